//! Executes chat commands.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::chat::{ADMINS_GROUP, Authorizer, ChatTransport};
use crate::commands::parser::Command;
use crate::jobs::{ExecutionMode, Job, JobError, JobExecutor, JobRegistry, ReportCatalog};
use crate::tracker::TrackerClient;

/// An incoming command as delivered by the chat platform
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub user: String,
    pub channel: String,
    pub text: String,
}

/// What happened to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Answered without running anything
    Replied,
    Denied,
    Unknown,
    /// Job was already running
    Busy,
    Succeeded,
    Failed,
}

pub struct CommandDispatcher {
    registry: Arc<JobRegistry>,
    executor: Arc<JobExecutor>,
    authorizer: Arc<dyn Authorizer>,
    transport: Arc<dyn ChatTransport>,
    catalog: ReportCatalog,
    /// Debug client; on-demand reports never write to the tracker
    report_client: Arc<dyn TrackerClient>,
    components: BTreeSet<String>,
    cancel: CancellationToken,
}

impl CommandDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<JobRegistry>,
        executor: Arc<JobExecutor>,
        authorizer: Arc<dyn Authorizer>,
        transport: Arc<dyn ChatTransport>,
        catalog: ReportCatalog,
        report_client: Arc<dyn TrackerClient>,
        components: BTreeSet<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            executor,
            authorizer,
            transport,
            catalog,
            report_client,
            components,
            cancel,
        }
    }

    /// Handles one command to completion. Failures are reported to the
    /// requester or the recorder and never returned.
    pub async fn handle(&self, request: &CommandRequest) -> CommandOutcome {
        let command = Command::parse(&request.text);
        tracing::info!(user = %request.user, channel = %request.channel, ?command, "Received command");

        if self.cancel.is_cancelled() {
            self.ephemeral(request, "The bot is shutting down, try again later.")
                .await;
            return CommandOutcome::Replied;
        }

        if command.requires_admin() && !self.is_admin(&request.user).await {
            self.ephemeral(
                request,
                &format!("You need to be in group {:?} to run this command.", ADMINS_GROUP),
            )
            .await;
            return CommandOutcome::Denied;
        }

        match command {
            Command::Trigger(name) => {
                let job = self.registry.controller(&name);
                self.run_job(request, &name, job, ExecutionMode::Production).await
            }
            Command::Debug(name) => {
                let job = self.registry.debuggable(&name);
                self.run_job(request, &name, job, ExecutionMode::Debug).await
            }
            Command::Report(name) => self.run_report(request, &name).await,
            Command::Say(text) => {
                self.reply(request, &text).await;
                CommandOutcome::Replied
            }
            Command::Help => {
                self.reply(request, &self.help()).await;
                CommandOutcome::Replied
            }
            Command::Unknown(_) => {
                self.reply(request, "Unknown command").await;
                CommandOutcome::Unknown
            }
        }
    }

    async fn is_admin(&self, user: &str) -> bool {
        match self.authorizer.is_member(user, ADMINS_GROUP).await {
            Ok(member) => member,
            Err(e) => {
                tracing::error!(user, error = %e, "Group membership check failed");
                false
            }
        }
    }

    async fn run_job(
        &self,
        request: &CommandRequest,
        name: &str,
        job: Option<Arc<dyn Job>>,
        mode: ExecutionMode,
    ) -> CommandOutcome {
        let Some(job) = job else {
            self.reply(request, &format!("Unknown job {:?}", name)).await;
            return CommandOutcome::Unknown;
        };

        if self.executor.concurrency().is_running(&job.instance()) {
            self.reply_busy(request, name).await;
            return CommandOutcome::Busy;
        }

        let ack = match mode {
            ExecutionMode::Production => format!("Triggering job {:?}", name),
            ExecutionMode::Debug => format!("Triggering job {:?} in debug mode", name),
        };
        self.ephemeral(request, &ack).await;

        match self.executor.execute(job.as_ref(), mode).await {
            Ok(report) if report.result.is_ok() => {
                self.ephemeral(
                    request,
                    &format!("Finished job {:?} after {:.1?}", name, report.elapsed),
                )
                .await;
                CommandOutcome::Succeeded
            }
            // Already posted to the admin channel by the executor
            Ok(_) => CommandOutcome::Failed,
            Err(JobError::AlreadyRunning(_)) => {
                self.reply_busy(request, name).await;
                CommandOutcome::Busy
            }
            Err(e) => {
                tracing::error!(job = %name, error = %e, "Failed to start job");
                self.ephemeral(request, &format!("Failed to start job {:?}: {}", name, e))
                    .await;
                CommandOutcome::Failed
            }
        }
    }

    async fn run_report(&self, request: &CommandRequest, name: &str) -> CommandOutcome {
        let Some(report) = self.catalog.create(name) else {
            self.reply(request, &format!("Unknown report {:?}", name)).await;
            return CommandOutcome::Unknown;
        };

        self.ephemeral(
            request,
            &format!("Running job {:?}. This might take some seconds.", name),
        )
        .await;

        let start = Instant::now();
        match report
            .generate(self.report_client.as_ref(), &self.components)
            .await
        {
            Ok(text) => {
                self.reply(request, &text).await;
                self.ephemeral(
                    request,
                    &format!("Finished report {:?} after {:.1?}", name, start.elapsed()),
                )
                .await;
                CommandOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!(report = %name, error = %e, "Report failed");
                self.ephemeral(request, &format!("Error running report {}: {}", name, e))
                    .await;
                CommandOutcome::Failed
            }
        }
    }

    fn help(&self) -> String {
        let controllers = self.registry.controller_names();
        let mut debuggable = controllers.clone();
        debuggable.extend(self.registry.report_names());
        [
            format!("`trigger <job>`: run a job now: {}", controllers.join(", ")),
            format!("`debug <job>`: run a job in debug mode: {}", debuggable.join(", ")),
            format!(
                "`report <job>`: run a report and print the result here: {}",
                self.catalog.names().join(", ")
            ),
            "`say <message>`: repeat a message".to_string(),
        ]
        .join("\n")
    }

    async fn reply_busy(&self, request: &CommandRequest, name: &str) {
        self.reply(
            request,
            &format!("Job {:?} is already running, try again later", name),
        )
        .await;
    }

    async fn reply(&self, request: &CommandRequest, text: &str) {
        if let Err(e) = self.transport.post_message(&request.channel, text).await {
            tracing::error!(channel = %request.channel, error = %e, "Failed to reply");
        }
    }

    async fn ephemeral(&self, request: &CommandRequest, text: &str) {
        if let Err(e) = self
            .transport
            .post_ephemeral(&request.channel, &request.user, text)
            .await
        {
            tracing::error!(channel = %request.channel, user = %request.user, error = %e, "Failed to post ephemeral reply");
        }
    }
}
