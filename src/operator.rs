//! Operator runtime: wires the clients, the job registry, the scheduler and
//! the command dispatcher together and owns their lifecycle.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::cache::{CacheStore, CachedTrackerClient};
use crate::chat::{ChannelClient, ChatTransport, GroupAuthorizer, Recorder, SlackTransport};
use crate::commands::CommandDispatcher;
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::jobs::controllers::{self, ControllerContext};
use crate::jobs::{
    ClientSet, JobExecutor, JobRegistry, JobScheduler, ReportCatalog, ReportDeps,
};
use crate::tracker::{DebugTrackerClient, HttpTrackerClient, TrackerClient};

const SHUTDOWN_MESSAGE: &str = ":crossed_fingers: *The bot is shutting down*";

pub struct Operator {
    settings: Settings,
    registry: Arc<JobRegistry>,
    dispatcher: Arc<CommandDispatcher>,
    recorder: Recorder,
    scheduler: JobScheduler,
    cache: Arc<CacheStore>,
    /// Commands dispatched from chat that have not finished yet
    commands: TaskTracker,
    cancel: CancellationToken,
    stopped: bool,
}

impl Operator {
    /// Connects to the tracker and the chat platform configured in
    /// `settings` and opens the cache.
    ///
    /// # Errors
    ///
    /// Fails when a client cannot be built or a schedule carries an invalid
    /// cron expression. Nothing is running yet when this returns an error.
    pub async fn new(settings: Settings, cancel: CancellationToken) -> AppResult<Self> {
        let tracker: Arc<dyn TrackerClient> = Arc::new(HttpTrackerClient::new(&settings.tracker)?);
        let transport: Arc<dyn ChatTransport> = Arc::new(SlackTransport::new(&settings.chat)?);
        let cache = CacheStore::open(&settings.cache, &cancel).await;
        Self::assemble(settings, tracker, transport, cache, cancel)
    }

    /// Builds the operator around already constructed clients.
    pub fn assemble(
        settings: Settings,
        tracker: Arc<dyn TrackerClient>,
        transport: Arc<dyn ChatTransport>,
        cache: Arc<CacheStore>,
        cancel: CancellationToken,
    ) -> AppResult<Self> {
        let admin_channel = settings.chat.admin_channel.clone();

        let production: Arc<dyn TrackerClient> =
            Arc::new(CachedTrackerClient::new(tracker, Arc::clone(&cache)));
        let debug: Arc<dyn TrackerClient> = Arc::new(DebugTrackerClient::new(
            Arc::clone(&production),
            ChannelClient::new(
                Arc::clone(&transport),
                admin_channel.clone(),
                admin_channel.clone(),
                true,
            ),
        ));
        let clients = ClientSet {
            production,
            debug: Arc::clone(&debug),
        };

        let catalog = ReportCatalog::builtin();
        let deps = ReportDeps {
            client: Arc::clone(&debug),
            transport: Arc::clone(&transport),
            admin_channel: admin_channel.clone(),
            components: settings.operator.components.clone(),
        };
        let context = ControllerContext::new(&settings, clients, Arc::clone(&transport));
        let registry = JobRegistry::builder()
            .controllers(controllers::all(&settings, &context))?
            .schedules(&settings.operator.schedules, &catalog, &deps)?
            .build();
        let registry = Arc::new(registry);

        let recorder = Recorder::new(
            ChannelClient::new(
                Arc::clone(&transport),
                admin_channel.clone(),
                admin_channel,
                false,
            ),
            settings.application.name.clone(),
        );
        let executor = Arc::new(JobExecutor::new(recorder.clone(), cancel.clone()));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&executor),
            Arc::new(GroupAuthorizer::new(settings.operator.groups.clone())),
            transport,
            catalog,
            debug,
            settings.operator.components.clone(),
            cancel.clone(),
        );

        Ok(Self {
            scheduler: JobScheduler::new(executor, cancel.clone()),
            settings,
            registry,
            dispatcher: Arc::new(dispatcher),
            recorder,
            cache,
            commands: TaskTracker::new(),
            cancel,
            stopped: false,
        })
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Tracker the listener spawns commands on; shutdown waits for them.
    pub fn command_tasks(&self) -> TaskTracker {
        self.commands.clone()
    }

    /// Announces the operator, reports configuration problems and starts one
    /// loop per enabled recurring job.
    pub async fn start(&mut self) -> AppResult<()> {
        let config = serde_json::to_string_pretty(&self.settings.anonymized())
            .map_err(|e| AppError::Internal { source: e.into() })?;
        self.recorder
            .event(
                "OperatorStarted",
                &format!("Bugzilla Operator Started\n\n```\n{}\n```\n", config),
            )
            .await;

        let disabled = &self.settings.operator.disabled_jobs;
        let unknown_disabled = self.registry.unknown_disabled(disabled);
        if !unknown_disabled.is_empty() {
            self.recorder
                .warning(
                    "UnknownDisabled",
                    &format!("Unknown disabled controllers in config: {:?}", unknown_disabled),
                )
                .await;
        }

        let unknown_reports = self.registry.unknown_reports();
        if !unknown_reports.is_empty() {
            self.recorder
                .warning(
                    "UnknownReport",
                    &format!("Unknown reports in schedules: {:?}", unknown_reports),
                )
                .await;
        }

        let jobs = self
            .registry
            .recurring(disabled, &self.settings.operator.enabled_jobs);
        self.scheduler.start(jobs);
        tracing::info!(
            loops = self.scheduler.len(),
            disabled = ?disabled,
            "Operator started"
        );
        Ok(())
    }

    /// Stops every loop after its current run, waits for commands still in
    /// flight, announces the shutdown and flushes the cache. Calling it again
    /// does nothing.
    pub async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        tracing::info!("Stopping job loops");
        self.cancel.cancel();
        self.scheduler.shutdown().await;

        self.commands.close();
        if !self.commands.is_empty() {
            tracing::info!(commands = self.commands.len(), "Waiting for running commands");
        }
        self.commands.wait().await;

        self.recorder.warning("Shutdown", SHUTDOWN_MESSAGE).await;
        self.cache.close().await;
        tracing::info!("Operator stopped");
    }
}
