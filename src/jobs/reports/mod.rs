//! Reports: plain-text summaries of tracker state, posted on a schedule or
//! generated on demand.

pub mod blockers;
pub mod closed;
pub mod incoming;
pub mod upcoming_sprint;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::chat::{ChannelClient, ChatTransport};
use crate::config::ScheduleEntry;
use crate::error::AppResult;
use crate::jobs::types::{Job, RunContext, Trigger};
use crate::tracker::{Bug, TrackerClient};

pub use blockers::BlockersReport;
pub use closed::ClosedReport;
pub use incoming::IncomingReport;
pub use upcoming_sprint::UpcomingSprintReport;

/// Produces report text from tracker reads.
#[async_trait]
pub trait Report: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        client: &dyn TrackerClient,
        components: &BTreeSet<String>,
    ) -> AppResult<String>;
}

pub type ReportFactory = fn() -> Arc<dyn Report>;

/// Registration table of report names to constructors
#[derive(Clone, Default)]
pub struct ReportCatalog {
    factories: BTreeMap<String, ReportFactory>,
}

impl ReportCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in report
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog
            .register(blockers::NAME, || Arc::new(BlockersReport))
            .register(closed::NAME, || Arc::new(ClosedReport))
            .register(incoming::NAME, || Arc::new(IncomingReport))
            .register(upcoming_sprint::NAME, || Arc::new(UpcomingSprintReport));
        catalog
    }

    pub fn register(&mut self, name: &str, factory: ReportFactory) -> &mut Self {
        self.factories.insert(name.to_string(), factory);
        self
    }

    pub fn create(&self, name: &str) -> Option<Arc<dyn Report>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Everything a report job needs besides the report itself.
#[derive(Clone)]
pub struct ReportDeps {
    /// Debug-decorated client; reports never write to the tracker
    pub client: Arc<dyn TrackerClient>,
    pub transport: Arc<dyn ChatTransport>,
    pub admin_channel: String,
    /// Components of on-demand runs
    pub components: BTreeSet<String>,
}

/// A report bound to a channel, components and trigger.
pub struct ReportJob {
    report: Arc<dyn Report>,
    instance: String,
    client: Arc<dyn TrackerClient>,
    channel: ChannelClient,
    components: BTreeSet<String>,
    trigger: Trigger,
}

impl ReportJob {
    /// Report posted to the entry's channel whenever the trigger fires.
    pub fn scheduled(
        report: Arc<dyn Report>,
        entry: &ScheduleEntry,
        trigger: Trigger,
        deps: &ReportDeps,
    ) -> Self {
        Self {
            instance: format!("{}@{}", report.name(), entry.channel),
            report,
            client: Arc::clone(&deps.client),
            channel: ChannelClient::new(
                Arc::clone(&deps.transport),
                entry.channel.clone(),
                deps.admin_channel.clone(),
                false,
            ),
            components: entry.components.clone(),
            trigger,
        }
    }

    /// Report invoked from chat, posting to the admin channel.
    pub fn on_demand(report: Arc<dyn Report>, deps: &ReportDeps) -> Self {
        Self {
            instance: format!("{}@{}", report.name(), deps.admin_channel),
            report,
            client: Arc::clone(&deps.client),
            channel: ChannelClient::new(
                Arc::clone(&deps.transport),
                deps.admin_channel.clone(),
                deps.admin_channel.clone(),
                false,
            ),
            components: deps.components.clone(),
            trigger: Trigger::Manual,
        }
    }

    pub fn channel(&self) -> &ChannelClient {
        &self.channel
    }
}

#[async_trait]
impl Job for ReportJob {
    fn name(&self) -> &str {
        self.report.name()
    }

    fn instance(&self) -> String {
        self.instance.clone()
    }

    fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    async fn sync(&self, ctx: &RunContext) -> AppResult<()> {
        let text = self
            .report
            .generate(self.client.as_ref(), &self.components)
            .await?;
        self.channel.for_mode(ctx.mode).message_channel(&text).await
    }
}

/// One bullet line per bug
pub(crate) fn bug_line(bug: &Bug) -> String {
    let assignee = if bug.assigned_to.is_empty() {
        "unassigned"
    } else {
        bug.assigned_to.as_str()
    };
    format!(
        "• #{} [{}] {} {} ({})",
        bug.id, bug.severity, bug.status, bug.summary, assignee
    )
}

/// Bugs grouped under their first component
pub(crate) fn by_component(bugs: &[Bug]) -> BTreeMap<String, Vec<&Bug>> {
    let mut groups: BTreeMap<String, Vec<&Bug>> = BTreeMap::new();
    for bug in bugs {
        let component = bug
            .component
            .first()
            .cloned()
            .unwrap_or_else(|| "(none)".to_string());
        groups.entry(component).or_default().push(bug);
    }
    groups
}

pub(crate) fn grouped_text(title: &str, bugs: &[Bug]) -> String {
    let mut lines = vec![format!("*{}* ({})", title, bugs.len())];
    for (component, bugs) in by_component(bugs) {
        lines.push(String::new());
        lines.push(format!("*{}* ({})", component, bugs.len()));
        lines.extend(bugs.into_iter().map(bug_line));
    }
    lines.join("\n")
}
