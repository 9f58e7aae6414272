//! Static lifecycle controllers, run every resync interval.

pub mod close_stale;
pub mod first_team_comment;
pub mod new_bug;
pub mod reset_stale;
pub mod stale;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChannelClient, ChatTransport};
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::jobs::types::{ClientSet, Job, RunContext, Trigger};
use crate::tracker::{Bug, BugId, BugUpdate, TrackerClient};

pub use close_stale::CloseStaleController;
pub use first_team_comment::FirstTeamCommentController;
pub use new_bug::NewBugController;
pub use reset_stale::ResetStaleController;
pub use stale::StaleController;

/// Shared wiring of every controller
#[derive(Clone)]
pub struct ControllerContext {
    pub clients: ClientSet,
    /// Bound to the admin channel
    pub channel: ChannelClient,
    pub components: BTreeSet<String>,
    pub product: Option<String>,
    /// Bot account; its own comments do not count as activity
    pub username: String,
    /// Tracker logins of the team
    pub team: BTreeSet<String>,
    pub trigger: Trigger,
}

impl ControllerContext {
    pub fn new(settings: &Settings, clients: ClientSet, transport: Arc<dyn ChatTransport>) -> Self {
        let admin = settings.chat.admin_channel.clone();
        Self {
            clients,
            channel: ChannelClient::new(transport, admin.clone(), admin, false),
            components: settings.operator.components.clone(),
            product: settings.tracker.product.clone(),
            username: settings.tracker.username.clone(),
            team: settings.operator.team.members.clone(),
            trigger: Trigger::Interval(Duration::from_secs(settings.operator.resync_interval)),
        }
    }

    fn client(&self, ctx: &RunContext) -> &Arc<dyn TrackerClient> {
        self.clients.for_mode(ctx.mode)
    }

    /// Team members and the bot account.
    fn speaks_for_team(&self, login: &str) -> bool {
        !login.is_empty() && (login == self.username || self.team.contains(login))
    }
}

/// Every static controller, in registration order.
pub fn all(settings: &Settings, context: &ControllerContext) -> Vec<Arc<dyn Job>> {
    let stale = &settings.operator.stale;
    let team = &settings.operator.team;
    vec![
        Arc::new(StaleController::new(context.clone(), stale.clone())),
        Arc::new(ResetStaleController::new(context.clone(), stale.clone())),
        Arc::new(CloseStaleController::new(context.clone(), stale.clone())),
        Arc::new(FirstTeamCommentController::new(context.clone(), team.clone())),
        Arc::new(NewBugController::new(context.clone(), team.clone())),
    ]
}

/// Applies `update` to each bug, continuing past failures.
async fn apply_all(
    client: &dyn TrackerClient,
    bugs: &[Bug],
    update: &BugUpdate,
) -> (Vec<BugId>, Vec<(BugId, AppError)>) {
    let mut done = Vec::new();
    let mut failed = Vec::new();
    for bug in bugs {
        match client.update_bug(bug.id, update).await {
            Ok(()) => done.push(bug.id),
            Err(e) => {
                tracing::warn!(bug_id = bug.id, error = %e, "Failed to update bug");
                failed.push((bug.id, e));
            }
        }
    }
    (done, failed)
}

/// Posts what a controller did and turns partial failure into an error.
async fn finish(
    context: &ControllerContext,
    ctx: &RunContext,
    action: &str,
    done: &[BugId],
    failed: Vec<(BugId, AppError)>,
) -> AppResult<()> {
    if !done.is_empty() {
        let ids: Vec<String> = done.iter().map(|id| format!("#{}", id)).collect();
        let text = format!("{} {} bug(s): {}", action, done.len(), ids.join(", "));
        context.channel.for_mode(ctx.mode).message_channel(&text).await?;
    }

    if failed.is_empty() {
        return Ok(());
    }
    let details: Vec<String> = failed
        .iter()
        .map(|(id, e)| format!("#{}: {}", id, e))
        .collect();
    Err(AppError::Internal {
        source: anyhow::anyhow!(
            "{} failed for {} bug(s): {}",
            action,
            failed.len(),
            details.join("; ")
        ),
    })
}
