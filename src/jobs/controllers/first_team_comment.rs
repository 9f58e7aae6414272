use async_trait::async_trait;

use super::{ControllerContext, apply_all, finish};
use crate::config::TeamConfig;
use crate::error::AppResult;
use crate::jobs::types::{Job, RunContext, Trigger};
use crate::tracker::{Bug, BugUpdate, OPEN_STATUSES, SearchQuery, TrackerClient};

pub const NAME: &str = "first-team-comment";

/// Acknowledges recently reported bugs nobody from the team has answered.
///
/// The acknowledgement is written by the bot account, which counts as the
/// team, so a bug is only ever commented on once.
pub struct FirstTeamCommentController {
    context: ControllerContext,
    config: TeamConfig,
}

impl FirstTeamCommentController {
    pub fn new(context: ControllerContext, config: TeamConfig) -> Self {
        Self { context, config }
    }

    async fn awaits_team(&self, client: &dyn TrackerClient, bug: &Bug) -> AppResult<bool> {
        let comments = client.get_comments(bug.id).await?;
        Ok(!comments
            .iter()
            .any(|c| self.context.speaks_for_team(&c.creator)))
    }
}

#[async_trait]
impl Job for FirstTeamCommentController {
    fn name(&self) -> &str {
        NAME
    }

    fn trigger(&self) -> &Trigger {
        &self.context.trigger
    }

    async fn sync(&self, ctx: &RunContext) -> AppResult<()> {
        let client = self.context.client(ctx);
        let query = SearchQuery::new()
            .product(self.context.product.clone())
            .components(self.context.components.iter().cloned())
            .statuses(OPEN_STATUSES.iter().copied())
            .created_within_days(self.config.first_comment_within_days);
        let recent = client.search(&query).await?;

        let mut waiting = Vec::new();
        for bug in recent {
            if self.awaits_team(client.as_ref(), &bug).await? {
                waiting.push(bug);
            }
        }
        tracing::info!(count = waiting.len(), "Found bugs without a team comment");

        let update = BugUpdate {
            comment: Some(self.config.first_comment.clone()),
            ..Default::default()
        };
        let (done, failed) = apply_all(client.as_ref(), &waiting, &update).await;
        finish(&self.context, ctx, "Added first team comment to", &done, failed).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::{SignedDuration, Timestamp};

    use super::*;
    use crate::jobs::ExecutionMode;
    use crate::test_support::{MockTracker, RecordingTransport, controller_context, run_context, sample_bug};

    fn controller(tracker: &Arc<MockTracker>, transport: &Arc<RecordingTransport>) -> FirstTeamCommentController {
        let mut context = controller_context(tracker, transport);
        context.team.insert("dev@example.com".to_string());
        FirstTeamCommentController::new(context, TeamConfig::default())
    }

    #[tokio::test]
    async fn test_comments_once_on_unanswered_recent_bugs() {
        let mut old = sample_bug(3, "NEW");
        old.creation_time = Some(Timestamp::now() - SignedDuration::from_hours(24 * 30));
        let tracker = Arc::new(MockTracker::with_bugs(vec![
            sample_bug(1, "NEW"),
            sample_bug(2, "ASSIGNED"),
            old,
        ]));
        tracker.push_comment(1, "reporter@example.com", "It crashes");
        tracker.push_comment(2, "dev@example.com", "Looking into it");
        let transport = Arc::new(RecordingTransport::default());
        let controller = controller(&tracker, &transport);
        let ctx = run_context(&transport, ExecutionMode::Production);

        controller.sync(&ctx).await.unwrap();
        assert_eq!(tracker.mutation_calls(), 1);
        assert_eq!(transport.messages()[0].text, "Added first team comment to 1 bug(s): #1");

        // the bot's comment answers the bug
        controller.sync(&ctx).await.unwrap();
        assert_eq!(tracker.mutation_calls(), 1);
    }

    #[tokio::test]
    async fn test_debug_run_only_describes_comment() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(1, "NEW")]));
        let transport = Arc::new(RecordingTransport::default());

        controller(&tracker, &transport)
            .sync(&run_context(&transport, ExecutionMode::Debug))
            .await
            .unwrap();

        assert_eq!(tracker.mutation_calls(), 0);
        assert!(transport.messages().iter().any(|m| m.text.contains("would update bug 1")));
    }
}
