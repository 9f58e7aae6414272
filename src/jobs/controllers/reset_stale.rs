use async_trait::async_trait;

use super::{ControllerContext, apply_all, finish};
use crate::config::StaleConfig;
use crate::error::AppResult;
use crate::jobs::types::{Job, RunContext, Trigger};
use crate::tracker::{Bug, BugUpdate, OPEN_STATUSES, SearchQuery, TrackerClient};

pub const NAME: &str = "stale-reset";

/// Removes the stale mark from bugs someone commented on.
pub struct ResetStaleController {
    context: ControllerContext,
    config: StaleConfig,
}

impl ResetStaleController {
    pub fn new(context: ControllerContext, config: StaleConfig) -> Self {
        Self { context, config }
    }

    /// True when the latest comment was written by somebody else than the bot.
    async fn has_human_activity(&self, client: &dyn TrackerClient, bug: &Bug) -> AppResult<bool> {
        let comments = client.get_comments(bug.id).await?;
        Ok(comments
            .last()
            .is_some_and(|c| !c.creator.is_empty() && c.creator != self.context.username))
    }
}

#[async_trait]
impl Job for ResetStaleController {
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
            .with_keyword(self.config.keyword.clone());
        let marked = client.search(&query).await?;

        let mut active = Vec::new();
        for bug in marked {
            if self.has_human_activity(client.as_ref(), &bug).await? {
                active.push(bug);
            }
        }

        let update = BugUpdate {
            keywords_remove: vec![self.config.keyword.clone()],
            ..Default::default()
        };
        let (done, failed) = apply_all(client.as_ref(), &active, &update).await;
        finish(&self.context, ctx, "Removed stale mark from", &done, failed).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::jobs::ExecutionMode;
    use crate::test_support::{MockTracker, RecordingTransport, controller_context, run_context, sample_bug};

    #[tokio::test]
    async fn test_resets_only_bugs_with_foreign_comments() {
        let mut answered = sample_bug(1, "NEW");
        answered.keywords = vec!["LifecycleStale".to_string()];
        let mut silent = sample_bug(2, "NEW");
        silent.keywords = vec!["LifecycleStale".to_string()];

        let tracker = Arc::new(MockTracker::with_bugs(vec![answered, silent]));
        tracker.push_comment(1, "bot@example.com", "marked stale");
        tracker.push_comment(1, "dev@example.com", "still happening");
        tracker.push_comment(2, "bot@example.com", "marked stale");

        let transport = Arc::new(RecordingTransport::default());
        let controller = ResetStaleController::new(
            controller_context(&tracker, &transport),
            StaleConfig::default(),
        );
        controller
            .sync(&run_context(&transport, ExecutionMode::Production))
            .await
            .unwrap();

        assert!(!tracker.bug(1).unwrap().has_keyword("LifecycleStale"));
        assert!(tracker.bug(2).unwrap().has_keyword("LifecycleStale"));
    }
}
