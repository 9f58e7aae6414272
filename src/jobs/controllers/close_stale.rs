use async_trait::async_trait;

use super::{ControllerContext, apply_all, finish};
use crate::config::StaleConfig;
use crate::error::AppResult;
use crate::jobs::types::{Job, RunContext, Trigger};
use crate::tracker::{BugUpdate, OPEN_STATUSES, SearchQuery};

pub const NAME: &str = "close-stale";

/// Closes stale bugs nobody reacted to.
pub struct CloseStaleController {
    context: ControllerContext,
    config: StaleConfig,
}

impl CloseStaleController {
    pub fn new(context: ControllerContext, config: StaleConfig) -> Self {
        Self { context, config }
    }
}

#[async_trait]
impl Job for CloseStaleController {
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
            .with_keyword(self.config.keyword.clone())
            .unchanged_for_days(self.config.close_after_days);
        let bugs = client.search(&query).await?;

        let update = BugUpdate {
            status: Some("CLOSED".to_string()),
            resolution: Some(self.config.close_resolution.clone()),
            comment: Some(self.config.close_comment.clone()),
            ..Default::default()
        };
        let (done, failed) = apply_all(client.as_ref(), &bugs, &update).await;
        finish(&self.context, ctx, "Closed", &done, failed).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::{SignedDuration, Timestamp};

    use super::*;
    use crate::jobs::ExecutionMode;
    use crate::test_support::{MockTracker, RecordingTransport, controller_context, run_context, sample_bug};

    #[tokio::test]
    async fn test_closes_expired_stale_bugs_and_reports_failures() {
        let expired = |id| {
            let mut bug = sample_bug(id, "NEW");
            bug.keywords = vec!["LifecycleStale".to_string()];
            bug.last_change_time = Some(Timestamp::now() - SignedDuration::from_hours(24 * 8));
            bug
        };
        let tracker = Arc::new(MockTracker::with_bugs(vec![expired(1), expired(2)]));
        tracker.fail_updates_for(2);

        let transport = Arc::new(RecordingTransport::default());
        let controller = CloseStaleController::new(
            controller_context(&tracker, &transport),
            StaleConfig::default(),
        );
        let result = controller
            .sync(&run_context(&transport, ExecutionMode::Production))
            .await;

        assert!(result.unwrap_err().to_string().contains("#2"));
        let closed = tracker.bug(1).unwrap();
        assert_eq!(closed.status, "CLOSED");
        assert_eq!(closed.resolution, "DEFERRED");
        assert_eq!(tracker.bug(2).unwrap().status, "NEW");
    }
}
