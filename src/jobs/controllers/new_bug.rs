use async_trait::async_trait;

use super::{ControllerContext, apply_all, finish};
use crate::config::TeamConfig;
use crate::error::AppResult;
use crate::jobs::types::{Job, RunContext, Trigger};
use crate::tracker::{BugUpdate, SearchQuery};

pub const NAME: &str = "new";

/// Moves NEW bugs that a team member already owns to ASSIGNED.
///
/// Off by default; list it in `operator.enabled_jobs` to run it on the
/// resync interval. It can always be triggered from chat.
pub struct NewBugController {
    context: ControllerContext,
    config: TeamConfig,
}

impl NewBugController {
    pub fn new(context: ControllerContext, config: TeamConfig) -> Self {
        Self { context, config }
    }
}

#[async_trait]
impl Job for NewBugController {
    fn name(&self) -> &str {
        NAME
    }

    fn trigger(&self) -> &Trigger {
        &self.context.trigger
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    async fn sync(&self, ctx: &RunContext) -> AppResult<()> {
        let client = self.context.client(ctx);
        let query = SearchQuery::new()
            .product(self.context.product.clone())
            .components(self.context.components.iter().cloned())
            .statuses(["NEW"]);
        let owned: Vec<_> = client
            .search(&query)
            .await?
            .into_iter()
            .filter(|bug| self.context.team.contains(&bug.assigned_to))
            .collect();

        let update = BugUpdate {
            status: Some("ASSIGNED".to_string()),
            comment: Some(self.config.assigned_comment.clone()),
            ..Default::default()
        };
        let (done, failed) = apply_all(client.as_ref(), &owned, &update).await;
        finish(&self.context, ctx, "Moved to ASSIGNED", &done, failed).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::jobs::ExecutionMode;
    use crate::test_support::{MockTracker, RecordingTransport, controller_context, run_context, sample_bug};

    #[tokio::test]
    async fn test_assigns_bugs_owned_by_the_team() {
        let mut unowned = sample_bug(2, "NEW");
        unowned.assigned_to = "nobody@example.com".to_string();
        let tracker = Arc::new(MockTracker::with_bugs(vec![
            sample_bug(1, "NEW"),
            unowned,
            sample_bug(3, "POST"),
        ]));
        let transport = Arc::new(RecordingTransport::default());
        let mut context = controller_context(&tracker, &transport);
        context.team.insert("dev@example.com".to_string());
        let controller = NewBugController::new(context, TeamConfig::default());

        controller
            .sync(&run_context(&transport, ExecutionMode::Production))
            .await
            .unwrap();

        assert_eq!(tracker.bug(1).unwrap().status, "ASSIGNED");
        assert_eq!(tracker.bug(2).unwrap().status, "NEW");
        assert_eq!(tracker.bug(3).unwrap().status, "POST");
        assert_eq!(tracker.mutation_calls(), 1);
    }

    #[test]
    fn test_off_by_default() {
        let tracker = Arc::new(MockTracker::default());
        let transport = Arc::new(RecordingTransport::default());
        let controller = NewBugController::new(
            controller_context(&tracker, &transport),
            TeamConfig::default(),
        );
        assert!(!controller.enabled_by_default());
    }
}
