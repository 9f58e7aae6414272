use async_trait::async_trait;

use super::{ControllerContext, apply_all, finish};
use crate::config::StaleConfig;
use crate::error::AppResult;
use crate::jobs::types::{Job, RunContext, Trigger};
use crate::tracker::{BugUpdate, OPEN_STATUSES, SearchQuery};

pub const NAME: &str = "stale";

/// Marks open bugs without recent activity as stale.
pub struct StaleController {
    context: ControllerContext,
    config: StaleConfig,
}

impl StaleController {
    pub fn new(context: ControllerContext, config: StaleConfig) -> Self {
        Self { context, config }
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new()
            .product(self.context.product.clone())
            .components(self.context.components.iter().cloned())
            .statuses(OPEN_STATUSES.iter().copied())
            .without_keyword(self.config.keyword.clone())
            .unchanged_for_days(self.config.after_days)
    }
}

#[async_trait]
impl Job for StaleController {
    fn name(&self) -> &str {
        NAME
    }

    fn trigger(&self) -> &Trigger {
        &self.context.trigger
    }

    async fn sync(&self, ctx: &RunContext) -> AppResult<()> {
        let client = self.context.client(ctx);
        let bugs = client.search(&self.query()).await?;
        tracing::info!(count = bugs.len(), "Found stale bug candidates");

        let update = BugUpdate {
            keywords_add: vec![self.config.keyword.clone()],
            comment: Some(self.config.comment.clone()),
            ..Default::default()
        };
        let (done, failed) = apply_all(client.as_ref(), &bugs, &update).await;
        finish(&self.context, ctx, "Marked as stale", &done, failed).await
    }
}
