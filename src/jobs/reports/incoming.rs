use std::collections::BTreeSet;

use async_trait::async_trait;

use super::{Report, grouped_text};
use crate::error::AppResult;
use crate::tracker::{SearchQuery, TrackerClient};

pub const NAME: &str = "incoming-bugs";

/// New bugs filed during the last day, per component.
pub struct IncomingReport;

#[async_trait]
impl Report for IncomingReport {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(
        &self,
        client: &dyn TrackerClient,
        components: &BTreeSet<String>,
    ) -> AppResult<String> {
        let query = SearchQuery::new()
            .components(components.iter().cloned())
            .statuses(["NEW"])
            .created_within_days(1);
        let bugs = client.search(&query).await?;

        if bugs.is_empty() {
            return Ok("No incoming bugs in the last 24 hours.".to_string());
        }
        Ok(grouped_text("Incoming bugs in the last 24 hours", &bugs))
    }
}
