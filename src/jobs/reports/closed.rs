use std::collections::BTreeSet;

use async_trait::async_trait;

use super::Report;
use crate::error::AppResult;
use crate::tracker::{CLOSED_STATUSES, SearchQuery, TrackerClient};

pub const NAME: &str = "closed-bugs";

/// Bugs closed during the last day.
pub struct ClosedReport;

#[async_trait]
impl Report for ClosedReport {
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
            .statuses(CLOSED_STATUSES.iter().copied())
            .changed_within_days(1);
        let bugs = client.search(&query).await?;

        if bugs.is_empty() {
            return Ok("No bugs closed in the last 24 hours.".to_string());
        }

        let mut lines = vec![format!("*Bugs closed in the last 24 hours* ({})", bugs.len())];
        for bug in &bugs {
            let outcome = if bug.resolution.is_empty() {
                bug.status.clone()
            } else {
                format!("{} {}", bug.status, bug.resolution)
            };
            lines.push(format!(
                "• #{} {} [{}] {}",
                bug.id,
                outcome,
                bug.component_label(),
                bug.summary
            ));
        }
        Ok(lines.join("\n"))
    }
}
