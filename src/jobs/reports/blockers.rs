use std::collections::BTreeSet;

use async_trait::async_trait;

use super::{Report, grouped_text};
use crate::error::AppResult;
use crate::tracker::{OPEN_STATUSES, SearchQuery, TrackerClient};

pub const NAME: &str = "blocker-bugs";

const BLOCKER_SEVERITIES: &[&str] = &["urgent", "high"];

/// Open urgent and high severity bugs per component.
pub struct BlockersReport;

#[async_trait]
impl Report for BlockersReport {
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
            .statuses(OPEN_STATUSES.iter().copied())
            .severities(BLOCKER_SEVERITIES.iter().copied());
        let mut bugs = client.search(&query).await?;

        if bugs.is_empty() {
            return Ok("No blocker bugs :tada:".to_string());
        }

        bugs.sort_by(|a, b| {
            severity_rank(&a.severity)
                .cmp(&severity_rank(&b.severity))
                .then(a.id.cmp(&b.id))
        });
        Ok(grouped_text("Blocker bugs", &bugs))
    }
}

fn severity_rank(severity: &str) -> usize {
    BLOCKER_SEVERITIES
        .iter()
        .position(|s| s.eq_ignore_ascii_case(severity))
        .unwrap_or(BLOCKER_SEVERITIES.len())
}
