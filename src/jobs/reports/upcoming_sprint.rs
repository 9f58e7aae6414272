use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use super::{Report, bug_line};
use crate::error::AppResult;
use crate::tracker::{Bug, OPEN_STATUSES, SearchQuery, TrackerClient};

pub const NAME: &str = "upcoming-sprint";

/// Keyword planning a bug into the next sprint
pub const SPRINT_KEYWORD: &str = "UpcomingSprint";

/// Open bugs planned for the next sprint, per assignee.
pub struct UpcomingSprintReport;

#[async_trait]
impl Report for UpcomingSprintReport {
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
            .with_keyword(SPRINT_KEYWORD);
        let bugs = client.search(&query).await?;

        if bugs.is_empty() {
            return Ok("No bugs planned for the upcoming sprint.".to_string());
        }

        let mut by_assignee: BTreeMap<&str, Vec<&Bug>> = BTreeMap::new();
        for bug in &bugs {
            let assignee = if bug.assigned_to.is_empty() {
                "unassigned"
            } else {
                bug.assigned_to.as_str()
            };
            by_assignee.entry(assignee).or_default().push(bug);
        }

        let mut lines = vec![format!("*Upcoming sprint* ({})", bugs.len())];
        for (assignee, bugs) in by_assignee {
            lines.push(String::new());
            lines.push(format!("*{}* ({})", assignee, bugs.len()));
            lines.extend(bugs.into_iter().map(bug_line));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockTracker, sample_bug};

    #[tokio::test]
    async fn test_groups_planned_bugs_by_assignee() {
        let mut mine = sample_bug(1, "ASSIGNED");
        mine.keywords = vec![SPRINT_KEYWORD.to_string()];
        let mut theirs = sample_bug(2, "NEW");
        theirs.keywords = vec![SPRINT_KEYWORD.to_string()];
        theirs.assigned_to = "qa@example.com".to_string();
        let mut done = sample_bug(3, "CLOSED");
        done.keywords = vec![SPRINT_KEYWORD.to_string()];
        let tracker = MockTracker::with_bugs(vec![mine, theirs, done, sample_bug(4, "NEW")]);

        let text = UpcomingSprintReport
            .generate(&tracker, &BTreeSet::new())
            .await
            .unwrap();

        assert!(text.starts_with("*Upcoming sprint* (2)"));
        assert!(text.contains("*dev@example.com* (1)"));
        assert!(text.contains("*qa@example.com* (1)"));
        assert!(!text.contains("#3"));
        assert!(!text.contains("#4"));
    }

    #[tokio::test]
    async fn test_empty_sprint() {
        let tracker = MockTracker::with_bugs(vec![sample_bug(1, "NEW")]);
        let text = UpcomingSprintReport
            .generate(&tracker, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(text, "No bugs planned for the upcoming sprint.");
    }
}
