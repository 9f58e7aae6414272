//! Client decorator that keeps debug runs read-only.

use std::sync::Arc;

use async_trait::async_trait;

use crate::chat::ChannelClient;
use crate::error::AppResult;
use crate::tracker::client::TrackerClient;
use crate::tracker::types::{Bug, BugId, BugUpdate, Comment, HistoryEntry, SearchQuery};

/// Passes reads through to the wrapped client and turns every mutation into
/// a message on the debug (admin) channel. The wrapped client's mutating
/// methods are never called.
pub struct DebugTrackerClient {
    delegate: Arc<dyn TrackerClient>,
    debug: ChannelClient,
}

impl DebugTrackerClient {
    pub fn new(delegate: Arc<dyn TrackerClient>, debug: ChannelClient) -> Self {
        Self { delegate, debug }
    }

    async fn report(&self, id: BugId, text: String) {
        tracing::info!(bug_id = id, "Suppressed tracker mutation in debug mode");
        // Suppression already happened; a lost notice must not fail the job
        if let Err(e) = self.debug.message_admin_channel(&text).await {
            tracing::warn!(bug_id = id, error = %e, "Failed to post debug mutation notice");
        }
    }
}

#[async_trait]
impl TrackerClient for DebugTrackerClient {
    async fn get_bug(&self, id: BugId) -> AppResult<Bug> {
        self.delegate.get_bug(id).await
    }

    async fn search(&self, query: &SearchQuery) -> AppResult<Vec<Bug>> {
        self.delegate.search(query).await
    }

    async fn get_comments(&self, id: BugId) -> AppResult<Vec<Comment>> {
        self.delegate.get_comments(id).await
    }

    async fn get_history(&self, id: BugId) -> AppResult<Vec<HistoryEntry>> {
        self.delegate.get_history(id).await
    }

    async fn update_bug(&self, id: BugId, update: &BugUpdate) -> AppResult<()> {
        self.report(
            id,
            format!(":eyes: DEBUG: would update bug {}: {}", id, update.describe()),
        )
        .await;
        Ok(())
    }

    async fn add_comment(&self, id: BugId, text: &str) -> AppResult<()> {
        self.report(
            id,
            format!(
                ":eyes: DEBUG: would comment on bug {}:\n> {}",
                id,
                text.replace('\n', "\n> ")
            ),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockTracker, RecordingTransport, sample_bug};

    #[tokio::test]
    async fn test_reads_pass_through_mutations_are_reported() {
        let tracker = Arc::new(MockTracker::with_bugs(vec![sample_bug(7, "NEW")]));
        let transport = Arc::new(RecordingTransport::default());
        let channel = ChannelClient::new(transport.clone(), "#team", "#admin", true);
        let client = DebugTrackerClient::new(tracker.clone(), channel);

        let bug = client.get_bug(7).await.unwrap();
        assert_eq!(bug.id, 7);
        assert_eq!(tracker.read_calls(), 1);

        let update = BugUpdate {
            keywords_add: vec!["LifecycleStale".to_string()],
            ..Default::default()
        };
        client.update_bug(7, &update).await.unwrap();
        client.add_comment(7, "hello").await.unwrap();

        assert_eq!(tracker.mutation_calls(), 0);
        let messages = transport.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.channel == "#admin"));
        assert!(messages[0].text.contains("would update bug 7"));
        assert!(messages[1].text.contains("> hello"));
    }

    #[tokio::test]
    async fn test_failed_notice_does_not_fail_mutation() {
        let tracker = Arc::new(MockTracker::default());
        let transport = Arc::new(RecordingTransport::failing());
        let channel = ChannelClient::new(transport, "#team", "#admin", true);
        let client = DebugTrackerClient::new(tracker.clone(), channel);

        assert!(client.add_comment(1, "text").await.is_ok());
        assert_eq!(tracker.mutation_calls(), 0);
    }
}
