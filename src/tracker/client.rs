use async_trait::async_trait;

use crate::error::AppResult;
use crate::tracker::types::{Bug, BugId, BugUpdate, Comment, HistoryEntry, SearchQuery};

/// Access to the ticket tracker.
///
/// Implemented by the HTTP client, the read-through cache and the debug
/// decorator, which all stack on top of each other. Errors are opaque
/// [`AppError::Remote`](crate::error::AppError::Remote) values and are never
/// retried at this layer. Dropping a returned future cancels the call.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    async fn get_bug(&self, id: BugId) -> AppResult<Bug>;

    async fn search(&self, query: &SearchQuery) -> AppResult<Vec<Bug>>;

    /// Comments of a bug, oldest first
    async fn get_comments(&self, id: BugId) -> AppResult<Vec<Comment>>;

    async fn get_history(&self, id: BugId) -> AppResult<Vec<HistoryEntry>>;

    async fn update_bug(&self, id: BugId, update: &BugUpdate) -> AppResult<()>;

    async fn add_comment(&self, id: BugId, text: &str) -> AppResult<()>;
}
