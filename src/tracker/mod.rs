//! Ticket tracker access: the client trait, the Bugzilla REST client and the
//! debug decorator.

pub mod client;
pub mod debug;
pub mod http;
pub mod types;

pub use client::TrackerClient;
pub use debug::DebugTrackerClient;
pub use http::HttpTrackerClient;
pub use types::{
    Bug, BugId, BugUpdate, CLOSED_STATUSES, Comment, FieldChange, HistoryEntry, OPEN_STATUSES,
    SearchQuery,
};
