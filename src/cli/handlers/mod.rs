//! Command handlers for CLI operations
//!
//! This module contains handlers for different CLI commands,
//! separating command execution logic from parsing and validation.

pub mod jobs;
pub mod serve;

pub use jobs::JobsCommandHandler;
pub use serve::ServeCommandHandler;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::chat::LoggingTransport;
use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::operator::Operator;
use crate::tracker::HttpTrackerClient;

/// Operator that never talks to anyone: chat output is logged and the cache
/// stays in memory. Building it validates the schedules.
fn offline_operator(settings: &Settings) -> AppResult<Operator> {
    Operator::assemble(
        settings.clone(),
        Arc::new(HttpTrackerClient::new(&settings.tracker)?),
        Arc::new(LoggingTransport),
        CacheStore::memory_only(Duration::from_secs(settings.cache.max_age)),
        CancellationToken::new(),
    )
}
