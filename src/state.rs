//! Shared state of the command listener.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::commands::CommandDispatcher;

/// State handed to every request handler.
///
/// Cloning is cheap; the dispatcher is shared and the token is a handle.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    /// Shared secret commands must carry; empty disables the check
    pub verification_token: Arc<str>,
    /// Process-wide shutdown signal
    pub cancel: CancellationToken,
    /// Commands run on these tasks so shutdown can wait for them
    pub commands: TaskTracker,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        verification_token: impl Into<Arc<str>>,
        cancel: CancellationToken,
        commands: TaskTracker,
    ) -> Self {
        Self {
            dispatcher,
            verification_token: verification_token.into(),
            cancel,
            commands,
        }
    }

    /// True when `token` may submit commands.
    pub fn accepts_token(&self, token: &str) -> bool {
        self.verification_token.is_empty() || *self.verification_token == *token
    }
}
