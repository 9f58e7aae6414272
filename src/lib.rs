//! tracker-operator
//!
//! Keeps a ticket tracker tidy from chat: recurring lifecycle controllers,
//! scheduled reports, an interactive command dispatcher, and a read-through
//! cache in front of the tracker.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cache;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logger;
pub mod operator;
pub mod server;
pub mod state;
pub mod tracker;

#[cfg(test)]
mod test_support;

pub use operator::Operator;
pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}
