//! Request handlers of the command listener.

pub mod commands;
pub mod health;
