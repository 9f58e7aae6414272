//! Interactive chat commands.

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{CommandDispatcher, CommandOutcome, CommandRequest};
pub use parser::Command;
