//! Request and response bodies of the command listener.

pub mod command;
pub mod error;
pub mod health;

pub use command::CommandPayload;
pub use error::ErrorResponse;
pub use health::{HealthResponse, HealthStatus};
