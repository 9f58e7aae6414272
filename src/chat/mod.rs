//! Chat platform integration: transport, channel binding, event recorder and
//! group membership.

pub mod auth;
pub mod channel;
pub mod recorder;
pub mod transport;

pub use auth::{ADMINS_GROUP, Authorizer, GroupAuthorizer};
pub use channel::ChannelClient;
pub use recorder::Recorder;
pub use transport::{ChatTransport, LoggingTransport, SlackTransport};
