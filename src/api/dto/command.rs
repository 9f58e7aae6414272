//! Slash-command payload.

use serde::Deserialize;

use crate::commands::CommandRequest;

/// A command as posted by the chat platform, form-encoded or JSON.
///
/// Field names follow the Slack slash-command payload; everything else the
/// platform sends is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandPayload {
    #[serde(default)]
    pub token: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
}

impl From<CommandPayload> for CommandRequest {
    fn from(payload: CommandPayload) -> Self {
        CommandRequest {
            user: payload.user_id,
            channel: payload.channel_id,
            text: payload.text,
        }
    }
}
