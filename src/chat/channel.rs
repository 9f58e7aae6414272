use std::sync::Arc;

use crate::chat::transport::ChatTransport;
use crate::error::AppResult;
use crate::jobs::ExecutionMode;

/// A transport bound to one channel and the admin channel.
///
/// In debug mode everything meant for the channel is redirected to the admin
/// channel, so a debug run never talks to the teams it would normally report
/// to.
#[derive(Clone)]
pub struct ChannelClient {
    transport: Arc<dyn ChatTransport>,
    channel: String,
    admin_channel: String,
    debug: bool,
}

impl ChannelClient {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        channel: impl Into<String>,
        admin_channel: impl Into<String>,
        debug: bool,
    ) -> Self {
        Self {
            transport,
            channel: channel.into(),
            admin_channel: admin_channel.into(),
            debug,
        }
    }

    /// Same channels, debug flag taken from the execution mode.
    pub fn for_mode(&self, mode: ExecutionMode) -> Self {
        Self {
            debug: mode.is_debug(),
            ..self.clone()
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Channel that channel messages actually end up in
    pub fn target(&self) -> &str {
        if self.debug {
            &self.admin_channel
        } else {
            &self.channel
        }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    pub async fn message_channel(&self, text: &str) -> AppResult<()> {
        if self.debug {
            let text = format!("DEBUG (for {}): {}", self.channel, text);
            self.transport.post_message(&self.admin_channel, &text).await
        } else {
            self.transport.post_message(&self.channel, text).await
        }
    }

    pub async fn message_admin_channel(&self, text: &str) -> AppResult<()> {
        self.transport.post_message(&self.admin_channel, text).await
    }
}
