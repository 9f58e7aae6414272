//! Event sink for operator status messages.
//!
//! Everything that goes wrong in a job loop or a command ends up here; the
//! admin channel is where failures become visible to humans.

use crate::chat::channel::ChannelClient;

#[derive(Clone)]
pub struct Recorder {
    channel: ChannelClient,
    component: String,
}

impl Recorder {
    pub fn new(channel: ChannelClient, component: impl Into<String>) -> Self {
        Self {
            channel,
            component: component.into(),
        }
    }

    /// Normal operator event
    pub async fn event(&self, reason: &str, message: &str) {
        tracing::info!(component = %self.component, reason, "{}", message);
        self.post(reason, message).await;
    }

    /// Something a human should look at
    pub async fn warning(&self, reason: &str, message: &str) {
        tracing::warn!(component = %self.component, reason, "{}", message);
        self.post(reason, &format!(":warning: {}", message)).await;
    }

    async fn post(&self, reason: &str, text: &str) {
        // Failing to report must never fail the caller
        if let Err(e) = self.channel.message_admin_channel(text).await {
            tracing::error!(component = %self.component, reason, error = %e, "Failed to post event");
        }
    }
}
