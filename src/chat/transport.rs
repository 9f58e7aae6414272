//! Outbound side of the chat platform.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::ChatConfig;
use crate::error::{AppError, AppResult};

/// Posts text into chat channels.
///
/// Implementations must be cheap to share; one instance serves every job,
/// the dispatcher and the recorder.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts a message visible to everyone in `channel`
    async fn post_message(&self, channel: &str, text: &str) -> AppResult<()>;

    /// Posts a message only `user` can see in `channel`
    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> AppResult<()>;

    /// Returns the transport name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API transport
pub struct SlackTransport {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackTransport {
    pub fn new(config: &ChatConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::remote(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::remote(
                method,
                anyhow::anyhow!("HTTP {}", status.as_u16()),
            ));
        }

        let result: SlackResponse = response
            .json()
            .await
            .map_err(|e| AppError::remote(method, e))?;
        if !result.ok {
            return Err(AppError::remote(
                method,
                anyhow::anyhow!(result.error.unwrap_or_else(|| "unknown error".to_string())),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn post_message(&self, channel: &str, text: &str) -> AppResult<()> {
        self.call(
            "chat.postMessage",
            json!({ "channel": channel, "text": text }),
        )
        .await
    }

    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> AppResult<()> {
        self.call(
            "chat.postEphemeral",
            json!({ "channel": channel, "user": user, "text": text }),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

/// Transport that only logs, used for dry runs.
pub struct LoggingTransport;

#[async_trait]
impl ChatTransport for LoggingTransport {
    async fn post_message(&self, channel: &str, text: &str) -> AppResult<()> {
        tracing::info!(channel, text, "chat message");
        Ok(())
    }

    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> AppResult<()> {
        tracing::info!(channel, user, text, "ephemeral chat message");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
