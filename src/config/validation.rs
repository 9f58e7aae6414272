//! Configuration validation logic
//!
//! Validation runs once at startup; any error here aborts the process before
//! a single job loop or listener has been started.

use crate::config::error::ConfigError;
use crate::config::settings::{
    CacheSettings, ChatConfig, OperatorConfig, ServerConfig, Settings, TrackerConfig,
};
use crate::jobs::Trigger;

impl ServerConfig {
    /// Port must be non-zero and the host non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535.",
            ));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(
                "server.host",
                "Host must not be empty.",
            ));
        }

        Ok(())
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::validation(
                "tracker.endpoint",
                format!(
                    "Invalid tracker endpoint '{}'. Expected an http:// or https:// URL.",
                    self.endpoint
                ),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "tracker.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_channel.trim().is_empty() {
            return Err(ConfigError::validation(
                "chat.admin_channel",
                "An admin channel is required; operator events and debug output are posted there.",
            ));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::validation(
                "chat.api_url",
                format!("Invalid chat API URL '{}'.", self.api_url),
            ));
        }

        Ok(())
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval == 0 {
            return Err(ConfigError::validation(
                "cache.flush_interval",
                "Flush interval must be greater than 0 seconds.",
            ));
        }

        if self.max_age == 0 {
            return Err(ConfigError::validation(
                "cache.max_age",
                "Max age must be greater than 0 seconds.",
            ));
        }

        if let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::validation(
                "cache.path",
                "Cache path must not be empty; remove the key for a memory-only cache.",
            ));
        }

        Ok(())
    }
}

impl OperatorConfig {
    /// Unknown report or disabled job names are not errors here; they are
    /// reported as warnings once the job registry exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resync_interval == 0 {
            return Err(ConfigError::validation(
                "operator.resync_interval",
                "Resync interval must be greater than 0 seconds.",
            ));
        }

        if self.stale.after_days == 0 || self.stale.close_after_days == 0 {
            return Err(ConfigError::validation(
                "operator.stale",
                "Stale and close thresholds must be at least one day.",
            ));
        }

        if self.team.first_comment_within_days == 0 {
            return Err(ConfigError::validation(
                "operator.team.first_comment_within_days",
                "First comment window must be at least one day.",
            ));
        }

        for (index, entry) in self.schedules.iter().enumerate() {
            let field = format!("operator.schedules[{}]", index);

            if entry.channel.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("{}.channel", field),
                    "Schedule channel must not be empty.".to_string(),
                ));
            }

            if entry.when.is_empty() {
                return Err(ConfigError::validation(
                    format!("{}.when", field),
                    "At least one cron expression is required.".to_string(),
                ));
            }

            Trigger::cron(&entry.when).map_err(|e| {
                ConfigError::validation(format!("{}.when", field), e.to_string())
            })?;
        }

        Ok(())
    }
}

impl Settings {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.tracker.validate()?;
        self.chat.validate()?;
        self.cache.validate()?;
        self.operator.validate()?;
        self.logger
            .validate()
            .map_err(|e| ConfigError::validation("logger", format!("{:#}", e)))?;
        Ok(())
    }
}
