//! Configuration settings structures for the operator
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logger::LoggerConfig;

const REDACTED: &str = "<redacted>";

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "tracker-operator".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_tracker_endpoint() -> String {
    "https://bugzilla.redhat.com".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_chat_api_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_flush_interval() -> u64 {
    300
}

fn default_cache_max_age() -> u64 {
    300
}

fn default_resync_interval() -> u64 {
    3600
}

fn default_stale_after_days() -> u32 {
    30
}

fn default_close_after_days() -> u32 {
    7
}

fn default_stale_keyword() -> String {
    "LifecycleStale".to_string()
}

fn default_stale_comment() -> String {
    "This bug hasn't had any activity in the last 30 days. Maybe the problem got resolved, \
     was a duplicate of something else, or became less pressing for some reason - or maybe \
     it's still relevant but just hasn't been looked at yet. As such, we're marking this bug \
     as \"LifecycleStale\" and it will be closed in 7 days unless someone comments on it."
        .to_string()
}

fn default_close_comment() -> String {
    "This bug hasn't had any activity 7 days after it was marked as \"LifecycleStale\", so we \
     are closing it. Please reopen it if the issue is still relevant."
        .to_string()
}

fn default_close_resolution() -> String {
    "DEFERRED".to_string()
}

fn default_first_comment_within_days() -> u32 {
    7
}

fn default_first_comment() -> String {
    "Thank you for the report. The team has seen this bug and will triage it.".to_string()
}

fn default_assigned_comment() -> String {
    "Moving to ASSIGNED, a team member is working on this bug.".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Listener for incoming chat commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// Tracker Configuration
// ============================================================================

/// Connection to the ticket tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the Bugzilla-compatible REST service
    #[serde(default = "default_tracker_endpoint")]
    pub endpoint: String,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: String,

    /// Login of the bot account; comments written by it are treated as our own
    #[serde(default)]
    pub username: String,

    /// Product every search is restricted to
    #[serde(default)]
    pub product: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tracker_endpoint(),
            api_key: String::new(),
            username: String::new(),
            product: None,
            request_timeout: default_request_timeout(),
        }
    }
}

// ============================================================================
// Chat Configuration
// ============================================================================

/// Chat platform the operator talks through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the chat Web API
    #[serde(default = "default_chat_api_url")]
    pub api_url: String,

    /// Bot token used to post messages
    #[serde(default)]
    pub token: String,

    /// Shared secret incoming commands must carry; empty disables the check
    #[serde(default)]
    pub verification_token: String,

    /// Channel receiving operator events, warnings and debug output
    #[serde(default)]
    pub admin_channel: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: default_chat_api_url(),
            token: String::new(),
            verification_token: String::new(),
            admin_channel: String::new(),
        }
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Read-through cache in front of the tracker client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory of the persisted cache image; memory only when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Seconds between best-effort flushes of the image
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,

    /// Entries older than this many seconds are refetched
    #[serde(default = "default_cache_max_age")]
    pub max_age: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval: default_flush_interval(),
            max_age: default_cache_max_age(),
        }
    }
}

// ============================================================================
// Operator Configuration
// ============================================================================

/// One scheduled delivery of reports to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScheduleEntry {
    /// Channel the reports are posted to
    pub channel: String,

    /// Components the reports are restricted to
    #[serde(default)]
    pub components: BTreeSet<String>,

    /// Report names, in posting order
    #[serde(default)]
    pub reports: Vec<String>,

    /// Cron expressions (5 or 6 fields) the reports fire on
    #[serde(default)]
    pub when: Vec<String>,
}

/// Stale-bug lifecycle settings used by the static controllers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleConfig {
    #[serde(default = "default_stale_after_days")]
    pub after_days: u32,

    #[serde(default = "default_close_after_days")]
    pub close_after_days: u32,

    /// Keyword marking a bug as stale
    #[serde(default = "default_stale_keyword")]
    pub keyword: String,

    #[serde(default = "default_stale_comment")]
    pub comment: String,

    #[serde(default = "default_close_comment")]
    pub close_comment: String,

    #[serde(default = "default_close_resolution")]
    pub close_resolution: String,
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            after_days: default_stale_after_days(),
            close_after_days: default_close_after_days(),
            keyword: default_stale_keyword(),
            comment: default_stale_comment(),
            close_comment: default_close_comment(),
            close_resolution: default_close_resolution(),
        }
    }
}

/// Team membership used by the triage controllers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Tracker logins of the team; the bot account always counts as a member
    #[serde(default)]
    pub members: BTreeSet<String>,

    /// Bugs created longer ago than this are left alone by first-team-comment
    #[serde(default = "default_first_comment_within_days")]
    pub first_comment_within_days: u32,

    #[serde(default = "default_first_comment")]
    pub first_comment: String,

    /// Comment added when the new controller moves a bug to ASSIGNED
    #[serde(default = "default_assigned_comment")]
    pub assigned_comment: String,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            members: BTreeSet::new(),
            first_comment_within_days: default_first_comment_within_days(),
            first_comment: default_first_comment(),
            assigned_comment: default_assigned_comment(),
        }
    }
}

/// Jobs, schedules and access control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Seconds between runs of the static controllers
    #[serde(default = "default_resync_interval")]
    pub resync_interval: u64,

    /// Job names excluded from automatic execution
    #[serde(default)]
    pub disabled_jobs: Vec<String>,

    /// Jobs that are off by default and should run anyway
    #[serde(default)]
    pub enabled_jobs: Vec<String>,

    /// Components used by controllers and by manually invoked reports
    #[serde(default)]
    pub components: BTreeSet<String>,

    /// Group name to member user ids; `admins` gates trigger and debug
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,

    #[serde(default)]
    pub stale: StaleConfig,

    #[serde(default)]
    pub team: TeamConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            resync_interval: default_resync_interval(),
            disabled_jobs: Vec::new(),
            enabled_jobs: Vec::new(),
            components: BTreeSet::new(),
            groups: HashMap::new(),
            schedules: Vec::new(),
            stale: StaleConfig::default(),
            team: TeamConfig::default(),
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete operator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub operator: OperatorConfig,
}

impl Settings {
    /// Copy of the settings with every credential replaced, safe to post.
    pub fn anonymized(&self) -> Settings {
        fn redact(value: &mut String) {
            if !value.is_empty() {
                *value = REDACTED.to_string();
            }
        }

        let mut copy = self.clone();
        redact(&mut copy.tracker.api_key);
        redact(&mut copy.chat.token);
        redact(&mut copy.chat.verification_token);
        copy
    }
}
