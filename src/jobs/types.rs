use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chat::Recorder;
use crate::error::AppResult;
use crate::jobs::error::{JobError, JobResult};
use crate::tracker::TrackerClient;

/// Whether a run may have production side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Production,
    /// Tracker writes are suppressed and channel output goes to the admin channel
    Debug,
}

impl ExecutionMode {
    pub fn is_debug(self) -> bool {
        self == ExecutionMode::Debug
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Production => "production",
            ExecutionMode::Debug => "debug",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context handed to every job run
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub job_name: String,
    pub mode: ExecutionMode,
    pub cancel: CancellationToken,
    pub recorder: Recorder,
}

impl RunContext {
    pub fn new(
        job_name: impl Into<String>,
        mode: ExecutionMode,
        cancel: CancellationToken,
        recorder: Recorder,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_name: job_name.into(),
            mode,
            cancel,
            recorder,
        }
    }
}

/// When a job runs on its own
#[derive(Debug, Clone)]
pub enum Trigger {
    Interval(Duration),
    Cron(Vec<cron::Schedule>),
    /// Only runs when invoked from chat
    Manual,
}

impl Trigger {
    /// Parses 5-field (standard) or 6/7-field (with seconds) cron expressions.
    pub fn cron(expressions: &[String]) -> JobResult<Self> {
        if expressions.is_empty() {
            return Err(JobError::InvalidCronExpression {
                expression: String::new(),
                message: "no expressions given".to_string(),
            });
        }

        let schedules = expressions
            .iter()
            .map(|expression| {
                let normalized = normalize_cron(expression)?;
                cron::Schedule::from_str(&normalized).map_err(|e| {
                    JobError::InvalidCronExpression {
                        expression: expression.clone(),
                        message: e.to_string(),
                    }
                })
            })
            .collect::<JobResult<Vec<_>>>()?;

        Ok(Trigger::Cron(schedules))
    }

    /// Time until the next firing, `None` for manual jobs.
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            Trigger::Interval(interval) => Some(*interval),
            Trigger::Cron(schedules) => {
                let now = chrono::Utc::now();
                schedules
                    .iter()
                    .filter_map(|s| s.after(&now).next())
                    .min()
                    .map(|next| (next - now).to_std().unwrap_or_default())
            }
            Trigger::Manual => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Trigger::Interval(interval) => format!("every {}s", interval.as_secs()),
            Trigger::Cron(schedules) => schedules
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" | "),
            Trigger::Manual => "manual".to_string(),
        }
    }
}

const WEEKDAYS: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Standard cron has no seconds field and counts weekdays from 0 = Sunday;
/// the `cron` crate wants seconds and counts from 1 = Sunday. Numeric
/// weekdays are rewritten as names so both read the same.
fn normalize_cron(expression: &str) -> JobResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Ok(fields.join(" "));
    }

    let invalid = |message: String| JobError::InvalidCronExpression {
        expression: expression.to_string(),
        message,
    };
    let numbers = Regex::new(r"/?\d+").map_err(|e| invalid(e.to_string()))?;

    let mut failed = None;
    let weekdays = numbers.replace_all(fields[4], |caps: &Captures| {
        let token = &caps[0];
        if token.starts_with('/') {
            return token.to_string();
        }
        match token.parse::<usize>().ok().and_then(|n| WEEKDAYS.get(n)) {
            Some(day) => day.to_string(),
            None => {
                failed = Some(format!("day of week {} out of range", token));
                token.to_string()
            }
        }
    });
    if let Some(message) = failed {
        return Err(invalid(message));
    }

    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekdays
    ))
}

/// A named unit of work run by the scheduler or from chat.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Key for overlap suppression. Jobs sharing a name (one report
    /// scheduled for several channels) override this.
    fn instance(&self) -> String {
        self.name().to_string()
    }

    fn trigger(&self) -> &Trigger;

    /// Jobs returning false only get a loop when explicitly enabled.
    fn enabled_by_default(&self) -> bool {
        true
    }

    async fn sync(&self, ctx: &RunContext) -> AppResult<()>;
}

/// Tracker clients for each execution mode.
#[derive(Clone)]
pub struct ClientSet {
    /// Cached client writing to the tracker
    pub production: Arc<dyn TrackerClient>,
    /// Same reads, mutations reported to the admin channel
    pub debug: Arc<dyn TrackerClient>,
}

impl ClientSet {
    pub fn for_mode(&self, mode: ExecutionMode) -> &Arc<dyn TrackerClient> {
        match mode {
            ExecutionMode::Production => &self.production,
            ExecutionMode::Debug => &self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exprs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_five_field_cron_accepted() {
        let trigger = Trigger::cron(&exprs(&["0 9 * * 1-5", "30 16 * * 5"])).unwrap();
        assert!(matches!(&trigger, Trigger::Cron(s) if s.len() == 2));
        assert!(trigger.next_delay().is_some());
    }

    #[test]
    fn test_six_field_cron_accepted() {
        assert!(Trigger::cron(&exprs(&["*/10 * * * * *"])).is_ok());
    }

    #[test]
    fn test_invalid_cron_rejected() {
        assert!(Trigger::cron(&exprs(&["every monday"])).is_err());
        assert!(Trigger::cron(&exprs(&["0 9 * * 9"])).is_err());
        assert!(Trigger::cron(&[]).is_err());
    }

    #[test]
    fn test_weekday_numbers_follow_standard_cron() {
        assert_eq!(normalize_cron("0 9 * * 1-5").unwrap(), "0 0 9 * * Mon-Fri");
        assert_eq!(normalize_cron("0 9 * * 0,6").unwrap(), "0 0 9 * * Sun,Sat");
        assert_eq!(normalize_cron("0 9 * * */2").unwrap(), "0 0 9 * * */2");
    }

    #[test]
    fn test_next_delay_per_trigger() {
        assert_eq!(
            Trigger::Interval(Duration::from_secs(5)).next_delay(),
            Some(Duration::from_secs(5))
        );
        assert!(Trigger::Manual.next_delay().is_none());

        let every_second = Trigger::cron(&exprs(&["* * * * * *"])).unwrap();
        assert!(every_second.next_delay().unwrap() <= Duration::from_secs(1));
    }

    #[test]
    fn test_execution_mode() {
        assert!(ExecutionMode::Debug.is_debug());
        assert_eq!(ExecutionMode::Production.to_string(), "production");
    }
}
