//! Records exchanged with the ticket tracker.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

pub type BugId = u64;

/// Statuses of bugs nobody has finished working on
pub const OPEN_STATUSES: &[&str] = &["NEW", "ASSIGNED", "POST", "MODIFIED"];

/// Statuses of bugs that are done
pub const CLOSED_STATUSES: &[&str] = &["ON_QA", "VERIFIED", "CLOSED"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    pub id: BugId,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub component: Vec<String>,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub creation_time: Option<Timestamp>,
    #[serde(default)]
    pub last_change_time: Option<Timestamp>,
}

impl Bug {
    pub fn is_open(&self) -> bool {
        OPEN_STATUSES.contains(&self.status.as_str())
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Whole days since the last change, zero when unknown.
    pub fn idle_days(&self, now: Timestamp) -> i64 {
        self.last_change_time
            .map(|changed| now.duration_since(changed).as_hours() / 24)
            .unwrap_or(0)
    }

    pub fn component_label(&self) -> String {
        if self.component.is_empty() {
            "(none)".to_string()
        } else {
            self.component.join(", ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub bug_id: BugId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub creation_time: Option<Timestamp>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field_name: String,
    #[serde(default)]
    pub removed: String,
    #[serde(default)]
    pub added: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub when: Timestamp,
    pub who: String,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
}

/// Search parameters. Lists are kept sorted and deduplicated so equal
/// searches always serialize, and therefore fingerprint, identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub product: Option<String>,
    pub components: Vec<String>,
    pub statuses: Vec<String>,
    pub severities: Vec<String>,
    /// Bugs must carry all of these keywords
    pub keywords: Vec<String>,
    /// Bugs must carry none of these keywords
    pub without_keywords: Vec<String>,
    pub changed_within_days: Option<u32>,
    pub unchanged_for_days: Option<u32>,
    pub created_within_days: Option<u32>,
}

fn normalized<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
    values.sort();
    values.dedup();
    values
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(mut self, product: Option<String>) -> Self {
        self.product = product;
        self
    }

    pub fn components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = normalized(components);
        self
    }

    pub fn statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses = normalized(statuses);
        self
    }

    pub fn severities<I, S>(mut self, severities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.severities = normalized(severities);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords = normalized(self.keywords.into_iter().chain([keyword.into()]));
        self
    }

    pub fn without_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.without_keywords =
            normalized(self.without_keywords.into_iter().chain([keyword.into()]));
        self
    }

    pub fn changed_within_days(mut self, days: u32) -> Self {
        self.changed_within_days = Some(days);
        self
    }

    pub fn unchanged_for_days(mut self, days: u32) -> Self {
        self.unchanged_for_days = Some(days);
        self
    }

    pub fn created_within_days(mut self, days: u32) -> Self {
        self.created_within_days = Some(days);
        self
    }

    /// Client-side evaluation of the query, used where no server is involved.
    pub fn matches(&self, bug: &Bug, now: Timestamp) -> bool {
        let day = SignedDuration::from_hours(24);
        let age = |time: Option<Timestamp>| time.map(|t| now.duration_since(t));

        if let Some(product) = &self.product
            && &bug.product != product
        {
            return false;
        }
        if !self.components.is_empty()
            && !bug.component.iter().any(|c| self.components.contains(c))
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&bug.status) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&bug.severity) {
            return false;
        }
        if !self.keywords.iter().all(|k| bug.has_keyword(k)) {
            return false;
        }
        if self.without_keywords.iter().any(|k| bug.has_keyword(k)) {
            return false;
        }
        if let Some(days) = self.changed_within_days
            && !age(bug.last_change_time).is_some_and(|a| a <= day * days as i32)
        {
            return false;
        }
        if let Some(days) = self.unchanged_for_days
            && !age(bug.last_change_time).is_some_and(|a| a >= day * days as i32)
        {
            return false;
        }
        if let Some(days) = self.created_within_days
            && !age(bug.creation_time).is_some_and(|a| a <= day * days as i32)
        {
            return false;
        }
        true
    }
}

/// A change to apply to one bug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugUpdate {
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub keywords_add: Vec<String>,
    pub keywords_remove: Vec<String>,
    pub comment: Option<String>,
}

impl BugUpdate {
    pub fn is_empty(&self) -> bool {
        self == &BugUpdate::default()
    }

    /// Human readable summary, used when the update is only reported.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(status) = &self.status {
            match &self.resolution {
                Some(resolution) => parts.push(format!("status -> {} {}", status, resolution)),
                None => parts.push(format!("status -> {}", status)),
            }
        }
        if !self.keywords_add.is_empty() {
            parts.push(format!("keywords +{}", self.keywords_add.join(", +")));
        }
        if !self.keywords_remove.is_empty() {
            parts.push(format!("keywords -{}", self.keywords_remove.join(", -")));
        }
        if let Some(comment) = &self.comment {
            parts.push(format!("comment:\n> {}", comment.replace('\n', "\n> ")));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join("; ")
        }
    }
}
