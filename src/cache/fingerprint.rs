use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tracker::{BugId, SearchQuery};

const SEARCH_PREFIX: &str = "search:";

/// Deterministic key of one cached read: the operation plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn bug(id: BugId) -> Self {
        Self(format!("bug:{}", id))
    }

    pub fn comments(id: BugId) -> Self {
        Self(format!("comments:{}", id))
    }

    pub fn history(id: BugId) -> Self {
        Self(format!("history:{}", id))
    }

    /// Search keys embed the whole query; its lists are already normalized.
    pub fn search(query: &SearchQuery) -> Self {
        let encoded = serde_json::to_string(query).unwrap_or_else(|_| format!("{:?}", query));
        Self(format!("{}{}", SEARCH_PREFIX, encoded))
    }

    /// Every key depending on a single bug
    pub fn for_bug(id: BugId) -> [Self; 3] {
        [Self::bug(id), Self::comments(id), Self::history(id)]
    }

    pub fn is_search(&self) -> bool {
        self.0.starts_with(SEARCH_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
