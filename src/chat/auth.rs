use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AppResult;

/// Group allowed to trigger and debug jobs
pub const ADMINS_GROUP: &str = "admins";

/// Group membership check for chat users.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_member(&self, user: &str, group: &str) -> AppResult<bool>;
}

/// Membership taken from the `operator.groups` configuration.
#[derive(Debug, Clone, Default)]
pub struct GroupAuthorizer {
    groups: HashMap<String, Vec<String>>,
}

impl GroupAuthorizer {
    pub fn new(groups: HashMap<String, Vec<String>>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl Authorizer for GroupAuthorizer {
    async fn is_member(&self, user: &str, group: &str) -> AppResult<bool> {
        Ok(self
            .groups
            .get(group)
            .is_some_and(|members| members.iter().any(|m| m == user)))
    }
}
