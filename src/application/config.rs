use serde::{Deserialize, Serialize};

/// What happens to a user's transactions when the user is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Delete only the transactions the user sent. Transactions the user
    /// received stay behind and keep pointing at the deleted id.
    #[default]
    SenderOnly,
    /// Delete every transaction the user sent or received.
    Full,
}

impl CascadePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadePolicy::SenderOnly => "sender_only",
            CascadePolicy::Full => "full",
        }
    }
}

/// Settlement service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub cascade: CascadePolicy,
}

impl ServiceConfig {
    pub fn with_cascade(mut self, cascade: CascadePolicy) -> Self {
        self.cascade = cascade;
        self
    }
}
