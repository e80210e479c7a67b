use serde::{Deserialize, Serialize};

use super::{Amount, Transaction};

pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub balance: Amount,
}

/// Payload for creating a user. Every field is optional so that a missing
/// field can be reported by name instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub username: Option<String>,
    pub balance: Option<Amount>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            username: Some(username.into()),
            balance: None,
        }
    }

    pub fn with_balance(mut self, balance: Amount) -> Self {
        self.balance = Some(balance);
        self
    }
}

/// A user together with every transaction it takes part in.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub transactions: Vec<Transaction>,
}

impl UserDetails {
    pub fn new(user: User, transactions: Vec<Transaction>) -> Self {
        Self { user, transactions }
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn balance(&self) -> Amount {
        self.user.balance
    }
}
