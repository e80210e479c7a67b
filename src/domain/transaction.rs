use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, UserId};

pub type TransactionId = i64;

/// Acceptance state of a transaction.
///
/// Serialized as the nullable `accepted` flag clients know:
/// `null` while pending, `true` once settled, `false` once declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Decision {
    /// Proposed, waiting for the receiving side to decide
    #[default]
    Pending,
    /// Settled: funds moved from sender to receiver
    Accepted,
    /// Refused: no funds moved
    Declined,
}

impl Decision {
    /// Map the caller-supplied `accepted` flag onto a decision.
    pub fn from_accepted(accepted: Option<bool>) -> Self {
        match accepted {
            None => Decision::Pending,
            Some(true) => Decision::Accepted,
            Some(false) => Decision::Declined,
        }
    }

    /// Decision reached by a decide call. Anything but an explicit accept declines.
    pub fn from_verdict(accept: bool) -> Self {
        if accept {
            Decision::Accepted
        } else {
            Decision::Declined
        }
    }

    pub fn as_accepted(&self) -> Option<bool> {
        match self {
            Decision::Pending => None,
            Decision::Accepted => Some(true),
            Decision::Declined => Some(false),
        }
    }

    /// Terminal decisions never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Pending)
    }

    /// True when reaching this decision moves funds.
    pub fn settles(&self) -> bool {
        matches!(self, Decision::Accepted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Pending => "pending",
            Decision::Accepted => "accepted",
            Decision::Declined => "declined",
        }
    }
}

impl From<Option<bool>> for Decision {
    fn from(accepted: Option<bool>) -> Self {
        Decision::from_accepted(accepted)
    }
}

impl From<Decision> for Option<bool> {
    fn from(decision: Decision) -> Self {
        decision.as_accepted()
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A movement of `amount` from `sender_id` to `receiver_id`.
///
/// Sender and receiver are plain ids: a transaction may outlive either user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Creation time, replaced when the transaction is decided
    pub timestamp: DateTime<Utc>,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Always positive
    pub amount: Amount,
    pub message: String,
    pub accepted: Decision,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        !self.accepted.is_terminal()
    }
}

/// Payload for creating a transaction. `accepted` selects the mode:
/// omitted proposes a pending transaction, `true` settles immediately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTransaction {
    pub sender_id: Option<UserId>,
    pub receiver_id: Option<UserId>,
    pub amount: Option<Amount>,
    pub message: Option<String>,
    pub accepted: Option<bool>,
}

impl NewTransaction {
    /// A pending proposal.
    pub fn request(
        sender_id: UserId,
        receiver_id: UserId,
        amount: Amount,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: Some(sender_id),
            receiver_id: Some(receiver_id),
            amount: Some(amount),
            message: Some(message.into()),
            accepted: None,
        }
    }

    /// A transfer settled on creation.
    pub fn payment(
        sender_id: UserId,
        receiver_id: UserId,
        amount: Amount,
        message: impl Into<String>,
    ) -> Self {
        Self::request(sender_id, receiver_id, amount, message).with_accepted(true)
    }

    pub fn with_accepted(mut self, accepted: bool) -> Self {
        self.accepted = Some(accepted);
        self
    }
}

/// Payload for deciding a pending transaction.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DecisionRequest {
    pub accepted: Option<bool>,
}

impl DecisionRequest {
    pub fn verdict(&self) -> bool {
        self.accepted == Some(true)
    }
}
