use thiserror::Error;

use crate::domain::{Amount, TransactionId, UserId};

/// Which record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Sender,
    Receiver,
    Transaction,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Sender => "Sender",
            EntityKind::Receiver => "Receiver",
            EntityKind::Transaction => "Transaction",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a request handler should report an error to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidInput,
    NotFound,
    Forbidden,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("Amount exceeds the current balance of user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Amount,
        required: Amount,
    },

    #[error("Crediting {amount} would overflow the balance of user {user_id}: balance {balance}")]
    BalanceOverflow {
        user_id: UserId,
        balance: Amount,
        amount: Amount,
    },

    #[error("Transaction {0} was already decided and cannot be changed")]
    AlreadyDecided(TransactionId),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        AppError::NotFound { entity, id }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::InvalidInput(_) => ErrorClass::InvalidInput,
            AppError::NotFound { .. } => ErrorClass::NotFound,
            AppError::InsufficientFunds { .. }
            | AppError::BalanceOverflow { .. }
            | AppError::AlreadyDecided(_) => ErrorClass::Forbidden,
            AppError::Database(_) => ErrorClass::Internal,
        }
    }
}
