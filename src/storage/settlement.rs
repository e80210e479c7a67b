use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction as SqlTransaction};

use crate::domain::{Amount, Decision, Transaction, TransactionId, User, UserId};

use super::repository::{
    delete_involving, delete_sent_by, fetch_transactions_for_user, fetch_user, insert_transaction,
    row_to_transaction, row_to_user,
};

/// A unit of work over the store: one SQLite transaction.
///
/// Callers must issue a write (`insert_transaction`, `claim_decision`,
/// `remove_user`) before any read, so SQLite grants the write lock up front
/// and competing units of work wait on the busy timeout instead of failing
/// a lock upgrade. Everything read afterwards stays valid until commit.
///
/// Dropping a unit of work without calling [`SettlementTx::commit`] rolls it back.
pub struct SettlementTx {
    tx: SqlTransaction<'static, Sqlite>,
}

impl SettlementTx {
    pub(super) fn new(tx: SqlTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back transaction")
    }

    /// Insert a transaction row and return its id.
    pub async fn insert_transaction(
        &mut self,
        timestamp: DateTime<Utc>,
        sender_id: UserId,
        receiver_id: UserId,
        amount: Amount,
        message: &str,
        accepted: Decision,
    ) -> Result<TransactionId> {
        insert_transaction(
            &mut *self.tx,
            timestamp,
            sender_id,
            receiver_id,
            amount,
            message,
            accepted,
        )
        .await
    }

    /// Record a decision on a transaction that is still pending.
    ///
    /// Returns the updated row, or `None` when the transaction does not exist
    /// or was already decided. Two units of work claiming the same transaction
    /// never both succeed.
    pub async fn claim_decision(
        &mut self,
        id: TransactionId,
        accepted: Decision,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET accepted = ?, timestamp = ?
            WHERE id = ? AND accepted IS NULL
            RETURNING id, timestamp, sender_id, receiver_id, amount, message, accepted
            "#,
        )
        .bind(accepted.as_accepted())
        .bind(timestamp.to_rfc3339())
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to record transaction decision")?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    /// Delete a user and return the row as it was.
    pub async fn remove_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "DELETE FROM users WHERE id = ? RETURNING id, name, username, balance",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to delete user")?;

        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        fetch_user(&mut *self.tx, id).await
    }

    pub async fn transactions_for_user(&mut self, user_id: UserId) -> Result<Vec<Transaction>> {
        fetch_transactions_for_user(&mut *self.tx, user_id).await
    }

    pub async fn delete_transactions_sent_by(&mut self, user_id: UserId) -> Result<u64> {
        delete_sent_by(&mut *self.tx, user_id).await
    }

    pub async fn delete_transactions_for_user(&mut self, user_id: UserId) -> Result<u64> {
        delete_involving(&mut *self.tx, user_id).await
    }

    /// Debit `sender_id` and credit `receiver_id` by `amount`.
    ///
    /// No funds check happens here; the caller checks the balance it read
    /// inside this same unit of work.
    pub async fn move_funds(
        &mut self,
        sender_id: UserId,
        receiver_id: UserId,
        amount: Amount,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET balance = balance - ? WHERE id = ?")
            .bind(amount)
            .bind(sender_id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to debit sender")?;

        sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(receiver_id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to credit receiver")?;

        Ok(())
    }
}
