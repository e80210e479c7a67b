use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::domain::{Amount, Decision, Transaction, TransactionId, User, UserId};

use super::{SettlementTx, StoreConfig, MIGRATION_001_INITIAL};

/// Repository for persisting and querying users and transactions.
///
/// Every method runs as its own statement and is committed before it returns.
/// Use [`Repository::begin`] when several operations must succeed or fail together.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing SQLite database.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        Self::open(config, false).await
    }

    /// Initialize a database (create the file if needed + migrate).
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let repo = Self::open(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn open(config: &StoreConfig, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", config.path.display()))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Start a unit of work. See [`SettlementTx`].
    pub async fn begin(&self) -> Result<SettlementTx> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(SettlementTx::new(tx))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // User operations
    // ========================

    /// Insert a user and return its assigned id. No validation happens here.
    pub async fn create_user(&self, name: &str, username: &str, balance: Amount) -> Result<UserId> {
        let result = sqlx::query("INSERT INTO users (name, username, balance) VALUES (?, ?, ?)")
            .bind(name)
            .bind(username)
            .bind(balance)
            .execute(&self.pool)
            .await
            .context("Failed to save user")?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let mut conn = self.acquire().await?;
        fetch_user(&mut *conn, id).await
    }

    /// List all users, ordered by id.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, username, balance FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        Ok(rows.iter().map(row_to_user).collect())
    }

    /// Delete a user. Deleting a missing user is not an error.
    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }

    /// Overwrite a user's balance.
    pub async fn update_user_balance(&self, id: UserId, balance: Amount) -> Result<()> {
        sqlx::query("UPDATE users SET balance = ? WHERE id = ?")
            .bind(balance)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user balance")?;
        Ok(())
    }

    // ========================
    // Transaction operations
    // ========================

    /// Insert a transaction and return its assigned id.
    pub async fn create_transaction(
        &self,
        timestamp: DateTime<Utc>,
        sender_id: UserId,
        receiver_id: UserId,
        amount: Amount,
        message: &str,
        accepted: Decision,
    ) -> Result<TransactionId> {
        let mut conn = self.acquire().await?;
        insert_transaction(
            &mut *conn,
            timestamp,
            sender_id,
            receiver_id,
            amount,
            message,
            accepted,
        )
        .await
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let mut conn = self.acquire().await?;
        fetch_transaction(&mut *conn, id).await
    }

    /// List all transactions, ordered by id.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, sender_id, receiver_id, amount, message, accepted
            FROM transactions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Transactions a user takes part in: those it sent, followed by those it received.
    pub async fn transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let mut conn = self.acquire().await?;
        fetch_transactions_for_user(&mut *conn, user_id).await
    }

    /// Delete a transaction. Deleting a missing transaction is not an error.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete transaction")?;
        Ok(())
    }

    /// Delete every transaction sent by a user. Returns how many rows went away.
    pub async fn delete_transactions_sent_by(&self, user_id: UserId) -> Result<u64> {
        let mut conn = self.acquire().await?;
        delete_sent_by(&mut *conn, user_id).await
    }

    /// Delete every transaction a user sent or received.
    pub async fn delete_transactions_for_user(&self, user_id: UserId) -> Result<u64> {
        let mut conn = self.acquire().await?;
        delete_involving(&mut *conn, user_id).await
    }

    /// Overwrite the decision and timestamp of a transaction.
    pub async fn update_transaction_decision(
        &self,
        id: TransactionId,
        accepted: Decision,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE transactions SET accepted = ?, timestamp = ? WHERE id = ?")
            .bind(accepted.as_accepted())
            .bind(timestamp.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update transaction decision")?;
        Ok(())
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire database connection")
    }
}

// Statements shared by the repository and by units of work.

pub(super) async fn fetch_user(conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, name, username, balance FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch user")?;

    Ok(row.as_ref().map(row_to_user))
}

pub(super) async fn fetch_transaction(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<Option<Transaction>> {
    let row = sqlx::query(
        r#"
        SELECT id, timestamp, sender_id, receiver_id, amount, message, accepted
        FROM transactions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

pub(super) async fn fetch_transactions_for_user(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<Vec<Transaction>> {
    let sent = sqlx::query(
        r#"
        SELECT id, timestamp, sender_id, receiver_id, amount, message, accepted
        FROM transactions
        WHERE sender_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list sent transactions")?;

    let received = sqlx::query(
        r#"
        SELECT id, timestamp, sender_id, receiver_id, amount, message, accepted
        FROM transactions
        WHERE receiver_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list received transactions")?;

    sent.iter()
        .chain(received.iter())
        .map(row_to_transaction)
        .collect()
}

pub(super) async fn insert_transaction(
    conn: &mut SqliteConnection,
    timestamp: DateTime<Utc>,
    sender_id: UserId,
    receiver_id: UserId,
    amount: Amount,
    message: &str,
    accepted: Decision,
) -> Result<TransactionId> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (timestamp, sender_id, receiver_id, amount, message, accepted)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(timestamp.to_rfc3339())
    .bind(sender_id)
    .bind(receiver_id)
    .bind(amount)
    .bind(message)
    .bind(accepted.as_accepted())
    .execute(&mut *conn)
    .await
    .context("Failed to save transaction")?;

    Ok(result.last_insert_rowid())
}

pub(super) async fn delete_sent_by(conn: &mut SqliteConnection, user_id: UserId) -> Result<u64> {
    let result = sqlx::query("DELETE FROM transactions WHERE sender_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete sent transactions")?;
    Ok(result.rows_affected())
}

pub(super) async fn delete_involving(conn: &mut SqliteConnection, user_id: UserId) -> Result<u64> {
    let result = sqlx::query("DELETE FROM transactions WHERE sender_id = ? OR receiver_id = ?")
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete user transactions")?;
    Ok(result.rows_affected())
}

pub(super) fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        balance: row.get("balance"),
    }
}

pub(super) fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let timestamp_str: String = row.get("timestamp");
    let accepted: Option<bool> = row.get("accepted");

    Ok(Transaction {
        id: row.get("id"),
        timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
            .context("Invalid transaction timestamp")?
            .with_timezone(&Utc),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        amount: row.get("amount"),
        message: row.get("message"),
        accepted: Decision::from_accepted(accepted),
    })
}
