use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    covers, Amount, Decision, NewTransaction, NewUser, Transaction, TransactionId, User,
    UserDetails, UserId,
};
use crate::storage::{Repository, SettlementTx, StoreConfig};

use super::{AppError, CascadePolicy, EntityKind, ServiceConfig};

/// Application service implementing the user and transaction lifecycles.
/// This is the primary interface for any client (CLI, API, etc.).
///
/// Every operation that touches balances runs inside a single store unit of
/// work, so the funds check and both balance writes commit together and
/// concurrent settlements on the same users are serialized.
pub struct LedgerService {
    repo: Repository,
    config: ServiceConfig,
}

impl LedgerService {
    /// Create a new service with the given repository and default settings.
    pub fn new(repo: Repository) -> Self {
        Self::with_config(repo, ServiceConfig::default())
    }

    pub fn with_config(repo: Repository, config: ServiceConfig) -> Self {
        Self { repo, config }
    }

    /// Initialize a new database (created if missing) and build a service on it.
    pub async fn init(store: &StoreConfig, config: ServiceConfig) -> Result<Self, AppError> {
        let repo = Repository::init(store).await?;
        Ok(Self::with_config(repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(store: &StoreConfig, config: ServiceConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(store).await?;
        Ok(Self::with_config(repo, config))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // User operations
    // ========================

    /// Create a user. `name` and `username` must be present and non-empty;
    /// the balance defaults to zero.
    pub async fn create_user(&self, new_user: NewUser) -> Result<UserDetails, AppError> {
        let name = required_text(new_user.name, "name")?;
        let username = required_text(new_user.username, "username")?;
        let balance = new_user.balance.unwrap_or(0);

        let id = self.repo.create_user(&name, &username, balance).await?;
        info!(user_id = id, username = %username, balance, "User created");

        let user = User {
            id,
            name,
            username,
            balance,
        };
        Ok(UserDetails::new(user, Vec::new()))
    }

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    /// Get a user together with every transaction it sent or received.
    pub async fn get_user(&self, id: UserId) -> Result<UserDetails, AppError> {
        let user = self
            .repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::User, id))?;
        let transactions = self.repo.transactions_for_user(id).await?;
        debug!(user_id = id, transactions = transactions.len(), "User fetched");

        Ok(UserDetails::new(user, transactions))
    }

    /// Delete a user and its transactions according to the configured
    /// [`CascadePolicy`]. Returns the user as it was, with the transactions it
    /// had before deletion.
    pub async fn delete_user(&self, id: UserId) -> Result<UserDetails, AppError> {
        let mut uow = self.repo.begin().await?;
        let outcome = remove_user(&mut uow, id, self.config.cascade).await;
        let (details, removed) = finish(uow, outcome).await?;

        info!(
            user_id = id,
            cascade = self.config.cascade.as_str(),
            removed_transactions = removed,
            "User deleted"
        );
        Ok(details)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Create a transaction.
    ///
    /// With `accepted` omitted the transaction is stored pending and no funds
    /// move. With `accepted = true` it is stored and settled in the same call,
    /// failing with [`AppError::InsufficientFunds`] if the sender cannot cover it.
    /// On any error nothing is stored.
    pub async fn create_transaction(
        &self,
        new_txn: NewTransaction,
    ) -> Result<Transaction, AppError> {
        let sender_id = new_txn
            .sender_id
            .ok_or(AppError::InvalidInput("sender_id"))?;
        let receiver_id = new_txn
            .receiver_id
            .ok_or(AppError::InvalidInput("receiver_id"))?;
        let amount = new_txn.amount.ok_or(AppError::InvalidInput("amount"))?;
        let message = new_txn.message.ok_or(AppError::InvalidInput("message"))?;
        if amount <= 0 {
            return Err(AppError::InvalidInput("amount"));
        }

        let accepted = Decision::from_accepted(new_txn.accepted);
        let timestamp = Utc::now();

        let mut uow = self.repo.begin().await?;
        let outcome = record_transaction(
            &mut uow,
            timestamp,
            sender_id,
            receiver_id,
            amount,
            &message,
            accepted,
        )
        .await;
        let id = finish(uow, outcome).await?;

        info!(
            transaction_id = id,
            sender_id,
            receiver_id,
            amount,
            accepted = %accepted,
            "Transaction created"
        );
        Ok(Transaction {
            id,
            timestamp,
            sender_id,
            receiver_id,
            amount,
            message,
            accepted,
        })
    }

    /// Get a transaction by id.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Transaction, id))
    }

    /// Decide a pending transaction.
    ///
    /// Accepting re-checks that both users still exist and that the sender's
    /// current balance covers the amount, then moves the funds. Anything else
    /// declines without touching balances. Either way the decision is final
    /// and the timestamp is renewed. On error the transaction stays pending.
    pub async fn decide_transaction(
        &self,
        id: TransactionId,
        accept: bool,
    ) -> Result<Transaction, AppError> {
        let decision = Decision::from_verdict(accept);

        let mut uow = self.repo.begin().await?;
        let outcome = apply_decision(&mut uow, id, decision).await;
        let Some(txn) = finish(uow, outcome).await? else {
            return Err(match self.repo.get_transaction(id).await? {
                Some(_) => AppError::AlreadyDecided(id),
                None => AppError::not_found(EntityKind::Transaction, id),
            });
        };

        info!(
            transaction_id = id,
            accepted = %decision,
            amount = txn.amount,
            "Transaction decided"
        );
        Ok(txn)
    }

    pub async fn accept_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.decide_transaction(id, true).await
    }

    pub async fn decline_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.decide_transaction(id, false).await
    }
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, AppError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AppError::InvalidInput(field)),
    }
}

/// Commit the unit of work if `outcome` succeeded, roll it back otherwise.
async fn finish<T>(uow: SettlementTx, outcome: Result<T, AppError>) -> Result<T, AppError> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

async fn remove_user(
    uow: &mut SettlementTx,
    id: UserId,
    cascade: CascadePolicy,
) -> Result<(UserDetails, u64), AppError> {
    let user = uow
        .remove_user(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::User, id))?;
    let transactions = uow.transactions_for_user(id).await?;

    let removed = match cascade {
        CascadePolicy::SenderOnly => uow.delete_transactions_sent_by(id).await?,
        CascadePolicy::Full => uow.delete_transactions_for_user(id).await?,
    };
    Ok((UserDetails::new(user, transactions), removed))
}

async fn record_transaction(
    uow: &mut SettlementTx,
    timestamp: DateTime<Utc>,
    sender_id: UserId,
    receiver_id: UserId,
    amount: Amount,
    message: &str,
    accepted: Decision,
) -> Result<TransactionId, AppError> {
    // Write first: the insert takes the write lock for the whole unit of work.
    let id = uow
        .insert_transaction(timestamp, sender_id, receiver_id, amount, message, accepted)
        .await?;

    let (sender, receiver) = load_parties(uow, sender_id, receiver_id).await?;
    if accepted.settles() {
        settle(uow, &sender, &receiver, amount).await?;
    }
    Ok(id)
}

/// Claim a pending transaction and settle it if accepted.
/// `None` means there was nothing pending to claim.
async fn apply_decision(
    uow: &mut SettlementTx,
    id: TransactionId,
    decision: Decision,
) -> Result<Option<Transaction>, AppError> {
    let Some(txn) = uow.claim_decision(id, decision, Utc::now()).await? else {
        return Ok(None);
    };

    if decision.settles() {
        let (sender, receiver) = load_parties(uow, txn.sender_id, txn.receiver_id).await?;
        settle(uow, &sender, &receiver, txn.amount).await?;
    }
    Ok(Some(txn))
}

/// Sender first, then receiver, so a missing sender is reported before a missing receiver.
async fn load_parties(
    uow: &mut SettlementTx,
    sender_id: UserId,
    receiver_id: UserId,
) -> Result<(User, User), AppError> {
    let sender = uow
        .get_user(sender_id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Sender, sender_id))?;
    let receiver = uow
        .get_user(receiver_id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Receiver, receiver_id))?;
    Ok((sender, receiver))
}

async fn settle(
    uow: &mut SettlementTx,
    sender: &User,
    receiver: &User,
    amount: Amount,
) -> Result<(), AppError> {
    if !covers(sender.balance, amount) {
        warn!(
            sender_id = sender.id,
            balance = sender.balance,
            amount,
            "Settlement rejected: insufficient funds"
        );
        return Err(AppError::InsufficientFunds {
            user_id: sender.id,
            balance: sender.balance,
            required: amount,
        });
    }

    // A self-transfer is debited before it is credited, so it cannot overflow.
    if sender.id != receiver.id && receiver.balance.checked_add(amount).is_none() {
        warn!(
            receiver_id = receiver.id,
            balance = receiver.balance,
            amount,
            "Settlement rejected: receiver balance would overflow"
        );
        return Err(AppError::BalanceOverflow {
            user_id: receiver.id,
            balance: receiver.balance,
            amount,
        });
    }

    uow.move_funds(sender.id, receiver.id, amount).await?;
    debug!(
        sender_id = sender.id,
        receiver_id = receiver.id,
        amount,
        "Funds moved"
    );
    Ok(())
}
