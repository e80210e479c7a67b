// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use tempfile::TempDir;
use venmo_ledger::application::{CascadePolicy, LedgerService, ServiceConfig};
use venmo_ledger::domain::{NewUser, UserId};
use venmo_ledger::storage::StoreConfig;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(ServiceConfig::default()).await
}

/// Helper to create a test service with the given cascade policy
pub async fn test_service_with_cascade(cascade: CascadePolicy) -> Result<(LedgerService, TempDir)> {
    test_service_with(ServiceConfig::default().with_cascade(cascade)).await
}

pub async fn test_service_with(config: ServiceConfig) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = StoreConfig::in_file(temp_dir.path().join("test.db"));
    let service = LedgerService::init(&store, config).await?;
    Ok((service, temp_dir))
}

/// Create a user with the given starting balance and return its id
pub async fn create_user(service: &LedgerService, username: &str, balance: i64) -> Result<UserId> {
    let details = service
        .create_user(NewUser::new(username.to_uppercase(), username).with_balance(balance))
        .await?;
    Ok(details.id())
}

/// Current balance of a user
pub async fn balance_of(service: &LedgerService, id: UserId) -> Result<i64> {
    Ok(service.get_user(id).await?.balance())
}

/// Test fixture: Alice and Bob with starting balances
pub struct Pair {
    pub alice: UserId,
    pub bob: UserId,
}

impl Pair {
    pub async fn create(service: &LedgerService, alice: i64, bob: i64) -> Result<Self> {
        Ok(Self {
            alice: create_user(service, "alice", alice).await?,
            bob: create_user(service, "bob", bob).await?,
        })
    }

    pub async fn balances(&self, service: &LedgerService) -> Result<(i64, i64)> {
        Ok((
            balance_of(service, self.alice).await?,
            balance_of(service, self.bob).await?,
        ))
    }
}
