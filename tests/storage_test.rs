use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;
use venmo_ledger::domain::Decision;
use venmo_ledger::storage::{Repository, StoreConfig};

async fn test_repo() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let repo = Repository::init(&StoreConfig::in_file(temp_dir.path().join("store.db"))).await?;
    Ok((repo, temp_dir))
}

#[tokio::test]
async fn test_user_point_operations() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    let id = repo.create_user("Alice", "alice", 10).await?;
    let user = repo.get_user(id).await?.expect("user exists");
    assert_eq!(user.name, "Alice");
    assert_eq!(user.username, "alice");
    assert_eq!(user.balance, 10);

    repo.update_user_balance(id, -5).await?;
    assert_eq!(repo.get_user(id).await?.unwrap().balance, -5);

    repo.delete_user(id).await?;
    assert!(repo.get_user(id).await?.is_none());
    // Deleting again is a no-op.
    repo.delete_user(id).await?;

    let next = repo.create_user("Bob", "bob", 0).await?;
    assert!(next > id, "Ids are not reused");

    Ok(())
}

#[tokio::test]
async fn test_store_does_not_validate() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    let id = repo.create_user("", "", -100).await?;
    let txn_id = repo
        .create_transaction(Utc::now(), id, 999, 0, "", Decision::Accepted)
        .await?;

    assert_eq!(repo.get_user(id).await?.unwrap().balance, -100);
    let txn = repo.get_transaction(txn_id).await?.unwrap();
    assert_eq!(txn.receiver_id, 999);
    assert_eq!(txn.accepted, Decision::Accepted);

    Ok(())
}

#[tokio::test]
async fn test_transaction_point_operations() -> Result<()> {
    let (repo, _temp) = test_repo().await?;
    let alice = repo.create_user("Alice", "alice", 100).await?;
    let bob = repo.create_user("Bob", "bob", 0).await?;

    let created_at = Utc::now();
    let id = repo
        .create_transaction(created_at, alice, bob, 30, "dinner", Decision::Pending)
        .await?;

    let txn = repo.get_transaction(id).await?.expect("transaction exists");
    assert_eq!(txn.timestamp, created_at);
    assert_eq!(txn.sender_id, alice);
    assert_eq!(txn.receiver_id, bob);
    assert_eq!(txn.amount, 30);
    assert_eq!(txn.message, "dinner");
    assert_eq!(txn.accepted, Decision::Pending);

    let decided_at = Utc::now();
    repo.update_transaction_decision(id, Decision::Declined, decided_at)
        .await?;
    let txn = repo.get_transaction(id).await?.unwrap();
    assert_eq!(txn.accepted, Decision::Declined);
    assert_eq!(txn.timestamp, decided_at);

    repo.delete_transaction(id).await?;
    assert!(repo.get_transaction(id).await?.is_none());
    repo.delete_transaction(id).await?;

    Ok(())
}

#[tokio::test]
async fn test_transactions_for_user_lists_sent_then_received() -> Result<()> {
    let (repo, _temp) = test_repo().await?;
    let (alice, bob, carol) = (1, 2, 3);

    let received = repo
        .create_transaction(Utc::now(), bob, alice, 1, "in", Decision::Pending)
        .await?;
    let sent_first = repo
        .create_transaction(Utc::now(), alice, bob, 2, "out", Decision::Pending)
        .await?;
    repo.create_transaction(Utc::now(), bob, carol, 3, "other", Decision::Pending)
        .await?;
    let sent_second = repo
        .create_transaction(Utc::now(), alice, carol, 4, "out", Decision::Accepted)
        .await?;

    let ids: Vec<_> = repo
        .transactions_for_user(alice)
        .await?
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![sent_first, sent_second, received]);

    assert!(repo.transactions_for_user(42).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_cascade_deletes() -> Result<()> {
    let (repo, _temp) = test_repo().await?;
    let (alice, bob) = (1, 2);

    repo.create_transaction(Utc::now(), alice, bob, 1, "a", Decision::Pending)
        .await?;
    repo.create_transaction(Utc::now(), bob, alice, 1, "b", Decision::Pending)
        .await?;
    repo.create_transaction(Utc::now(), alice, bob, 1, "c", Decision::Pending)
        .await?;

    assert_eq!(repo.delete_transactions_sent_by(alice).await?, 2);
    assert_eq!(repo.list_transactions().await?.len(), 1);

    assert_eq!(repo.delete_transactions_for_user(alice).await?, 1);
    assert!(repo.list_transactions().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unit_of_work_rolls_back() -> Result<()> {
    let (repo, _temp) = test_repo().await?;
    let alice = repo.create_user("Alice", "alice", 100).await?;
    let bob = repo.create_user("Bob", "bob", 0).await?;

    let mut uow = repo.begin().await?;
    uow.insert_transaction(Utc::now(), alice, bob, 40, "draft", Decision::Accepted)
        .await?;
    uow.move_funds(alice, bob, 40).await?;
    assert_eq!(uow.get_user(alice).await?.unwrap().balance, 60);
    uow.rollback().await?;

    assert_eq!(repo.get_user(alice).await?.unwrap().balance, 100);
    assert_eq!(repo.get_user(bob).await?.unwrap().balance, 0);
    assert!(repo.list_transactions().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_claim_decision_only_once() -> Result<()> {
    let (repo, _temp) = test_repo().await?;
    let id = repo
        .create_transaction(Utc::now(), 1, 2, 5, "claim", Decision::Pending)
        .await?;

    let mut uow = repo.begin().await?;
    let claimed = uow.claim_decision(id, Decision::Accepted, Utc::now()).await?;
    assert_eq!(claimed.map(|t| t.accepted), Some(Decision::Accepted));
    uow.commit().await?;

    let mut uow = repo.begin().await?;
    assert!(uow.claim_decision(id, Decision::Declined, Utc::now()).await?.is_none());
    assert!(uow.claim_decision(999, Decision::Declined, Utc::now()).await?.is_none());
    uow.commit().await?;

    assert_eq!(
        repo.get_transaction(id).await?.unwrap().accepted,
        Decision::Accepted
    );

    Ok(())
}

#[tokio::test]
async fn test_connect_reopens_existing_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = StoreConfig::in_file(temp_dir.path().join("reopen.db"));

    let repo = Repository::init(&config).await?;
    let id = repo.create_user("Alice", "alice", 7).await?;
    repo.close().await;

    let reopened = Repository::connect(&config).await?;
    assert_eq!(reopened.get_user(id).await?.unwrap().balance, 7);

    Ok(())
}

#[tokio::test]
async fn test_connect_requires_existing_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = StoreConfig::in_file(temp_dir.path().join("missing.db"));

    assert!(Repository::connect(&config).await.is_err());

    Ok(())
}
