mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{create_user, test_service, Pair};
use venmo_ledger::application::AppError;
use venmo_ledger::domain::{Decision, NewTransaction};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_never_overdraw_sender() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let pair = Pair::create(&service, 100, 0).await?;

    // Twelve requests of 25 against a balance of 100: at most four can settle.
    let mut ids = Vec::new();
    for i in 0..12 {
        let txn = service
            .create_transaction(NewTransaction::request(
                pair.alice,
                pair.bob,
                25,
                format!("request {i}"),
            ))
            .await?;
        ids.push(txn.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.accept_transaction(id).await })
        })
        .collect();

    let mut settled = 0;
    for handle in handles {
        match handle.await? {
            Ok(txn) => {
                assert_eq!(txn.accepted, Decision::Accepted);
                settled += 1;
            }
            Err(AppError::InsufficientFunds { .. }) => {}
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(settled, 4);
    let (alice, bob) = pair.balances(&service).await?;
    assert_eq!(alice, 0);
    assert_eq!(bob, 100);

    let accepted = service
        .repository()
        .list_transactions()
        .await?
        .into_iter()
        .filter(|t| t.accepted == Decision::Accepted)
        .count();
    assert_eq!(accepted, 4, "Only settled transactions are marked accepted");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_conserve_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let pair = Pair::create(&service, 50, 50).await?;

    // Alice and Bob pay each other 10 at a time, twenty times each way.
    let mut handles = Vec::new();
    for i in 0..40 {
        let service = Arc::clone(&service);
        let (from, to) = if i % 2 == 0 {
            (pair.alice, pair.bob)
        } else {
            (pair.bob, pair.alice)
        };
        handles.push(tokio::spawn(async move {
            service
                .create_transaction(NewTransaction::payment(from, to, 10, "ping"))
                .await
        }));
    }

    for handle in handles {
        match handle.await? {
            Ok(_) | Err(AppError::InsufficientFunds { .. }) => {}
            Err(other) => return Err(other.into()),
        }
    }

    let (alice, bob) = pair.balances(&service).await?;
    assert!(alice >= 0 && bob >= 0, "No overdraft: {alice} / {bob}");
    assert_eq!(alice + bob, 100);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_decisions_have_one_winner() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let alice = create_user(&service, "alice", 100).await?;
    let bob = create_user(&service, "bob", 0).await?;

    let txn = service
        .create_transaction(NewTransaction::request(alice, bob, 60, "once"))
        .await?;
    let txn_id = txn.id;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.decide_transaction(txn_id, i % 2 == 0).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(decided) => winners.push(decided.accepted),
            Err(AppError::AlreadyDecided(_)) => {}
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(winners.len(), 1);
    let expected = match winners[0] {
        Decision::Accepted => (40, 60),
        _ => (100, 0),
    };
    assert_eq!(
        (
            service.get_user(alice).await?.balance(),
            service.get_user(bob).await?.balance()
        ),
        expected
    );

    Ok(())
}
