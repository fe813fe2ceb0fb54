//! Integration Tests: Balance & History Sync
//!
//! - Transfers and contract calls merged into one feed
//! - Feed capped to the most recent records
//! - Partial and total fetch failures

use super::mocks::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use stellar_savings::gateway::LedgerGateway;
use stellar_savings::{Amount, BalanceSynchronizer, Direction, RecordKind, WalletError};

fn synchronizer(ledger: &Arc<MockLedger>) -> BalanceSynchronizer {
    BalanceSynchronizer::new(ALICE, Arc::clone(ledger) as Arc<dyn LedgerGateway>, 10)
}

#[tokio::test]
async fn test_refresh_merges_both_streams() {
    let ledger = Arc::new(MockLedger::new().with_account(ALICE, 42));
    ledger.add_payment(payment("p1", ALICE, BOB, 3, 10));
    ledger.add_payment(payment("p2", CAROL, ALICE, 8, 30));
    ledger.add_operation(invocation("o1", ALICE, 25, 20));
    let sync = synchronizer(&ledger);

    let view = sync.refresh().await.unwrap();

    assert_eq!(view.balance, Some(Amount::from_xlm(42)));
    let ids: Vec<&str> = view.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "o1", "p1"]);

    assert_eq!(view.records[0].direction, Direction::Received);
    assert_eq!(view.records[0].counterparty, CAROL);
    assert_eq!(view.records[1].kind, RecordKind::ContractCall);
    assert_eq!(view.records[1].amount, "25");
    assert_eq!(view.records[1].counterparty, SAVINGS);
    assert_eq!(view.records[2].direction, Direction::Sent);
    assert!(view.refreshed_at.is_some());
}

#[tokio::test]
async fn test_feed_keeps_fifteen_most_recent() {
    let ledger = Arc::new(MockLedger::new().with_account(ALICE, 1));
    for i in 0..10 {
        ledger.add_payment(payment(&format!("p{:02}", i), BOB, ALICE, 1, 100 + i));
        ledger.add_operation(invocation(&format!("o{:02}", i), ALICE, 1, 200 + i));
    }
    let sync = synchronizer(&ledger);

    let view = sync.refresh().await.unwrap();

    assert_eq!(view.records.len(), 15);
    assert_eq!(view.records[0].id, "o09");
    assert_eq!(view.records[14].id, "p05");
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let ledger = Arc::new(MockLedger::new().with_account(ALICE, 5));
    ledger.add_payment(payment("p1", BOB, ALICE, 2, 10));
    let sync = synchronizer(&ledger);

    let first = sync.refresh().await.unwrap();
    let second = sync.refresh().await.unwrap();

    assert_eq!(first.balance, second.balance);
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn test_failed_stream_keeps_last_copy() {
    let ledger = Arc::new(MockLedger::new().with_account(ALICE, 5));
    ledger.add_payment(payment("p1", BOB, ALICE, 2, 10));
    ledger.add_operation(invocation("o1", ALICE, 7, 20));
    let sync = synchronizer(&ledger);
    sync.refresh().await.unwrap();

    ledger.fail_operations.store(true, Ordering::SeqCst);
    ledger.add_payment(payment("p2", BOB, ALICE, 4, 30));

    let view = sync.refresh().await.unwrap();
    let ids: Vec<&str> = view.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "o1", "p1"]);
}

#[tokio::test]
async fn test_total_failure_keeps_displayed_view() {
    let ledger = Arc::new(MockLedger::new().with_account(ALICE, 5));
    ledger.add_payment(payment("p1", BOB, ALICE, 2, 10));
    let sync = synchronizer(&ledger);
    let before = sync.refresh().await.unwrap();

    ledger.fail_all(true);
    let result = sync.refresh().await;

    assert!(matches!(result, Err(WalletError::Refresh(_))));
    assert_eq!(sync.view().await, before);
}

#[tokio::test]
async fn test_balance_failure_keeps_last_balance() {
    let ledger = Arc::new(MockLedger::new().with_account(ALICE, 5));
    let sync = synchronizer(&ledger);
    sync.refresh().await.unwrap();

    ledger.fail_balance.store(true, Ordering::SeqCst);
    ledger.add_payment(payment("p1", BOB, ALICE, 2, 10));

    let view = sync.refresh().await.unwrap();
    assert_eq!(view.balance, Some(Amount::from_xlm(5)));
    assert_eq!(view.records.len(), 1);
}

#[tokio::test]
async fn test_unknown_account_has_no_balance() {
    let ledger = Arc::new(MockLedger::new());
    let sync = synchronizer(&ledger);

    let view = sync.refresh().await.unwrap();

    assert_eq!(view.balance, None);
    assert!(view.records.is_empty());
}
