//! Integration Tests: Transaction Lifecycle
//!
//! Drives the coordinator through complete attempts:
//! - Transfers rejected by the ledger, accepted, and racing a second attempt
//! - Signer failures and timeouts
//! - Contract calls with simulation and confirmation polling
//! - Disconnect while an attempt is in flight

use super::mocks::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use stellar_savings::amount::STROOPS_PER_XLM;
use stellar_savings::gateway::{SendStatus, TransactionLookup};
use stellar_savings::transaction::{decode_time_bounds, TX_VALIDITY_SECS};
use stellar_xdr::curr::{
    Limits, TransactionResult, TransactionResultExt, TransactionResultResult, WriteXdr,
};
use stellar_savings::{
    validate_contract_call, validate_transfer, Amount, ContractOperation, Direction, ErrorKind,
    ResultCodes, SignerError, TxStatus, WalletError,
};

fn transfer(amount: &str) -> stellar_savings::Intent {
    validate_transfer(Some(ALICE), BOB, amount).expect("valid transfer")
}

fn add_savings(amount: &str) -> stellar_savings::Intent {
    validate_contract_call(Some(ALICE), SAVINGS, ContractOperation::AddSavings, amount)
        .expect("valid contract call")
}

fn insufficient_balance_xdr() -> String {
    TransactionResult {
        fee_charged: 100,
        result: TransactionResultResult::TxInsufficientBalance,
        ext: TransactionResultExt::V0,
    }
    .to_xdr_base64(Limits::none())
    .unwrap()
}

#[tokio::test]
async fn test_underfunded_transfer_from_empty_account() {
    let h = Harness::new(
        MockLedger::new().with_account(ALICE, 0).with_account(BOB, 10),
        MockContracts::new(),
        MockSigner::new(ALICE),
    );
    h.ledger.set_outcome(SubmitOutcome::Reject(ResultCodes {
        transaction: Some("tx_failed".into()),
        operations: Some(vec!["op_underfunded".into()]),
    }));

    let before = chrono::Utc::now().timestamp() as u64;
    let state = h.coordinator.submit(transfer("10")).await.unwrap();
    let after = chrono::Utc::now().timestamp() as u64;

    // the envelope the wallet saw expires 60 seconds after it was built
    let requests = h.signer.requests();
    assert_eq!(requests.len(), 1);
    let (min_time, max_time) = decode_time_bounds(&requests[0]).unwrap().unwrap();
    assert_eq!(min_time, 0);
    assert_eq!(TX_VALIDITY_SECS, 60);
    assert!(
        (before + 60..=after + 60).contains(&max_time),
        "max_time {} outside [{}, {}]",
        max_time,
        before + 60,
        after + 60
    );

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::InsufficientFunds));
    assert_eq!(state.hash, None);
    assert_eq!(h.ledger.submitted().len(), 1);
    assert_eq!(h.ledger.history_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(
        state.error_message(),
        Some("Insufficient balance to complete this transaction.")
    );
}

#[tokio::test]
async fn test_horizon_failure_is_generic() {
    let h = Harness::funded();
    h.ledger.set_outcome(SubmitOutcome::Fail("HTTP 503 Service Unavailable".into()));

    let state = h.coordinator.submit(transfer("5")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::Generic));
    assert_eq!(state.hash, None);
    assert_eq!(h.ledger.submitted().len(), 1);
    assert_eq!(h.ledger.history_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_accepted_transfer_refreshes_balance() {
    let h = Harness::funded();
    let fee = i64::from(FEE);
    h.ledger.on_accept(
        Amount::from_stroops(5 * STROOPS_PER_XLM + fee),
        payment("p1", ALICE, BOB, 5, 1_700_000_000),
    );

    let state = h.coordinator.submit(transfer("5")).await.unwrap();

    assert_eq!(state.status, TxStatus::Success);
    assert_eq!(state.hash, Some(format!("{:064x}", 1)));
    assert_eq!(state.error, None);
    assert_eq!(state.refresh_error, None);

    let view = h.synchronizer.view().await;
    assert_eq!(
        view.balance,
        Some(Amount::from_stroops(95 * STROOPS_PER_XLM - fee))
    );
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].direction, Direction::Sent);
    assert_eq!(view.records[0].amount, "5.00");
    assert_eq!(view.records[0].counterparty, BOB);
}

#[tokio::test]
async fn test_second_attempt_while_signing_is_refused() {
    let (signer, gate) = MockSigner::gated(ALICE);
    let h = Harness::new(
        MockLedger::new().with_account(ALICE, 100).with_account(BOB, 10),
        MockContracts::new(),
        signer,
    );

    let coordinator = Arc::clone(&h.coordinator);
    let first = tokio::spawn(async move { coordinator.submit(transfer("5")).await });

    h.signer.entered.notified().await;
    assert_eq!(h.coordinator.state().status, TxStatus::Signing);

    let second = h.coordinator.submit(transfer("7")).await;
    assert!(matches!(second, Err(WalletError::AttemptInFlight)));
    assert_eq!(h.coordinator.state().status, TxStatus::Signing);

    gate.notify_one();
    let state = first.await.unwrap().unwrap();

    assert_eq!(state.status, TxStatus::Success);
    assert_eq!(h.signer.requests().len(), 1);
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn test_new_attempt_accepted_after_failure() {
    let h = Harness::funded();
    h.signer.set_behavior(SignBehavior::Reject(SignerError::UserRejected));

    let failed = h.coordinator.submit(transfer("5")).await.unwrap();
    assert_eq!(failed.status, TxStatus::Failed);
    assert_eq!(failed.error, Some(ErrorKind::UserRejected));
    assert!(h.ledger.submitted().is_empty());

    h.signer.set_behavior(SignBehavior::Approve);
    let retried = h.coordinator.submit(transfer("5")).await.unwrap();
    assert_eq!(retried.status, TxStatus::Success);
    assert_eq!(retried.error, None);
    assert_eq!(h.signer.requests().len(), 2);
}

#[tokio::test]
async fn test_signer_failures_are_classified() {
    let cases = [
        (SignBehavior::Reject(SignerError::NotInstalled), ErrorKind::WalletNotFound),
        (SignBehavior::Reject(SignerError::UserRejected), ErrorKind::UserRejected),
        (SignBehavior::Empty, ErrorKind::UserRejected),
        (
            SignBehavior::Reject(SignerError::Other("User declined access".into())),
            ErrorKind::UserRejected,
        ),
        (
            SignBehavior::Reject(SignerError::Other("extension crashed".into())),
            ErrorKind::Generic,
        ),
    ];

    for (behavior, expected) in cases {
        let h = Harness::funded();
        h.signer.set_behavior(behavior.clone());
        let state = h.coordinator.submit(transfer("1")).await.unwrap();
        assert_eq!(state.status, TxStatus::Failed, "{:?}", behavior);
        assert_eq!(state.error, Some(expected), "{:?}", behavior);
        assert!(h.ledger.submitted().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_signer_times_out() {
    let config = stellar_savings::WalletConfig {
        signer_timeout_secs: 2,
        ..test_config()
    };
    let h = Harness::with_config(
        config,
        MockLedger::new().with_account(ALICE, 100).with_account(BOB, 10),
        MockContracts::new(),
        MockSigner::new(ALICE),
    );
    h.signer.set_behavior(SignBehavior::Hang);

    let state = h.coordinator.submit(transfer("1")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::Generic));
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_missing_source_account_fails_while_building() {
    let h = Harness::new(
        MockLedger::new(),
        MockContracts::new(),
        MockSigner::new(ALICE),
    );

    let state = h.coordinator.submit(transfer("5")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::Generic));
    assert!(h.signer.requests().is_empty());
}

#[tokio::test]
async fn test_transfer_to_unfunded_destination() {
    let h = Harness::new(
        MockLedger::new().with_account(ALICE, 100),
        MockContracts::new(),
        MockSigner::new(ALICE),
    );

    // Below the starting balance: refused before the wallet is asked
    let state = h.coordinator.submit(transfer("0.5")).await.unwrap();
    assert_eq!(state.status, TxStatus::Failed);
    assert!(h.signer.requests().is_empty());

    let state = h.coordinator.submit(transfer("5")).await.unwrap();
    assert_eq!(state.status, TxStatus::Success);
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn test_intent_for_another_wallet_is_refused() {
    let h = Harness::funded();
    let intent = validate_transfer(Some(CAROL), BOB, "1").unwrap();

    let result = h.coordinator.submit(intent).await;

    assert!(matches!(result, Err(WalletError::InvalidTransaction(_))));
    assert_eq!(h.coordinator.state().status, TxStatus::Idle);
    assert_eq!(h.ledger.account_loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disconnect_abandons_in_flight_attempt() {
    let (signer, gate) = MockSigner::gated(ALICE);
    let h = Harness::new(
        MockLedger::new().with_account(ALICE, 100).with_account(BOB, 10),
        MockContracts::new(),
        signer,
    );

    let coordinator = Arc::clone(&h.coordinator);
    let first = tokio::spawn(async move { coordinator.submit(transfer("5")).await });
    h.signer.entered.notified().await;

    h.coordinator.disconnect();
    let state = h.coordinator.state();
    assert_eq!(state.status, TxStatus::Idle);
    assert_eq!(state.epoch, 1);

    gate.notify_one();
    let abandoned = first.await.unwrap().unwrap();
    assert_eq!(abandoned.status, TxStatus::Idle);
    assert_eq!(abandoned.error, None);
    assert!(h.ledger.submitted().is_empty());

    // A fresh attempt runs normally in the new epoch
    gate.notify_one();
    let state = h.coordinator.submit(transfer("5")).await.unwrap();
    assert_eq!(state.status, TxStatus::Success);
    assert_eq!(state.epoch, 1);
}

#[tokio::test]
async fn test_refresh_failure_after_success_is_reported_separately() {
    let (signer, gate) = MockSigner::gated(ALICE);
    let h = Harness::new(
        MockLedger::new().with_account(ALICE, 100).with_account(BOB, 10),
        MockContracts::new(),
        signer,
    );

    let coordinator = Arc::clone(&h.coordinator);
    let attempt = tokio::spawn(async move { coordinator.submit(transfer("1")).await });

    // The envelope is built; history goes dark before submission
    h.signer.entered.notified().await;
    h.ledger.fail_all(true);
    gate.notify_one();

    let state = attempt.await.unwrap().unwrap();
    assert_eq!(state.status, TxStatus::Success);
    assert!(state.hash.is_some());
    assert!(state.refresh_error.is_some());
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn test_contract_call_is_simulated_and_confirmed() {
    let h = Harness::funded();
    h.contracts.queue_lookups([
        TransactionLookup::NotFound,
        TransactionLookup::Success {
            ledger: Some(120),
            created_at: None,
        },
    ]);

    let state = h.coordinator.submit(add_savings("25")).await.unwrap();

    assert_eq!(state.status, TxStatus::Success);
    assert_eq!(state.hash, Some(format!("{:064x}", 1)));
    assert_eq!(h.contracts.simulations.load(Ordering::SeqCst), 1);
    assert_eq!(h.contracts.status_polls.load(Ordering::SeqCst), 2);
    assert_eq!(h.contracts.sent().len(), 1);
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_contract_call_failed_on_ledger() {
    let h = Harness::funded();
    h.contracts.queue_lookups([TransactionLookup::Failed {
        result_xdr: Some(insufficient_balance_xdr()),
    }]);

    let state = h.coordinator.submit(add_savings("25")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::InsufficientFunds));
}

#[tokio::test]
async fn test_contract_call_refused_by_rpc() {
    let h = Harness::funded();
    h.contracts
        .set_send_status(SendStatus::Error, Some(insufficient_balance_xdr()));

    let state = h.coordinator.submit(add_savings("25")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::InsufficientFunds));
    assert_eq!(h.contracts.status_polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_contract_call_congested_rpc() {
    let h = Harness::funded();
    h.contracts.set_send_status(SendStatus::TryAgainLater, None);

    let state = h.coordinator.submit(add_savings("25")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::Generic));
}

#[tokio::test]
async fn test_contract_call_never_confirmed() {
    let h = Harness::funded();

    let state = h.coordinator.submit(add_savings("25")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::Generic));
    assert_eq!(h.contracts.status_polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_simulation_never_reaches_signer() {
    let h = Harness::funded();
    h.contracts.set_simulation_error("HostError: Error(Contract, #3)");

    let state = h.coordinator.submit(add_savings("25")).await.unwrap();

    assert_eq!(state.status, TxStatus::Failed);
    assert_eq!(state.error, Some(ErrorKind::Generic));
    assert!(h.signer.requests().is_empty());
    assert!(h.contracts.sent().is_empty());
}
