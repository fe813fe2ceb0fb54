// ============================================================================
// STELLAR-SAVINGS - Balance & History Synchronizer
// ============================================================================
// Owns the displayed balance and transaction feed for one wallet.
//
// A refresh fetches three things concurrently:
//   balance       /accounts/{id}
//   transfers     /accounts/{id}/payments
//   invocations   /accounts/{id}/operations (invoke_host_function only)
//
// Each stream keeps its last good copy, so one failing fetch never blanks
// the other. Only a total failure is reported, and it leaves the view alone.
// ============================================================================

use crate::amount::Amount;
use crate::error::WalletError;
use crate::gateway::{LedgerGateway, OperationRecord, Order, PaymentRecord};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Transfer,
    ContractCall,
}

/// One row of the history feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub kind: RecordKind,
    pub direction: Direction,
    /// Display amount ("5.00" for XLM, integer units for contract calls)
    pub amount: String,
    pub timestamp: DateTime<Utc>,
    pub counterparty: String,
    pub reference_hash: String,
}

/// A record from either remote stream, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRecord {
    Payment(PaymentRecord),
    Invocation(OperationRecord),
}

impl RemoteRecord {
    /// Normalize into a feed row as seen from `wallet`.
    ///
    /// Non-native payments and non-contract operations yield `None`.
    pub fn normalize(&self, wallet: &str) -> Option<TransactionRecord> {
        match self {
            RemoteRecord::Payment(p) => {
                if !p.is_native {
                    return None;
                }
                let sent = p.from == wallet;
                Some(TransactionRecord {
                    id: p.id.clone(),
                    kind: RecordKind::Transfer,
                    direction: if sent { Direction::Sent } else { Direction::Received },
                    amount: p.amount.display_2dp(),
                    timestamp: p.created_at,
                    counterparty: if sent { p.to.clone() } else { p.from.clone() },
                    reference_hash: p.transaction_hash.clone(),
                })
            }
            RemoteRecord::Invocation(op) => {
                if !op.is_contract_invocation() {
                    return None;
                }
                let sent = op.source_account == wallet;
                Some(TransactionRecord {
                    id: op.id.clone(),
                    kind: RecordKind::ContractCall,
                    direction: if sent { Direction::Sent } else { Direction::Received },
                    amount: op.amount.unwrap_or(0).to_string(),
                    timestamp: op.created_at,
                    counterparty: op
                        .contract_id
                        .clone()
                        .unwrap_or_else(|| op.source_account.clone()),
                    reference_hash: op.transaction_hash.clone(),
                })
            }
        }
    }
}

/// Most recent records kept in the displayed feed
pub const FEED_LIMIT: usize = 15;

/// Merge records into one feed: unique ids, newest first, at most `cap`.
///
/// Ties on timestamp are broken by id so the result does not depend on the
/// order of the inputs.
pub fn merge_feed(
    records: impl IntoIterator<Item = TransactionRecord>,
    cap: usize,
) -> Vec<TransactionRecord> {
    let mut merged: Vec<TransactionRecord> = records.into_iter().collect();
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));

    let mut seen = HashSet::new();
    merged.retain(|r| seen.insert(r.id.clone()));
    merged.truncate(cap);
    merged
}

// ============================================================================
// SYNCHRONIZER
// ============================================================================

/// What the UI displays for the connected wallet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletView {
    pub balance: Option<Amount>,
    pub records: Vec<TransactionRecord>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SyncState {
    view: WalletView,
    transfers: Vec<TransactionRecord>,
    invocations: Vec<TransactionRecord>,
}

pub struct BalanceSynchronizer {
    wallet: String,
    ledger: Arc<dyn LedgerGateway>,
    page_limit: u32,
    state: RwLock<SyncState>,
}

impl BalanceSynchronizer {
    pub fn new(
        wallet: impl Into<String>,
        ledger: Arc<dyn LedgerGateway>,
        page_limit: u32,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            ledger,
            page_limit,
            state: RwLock::new(SyncState::default()),
        }
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    /// Current displayed state
    pub async fn view(&self) -> WalletView {
        self.state.read().await.view.clone()
    }

    /// Refetch everything and rebuild the view.
    ///
    /// Returns the new view, or `Refresh` when every fetch failed.
    pub async fn refresh(&self) -> Result<WalletView> {
        let wallet = self.wallet.as_str();
        let (balance, payments, operations) = tokio::join!(
            self.ledger.load_account(wallet),
            self.ledger.list_payments(wallet, self.page_limit, Order::Descending),
            self.ledger.list_operations(wallet, self.page_limit, Order::Descending),
        );

        if let (Err(b), Err(p), Err(o)) = (&balance, &payments, &operations) {
            warn!("Refresh failed for {}: {}; {}; {}", wallet, b, p, o);
            return Err(WalletError::Refresh(b.to_string()));
        }

        let transfers = payments.map(|records| {
            records
                .into_iter()
                .filter_map(|p| RemoteRecord::Payment(p).normalize(wallet))
                .collect::<Vec<_>>()
        });
        let invocations = operations.map(|records| {
            records
                .into_iter()
                .filter_map(|op| RemoteRecord::Invocation(op).normalize(wallet))
                .collect::<Vec<_>>()
        });

        let mut state = self.state.write().await;

        match balance {
            Ok(snapshot) => state.view.balance = Some(snapshot.balance),
            Err(e) => warn!("Balance fetch failed, keeping last value: {}", e),
        }
        match transfers {
            Ok(records) => state.transfers = records,
            Err(e) => warn!("Payments fetch failed, keeping last page: {}", e),
        }
        match invocations {
            Ok(records) => state.invocations = records,
            Err(e) => warn!("Operations fetch failed, keeping last page: {}", e),
        }

        let combined = state
            .transfers
            .iter()
            .chain(state.invocations.iter())
            .cloned()
            .collect::<Vec<_>>();
        state.view.records = merge_feed(combined, FEED_LIMIT);
        state.view.refreshed_at = Some(Utc::now());

        debug!(
            "Refreshed {}: {} records, balance {:?}",
            wallet,
            state.view.records.len(),
            state.view.balance
        );
        Ok(state.view.clone())
    }
}
