// ============================================================================
// STELLAR-SAVINGS - Network Gateway Ports
// ============================================================================
// Typed seams over the two remote services the wallet talks to:
//
//   LedgerGateway    Horizon REST   (accounts, fees, history, submit)
//   ContractGateway  Soroban RPC    (simulate, send, status, events)
//
// Production implementations live in `horizon` and `soroban`; tests plug in
// in-memory mocks.
// ============================================================================

use crate::amount::Amount;
use crate::error::WalletError;
use crate::transaction::{SignedEnvelope, UnsignedEnvelope};
use crate::xdr::{self, ScVal};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// RECORDS
// ============================================================================

/// Fresh view of an account, fetched right before each attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    /// Last consumed sequence number
    pub sequence: i64,
    /// Native balance
    pub balance: Amount,
}

/// Listing order for history endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Ascending,
    #[default]
    Descending,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Ascending => "asc",
            Order::Descending => "desc",
        }
    }
}

/// A payment-like operation (payment, create_account) touching the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    /// Horizon operation type ("payment", "create_account")
    pub kind: String,
    pub from: String,
    pub to: String,
    pub amount: Amount,
    pub is_native: bool,
    pub created_at: DateTime<Utc>,
    pub transaction_hash: String,
}

/// Any operation on the account; contract invocations carry their decoded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: String,
    /// Horizon operation type ("invoke_host_function", "payment", ...)
    pub kind: String,
    pub source_account: String,
    pub created_at: DateTime<Utc>,
    pub transaction_hash: String,
    /// Called contract (C... address), when decodable
    pub contract_id: Option<String>,
    /// Called contract function, when decodable
    pub function: Option<String>,
    /// Integer argument of the call, when decodable
    pub amount: Option<i128>,
}

impl OperationRecord {
    pub fn is_contract_invocation(&self) -> bool {
        self.kind == "invoke_host_function"
    }
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub hash: String,
    pub ledger: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Output of `simulateTransaction`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationResult {
    /// Base64 `SorobanTransactionData`
    pub transaction_data: Option<String>,
    /// Resource fee in stroops, added to the inclusion fee
    pub min_resource_fee: u64,
    /// Base64 `SorobanAuthorizationEntry` list for the invocation
    pub auth: Vec<String>,
    /// Base64 `SCVal` returned by the function
    pub retval: Option<String>,
    pub error: Option<String>,
    pub latest_ledger: u32,
}

impl SimulationResult {
    /// Decoded return value, if the simulation produced one
    pub fn return_value(&self) -> Result<Option<ScVal>> {
        self.retval.as_deref().map(xdr::decode_val).transpose()
    }
}

/// Status of a `sendTransaction` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub hash: String,
    pub status: SendStatus,
    /// Base64 `TransactionResult` when status is ERROR
    pub error_result_xdr: Option<String>,
}

/// Result of `getTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    NotFound,
    Success {
        ledger: Option<u32>,
        created_at: Option<DateTime<Utc>>,
    },
    Failed {
        result_xdr: Option<String>,
    },
}

/// A contract event as returned by `getEvents`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    pub id: String,
    pub ledger: u32,
    pub ledger_closed_at: Option<String>,
    pub contract_id: String,
    /// Base64 `SCVal` topics
    pub topics: Vec<String>,
    /// Base64 `SCVal` body
    pub value: String,
    pub tx_hash: Option<String>,
}

impl ContractEvent {
    /// First topic, when it is a symbol
    pub fn name(&self) -> Option<String> {
        xdr::val_as_symbol(&xdr::decode_val(self.topics.first()?).ok()?)
    }

    /// Body as an integer, when it is one
    pub fn amount(&self) -> Option<i128> {
        xdr::val_as_i128(&xdr::decode_val(&self.value).ok()?)
    }
}

/// Where a `getEvents` request begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStart {
    /// Events at or after this ledger
    Ledger(u32),
    /// Events strictly after a paging token from an earlier page
    After(String),
}

/// One page of events plus the ledger the RPC had closed when answering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    pub events: Vec<ContractEvent>,
    pub latest_ledger: u32,
    /// Paging token to continue from; set even when the page is empty
    pub cursor: Option<String>,
}

// ============================================================================
// PORTS
// ============================================================================

/// Account/ledger service (Horizon)
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Load an account; `AccountNotFound` when it does not exist
    async fn load_account(&self, account_id: &str) -> Result<AccountSnapshot>;

    /// Whether the account exists on the ledger
    async fn account_exists(&self, account_id: &str) -> Result<bool> {
        match self.load_account(account_id).await {
            Ok(_) => Ok(true),
            Err(WalletError::AccountNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Current per-operation inclusion fee in stroops
    async fn fetch_base_fee(&self) -> Result<u32>;

    async fn list_payments(
        &self,
        account_id: &str,
        limit: u32,
        order: Order,
    ) -> Result<Vec<PaymentRecord>>;

    async fn list_operations(
        &self,
        account_id: &str,
        limit: u32,
        order: Order,
    ) -> Result<Vec<OperationRecord>>;

    /// Submit a signed envelope; a ledger rejection is `TransactionRejected`
    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt>;
}

/// Smart-contract service (Soroban RPC)
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn get_account(&self, account_id: &str) -> Result<AccountSnapshot>;

    async fn simulate(&self, envelope: &UnsignedEnvelope) -> Result<SimulationResult>;

    /// Fold a simulation into the envelope. Pure and local.
    fn assemble(
        &self,
        envelope: UnsignedEnvelope,
        simulation: &SimulationResult,
    ) -> Result<UnsignedEnvelope> {
        envelope.assemble(simulation)
    }

    async fn send(&self, envelope: &SignedEnvelope) -> Result<SendReceipt>;

    async fn get_transaction(&self, hash: &str) -> Result<TransactionLookup>;

    async fn get_events(
        &self,
        contract_id: &str,
        start: &EventStart,
        limit: u32,
    ) -> Result<EventPage>;

    async fn get_latest_ledger(&self) -> Result<u32>;
}
