// ============================================================================
// STELLAR-SAVINGS - Wallet Transaction Lifecycle
// ============================================================================
// Orchestrates a browser-wallet connected Stellar account:
//
// - Validate transfer and savings-contract intents
// - Build envelopes from fresh account state (sequence, fee, simulation)
// - Hand envelopes to the external signer, submit, confirm
// - Classify failures into a small set of user-facing kinds
// - Keep balance and history in sync after every success
// - Poll the savings contract for events
//
// Keys never enter this crate.
// ============================================================================

pub mod amount;
pub mod classifier;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod horizon;
pub mod intent;
pub mod logging;
pub mod session;
pub mod signer;
pub mod soroban;
pub mod sync;
pub mod transaction;
pub mod watcher;
pub mod xdr;

pub use amount::Amount;
pub use classifier::{classify, classify_error, ErrorKind, RawFailure};
pub use config::{Network, WalletConfig};
pub use contract::{ContractOperation, LeaderboardEntry, SavingsContract};
pub use coordinator::{AttemptState, TransactionCoordinator, TxStatus};
pub use error::{ResultCodes, WalletError};
pub use gateway::{
    AccountSnapshot, ContractEvent, ContractGateway, EventPage, EventStart, LedgerGateway,
};
pub use horizon::HorizonClient;
pub use intent::{validate_contract_call, validate_transfer, Intent, IntentKind, ValidationError};
pub use session::WalletSession;
pub use signer::{ExternalSigner, SignerError};
pub use soroban::SorobanRpcClient;
pub use sync::{BalanceSynchronizer, Direction, RecordKind, TransactionRecord, WalletView};
pub use transaction::{SignedEnvelope, TransactionBuilder, UnsignedEnvelope};
pub use watcher::{CursorStore, EventWatcher, JsonFileCursorStore, MemoryCursorStore, WatcherHandle};

/// Re-export for convenience
pub type Result<T> = std::result::Result<T, WalletError>;
