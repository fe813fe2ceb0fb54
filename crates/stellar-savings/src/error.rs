// ============================================================================
// STELLAR-SAVINGS - Error Types
// ============================================================================

use crate::intent::ValidationError;
use crate::signer::SignerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured result codes reported by the ledger for a rejected transaction.
///
/// Horizon returns these as strings (`tx_failed`, `op_underfunded`); Soroban
/// RPC returns a `TransactionResult` XDR that is decoded into the same names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCodes {
    pub transaction: Option<String>,
    #[serde(default)]
    pub operations: Option<Vec<String>>,
}

impl ResultCodes {
    /// All codes, transaction first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.transaction
            .iter()
            .map(String::as_str)
            .chain(self.operations.iter().flatten().map(String::as_str))
    }
}

#[derive(Error, Debug)]
pub enum WalletError {
    // ==================== Validation Errors ====================
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid Stellar address: {0}")]
    InvalidAddress(String),

    // ==================== Signer Errors ====================
    #[error("Wallet signer error: {0}")]
    Signer(#[from] SignerError),

    // ==================== Account Errors ====================
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    // ==================== Transaction Errors ====================
    #[error("A transaction is already in flight for this wallet")]
    AttemptInFlight,

    #[error("Transaction refused by the network: {reason}")]
    TransactionRejected {
        reason: String,
        codes: Option<ResultCodes>,
    },

    #[error("Transaction timeout")]
    TransactionTimeout,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Contract simulation failed: {0}")]
    Simulation(String),

    // ==================== Network Errors ====================
    #[error("Horizon API error: {0}")]
    HorizonError(String),

    #[error("Soroban RPC error: {0}")]
    RpcError(String),

    #[error("Network request failed: {0}")]
    NetworkError(String),

    #[error("Rate limited - try again later")]
    RateLimited,

    // ==================== Refresh Errors ====================
    #[error("Refresh failed: {0}")]
    Refresh(String),

    // ==================== Configuration Errors ====================
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ==================== Internal Errors ====================
    #[error("XDR error: {0}")]
    Xdr(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl WalletError {
    /// Result codes attached to a ledger rejection, if any.
    pub fn result_codes(&self) -> Option<&ResultCodes> {
        match self {
            WalletError::TransactionRejected { codes, .. } => codes.as_ref(),
            _ => None,
        }
    }

    /// Errors a caller may reasonably retry by starting a new attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WalletError::NetworkError(_)
                | WalletError::RateLimited
                | WalletError::TransactionTimeout
                | WalletError::AttemptInFlight
        )
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WalletError::TransactionTimeout
        } else {
            WalletError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::SerializationError(err.to_string())
    }
}

impl From<stellar_xdr::curr::Error> for WalletError {
    fn from(err: stellar_xdr::curr::Error) -> Self {
        WalletError::Xdr(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Storage(err.to_string())
    }
}
