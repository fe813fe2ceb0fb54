// ============================================================================
// STELLAR-SAVINGS - Error Classifier
// ============================================================================
// Collapses every failure an attempt can hit (wallet, RPC, Horizon) into one
// of four user-facing kinds. First match wins, in this order:
//
//   WalletNotFound     extension missing
//   UserRejected       user declined in the wallet
//   InsufficientFunds  ledger says the account cannot pay
//   Generic            everything else
// ============================================================================

use crate::error::{ResultCodes, WalletError};
use crate::signer::SignerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    WalletNotFound,
    UserRejected,
    InsufficientFunds,
    Generic,
}

impl ErrorKind {
    /// The only text a user ever sees for a failed attempt
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::WalletNotFound => {
                "Wallet extension not found. Please install Freighter and reload the page."
            }
            ErrorKind::UserRejected => "Transaction rejected in your wallet.",
            ErrorKind::InsufficientFunds => {
                "Insufficient balance to complete this transaction."
            }
            ErrorKind::Generic => {
                "Transaction failed. Make sure the receiver exists and is funded, then try again."
            }
        }
    }
}

/// Raw material for classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFailure {
    pub message: String,
    pub codes: Option<ResultCodes>,
}

impl RawFailure {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            codes: None,
        }
    }

    pub fn with_codes(mut self, codes: ResultCodes) -> Self {
        self.codes = Some(codes);
        self
    }
}

impl From<&WalletError> for RawFailure {
    fn from(err: &WalletError) -> Self {
        Self {
            message: err.to_string(),
            codes: err.result_codes().cloned(),
        }
    }
}

const WALLET_NOT_FOUND_NEEDLES: &[&str] = &[
    "not installed",
    "wallet not found",
    "extension not found",
    "no wallet",
];

const USER_REJECTED_NEEDLES: &[&str] = &["rejected", "declined", "denied", "cancel"];

const INSUFFICIENT_FUNDS_CODES: &[&str] = &[
    "op_underfunded",
    "tx_insufficient_balance",
    "op_low_reserve",
];

const INSUFFICIENT_FUNDS_NEEDLES: &[&str] = &[
    "underfunded",
    "insufficient balance",
    "insufficient funds",
];

/// Classify a raw failure. Total, pure and case-insensitive.
pub fn classify(failure: &RawFailure) -> ErrorKind {
    let message = failure.message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

    if mentions(WALLET_NOT_FOUND_NEEDLES) {
        return ErrorKind::WalletNotFound;
    }
    if mentions(USER_REJECTED_NEEDLES) {
        return ErrorKind::UserRejected;
    }

    let coded_underfunded = failure.codes.as_ref().is_some_and(|codes| {
        codes
            .iter()
            .any(|code| INSUFFICIENT_FUNDS_CODES.contains(&code.to_lowercase().as_str()))
    });
    if coded_underfunded || mentions(INSUFFICIENT_FUNDS_NEEDLES) {
        return ErrorKind::InsufficientFunds;
    }

    ErrorKind::Generic
}

/// Classify a crate error, using the typed signer variants when present
pub fn classify_error(err: &WalletError) -> ErrorKind {
    match err {
        WalletError::Signer(SignerError::NotInstalled) => ErrorKind::WalletNotFound,
        WalletError::Signer(SignerError::UserRejected) => ErrorKind::UserRejected,
        other => classify(&RawFailure::from(other)),
    }
}
