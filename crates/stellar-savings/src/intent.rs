// ============================================================================
// STELLAR-SAVINGS - Transaction Intents
// ============================================================================
// Validation of raw UI input into transfer and contract-call intents.
//
// Everything here is synchronous and works on raw strings; nothing
// touches the network or the wallet.
// ============================================================================

use crate::amount::{parse_contract_units, Amount};
use crate::contract::ContractOperation;
use crate::xdr::{is_account_address, is_contract_address};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why raw input was refused before any I/O
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Please connect your wallet first.")]
    NotConnected,

    #[error("Please enter a destination address.")]
    MissingDestination,

    #[error("Enter a valid amount greater than 0.")]
    InvalidAmount,

    #[error("Destination is not a valid address: {0}")]
    InvalidAddress(String),

    #[error("Operation '{0}' does not change contract state")]
    ReadOnlyOperation(String),
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    /// Native XLM transfer
    Transfer { destination: String, amount: Amount },

    /// Savings contract invocation; the wallet address is the first argument
    ContractCall {
        contract_id: String,
        operation: ContractOperation,
        amount: i128,
    },
}

/// A validated, immutable request to move funds or change contract state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    source: String,
    kind: IntentKind,
}

impl Intent {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &IntentKind {
        &self.kind
    }

    pub fn is_contract_call(&self) -> bool {
        matches!(self.kind, IntentKind::ContractCall { .. })
    }
}

/// Validate a native transfer.
///
/// Checks run in a fixed order: connection, destination presence, amount,
/// destination format.
pub fn validate_transfer(
    wallet: Option<&str>,
    destination: &str,
    amount: &str,
) -> Result<Intent, ValidationError> {
    let source = connected(wallet)?;
    let destination = present(destination)?;

    let amount = Amount::parse(amount)
        .filter(Amount::is_positive)
        .ok_or(ValidationError::InvalidAmount)?;

    if !is_account_address(destination) {
        return Err(ValidationError::InvalidAddress(destination.to_string()));
    }

    Ok(Intent {
        source,
        kind: IntentKind::Transfer {
            destination: destination.to_string(),
            amount,
        },
    })
}

/// Validate a savings contract invocation.
pub fn validate_contract_call(
    wallet: Option<&str>,
    contract_id: &str,
    operation: ContractOperation,
    amount: &str,
) -> Result<Intent, ValidationError> {
    let source = connected(wallet)?;
    let contract_id = present(contract_id)?;

    let amount = parse_contract_units(amount)
        .filter(|units| *units > 0)
        .ok_or(ValidationError::InvalidAmount)?;

    if !is_contract_address(contract_id) {
        return Err(ValidationError::InvalidAddress(contract_id.to_string()));
    }
    if operation.is_read_only() {
        return Err(ValidationError::ReadOnlyOperation(
            operation.function_name().to_string(),
        ));
    }

    Ok(Intent {
        source,
        kind: IntentKind::ContractCall {
            contract_id: contract_id.to_string(),
            operation,
            amount,
        },
    })
}

fn connected(wallet: Option<&str>) -> Result<String, ValidationError> {
    match wallet.map(str::trim) {
        Some(address) if !address.is_empty() => Ok(address.to_string()),
        _ => Err(ValidationError::NotConnected),
    }
}

fn present(destination: &str) -> Result<&str, ValidationError> {
    let trimmed = destination.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingDestination)
    } else {
        Ok(trimmed)
    }
}
