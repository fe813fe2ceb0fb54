// ============================================================================
// STELLAR-SAVINGS - XDR Conversions
// ============================================================================
// Glue between the wallet's string-typed world and `stellar_xdr::curr`:
//
//   G... / C... strkeys      <-> AccountId, MuxedAccount, ScAddress
//   contract arguments       <-> ScVal (base64 on the wire)
//   getLedgerEntries         -> AccountEntry head
//   TransactionResult        -> Horizon-style result code names
// ============================================================================

use crate::error::{ResultCodes, WalletError};
use crate::Result;
use stellar_strkey::{ed25519, Contract};
use stellar_xdr::curr::{
    AccountId, ContractId, CreateAccountResult, Hash, LedgerEntryData, LedgerKey,
    LedgerKeyAccount, Limits, MuxedAccount, OperationResult, OperationResultTr, PublicKey,
    ReadXdr, ScAddress, ScSymbol, TransactionResult, TransactionResultResult, Uint256, WriteXdr,
};

pub use stellar_xdr::curr::ScVal;

// ============================================================================
// ADDRESSES
// ============================================================================

/// Decode a G... address into an `AccountId`
pub fn account_id(address: &str) -> Result<AccountId> {
    let key = ed25519::PublicKey::from_string(address)
        .map_err(|_| WalletError::InvalidAddress(address.to_string()))?;
    Ok(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key.0))))
}

/// Plain (non-multiplexed) `MuxedAccount` for a G... address
pub fn muxed_account(address: &str) -> Result<MuxedAccount> {
    Ok(account_id(address)?.into())
}

/// Decode a C... address into a `ContractId`
pub fn contract_id(address: &str) -> Result<ContractId> {
    let contract = Contract::from_string(address)
        .map_err(|_| WalletError::InvalidAddress(address.to_string()))?;
    Ok(ContractId(Hash(contract.0)))
}

/// `ScAddress` for either a G... account or a C... contract
pub fn sc_address(address: &str) -> Result<ScAddress> {
    match address.as_bytes().first() {
        Some(b'G') => Ok(ScAddress::Account(account_id(address)?)),
        Some(b'C') => Ok(ScAddress::Contract(contract_id(address)?)),
        _ => Err(WalletError::InvalidAddress(address.to_string())),
    }
}

pub fn is_account_address(address: &str) -> bool {
    ed25519::PublicKey::from_string(address).is_ok()
}

pub fn is_contract_address(address: &str) -> bool {
    Contract::from_string(address).is_ok()
}

/// Strkey form of an account or contract address; other kinds yield `None`
pub fn address_string(address: &ScAddress) -> Option<String> {
    match address {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))) => {
            Some(ed25519::PublicKey(*key).to_string())
        }
        ScAddress::Contract(ContractId(Hash(hash))) => Some(Contract(*hash).to_string()),
        _ => None,
    }
}

// ============================================================================
// SCVAL
// ============================================================================

pub fn address_val(address: &str) -> Result<ScVal> {
    Ok(ScVal::Address(sc_address(address)?))
}

pub fn symbol_val(name: &str) -> Result<ScVal> {
    let symbol = ScSymbol::try_from(name)
        .map_err(|_| WalletError::Xdr(format!("invalid symbol '{}'", name)))?;
    Ok(ScVal::Symbol(symbol))
}

pub fn decode_val(input: &str) -> Result<ScVal> {
    Ok(ScVal::from_xdr_base64(input.trim(), Limits::none())?)
}

pub fn encode_val(value: &ScVal) -> Result<String> {
    Ok(value.to_xdr_base64(Limits::none())?)
}

/// Integer view of any integer-like value; Void reads as zero
pub fn val_as_i128(value: &ScVal) -> Option<i128> {
    match value {
        ScVal::Void => Some(0),
        ScVal::U32(v) => Some(i128::from(*v)),
        ScVal::I32(v) => Some(i128::from(*v)),
        ScVal::U64(v) => Some(i128::from(*v)),
        ScVal::I64(v) => Some(i128::from(*v)),
        ScVal::U128(parts) => i128::try_from(u128::from(parts)).ok(),
        ScVal::I128(parts) => Some(i128::from(parts)),
        _ => None,
    }
}

pub fn val_as_symbol(value: &ScVal) -> Option<String> {
    match value {
        ScVal::Symbol(symbol) => symbol.0.to_utf8_string().ok(),
        _ => None,
    }
}

pub fn val_as_address(value: &ScVal) -> Option<String> {
    match value {
        ScVal::Address(address) => address_string(address),
        _ => None,
    }
}

// ============================================================================
// LEDGER ENTRIES
// ============================================================================

/// LedgerKey for an account, base64 encoded for `getLedgerEntries`
pub fn account_ledger_key(address: &str) -> Result<String> {
    let key = LedgerKey::Account(LedgerKeyAccount {
        account_id: account_id(address)?,
    });
    Ok(key.to_xdr_base64(Limits::none())?)
}

/// The parts of an AccountEntry the wallet reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntryHead {
    pub account_id: String,
    pub balance: i64,
    pub sequence: i64,
}

/// Decode a base64 `LedgerEntryData` that must hold an account
pub fn decode_account_entry(entry_xdr: &str) -> Result<AccountEntryHead> {
    match LedgerEntryData::from_xdr_base64(entry_xdr.trim(), Limits::none())? {
        LedgerEntryData::Account(entry) => {
            let AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key))) = entry.account_id;
            Ok(AccountEntryHead {
                account_id: ed25519::PublicKey(key).to_string(),
                balance: entry.balance,
                sequence: entry.seq_num.0,
            })
        }
        other => Err(WalletError::Xdr(format!(
            "expected an account ledger entry, got {}",
            other.name()
        ))),
    }
}

// ============================================================================
// TRANSACTION RESULTS
// ============================================================================

/// `TxBadSeq` -> `bad_seq` style conversion of generated variant names
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn transaction_code(result: &TransactionResultResult) -> String {
    match result {
        TransactionResultResult::TxNoAccount => "tx_no_source_account".to_string(),
        other => snake_case(other.name()),
    }
}

fn operation_code(result: &OperationResult) -> String {
    let inner = match result {
        OperationResult::OpInner(inner) => inner,
        OperationResult::OpNoAccount => return "op_no_source_account".to_string(),
        other => return snake_case(other.name()),
    };
    let name = match inner {
        OperationResultTr::CreateAccount(CreateAccountResult::AlreadyExist) => "AlreadyExists",
        OperationResultTr::CreateAccount(r) => r.name(),
        OperationResultTr::Payment(r) => r.name(),
        OperationResultTr::InvokeHostFunction(r) => r.name(),
        // never built by this wallet
        other => other.name(),
    };
    format!("op_{}", snake_case(name))
}

/// Decode a base64 `TransactionResult` into the names Horizon reports
/// (`tx_failed`, `op_underfunded`, ...).
pub fn decode_result_codes(result_xdr: &str) -> Result<ResultCodes> {
    let result = TransactionResult::from_xdr_base64(result_xdr.trim(), Limits::none())?;

    let operations = match &result.result {
        TransactionResultResult::TxSuccess(ops) | TransactionResultResult::TxFailed(ops) => {
            Some(ops.iter().map(operation_code).collect())
        }
        _ => None,
    };

    Ok(ResultCodes {
        transaction: Some(transaction_code(&result.result)),
        operations,
    })
}
