// ============================================================================
// STELLAR-SAVINGS - Transaction Builder
// ============================================================================
// Build unsigned Stellar transaction envelopes for the wallet to sign.
//
// Every envelope carries:
// - Source account
// - Sequence number (snapshot + 1, never cached)
// - Fee
// - Time bounds [0, now + 60s]
// - Exactly one operation (payment, create account or contract call)
// - Soroban transaction data, for contract calls, after simulation
//
// Signing happens in the external wallet; this module only produces and
// inspects XDR.
// ============================================================================

use crate::amount::{Amount, STROOPS_PER_XLM};
use crate::error::WalletError;
use crate::gateway::{AccountSnapshot, SimulationResult};
use crate::intent::{Intent, IntentKind};
use crate::xdr;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    self as stellar, Asset, CreateAccountOp, HostFunction, InvokeContractArgs,
    InvokeHostFunctionOp, Limits, OperationBody, PaymentOp, Preconditions, ReadXdr, ScSymbol,
    ScVal, SequenceNumber, SorobanAuthorizationEntry, SorobanTransactionData, TimeBounds,
    TimePoint, TransactionEnvelope, TransactionExt, TransactionV1Envelope, VecM, WriteXdr,
};

/// Validity window of every envelope, in seconds
pub const TX_VALIDITY_SECS: u64 = 60;

/// Smallest starting balance accepted for a new account
pub const MIN_STARTING_BALANCE: Amount = Amount::from_stroops(STROOPS_PER_XLM);

// ============================================================================
// TRANSACTION TYPES
// ============================================================================

/// Transaction operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create and fund a new account
    CreateAccount {
        destination: String,
        starting_balance: Amount,
    },

    /// Native XLM payment
    Payment { destination: String, amount: Amount },

    /// Invoke a contract function
    InvokeContract {
        contract_id: String,
        function: String,
        args: Vec<ScVal>,
        /// Filled in from simulation
        auth: Vec<SorobanAuthorizationEntry>,
    },
}

impl Operation {
    pub fn is_contract_call(&self) -> bool {
        matches!(self, Operation::InvokeContract { .. })
    }

    fn to_xdr(&self) -> Result<stellar::Operation> {
        let body = match self {
            Operation::CreateAccount {
                destination,
                starting_balance,
            } => OperationBody::CreateAccount(CreateAccountOp {
                destination: xdr::account_id(destination)?,
                starting_balance: starting_balance.stroops(),
            }),

            Operation::Payment { destination, amount } => OperationBody::Payment(PaymentOp {
                destination: xdr::muxed_account(destination)?,
                asset: Asset::Native,
                amount: amount.stroops(),
            }),

            Operation::InvokeContract {
                contract_id,
                function,
                args,
                auth,
            } => {
                let function_name = ScSymbol::try_from(function.as_str()).map_err(|_| {
                    WalletError::InvalidTransaction(format!("Invalid function name: {}", function))
                })?;
                OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                    host_function: HostFunction::InvokeContract(InvokeContractArgs {
                        contract_address: xdr::sc_address(contract_id)?,
                        function_name,
                        args: args.clone().try_into()?,
                    }),
                    auth: auth.clone().try_into()?,
                })
            }
        };

        Ok(stellar::Operation {
            source_account: None,
            body,
        })
    }
}

// ============================================================================
// TRANSACTION BUILDER
// ============================================================================

/// Builder for Stellar transactions
pub struct TransactionBuilder {
    source_account: String,
    sequence: Option<i64>,
    fee: u32,
    operations: Vec<Operation>,
    now: Option<u64>,
}

impl TransactionBuilder {
    /// Start from a fresh account snapshot
    pub fn new(source: &AccountSnapshot) -> Self {
        Self {
            source_account: source.account_id.clone(),
            sequence: source.sequence.checked_add(1),
            fee: 100,
            operations: Vec::new(),
            now: None,
        }
    }

    /// Set fee per operation (in stroops)
    pub fn fee(mut self, fee: u32) -> Self {
        self.fee = fee;
        self
    }

    /// Pin the clock (unix seconds) the time bounds are computed from
    pub fn at(mut self, now: u64) -> Self {
        self.now = Some(now);
        self
    }

    /// Add operation
    pub fn add_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Add XLM payment operation
    pub fn payment_xlm(self, destination: &str, amount: Amount) -> Self {
        self.add_operation(Operation::Payment {
            destination: destination.to_string(),
            amount,
        })
    }

    /// Add create account operation
    pub fn create_account(self, destination: &str, starting_balance: Amount) -> Self {
        self.add_operation(Operation::CreateAccount {
            destination: destination.to_string(),
            starting_balance,
        })
    }

    /// Add contract invocation (auth is filled in by simulation)
    pub fn invoke_contract(self, contract_id: &str, function: &str, args: Vec<ScVal>) -> Self {
        self.add_operation(Operation::InvokeContract {
            contract_id: contract_id.to_string(),
            function: function.to_string(),
            args,
            auth: Vec::new(),
        })
    }

    /// Add the single operation an intent asks for.
    ///
    /// `destination_exists` selects between Payment and CreateAccount for
    /// transfers; it is ignored for contract calls.
    pub fn intent(self, intent: &Intent, destination_exists: bool) -> Result<Self> {
        match intent.kind() {
            IntentKind::Transfer { destination, amount } if destination_exists => {
                Ok(self.payment_xlm(destination, *amount))
            }
            IntentKind::Transfer { destination, amount } => {
                if *amount < MIN_STARTING_BALANCE {
                    return Err(WalletError::InvalidTransaction(format!(
                        "New accounts require at least {}",
                        MIN_STARTING_BALANCE
                    )));
                }
                Ok(self.create_account(destination, *amount))
            }
            IntentKind::ContractCall {
                contract_id,
                operation,
                amount,
            } => {
                let args = vec![xdr::address_val(intent.source())?, ScVal::from(*amount)];
                Ok(self.invoke_contract(contract_id, operation.function_name(), args))
            }
        }
    }

    /// Build the transaction (returns the envelope ready for signing)
    pub fn build(self) -> Result<UnsignedEnvelope> {
        let sequence = self.sequence.ok_or_else(|| {
            WalletError::InvalidTransaction("Sequence number overflow".to_string())
        })?;

        let mut operations = self.operations.into_iter();
        let operation = match (operations.next(), operations.next()) {
            (Some(op), None) => op,
            (None, _) => {
                return Err(WalletError::InvalidTransaction(
                    "Transaction must have one operation".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(WalletError::InvalidTransaction(
                    "Transaction must have exactly one operation".to_string(),
                ))
            }
        };

        let now = self
            .now
            .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);

        Ok(UnsignedEnvelope {
            source_account: self.source_account,
            sequence,
            fee: self.fee,
            min_time: 0,
            max_time: now.saturating_add(TX_VALIDITY_SECS),
            operation,
            soroban_data: None,
        })
    }
}

// ============================================================================
// UNSIGNED ENVELOPE
// ============================================================================

/// Unsigned transaction ready for simulation or signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEnvelope {
    source_account: String,
    sequence: i64,
    fee: u32,
    min_time: u64,
    max_time: u64,
    operation: Operation,
    soroban_data: Option<SorobanTransactionData>,
}

impl UnsignedEnvelope {
    pub fn source_account(&self) -> &str {
        &self.source_account
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn fee(&self) -> u32 {
        self.fee
    }

    /// `(min_time, max_time)` in unix seconds
    pub fn time_bounds(&self) -> (u64, u64) {
        (self.min_time, self.max_time)
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn is_assembled(&self) -> bool {
        self.soroban_data.is_some()
    }

    /// Fold a simulation into a contract-call envelope.
    ///
    /// Adds the resource fee to the inclusion fee, attaches the Soroban
    /// transaction data and replaces the auth entries.
    pub fn assemble(mut self, simulation: &SimulationResult) -> Result<Self> {
        if let Some(error) = &simulation.error {
            return Err(WalletError::Simulation(error.clone()));
        }

        let data = simulation.transaction_data.as_deref().ok_or_else(|| {
            WalletError::Simulation("simulation returned no transaction data".to_string())
        })?;
        let data = SorobanTransactionData::from_xdr_base64(data.trim(), Limits::none())?;

        let Operation::InvokeContract { auth, .. } = &mut self.operation else {
            return Err(WalletError::InvalidTransaction(
                "Only contract calls can be assembled".to_string(),
            ));
        };
        *auth = simulation
            .auth
            .iter()
            .map(|entry| SorobanAuthorizationEntry::from_xdr_base64(entry.trim(), Limits::none()))
            .collect::<std::result::Result<_, _>>()?;

        let resource_fee = u32::try_from(simulation.min_resource_fee)
            .ok()
            .and_then(|fee| self.fee.checked_add(fee))
            .ok_or_else(|| {
                WalletError::InvalidTransaction(format!(
                    "Resource fee too large: {}",
                    simulation.min_resource_fee
                ))
            })?;

        self.fee = resource_fee;
        self.soroban_data = Some(data);
        Ok(self)
    }

    /// Transaction hash for the given network
    pub fn hash(&self, network_passphrase: &str) -> Result<[u8; 32]> {
        let network_id: [u8; 32] = Sha256::digest(network_passphrase.as_bytes()).into();
        Ok(self.to_transaction()?.hash(network_id)?)
    }

    pub fn hash_hex(&self, network_passphrase: &str) -> Result<String> {
        Ok(hex::encode(self.hash(network_passphrase)?))
    }

    /// Base64 `TransactionEnvelope` with no signatures
    pub fn to_envelope_xdr(&self) -> Result<String> {
        let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: self.to_transaction()?,
            signatures: VecM::default(),
        });
        Ok(envelope.to_xdr_base64(Limits::none())?)
    }

    fn to_transaction(&self) -> Result<stellar::Transaction> {
        let ext = match &self.soroban_data {
            None => TransactionExt::V0,
            Some(data) => TransactionExt::V1(data.clone()),
        };

        Ok(stellar::Transaction {
            source_account: xdr::muxed_account(&self.source_account)?,
            fee: self.fee,
            seq_num: SequenceNumber(self.sequence),
            cond: Preconditions::Time(TimeBounds {
                min_time: TimePoint(self.min_time),
                max_time: TimePoint(self.max_time),
            }),
            memo: stellar::Memo::None,
            operations: vec![self.operation.to_xdr()?].try_into()?,
            ext,
        })
    }
}

// ============================================================================
// SIGNED ENVELOPE
// ============================================================================

/// Opaque base64 envelope returned by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope(String);

impl SignedEnvelope {
    /// Wrap the signer's output; an empty payload is refused
    pub fn new(xdr: impl Into<String>) -> Option<Self> {
        let xdr = xdr.into();
        if xdr.trim().is_empty() {
            None
        } else {
            Some(Self(xdr))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// INSPECTION
// ============================================================================

/// Read the time bounds back out of a base64 envelope.
///
/// Returns `None` when the transaction has no time bounds.
pub fn decode_time_bounds(envelope_xdr: &str) -> Result<Option<(u64, u64)>> {
    let envelope = TransactionEnvelope::from_xdr_base64(envelope_xdr.trim(), Limits::none())?;

    let bounds = match &envelope {
        TransactionEnvelope::TxV0(v0) => v0.tx.time_bounds.clone(),
        TransactionEnvelope::Tx(v1) => preconditions_bounds(&v1.tx.cond),
        TransactionEnvelope::TxFeeBump(bump) => match &bump.tx.inner_tx {
            stellar::FeeBumpTransactionInnerTx::Tx(inner) => preconditions_bounds(&inner.tx.cond),
        },
    };

    Ok(bounds.map(|b| (b.min_time.0, b.max_time.0)))
}

fn preconditions_bounds(cond: &Preconditions) -> Option<TimeBounds> {
    match cond {
        Preconditions::None => None,
        Preconditions::Time(bounds) => Some(bounds.clone()),
        Preconditions::V2(v2) => v2.time_bounds.clone(),
    }
}
