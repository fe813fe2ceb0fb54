// ============================================================================
// STELLAR-SAVINGS - Soroban RPC Client
// ============================================================================
// JSON-RPC 2.0 client for the Soroban smart-contract service.
//
// Methods used:
//   getLedgerEntries     account sequence + balance
//   simulateTransaction  resource fee, auth and return values
//   sendTransaction      submit a signed envelope
//   getTransaction       confirmation polling
//   getEvents            contract event feed
//   getLatestLedger      event cursor bootstrap
// ============================================================================

use crate::amount::Amount;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::gateway::{
    AccountSnapshot, ContractEvent, ContractGateway, EventPage, EventStart, SendReceipt,
    SendStatus, SimulationResult, TransactionLookup,
};
use crate::transaction::{SignedEnvelope, UnsignedEnvelope};
use crate::xdr::{account_ledger_key, decode_account_entry};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// JSON-RPC ENVELOPES
// ============================================================================

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub id: Option<Value>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl<T> JsonRpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if let Some(error) = self.error {
            return Err(WalletError::RpcError(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            )));
        }
        self.result
            .ok_or_else(|| WalletError::RpcError(format!("{} returned no result", method)))
    }
}

// ============================================================================
// METHOD RESULTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntriesResult {
    #[serde(default)]
    entries: Option<Vec<LedgerEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct LedgerEntry {
    xdr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResult {
    #[serde(default)]
    transaction_data: Option<String>,
    #[serde(default)]
    min_resource_fee: Option<String>,
    #[serde(default)]
    results: Vec<SimulateHostFunctionResult>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    latest_ledger: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct SimulateHostFunctionResult {
    #[serde(default)]
    auth: Vec<String>,
    #[serde(default)]
    xdr: Option<String>,
}

impl SimulateResult {
    fn into_simulation(self) -> Result<SimulationResult> {
        let min_resource_fee = match self.min_resource_fee.as_deref() {
            Some(fee) => fee.parse().map_err(|_| {
                WalletError::RpcError(format!("Unparseable minResourceFee '{}'", fee))
            })?,
            None => 0,
        };
        let first = self.results.into_iter().next();
        Ok(SimulationResult {
            transaction_data: self.transaction_data,
            min_resource_fee,
            auth: first.as_ref().map(|r| r.auth.clone()).unwrap_or_default(),
            retval: first.and_then(|r| r.xdr),
            error: self.error,
            latest_ledger: self.latest_ledger,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResult {
    status: SendStatus,
    hash: String,
    #[serde(default)]
    error_result_xdr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTransactionResult {
    status: String,
    #[serde(default)]
    ledger: Option<u32>,
    /// Unix seconds, string encoded
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    result_xdr: Option<String>,
}

impl GetTransactionResult {
    fn into_lookup(self) -> Result<TransactionLookup> {
        match self.status.as_str() {
            "NOT_FOUND" => Ok(TransactionLookup::NotFound),
            "SUCCESS" => Ok(TransactionLookup::Success {
                ledger: self.ledger,
                created_at: self
                    .created_at
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            }),
            "FAILED" => Ok(TransactionLookup::Failed {
                result_xdr: self.result_xdr,
            }),
            other => Err(WalletError::RpcError(format!(
                "Unknown transaction status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetEventsResult {
    #[serde(default)]
    events: Vec<RawEvent>,
    #[serde(default)]
    latest_ledger: u32,
    #[serde(default)]
    cursor: Option<String>,
}

impl GetEventsResult {
    fn into_page(self) -> EventPage {
        EventPage {
            events: self.events.into_iter().map(ContractEvent::from).collect(),
            latest_ledger: self.latest_ledger,
            cursor: self.cursor.filter(|c| !c.is_empty()),
        }
    }
}

/// `startLedger` and a paging cursor are mutually exclusive in `getEvents`
fn events_params(contract_id: &str, start: &EventStart, limit: u32) -> Value {
    let filters = json!([{ "type": "contract", "contractIds": [contract_id] }]);
    match start {
        EventStart::Ledger(ledger) => json!({
            "startLedger": ledger,
            "filters": filters,
            "pagination": { "limit": limit },
        }),
        EventStart::After(cursor) => json!({
            "filters": filters,
            "pagination": { "cursor": cursor, "limit": limit },
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    id: String,
    ledger: u32,
    #[serde(default)]
    ledger_closed_at: Option<String>,
    #[serde(default)]
    contract_id: String,
    #[serde(default)]
    topic: Vec<String>,
    value: String,
    #[serde(default)]
    tx_hash: Option<String>,
}

impl From<RawEvent> for ContractEvent {
    fn from(raw: RawEvent) -> Self {
        ContractEvent {
            id: raw.id,
            ledger: raw.ledger,
            ledger_closed_at: raw.ledger_closed_at,
            contract_id: raw.contract_id,
            topics: raw.topic,
            value: raw.value,
            tx_hash: raw.tx_hash,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LatestLedgerResult {
    sequence: u32,
}

// ============================================================================
// SOROBAN RPC CLIENT
// ============================================================================

/// Client for the Soroban JSON-RPC service
pub struct SorobanRpcClient {
    rpc_url: String,
    http: Client,
    next_id: AtomicU64,
}

impl SorobanRpcClient {
    pub fn new(config: &WalletConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.http_timeout()).build()?;

        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!("RPC {} #{}", method, request.id);

        let response = self.http.post(&self.rpc_url).json(&request).send().await?;

        match response.status().as_u16() {
            200 => {
                let body: JsonRpcResponse<T> = response.json().await?;
                body.into_result(method)
            }
            429 => Err(WalletError::RateLimited),
            504 => Err(WalletError::TransactionTimeout),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(WalletError::RpcError(format!(
                    "{}: HTTP {}: {}",
                    method, status, error_text
                )))
            }
        }
    }
}

#[async_trait]
impl ContractGateway for SorobanRpcClient {
    async fn get_account(&self, account_id: &str) -> Result<AccountSnapshot> {
        let key = account_ledger_key(account_id)?;
        let result: LedgerEntriesResult = self
            .call("getLedgerEntries", json!({ "keys": [key] }))
            .await?;

        let entry = result
            .entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::AccountNotFound(account_id.to_string()))?;

        let head = decode_account_entry(&entry.xdr)?;
        Ok(AccountSnapshot {
            account_id: head.account_id,
            sequence: head.sequence,
            balance: Amount::from_stroops(head.balance),
        })
    }

    async fn simulate(&self, envelope: &UnsignedEnvelope) -> Result<SimulationResult> {
        let transaction = envelope.to_envelope_xdr()?;
        let result: SimulateResult = self
            .call("simulateTransaction", json!({ "transaction": transaction }))
            .await?;
        result.into_simulation()
    }

    async fn send(&self, envelope: &SignedEnvelope) -> Result<SendReceipt> {
        let result: SendResult = self
            .call("sendTransaction", json!({ "transaction": envelope.as_str() }))
            .await?;
        debug!("sendTransaction {} -> {:?}", result.hash, result.status);
        Ok(SendReceipt {
            hash: result.hash,
            status: result.status,
            error_result_xdr: result.error_result_xdr,
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<TransactionLookup> {
        let result: GetTransactionResult =
            self.call("getTransaction", json!({ "hash": hash })).await?;
        result.into_lookup()
    }

    async fn get_events(
        &self,
        contract_id: &str,
        start: &EventStart,
        limit: u32,
    ) -> Result<EventPage> {
        let result: GetEventsResult = self
            .call("getEvents", events_params(contract_id, start, limit))
            .await?;
        Ok(result.into_page())
    }

    async fn get_latest_ledger(&self) -> Result<u32> {
        let result: LatestLedgerResult = self.call("getLatestLedger", json!({})).await?;
        Ok(result.sequence)
    }
}
