// ============================================================================
// STELLAR-SAVINGS - Horizon API Client
// ============================================================================
// HTTP client for Stellar's Horizon API.
// Handles account snapshots, fee estimation, payment/operation history and
// transaction submission.
// ============================================================================

use crate::amount::Amount;
use crate::config::WalletConfig;
use crate::error::{ResultCodes, WalletError};
use crate::gateway::{
    AccountSnapshot, LedgerGateway, OperationRecord, Order, PaymentRecord, SubmitReceipt,
};
use crate::transaction::SignedEnvelope;
use crate::xdr::{self, ScVal};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// DATA TYPES
// ============================================================================

/// Account balance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// Asset type: "native" for XLM
    pub asset_type: String,

    /// Balance amount as string (Stellar uses string for precision)
    pub balance: String,
}

impl Balance {
    /// Check if this is native XLM
    pub fn is_native(&self) -> bool {
        self.asset_type == "native"
    }
}

/// Stellar account information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account public key (G... address)
    pub id: String,

    /// Current sequence number (string-encoded i64)
    pub sequence: String,

    /// Account balances
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    /// Native balance; zero when the account holds none
    pub fn xlm_balance(&self) -> Result<Amount> {
        match self.balances.iter().find(|b| b.is_native()) {
            Some(balance) => Amount::parse(&balance.balance).ok_or_else(|| {
                WalletError::HorizonError(format!("Unparseable balance '{}'", balance.balance))
            }),
            None => Ok(Amount::ZERO),
        }
    }

    pub fn snapshot(&self) -> Result<AccountSnapshot> {
        let sequence = self.sequence.parse::<i64>().map_err(|_| {
            WalletError::HorizonError(format!("Unparseable sequence '{}'", self.sequence))
        })?;
        Ok(AccountSnapshot {
            account_id: self.id.clone(),
            sequence,
            balance: self.xlm_balance()?,
        })
    }
}

/// Transaction submission result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub hash: String,
    #[serde(default)]
    pub ledger: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub successful: Option<bool>,
}

/// Horizon error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonErrorResponse {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub title: Option<String>,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub extras: Option<HorizonErrorExtras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonErrorExtras {
    pub envelope_xdr: Option<String>,
    pub result_codes: Option<ResultCodes>,
    pub result_xdr: Option<String>,
}

impl HorizonErrorResponse {
    /// Convert a 400 on submission into a typed rejection
    pub fn into_rejection(self) -> WalletError {
        let codes = self.extras.and_then(|e| e.result_codes);
        let reason = match &codes {
            Some(rc) => rc.iter().collect::<Vec<_>>().join(", "),
            None => self
                .detail
                .or(self.title)
                .unwrap_or_else(|| "unknown reason".to_string()),
        };
        WalletError::TransactionRejected { reason, codes }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeStats {
    pub last_ledger: String,
    pub last_ledger_base_fee: String,
}

impl FeeStats {
    pub fn base_fee(&self) -> Result<u32> {
        self.last_ledger_base_fee.parse().map_err(|_| {
            WalletError::HorizonError(format!(
                "Unparseable base fee '{}'",
                self.last_ledger_base_fee
            ))
        })
    }
}

/// Any record from `/payments` or `/operations`; fields depend on `type`
#[derive(Debug, Clone, Deserialize)]
struct RawOperation {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    source_account: String,
    created_at: DateTime<Utc>,
    transaction_hash: String,

    // payment
    from: Option<String>,
    to: Option<String>,
    amount: Option<String>,
    asset_type: Option<String>,

    // create_account
    funder: Option<String>,
    account: Option<String>,
    starting_balance: Option<String>,

    // invoke_host_function
    #[serde(default)]
    parameters: Vec<RawParameter>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawParameter {
    value: String,
}

impl RawOperation {
    fn into_payment(self) -> Option<PaymentRecord> {
        let (from, to, amount, is_native) = match self.kind.as_str() {
            "payment" => (
                self.from?,
                self.to?,
                self.amount?,
                self.asset_type.as_deref() == Some("native"),
            ),
            "create_account" => (self.funder?, self.account?, self.starting_balance?, true),
            _ => return None,
        };
        Some(PaymentRecord {
            id: self.id,
            kind: self.kind,
            from,
            to,
            amount: Amount::parse(&amount)?,
            is_native,
            created_at: self.created_at,
            transaction_hash: self.transaction_hash,
        })
    }

    fn into_operation(self) -> OperationRecord {
        // parameters: contract address, function symbol, then call arguments
        let values: Vec<ScVal> = self
            .parameters
            .iter()
            .filter_map(|p| xdr::decode_val(&p.value).ok())
            .collect();

        let contract_id = values
            .iter()
            .filter_map(xdr::val_as_address)
            .find(|address| xdr::is_contract_address(address));
        let function = values.iter().find_map(xdr::val_as_symbol);
        let amount = values
            .iter()
            .filter(|v| !matches!(v, ScVal::Void))
            .filter_map(xdr::val_as_i128)
            .last();

        OperationRecord {
            id: self.id,
            kind: self.kind,
            source_account: self.source_account,
            created_at: self.created_at,
            transaction_hash: self.transaction_hash,
            contract_id,
            function,
            amount,
        }
    }
}

fn embedded_records(data: serde_json::Value) -> Vec<RawOperation> {
    data["_embedded"]["records"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| serde_json::from_value(r).ok())
        .collect()
}

// ============================================================================
// HORIZON CLIENT
// ============================================================================

/// Client for Stellar Horizon API
pub struct HorizonClient {
    horizon_url: String,
    http: Client,
}

impl HorizonClient {
    /// Create new Horizon client
    pub fn new(config: &WalletConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.http_timeout()).build()?;

        Ok(Self {
            horizon_url: config.horizon_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn horizon_url(&self) -> &str {
        &self.horizon_url
    }

    /// Map non-success statuses shared by every endpoint
    async fn check(response: Response, not_found: impl FnOnce() -> WalletError) -> Result<Response> {
        match response.status().as_u16() {
            200..=299 => Ok(response),
            404 => Err(not_found()),
            429 => Err(WalletError::RateLimited),
            504 => Err(WalletError::TransactionTimeout),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(WalletError::HorizonError(format!(
                    "HTTP {}: {}",
                    status, error_text
                )))
            }
        }
    }

    /// Load account information
    pub async fn load_account_info(&self, address: &str) -> Result<AccountInfo> {
        let url = format!("{}/accounts/{}", self.horizon_url, address);

        debug!("Loading account: {}", address);

        let response = self.http.get(&url).send().await?;
        let response = Self::check(response, || {
            WalletError::AccountNotFound(address.to_string())
        })
        .await?;
        Ok(response.json().await?)
    }

    /// Get current fee stats
    pub async fn get_fee_stats(&self) -> Result<FeeStats> {
        let url = format!("{}/fee_stats", self.horizon_url);

        let response = self.http.get(&url).send().await?;
        let response =
            Self::check(response, || WalletError::HorizonError("fee_stats not found".into()))
                .await?;
        Ok(response.json().await?)
    }

    async fn list_account_records(
        &self,
        address: &str,
        endpoint: &str,
        limit: u32,
        order: Order,
    ) -> Result<Vec<RawOperation>> {
        let url = format!("{}/accounts/{}/{}", self.horizon_url, address, endpoint);

        debug!("Fetching {} for: {}", endpoint, address);

        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string()), ("order", order.as_str().to_string())])
            .send()
            .await?;
        let response = Self::check(response, || {
            WalletError::AccountNotFound(address.to_string())
        })
        .await?;

        let data: serde_json::Value = response.json().await?;
        Ok(embedded_records(data))
    }

    /// Submit a signed transaction
    pub async fn submit_transaction(&self, envelope_xdr: &str) -> Result<TransactionResponse> {
        let url = format!("{}/transactions", self.horizon_url);

        debug!("Submitting transaction...");

        let response = self
            .http
            .post(&url)
            .form(&[("tx", envelope_xdr)])
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let tx_response: TransactionResponse = response.json().await?;
                debug!("Transaction successful: {}", tx_response.hash);
                Ok(tx_response)
            }
            400 => {
                let error: HorizonErrorResponse = response.json().await?;
                let rejection = error.into_rejection();
                warn!("Transaction rejected: {}", rejection);
                Err(rejection)
            }
            _ => {
                let response = Self::check(response, || {
                    WalletError::HorizonError("transactions endpoint not found".into())
                })
                .await?;
                Ok(response.json().await?)
            }
        }
    }
}

#[async_trait]
impl LedgerGateway for HorizonClient {
    async fn load_account(&self, account_id: &str) -> Result<AccountSnapshot> {
        self.load_account_info(account_id).await?.snapshot()
    }

    async fn account_exists(&self, account_id: &str) -> Result<bool> {
        let url = format!("{}/accounts/{}", self.horizon_url, account_id);

        let response = self.http.get(&url).send().await?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            429 => Err(WalletError::RateLimited),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(WalletError::HorizonError(format!(
                    "HTTP {}: {}",
                    status, error_text
                )))
            }
        }
    }

    async fn fetch_base_fee(&self) -> Result<u32> {
        self.get_fee_stats().await?.base_fee()
    }

    async fn list_payments(
        &self,
        account_id: &str,
        limit: u32,
        order: Order,
    ) -> Result<Vec<PaymentRecord>> {
        let records = self
            .list_account_records(account_id, "payments", limit, order)
            .await?;
        Ok(records.into_iter().filter_map(RawOperation::into_payment).collect())
    }

    async fn list_operations(
        &self,
        account_id: &str,
        limit: u32,
        order: Order,
    ) -> Result<Vec<OperationRecord>> {
        let records = self
            .list_account_records(account_id, "operations", limit, order)
            .await?;
        Ok(records.into_iter().map(RawOperation::into_operation).collect())
    }

    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt> {
        let response = self.submit_transaction(envelope.as_str()).await?;
        Ok(SubmitReceipt {
            hash: response.hash,
            ledger: response.ledger,
            created_at: response.created_at,
        })
    }
}
