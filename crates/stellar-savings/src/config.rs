// ============================================================================
// STELLAR-SAVINGS - Configuration
// ============================================================================
// Endpoint and timing configuration, supplied once at startup.

use crate::error::WalletError;
use crate::xdr;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Network selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        #[cfg(feature = "mainnet")]
        return Network::Mainnet;

        #[cfg(all(feature = "testnet", not(feature = "mainnet")))]
        return Network::Testnet;

        #[cfg(not(any(feature = "mainnet", feature = "testnet")))]
        return Network::Testnet;
    }
}

const SAVINGS_CONTRACT_TESTNET: &str = "CB2QEUXSE7JNVZQIFQLTWWMTNYZFMYBUEJTHBNPBJRYU2OGRCS66K65P";

/// Wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Network (mainnet or testnet)
    pub network: Network,

    /// Horizon API URL
    pub horizon_url: String,

    /// Soroban RPC URL
    pub rpc_url: String,

    /// Network passphrase handed to the signer
    pub network_passphrase: String,

    /// Savings contract id (C... address)
    pub contract_id: String,

    /// How long to wait for the wallet to return a signature
    #[serde(default = "default_signer_timeout")]
    pub signer_timeout_secs: u64,

    /// HTTP request timeout
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Page size for each history stream
    #[serde(default = "default_page_limit")]
    pub history_page_limit: u32,

    /// Ledgers to look back when no event cursor is stored (~7 hours)
    #[serde(default = "default_event_lookback")]
    pub event_lookback_ledgers: u32,

    /// Page size of each `getEvents` request
    #[serde(default = "default_event_limit")]
    pub event_limit: u32,

    /// Event poll interval in milliseconds
    #[serde(default = "default_event_poll_interval")]
    pub event_poll_interval_ms: u64,

    /// Status polls after a contract call is accepted by the RPC
    #[serde(default = "default_confirmation_attempts")]
    pub confirmation_attempts: u32,

    /// Delay between confirmation polls in milliseconds
    #[serde(default = "default_confirmation_interval")]
    pub confirmation_interval_ms: u64,

    /// Fund unknown destinations with CreateAccount instead of Payment
    #[serde(default = "default_true")]
    pub create_missing_destination: bool,
}

fn default_signer_timeout() -> u64 {
    300
}

fn default_http_timeout() -> u64 {
    30
}

fn default_page_limit() -> u32 {
    10
}

fn default_event_lookback() -> u32 {
    5000
}

fn default_event_limit() -> u32 {
    15
}

fn default_event_poll_interval() -> u64 {
    5000
}

fn default_confirmation_attempts() -> u32 {
    10
}

fn default_confirmation_interval() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl WalletConfig {
    /// Create mainnet configuration
    ///
    /// The savings contract is only deployed on testnet, so the caller must
    /// set `contract_id` before [`validate`](Self::validate) passes.
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            horizon_url: "https://horizon.stellar.org".to_string(),
            rpc_url: "https://soroban-rpc.mainnet.stellar.gateway.fm".to_string(),
            network_passphrase: "Public Global Stellar Network ; September 2015".to_string(),
            contract_id: String::new(),
            ..Self::testnet()
        }
    }

    /// Create testnet configuration
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            horizon_url: "https://horizon-testnet.stellar.org".to_string(),
            rpc_url: "https://soroban-testnet.stellar.org".to_string(),
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            contract_id: SAVINGS_CONTRACT_TESTNET.to_string(),
            signer_timeout_secs: default_signer_timeout(),
            http_timeout_secs: default_http_timeout(),
            history_page_limit: default_page_limit(),
            event_lookback_ledgers: default_event_lookback(),
            event_limit: default_event_limit(),
            event_poll_interval_ms: default_event_poll_interval(),
            confirmation_attempts: default_confirmation_attempts(),
            confirmation_interval_ms: default_confirmation_interval(),
            create_missing_destination: true,
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WalletConfig = serde_json::from_str(json)
            .map_err(|e| WalletError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WalletError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Check endpoints, the contract id and page sizes
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("horizon_url", &self.horizon_url), ("rpc_url", &self.rpc_url)] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(WalletError::ConfigError(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        if self.network_passphrase.is_empty() {
            return Err(WalletError::ConfigError("network_passphrase is empty".into()));
        }
        if !xdr::is_contract_address(&self.contract_id) {
            return Err(WalletError::ConfigError(format!(
                "contract_id: not a contract address: '{}'",
                self.contract_id
            )));
        }
        for (name, limit) in [
            ("history_page_limit", self.history_page_limit),
            ("event_limit", self.event_limit),
        ] {
            if limit == 0 {
                return Err(WalletError::ConfigError(format!("{} must be > 0", name)));
            }
        }
        Ok(())
    }

    /// Check if this is mainnet
    pub fn is_mainnet(&self) -> bool {
        self.network == Network::Mainnet
    }

    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn confirmation_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_interval_ms)
    }

    fn explorer_base(&self) -> &'static str {
        match self.network {
            Network::Mainnet => "https://stellar.expert/explorer/public",
            Network::Testnet => "https://stellar.expert/explorer/testnet",
        }
    }

    /// Get Stellar Expert explorer URL for a transaction
    pub fn explorer_tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base(), hash)
    }

    /// Get Stellar Expert explorer URL for the savings contract
    pub fn explorer_contract_url(&self) -> String {
        format!("{}/contract/{}", self.explorer_base(), self.contract_id)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        match Network::default() {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
        }
    }
}
