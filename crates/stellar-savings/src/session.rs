// ============================================================================
// STELLAR-SAVINGS - Wallet Session
// ============================================================================
// Everything bound to one connected wallet: coordinator, synchronizer,
// savings reader and (optionally) a running event watcher.
// ============================================================================

use crate::config::WalletConfig;
use crate::contract::{ContractOperation, SavingsContract};
use crate::coordinator::{AttemptState, TransactionCoordinator};
use crate::error::WalletError;
use crate::gateway::{ContractEvent, ContractGateway, LedgerGateway};
use crate::horizon::HorizonClient;
use crate::intent::{validate_contract_call, validate_transfer};
use crate::signer::{ExternalSigner, SignerError};
use crate::soroban::SorobanRpcClient;
use crate::sync::{BalanceSynchronizer, WalletView};
use crate::watcher::{CursorStore, EventWatcher, WatcherHandle};
use crate::xdr;
use crate::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct WalletSession {
    config: WalletConfig,
    address: String,
    contracts: Arc<dyn ContractGateway>,
    coordinator: Arc<TransactionCoordinator>,
    synchronizer: Arc<BalanceSynchronizer>,
    savings: SavingsContract,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl WalletSession {
    /// Connect to the wallet extension and load the initial view.
    ///
    /// A failing initial refresh is logged, not returned.
    pub async fn connect(
        config: WalletConfig,
        ledger: Arc<dyn LedgerGateway>,
        contracts: Arc<dyn ContractGateway>,
        signer: Arc<dyn ExternalSigner>,
    ) -> Result<Self> {
        config.validate()?;
        if !signer.is_connected().await {
            return Err(SignerError::NotInstalled.into());
        }

        let address = signer.get_address().await?.trim().to_string();
        if !xdr::is_account_address(&address) {
            return Err(WalletError::InvalidAddress(address));
        }
        info!("Connected wallet {}", address);

        let synchronizer = Arc::new(BalanceSynchronizer::new(
            address.clone(),
            Arc::clone(&ledger),
            config.history_page_limit,
        ));
        let coordinator = Arc::new(TransactionCoordinator::new(
            config.clone(),
            ledger,
            Arc::clone(&contracts),
            signer,
            Arc::clone(&synchronizer),
        ));
        let savings = SavingsContract::new(Arc::clone(&contracts), config.contract_id.clone());

        if let Err(e) = synchronizer.refresh().await {
            warn!("Initial refresh failed: {}", e);
        }

        Ok(Self {
            config,
            address,
            contracts,
            coordinator,
            synchronizer,
            savings,
            watcher: Mutex::new(None),
        })
    }

    /// Connect using the HTTP gateways built from `config`
    pub async fn connect_default(
        config: WalletConfig,
        signer: Arc<dyn ExternalSigner>,
    ) -> Result<Self> {
        let ledger = Arc::new(HorizonClient::new(&config)?);
        let contracts = Arc::new(SorobanRpcClient::new(&config)?);
        Self::connect(config, ledger, contracts, signer).await
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }

    pub fn synchronizer(&self) -> &Arc<BalanceSynchronizer> {
        &self.synchronizer
    }

    pub fn savings(&self) -> &SavingsContract {
        &self.savings
    }

    pub async fn view(&self) -> WalletView {
        self.synchronizer.view().await
    }

    /// Validate and submit a native transfer
    pub async fn send_transfer(&self, destination: &str, amount: &str) -> Result<AttemptState> {
        let intent = validate_transfer(Some(&self.address), destination, amount)?;
        self.coordinator.submit(intent).await
    }

    /// Validate and submit a savings contract call
    pub async fn call_contract(
        &self,
        operation: ContractOperation,
        amount: &str,
    ) -> Result<AttemptState> {
        let intent =
            validate_contract_call(Some(&self.address), &self.config.contract_id, operation, amount)?;
        self.coordinator.submit(intent).await
    }

    /// Start polling savings contract events, replacing any running watcher
    pub async fn start_event_watcher(&self, store: Arc<dyn CursorStore>) {
        let handle = EventWatcher::new(
            Arc::clone(&self.contracts),
            store,
            self.config.contract_id.clone(),
        )
        .lookback(self.config.event_lookback_ledgers)
        .limit(self.config.event_limit)
        .interval(self.config.event_poll_interval())
        .spawn();

        let previous = self.watcher.lock().await.replace(handle);
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }

    /// Events last published by the watcher
    pub async fn events(&self) -> Vec<ContractEvent> {
        match self.watcher.lock().await.as_ref() {
            Some(handle) => handle.events(),
            None => Vec::new(),
        }
    }

    pub async fn stop_event_watcher(&self) {
        let handle = self.watcher.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    /// Reset the coordinator and stop background polling
    pub async fn disconnect(&self) {
        self.coordinator.disconnect();
        self.stop_event_watcher().await;
        info!("Session for {} closed", self.address);
    }
}
