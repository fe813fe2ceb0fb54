// ============================================================================
// STELLAR-SAVINGS - Transaction Lifecycle Coordinator
// ============================================================================
// Drives one attempt at a time through Builder -> Signer -> Gateway:
//
//   idle ──submit──▶ building ──▶ signing ──▶ submitting ──▶ success
//                       │            │             │
//                       └────────────┴─────────────┴──────▶ failed
//
//   success | failed ──submit──▶ building
//   any ──disconnect──▶ idle   (epoch + 1, late transitions dropped)
//
// State is published on a watch channel; the in-flight guard is the
// `send_if_modified` closure, which runs under the channel's lock.
// ============================================================================

use crate::classifier::{classify_error, ErrorKind};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::gateway::{ContractGateway, LedgerGateway, SendStatus, SubmitReceipt, TransactionLookup};
use crate::intent::{Intent, IntentKind};
use crate::signer::{request_signature, ExternalSigner, SignerError};
use crate::sync::BalanceSynchronizer;
use crate::transaction::{SignedEnvelope, TransactionBuilder, UnsignedEnvelope};
use crate::xdr::decode_result_codes;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle status of the current attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Idle,
    Building,
    Signing,
    Submitting,
    Success,
    Failed,
}

impl TxStatus {
    /// An attempt is between `building` and its terminal state
    pub fn is_busy(&self) -> bool {
        matches!(self, TxStatus::Building | TxStatus::Signing | TxStatus::Submitting)
    }
}

/// Everything the UI needs to render the last attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttemptState {
    pub status: TxStatus,
    /// Hash of the last successful transaction
    pub hash: Option<String>,
    /// Classified failure of the last attempt
    pub error: Option<ErrorKind>,
    /// Post-success refresh failure, shown as a banner
    pub refresh_error: Option<String>,
    /// Bumped on disconnect
    pub epoch: u64,
}

impl AttemptState {
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.map(|kind| kind.user_message())
    }
}

pub struct TransactionCoordinator {
    wallet: String,
    config: WalletConfig,
    ledger: Arc<dyn LedgerGateway>,
    contracts: Arc<dyn ContractGateway>,
    signer: Arc<dyn ExternalSigner>,
    synchronizer: Arc<BalanceSynchronizer>,
    state: watch::Sender<AttemptState>,
}

impl TransactionCoordinator {
    pub fn new(
        config: WalletConfig,
        ledger: Arc<dyn LedgerGateway>,
        contracts: Arc<dyn ContractGateway>,
        signer: Arc<dyn ExternalSigner>,
        synchronizer: Arc<BalanceSynchronizer>,
    ) -> Self {
        let (state, _) = watch::channel(AttemptState::default());
        Self {
            wallet: synchronizer.wallet().to_string(),
            config,
            ledger,
            contracts,
            signer,
            synchronizer,
            state,
        }
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AttemptState {
        self.state.borrow().clone()
    }

    /// Observe every transition
    pub fn subscribe(&self) -> watch::Receiver<AttemptState> {
        self.state.subscribe()
    }

    /// Run one attempt to completion.
    ///
    /// Fails with `AttemptInFlight` (and changes nothing) while another
    /// attempt is building, signing or submitting. Every other failure ends
    /// in `failed` and is reported through the returned state.
    pub async fn submit(&self, intent: Intent) -> Result<AttemptState> {
        if intent.source() != self.wallet {
            return Err(WalletError::InvalidTransaction(format!(
                "Intent source {} is not the connected wallet",
                intent.source()
            )));
        }

        let mut epoch = 0;
        let accepted = self.state.send_if_modified(|state| {
            if state.status.is_busy() {
                return false;
            }
            state.status = TxStatus::Building;
            state.hash = None;
            state.error = None;
            state.refresh_error = None;
            epoch = state.epoch;
            true
        });
        if !accepted {
            debug!("Attempt refused: another one is in flight");
            return Err(WalletError::AttemptInFlight);
        }

        match self.run(&intent, epoch).await {
            Ok(receipt) => {
                info!("Transaction accepted: {}", receipt.hash);
                let hash = receipt.hash.clone();
                if self.transition(epoch, |state| {
                    state.status = TxStatus::Success;
                    state.hash = Some(hash);
                }) {
                    if let Err(e) = self.synchronizer.refresh().await {
                        warn!("Refresh after success failed: {}", e);
                        self.transition(epoch, |state| {
                            state.refresh_error = Some(e.to_string());
                        });
                    }
                }
            }
            Err(e) => {
                let kind = classify_error(&e);
                warn!("Transaction attempt failed ({:?}): {}", kind, e);
                self.transition(epoch, |state| {
                    state.status = TxStatus::Failed;
                    state.error = Some(kind);
                });
            }
        }

        Ok(self.state())
    }

    /// Drop back to idle and abandon whatever is in flight
    pub fn disconnect(&self) {
        self.state.send_modify(|state| {
            *state = AttemptState {
                epoch: state.epoch.wrapping_add(1),
                ..AttemptState::default()
            };
        });
        info!("Wallet {} disconnected", self.wallet);
    }

    /// Apply `update` only if the attempt still owns the state
    fn transition(&self, epoch: u64, update: impl FnOnce(&mut AttemptState)) -> bool {
        self.state.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            update(state);
            true
        })
    }

    fn step(&self, epoch: u64, status: TxStatus) -> Result<()> {
        if self.transition(epoch, |state| state.status = status) {
            debug!("Attempt -> {:?}", status);
            Ok(())
        } else {
            Err(SignerError::NotConnected.into())
        }
    }

    async fn run(&self, intent: &Intent, epoch: u64) -> Result<SubmitReceipt> {
        let envelope = self.build(intent).await?;

        self.step(epoch, TxStatus::Signing)?;
        let signed = request_signature(
            self.signer.as_ref(),
            &envelope,
            &self.config.network_passphrase,
            self.config.signer_timeout(),
        )
        .await?;

        self.step(epoch, TxStatus::Submitting)?;
        if intent.is_contract_call() {
            self.send_and_confirm(&signed).await
        } else {
            self.ledger.submit(&signed).await
        }
    }

    async fn build(&self, intent: &Intent) -> Result<UnsignedEnvelope> {
        match intent.kind() {
            IntentKind::Transfer { destination, .. } => {
                let (account, fee, exists) = tokio::try_join!(
                    self.ledger.load_account(intent.source()),
                    self.ledger.fetch_base_fee(),
                    self.destination_exists(destination),
                )?;
                debug!("Building transfer from sequence {}", account.sequence);
                TransactionBuilder::new(&account)
                    .fee(fee)
                    .intent(intent, exists)?
                    .build()
            }
            IntentKind::ContractCall { .. } => {
                let (account, fee) = tokio::try_join!(
                    self.contracts.get_account(intent.source()),
                    self.ledger.fetch_base_fee(),
                )?;
                let envelope = TransactionBuilder::new(&account)
                    .fee(fee)
                    .intent(intent, true)?
                    .build()?;
                let simulation = self.contracts.simulate(&envelope).await?;
                self.contracts.assemble(envelope, &simulation)
            }
        }
    }

    async fn destination_exists(&self, destination: &str) -> Result<bool> {
        if !self.config.create_missing_destination {
            return Ok(true);
        }
        self.ledger.account_exists(destination).await
    }

    /// Send through the RPC and poll until the ledger includes it
    async fn send_and_confirm(&self, signed: &SignedEnvelope) -> Result<SubmitReceipt> {
        let sent = self.contracts.send(signed).await?;

        match sent.status {
            SendStatus::Pending | SendStatus::Duplicate => {}
            SendStatus::TryAgainLater => {
                return Err(WalletError::NetworkError(
                    "RPC is congested, try again later".to_string(),
                ))
            }
            SendStatus::Error => return Err(rejection(sent.error_result_xdr.as_deref())),
        }

        if self.config.confirmation_attempts == 0 {
            return Ok(SubmitReceipt {
                hash: sent.hash,
                ledger: None,
                created_at: None,
            });
        }

        for attempt in 1..=self.config.confirmation_attempts {
            tokio::time::sleep(self.config.confirmation_interval()).await;
            match self.contracts.get_transaction(&sent.hash).await {
                Ok(TransactionLookup::Success { ledger, created_at }) => {
                    return Ok(SubmitReceipt {
                        hash: sent.hash,
                        ledger,
                        created_at,
                    })
                }
                Ok(TransactionLookup::Failed { result_xdr }) => {
                    return Err(rejection(result_xdr.as_deref()))
                }
                Ok(TransactionLookup::NotFound) => {
                    debug!("{} not yet included (poll {})", sent.hash, attempt);
                }
                Err(e) => debug!("Status poll {} for {} failed: {}", attempt, sent.hash, e),
            }
        }

        Err(WalletError::TransactionTimeout)
    }
}

fn rejection(result_xdr: Option<&str>) -> WalletError {
    let codes = result_xdr.and_then(|xdr| match decode_result_codes(xdr) {
        Ok(codes) => Some(codes),
        Err(e) => {
            debug!("Undecodable transaction result: {}", e);
            None
        }
    });
    let reason = codes
        .as_ref()
        .map(|c| c.iter().collect::<Vec<_>>().join(", "))
        .unwrap_or_else(|| "transaction failed".to_string());
    WalletError::TransactionRejected { reason, codes }
}
