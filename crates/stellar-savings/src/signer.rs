// ============================================================================
// STELLAR-SAVINGS - External Signer
// ============================================================================
// The browser wallet holds the keys. The crate only ever asks it for the
// connected address and for a signature over a base64 envelope.
// ============================================================================

use crate::transaction::{SignedEnvelope, UnsignedEnvelope};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failures reported by the wallet extension
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Wallet extension is not installed")]
    NotInstalled,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Wallet did not answer within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Capability interface to the wallet extension.
///
/// Each call is single-shot; a rejected signature is never retried.
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    /// Address of the connected account
    async fn get_address(&self) -> Result<String, SignerError>;

    /// Sign a base64 envelope for the given network
    async fn sign(&self, envelope_xdr: &str, network_passphrase: &str)
        -> Result<String, SignerError>;

    async fn is_connected(&self) -> bool;
}

/// Ask the wallet for one signature, bounded by `timeout`.
///
/// An empty signed payload counts as a rejection.
pub async fn request_signature(
    signer: &dyn ExternalSigner,
    envelope: &UnsignedEnvelope,
    network_passphrase: &str,
    timeout: Duration,
) -> crate::Result<SignedEnvelope> {
    let xdr = envelope.to_envelope_xdr()?;

    let signed = tokio::time::timeout(timeout, signer.sign(&xdr, network_passphrase))
        .await
        .map_err(|_| SignerError::Timeout(timeout))??;

    debug!("Wallet returned {} bytes of signed XDR", signed.len());
    SignedEnvelope::new(signed).ok_or_else(|| SignerError::UserRejected.into())
}
