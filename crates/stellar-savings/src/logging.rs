// ============================================================================
// STELLAR-SAVINGS - Logging
// ============================================================================
// Tracing subscriber setup for hosts embedding the crate.
// ============================================================================

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `stellar_savings=info`. Calling it again, or after the host
/// installed its own subscriber, is a no-op.
pub fn init() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stellar_savings=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized");
    }
}
