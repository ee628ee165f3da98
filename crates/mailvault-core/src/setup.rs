//! Account setup flow.
//!
//! Setup obtains a storage bearer token from a caller-supplied handshake
//! (in the CLI, a browser round trip served by a background task) and
//! persists it through the injected [`CredentialStore`]. The handshake runs
//! on its own task and reports through a one-slot handoff, so the initiator
//! can be cancelled at any point without leaving shared state behind.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::handoff;

/// Runs a handshake to completion or cancellation and returns the obtained
/// token.
///
/// The handshake future is spawned onto its own task; its single outcome is
/// published through a handoff that the initiator waits on together with the
/// cancellation token.
///
/// # Errors
///
/// Returns [`Error::Handoff`] when cancelled or when the handshake task dies
/// without an outcome, or the handshake's own error.
pub async fn acquire_token<F>(handshake: F, cancel: &CancellationToken) -> Result<String>
where
    F: Future<Output = Result<String>> + Send + 'static,
{
    let (tx, rx) = handoff::channel();
    tokio::spawn(async move {
        let outcome = handshake.await;
        if tx.publish(outcome).is_err() {
            warn!("setup outcome discarded, initiator already gone");
        }
    });

    rx.wait(cancel).await?
}

/// Completes setup for an account: acquires a token and stores it.
///
/// # Errors
///
/// Propagates acquisition failures and credential-store failures; nothing is
/// stored unless the handshake succeeded.
pub async fn setup_account<S, F>(
    store: &S,
    account: &str,
    handshake: F,
    cancel: &CancellationToken,
) -> Result<String>
where
    S: CredentialStore + ?Sized,
    F: Future<Output = Result<String>> + Send + 'static,
{
    let token = acquire_token(handshake, cancel).await?;
    store.store_token(account, &token)?;
    info!(account, "account setup complete");
    Ok(token)
}
