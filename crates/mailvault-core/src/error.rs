//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),

    /// Setup handoff error (cancellation or abandoned worker).
    #[error("Setup error: {0}")]
    Handoff(#[from] crate::handoff::HandoffError),

    /// No credential is stored for the account.
    #[error("No stored credential for account: {0}")]
    MissingCredential(String),

    /// I/O error during a setup handshake.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
