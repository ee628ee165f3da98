//! Error types for the file-storage client.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of response-body bytes kept in a [`Error::Protocol`]
/// diagnostic.
pub(crate) const BODY_SNIPPET_LIMIT: usize = 512;

/// Errors that can occur during file-storage operations.
///
/// Errors fall into three tiers: validation errors surface before any network
/// attempt, transport errors are retried per policy, and protocol errors carry
/// the terminal server response.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote path failed validation (traversal or normalization failure).
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// Client configuration is unusable (bad credential bytes, unresolvable
    /// base URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport failure (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local file I/O failed (upload source or download sink).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Multistatus listing body could not be decoded.
    #[error("malformed listing response: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The remote resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote collection already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The move destination is already occupied.
    #[error("destination already exists: {0}")]
    DestinationExists(String),

    /// Terminal non-success response, or retries exhausted.
    #[error("{operation} failed with status {status}: {body}")]
    Protocol {
        /// Name of the storage operation that failed.
        operation: &'static str,
        /// Terminal HTTP status code.
        status: StatusCode,
        /// Truncated response body, kept for diagnostics only.
        body: String,
    },
}

impl Error {
    /// Builds a [`Error::Protocol`] from a terminal response, consuming its
    /// body for the diagnostic snippet.
    ///
    /// The body read is best effort: a failure while draining it degrades to
    /// an empty snippet rather than masking the status error itself.
    pub(crate) async fn from_response(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Self {
        let status = response.status();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > BODY_SNIPPET_LIMIT {
            // Truncate on a char boundary so the snippet stays valid UTF-8.
            let mut end = BODY_SNIPPET_LIMIT;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Self::Protocol {
            operation,
            status,
            body,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
