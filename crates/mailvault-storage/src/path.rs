//! Remote path validation and normalization.
//!
//! Remote paths are strings in the server's document space, not local
//! filesystem paths. Every operation validates its path arguments through
//! [`RemotePath::validate`] before any network activity: the check is pure,
//! total, and rejects traversal attempts outright.

use crate::error::{Error, Result};

/// A validated, normalized absolute path in the remote document space.
///
/// Invariants: begins with `/`, contains no `..` segment, and has no
/// redundant `.` or `//` segments. Constructed fresh per call from caller
/// input; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath(String);

impl RemotePath {
    /// Validates and normalizes a caller-supplied path string.
    ///
    /// A missing leading `/` is prepended rather than rejected. The literal
    /// substring `..` is rejected before any normalization takes place, so a
    /// traversal sequence can never survive into the cleaned result. After
    /// cleaning, the result must still be absolute.
    ///
    /// Note: percent-encoded sequences are not decoded before the traversal
    /// check; the server-side path space receives them verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the input contains `..` or does not
    /// normalize to an absolute path.
    pub fn validate(path: &str) -> Result<Self> {
        let raw = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        // Traversal check runs on the raw input, independent of the cleaner.
        if raw.contains("..") {
            return Err(Error::InvalidPath(format!(
                "path must not contain '..': {path}"
            )));
        }

        let normalized = normalize(&raw);

        if !normalized.starts_with('/') {
            return Err(Error::InvalidPath(format!(
                "path escapes root after normalization: {path}"
            )));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path with a trailing slash, as collection requests
    /// (listing, collection creation) require.
    #[must_use]
    pub fn as_dir(&self) -> String {
        if self.0.ends_with('/') {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Returns the final path segment, or `/` for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("/")
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapses `//` runs and drops `.` segments, preserving absoluteness.
///
/// Idempotent: normalizing an already-normalized path is a no-op.
fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
