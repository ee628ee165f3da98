//! Secure credential storage behind an injected capability.
//!
//! The storage token for an account lives in the platform's native
//! credential store:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager
//!
//! Consumers take a [`CredentialStore`] rather than reaching for the keyring
//! directly, so tests and headless environments can inject their own
//! implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use tracing::debug;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailvault";

/// Credential type identifier for storage bearer tokens.
const STORAGE_CREDENTIAL: &str = "storage";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access the platform credential store.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// The in-memory store was poisoned by a panicking holder.
    #[error("Credential store unavailable")]
    Unavailable,
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Capability for reading and writing an account's storage bearer token.
pub trait CredentialStore: Send + Sync {
    /// Retrieves the stored token for an account, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn get_token(&self, account: &str) -> CredentialResult<Option<String>>;

    /// Stores the token for an account, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn store_token(&self, account: &str, token: &str) -> CredentialResult<()>;

    /// Deletes the token for an account. Missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn delete_token(&self, account: &str) -> CredentialResult<()>;
}

/// Generates the keyring entry key for an account's storage token.
fn credential_key(account: &str) -> String {
    format!("{SERVICE_NAME}_{STORAGE_CREDENTIAL}_{account}")
}

/// [`CredentialStore`] backed by the system keyring.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl CredentialStore for KeyringStore {
    fn get_token(&self, account: &str) -> CredentialResult<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, &credential_key(account))?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => {
                debug!(account, "no storage token found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store_token(&self, account: &str, token: &str) -> CredentialResult<()> {
        let entry = Entry::new(SERVICE_NAME, &credential_key(account))?;
        entry.set_password(token)?;
        debug!(account, "stored storage token");
        Ok(())
    }

    fn delete_token(&self, account: &str) -> CredentialResult<()> {
        let entry = Entry::new(SERVICE_NAME, &credential_key(account))?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                debug!(account, "deleted storage token");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// [`CredentialStore`] held in process memory.
///
/// Useful for tests and for environments without a usable platform keyring.
/// Tokens are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get_token(&self, account: &str) -> CredentialResult<Option<String>> {
        let tokens = self.tokens.lock().map_err(|_| CredentialError::Unavailable)?;
        Ok(tokens.get(account).cloned())
    }

    fn store_token(&self, account: &str, token: &str) -> CredentialResult<()> {
        let mut tokens = self.tokens.lock().map_err(|_| CredentialError::Unavailable)?;
        tokens.insert(account.to_string(), token.to_string());
        Ok(())
    }

    fn delete_token(&self, account: &str) -> CredentialResult<()> {
        let mut tokens = self.tokens.lock().map_err(|_| CredentialError::Unavailable)?;
        tokens.remove(account);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    // The keyring-backed tests interact with the actual system keyring and
    // are ignored by default. Run manually with `cargo test -- --ignored`.

    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get_token("alice@example.com").unwrap(), None);

        store.store_token("alice@example.com", "tok-1").unwrap();
        assert_eq!(
            store.get_token("alice@example.com").unwrap(),
            Some("tok-1".to_string())
        );

        store.store_token("alice@example.com", "tok-2").unwrap();
        assert_eq!(
            store.get_token("alice@example.com").unwrap(),
            Some("tok-2".to_string())
        );

        store.delete_token("alice@example.com").unwrap();
        assert_eq!(store.get_token("alice@example.com").unwrap(), None);
    }

    #[test]
    fn memory_store_keeps_accounts_separate() {
        let store = MemoryStore::new();
        store.store_token("a@example.com", "tok-a").unwrap();
        store.store_token("b@example.com", "tok-b").unwrap();

        assert_eq!(
            store.get_token("a@example.com").unwrap(),
            Some("tok-a".to_string())
        );
        assert_eq!(
            store.get_token("b@example.com").unwrap(),
            Some("tok-b".to_string())
        );
    }

    #[test]
    fn delete_of_missing_entry_is_not_an_error() {
        let store = MemoryStore::new();
        store.delete_token("nobody@example.com").unwrap();
    }

    #[test]
    fn credential_key_includes_account_and_type() {
        let key = credential_key("alice@example.com");
        assert_eq!(key, "mailvault_storage_alice@example.com");
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn keyring_store_round_trip() {
        let store = KeyringStore;
        let account = "mailvault-test@example.com";

        store.store_token(account, "test_token_12345").unwrap();
        assert_eq!(
            store.get_token(account).unwrap(),
            Some("test_token_12345".to_string())
        );

        store.delete_token(account).unwrap();
        assert_eq!(store.get_token(account).unwrap(), None);
    }
}
