//! # mailvault-core
//!
//! Account-level capabilities consumed by the mailvault CLI:
//!
//! - [`credentials`]: storage bearer tokens behind an injected
//!   [`CredentialStore`] capability, with a system-keyring implementation.
//! - [`handoff`]: a one-slot outcome handoff with cancellable waiting, the
//!   primitive under the account setup flow.
//! - [`setup`]: the setup flow itself: run a handshake, wait on it or on
//!   cancellation, persist the obtained token.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod credentials;
mod error;
pub mod handoff;
pub mod setup;

pub use credentials::{CredentialStore, KeyringStore, MemoryStore};
pub use error::{Error, Result};
