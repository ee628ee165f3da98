//! # mailvault-storage
//!
//! Resilient client for the remote file-storage protocol of a mailvault
//! hosted account: a document-oriented WebDAV-style API spoken over HTTPS
//! with a bearer credential.
//!
//! ## Design
//!
//! - **Path safety**: every remote path is validated and normalized before
//!   any network activity; traversal sequences are rejected outright.
//! - **Resilience**: each operation runs through a bounded retry executor
//!   that rebuilds its request per attempt (so streaming bodies rewind) and
//!   classifies transient statuses per operation. Backoff is exponential,
//!   capped, jittered, and cancellable.
//! - **Typed listings**: the multistatus listing format is decoded into
//!   [`FileInfo`] records, excluding the requested collection itself.
//! - **Concurrency**: a [`StorageClient`] is immutable after construction
//!   and safe for concurrent use; it holds no worker pool and no shared
//!   mutable state beyond the HTTP connection pool.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailvault_storage::{Config, StorageClient};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> mailvault_storage::Result<()> {
//!     let config = Config::new(
//!         Url::parse("https://storage.example.com").unwrap(),
//!         std::env::var("MAILVAULT_TOKEN").unwrap(),
//!     );
//!     let client = StorageClient::new(config)?;
//!     let cancel = CancellationToken::new();
//!
//!     for entry in client.list("/", &cancel).await? {
//!         println!("{} {}", if entry.is_dir { "d" } else { "-" }, entry.path);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod multistatus;
mod path;
pub mod retry;

pub use client::{Config, StorageClient};
pub use error::{Error, Result};
pub use multistatus::FileInfo;
pub use path::RemotePath;
pub use retry::RetryPolicy;
