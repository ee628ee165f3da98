//! `mailvault` - command-line client for mailvault hosted mailbox accounts.
//!
//! The binary stays thin: argument parsing, credential lookup, and output
//! formatting. All protocol behavior lives in `mailvault-storage`, and
//! credential/setup capabilities in `mailvault-core`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use mailvault_core::{CredentialStore, KeyringStore};
use mailvault_storage::{Config, FileInfo, StorageClient};

/// Command-line client for mailvault hosted mailbox accounts.
#[derive(Debug, Parser)]
#[command(name = "mailvault", version, about)]
struct Cli {
    /// Account the command acts on.
    #[arg(long, global = true, env = "MAILVAULT_ACCOUNT")]
    account: Option<String>,

    /// Base URL of the account's file-storage endpoint.
    #[arg(long, global = true, env = "MAILVAULT_BASE_URL")]
    base_url: Option<Url>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a storage credential for an account.
    ///
    /// Reads an app token from standard input and saves it in the system
    /// keyring.
    Setup,

    /// Remote file-storage operations.
    #[command(subcommand)]
    Files(FilesCommand),
}

#[derive(Debug, Subcommand)]
enum FilesCommand {
    /// List the contents of a remote directory.
    Ls {
        /// Remote directory path.
        #[arg(default_value = "/")]
        path: String,
    },
    /// Upload a local file.
    Put {
        /// Local source file.
        local: PathBuf,
        /// Remote destination path.
        remote: String,
    },
    /// Download a remote file.
    Get {
        /// Remote source path.
        remote: String,
        /// Local destination file (defaults to the remote file name).
        local: Option<PathBuf>,
    },
    /// Create a remote directory.
    Mkdir {
        /// Remote directory path.
        path: String,
    },
    /// Delete a remote file or directory.
    Rm {
        /// Remote path.
        path: String,
    },
    /// Move or rename a remote file without overwriting.
    Mv {
        /// Remote source path.
        src: String,
        /// Remote destination path.
        dst: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailvault=info,mailvault_storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli {
        account,
        base_url,
        command,
    } = Cli::parse();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            trigger.cancel();
        }
    });

    let store = KeyringStore;
    let account =
        account.context("no account given; pass --account or set MAILVAULT_ACCOUNT");

    match command {
        Command::Setup => {
            let account = account?;
            eprintln!("Paste the app token for {account} and press enter:");
            mailvault_core::setup::setup_account(&store, &account, read_token_line(), &cancel)
                .await?;
            println!("Credential stored for {account}.");
        }
        Command::Files(files) => {
            let account = account?;
            let base_url =
                base_url.context("no base URL given; pass --base-url or set MAILVAULT_BASE_URL")?;
            let token = store
                .get_token(&account)?
                .ok_or_else(|| mailvault_core::Error::MissingCredential(account.clone()))?;
            let client = StorageClient::new(Config::new(base_url, token))?;
            run_files(&client, files, &cancel).await?;
        }
    }

    Ok(())
}

/// Reads one token line from standard input; the setup flow races this
/// against cancellation.
async fn read_token_line() -> mailvault_core::Result<String> {
    let mut line = String::new();
    let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
    reader.read_line(&mut line).await?;
    let token = line.trim().to_string();
    if token.is_empty() {
        return Err(mailvault_core::Error::MissingCredential(
            "empty token".to_string(),
        ));
    }
    Ok(token)
}

/// Dispatches one file-storage subcommand.
async fn run_files(
    client: &StorageClient,
    command: FilesCommand,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        FilesCommand::Ls { path } => {
            let entries = client.list(&path, cancel).await?;
            for entry in &entries {
                println!("{}", render_entry(entry));
            }
        }
        FilesCommand::Put { local, remote } => {
            client.upload(&local, &remote, cancel).await?;
            println!("Uploaded {} to {remote}", local.display());
        }
        FilesCommand::Get { remote, local } => {
            let local = local.unwrap_or_else(|| {
                PathBuf::from(remote.rsplit('/').next().unwrap_or("download"))
            });
            client.download(&remote, &local, cancel).await?;
            println!("Downloaded {remote} to {}", local.display());
        }
        FilesCommand::Mkdir { path } => {
            client.mkdir(&path, cancel).await?;
            println!("Created {path}");
        }
        FilesCommand::Rm { path } => {
            client.delete(&path, cancel).await?;
            println!("Deleted {path}");
        }
        FilesCommand::Mv { src, dst } => {
            client.rename(&src, &dst, cancel).await?;
            println!("Moved {src} to {dst}");
        }
    }
    Ok(())
}

/// Formats one listing row: type flag, size, modification time, name.
fn render_entry(entry: &FileInfo) -> String {
    let kind = if entry.is_dir { 'd' } else { '-' };
    let modified = entry.modified.format("%Y-%m-%d %H:%M");
    format!("{kind} {:>10} {modified} {}", entry.size, entry.name)
}
