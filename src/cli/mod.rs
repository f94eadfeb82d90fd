pub mod config;
pub mod keys;
pub mod relay;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::error::WalletError;

#[derive(Parser)]
#[command(name = "rust_bastion")]
#[command(about = "Bastion wallet operator CLI", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "bastion.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Key management
    Keys {
        #[command(subcommand)]
        cmd: keys::KeysCommands,
    },
    /// Build, hash and sign relay requests
    Relay {
        #[command(subcommand)]
        cmd: relay::RelayCommands,
    },
    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        cmd: config::ConfigCommands,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("invalid key: {0}")]
    Key(String),
    #[error("{0}")]
    Usage(String),
}

pub(crate) fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_file(path: &std::path::Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
