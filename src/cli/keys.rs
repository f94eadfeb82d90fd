use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{read_file, write_file, CliError};
use crate::crypto::KeyPair;
use crate::identity::Identity;

#[derive(Subcommand, Debug, Clone)]
pub enum KeysCommands {
    /// Generate a new signing key
    Generate {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the identity controlled by a key file
    Inspect {
        #[arg(long)]
        key: PathBuf,
    },
}

/// On-disk key: the identity is stored next to the secret for quick lookup
/// and checked against it on load.
#[derive(Serialize, Deserialize, Debug)]
pub struct KeyFile {
    pub identity: Identity,
    pub secret: String,
}

impl KeyFile {
    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            identity: keypair.identity(),
            secret: keypair.secret_hex(),
        }
    }

    pub fn load(path: &Path) -> Result<KeyPair, CliError> {
        let file: KeyFile = serde_json::from_str(&read_file(path)?)?;
        let keypair = KeyPair::from_secret_hex(&file.secret).map_err(CliError::Key)?;
        if keypair.identity() != file.identity {
            return Err(CliError::Key(format!(
                "{} stores identity {} but its secret controls {}",
                path.display(),
                file.identity,
                keypair.identity()
            )));
        }
        Ok(keypair)
    }
}

pub fn handle_keys_command(cmd: KeysCommands) -> Result<(), CliError> {
    match cmd {
        KeysCommands::Generate { out } => {
            if out.exists() {
                return Err(CliError::Usage(format!(
                    "File '{}' already exists. Aborting to prevent overwrite.",
                    out.display()
                )));
            }
            let keypair = KeyPair::generate();
            let file = KeyFile::from_keypair(&keypair);
            write_file(&out, &serde_json::to_string_pretty(&file)?)?;
            println!("Key saved to '{}'", out.display());
            println!("Identity: {}", file.identity);
        }
        KeysCommands::Inspect { key } => {
            let keypair = KeyFile::load(&key)?;
            println!("Identity: {}", keypair.identity());
        }
    }
    Ok(())
}
