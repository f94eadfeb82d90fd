use clap::Subcommand;
use std::path::PathBuf;

use super::CliError;
use crate::config::BastionConfig;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Write the default configuration unless the file already exists
    Init {
        #[arg(long, default_value = "bastion.toml")]
        path: PathBuf,
    },
    /// Print the effective configuration
    Show,
}

pub fn handle_config_command(cmd: ConfigCommands, effective: &BastionConfig) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Init { path } => {
            let config = BastionConfig::load_or_default(&path);
            println!("{}", config.to_toml()?);
        }
        ConfigCommands::Show => {
            println!("{}", effective.to_toml()?);
        }
    }
    Ok(())
}
