use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::warn;

use rust_bastion::cli::{self, Cli, Commands};
use rust_bastion::config::BastionConfig;
use rust_bastion::logging;

/// Read the configuration if present. Unlike `config init`, this never
/// writes a file.
fn effective_config(path: &Path) -> BastionConfig {
    if !path.exists() {
        return BastionConfig::default();
    }
    BastionConfig::load(path).unwrap_or_else(|e| {
        eprintln!("{}. Using defaults.", e);
        BastionConfig::default()
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = effective_config(&cli.config);
    logging::init(&config.logging.level);

    let result = match cli.command {
        Commands::Keys { cmd } => cli::keys::handle_keys_command(cmd),
        Commands::Relay { cmd } => cli::relay::handle_relay_command(cmd),
        Commands::Config { cmd } => cli::config::handle_config_command(cmd, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            warn!("command failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
