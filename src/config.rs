use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::WalletError;

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct BastionConfig {
    #[serde(default)]
    pub guardians: GuardianConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GuardianConfig {
    /// Delay between requesting and confirming a guardian change
    pub security_period_secs: u64,
    /// How long a matured request stays confirmable
    pub security_window_secs: u64,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            security_period_secs: 24 * 60 * 60,
            security_window_secs: 12 * 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryConfig {
    pub recovery_period_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            recovery_period_secs: 48 * 60 * 60,
        }
    }
}

/// Abstract gas schedule used to price relayed calls.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    pub base_gas: u64,
    pub gas_per_signature: u64,
    pub gas_per_payload_byte: u64,
    pub dispatch_gas: u64,
    pub gas_per_event: u64,
    pub refund_gas: u64,
    pub native_asset: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_gas: 21_000,
            gas_per_signature: 3_000,
            gas_per_payload_byte: 16,
            dispatch_gas: 10_000,
            gas_per_event: 1_500,
            refund_gas: 7_000,
            native_asset: "native".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BastionConfig {
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, WalletError> {
        let config: Self = toml::from_str(raw).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, WalletError> {
        toml::to_string_pretty(self).map_err(|e| WalletError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.guardians.security_period_secs == 0 {
            return Err(WalletError::Config(
                "guardians.security_period_secs must be positive".to_string(),
            ));
        }
        if self.guardians.security_window_secs == 0 {
            return Err(WalletError::Config(
                "guardians.security_window_secs must be positive".to_string(),
            ));
        }
        if self.relay.native_asset.is_empty() {
            return Err(WalletError::Config("relay.native_asset must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load `path`, falling back to defaults. A missing file is created with
    /// the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file not found at '{}'. Creating default.", path.display());
            let config = Self::default();
            match config.to_toml() {
                Ok(s) => {
                    if let Err(e) = std::fs::write(path, s) {
                        warn!("Could not write default config: {}", e);
                    }
                }
                Err(e) => warn!("Could not render default config: {}", e),
            }
            config
        }
    }
}
