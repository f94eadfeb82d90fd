//! Authorization and social-recovery core of a smart-contract wallet.

pub mod account;
pub mod cli;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod events;
pub mod identity;
pub mod logging;
pub mod modules;
pub mod registry;
pub mod relay;
pub mod upgrade;
pub mod vm;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, WalletError};
pub use identity::{Identity, ModuleId, Timestamp, UpgraderId};
pub use relay::{RelayExecutor, RelayOutcome, RelayRequest};
pub use upgrade::UpgradeCoordinator;
pub use vm::Vm;
