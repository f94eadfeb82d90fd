//! Account state
//!
//! - wallet records (owner + authorized modules) and deployed code
//! - guardian / nonce / recovery bookkeeping per wallet
//! - balances used for received value and relay refunds

pub mod types;
pub mod store;
pub mod authorization;
pub mod balance;

pub use types::{Account, ChangeKind, Guardian, OwnerResolver, PendingGuardianChange, RecoveryRecord};
pub use store::AccountStore;
pub use authorization::AuthorizationStore;
pub use balance::{Asset, BalanceStore};
