//! Balance tracking for wallets and refund recipients
//!
//! Settlement itself is a primitive: the core only credits received value and
//! moves refunds between two holders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::WalletError;
use crate::identity::Identity;

/// Asset label ("native" for the platform currency, otherwise a token label)
pub type Asset = String;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BalanceStore {
    /// Map of (holder, asset) -> balance
    balances: HashMap<(Identity, Asset), u64>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, holder: &Identity, asset: &str) -> u64 {
        self.balances
            .get(&(*holder, asset.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn credit(&mut self, holder: &Identity, asset: &str, amount: u64) -> Result<(), WalletError> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.balances.entry((*holder, asset.to_string())).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| WalletError::BalanceOverflow(asset.to_string()))?;
        Ok(())
    }

    pub fn debit(&mut self, holder: &Identity, asset: &str, amount: u64) -> Result<(), WalletError> {
        if amount == 0 {
            return Ok(());
        }
        let key = (*holder, asset.to_string());
        let current = self.balances.get(&key).copied().unwrap_or(0);
        if current < amount {
            return Err(WalletError::InsufficientFunds {
                asset: asset.to_string(),
                needed: amount,
                available: current,
            });
        }
        if current == amount {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, current - amount);
        }
        Ok(())
    }

    pub fn transfer(&mut self, from: &Identity, to: &Identity, asset: &str, amount: u64) -> Result<(), WalletError> {
        self.debit(from, asset, amount)?;
        if let Err(e) = self.credit(to, asset, amount) {
            // restore the sender before reporting
            self.credit(from, asset, amount)?;
            return Err(e);
        }
        Ok(())
    }

    pub fn total_supply(&self, asset: &str) -> u64 {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, balance)| balance)
            .sum()
    }
}
