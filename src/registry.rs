//! Platform-wide registry of permitted module and upgrader code.
//!
//! Membership only: deregistering forgets the entry, so an identifier can be
//! registered again later.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::WalletError;
use crate::identity::{Identity, ModuleId, UpgraderId};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Registry {
    owner: Identity,
    modules: HashMap<ModuleId, String>,
    upgraders: HashMap<UpgraderId, String>,
}

impl Registry {
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            modules: HashMap::new(),
            upgraders: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Identity {
        self.owner
    }

    fn ensure_owner(&self, caller: &Identity) -> Result<(), WalletError> {
        if *caller != self.owner {
            return Err(WalletError::CallerNotRegistryOwner(*caller));
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &Identity, new_owner: Identity) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        if new_owner.is_null() {
            return Err(WalletError::NullIdentity);
        }
        self.owner = new_owner;
        Ok(())
    }

    pub fn register_module(&mut self, caller: &Identity, module: ModuleId, label: &str) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        if module.is_null() {
            return Err(WalletError::NullIdentity);
        }
        if self.modules.contains_key(&module) {
            return Err(WalletError::ModuleAlreadyRegistered(module));
        }
        self.modules.insert(module, label.to_string());
        Ok(())
    }

    pub fn deregister_module(&mut self, caller: &Identity, module: &ModuleId) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        self.modules
            .remove(module)
            .map(|_| ())
            .ok_or(WalletError::ModuleNotRegistered(*module))
    }

    pub fn register_upgrader(&mut self, caller: &Identity, upgrader: UpgraderId, label: &str) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        if upgrader.is_null() {
            return Err(WalletError::NullIdentity);
        }
        if self.upgraders.contains_key(&upgrader) {
            return Err(WalletError::UpgraderAlreadyRegistered(upgrader));
        }
        self.upgraders.insert(upgrader, label.to_string());
        Ok(())
    }

    pub fn deregister_upgrader(&mut self, caller: &Identity, upgrader: &UpgraderId) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        self.upgraders
            .remove(upgrader)
            .map(|_| ())
            .ok_or(WalletError::UpgraderNotRegistered(*upgrader))
    }

    pub fn is_registered_module(&self, module: &ModuleId) -> bool {
        self.modules.contains_key(module)
    }

    pub fn is_registered_upgrader(&self, upgrader: &UpgraderId) -> bool {
        self.upgraders.contains_key(upgrader)
    }

    pub fn module_label(&self, module: &ModuleId) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }

    pub fn upgrader_label(&self, upgrader: &UpgraderId) -> Option<&str> {
        self.upgraders.get(upgrader).map(String::as_str)
    }
}
