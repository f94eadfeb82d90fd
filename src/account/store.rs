//! Wallet records and deployed code directory

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::types::{Account, Guardian, OwnerResolver};
use crate::error::WalletError;
use crate::identity::{Identity, ModuleId};
use crate::registry::Registry;

/// Wallet records plus every other identity that carries code.
///
/// Code identities are what guardian capability probes inspect: an identity
/// with code must expose an owner to be accepted as a guardian.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AccountStore {
    wallets: HashMap<Identity, Account>,
    code: HashMap<Identity, Option<Identity>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record code at `id`, optionally with a resolvable owner.
    pub fn deploy_code(&mut self, id: Identity, owner: Option<Identity>) {
        self.code.insert(id, owner);
    }

    pub fn has_code(&self, id: &Identity) -> bool {
        self.code.contains_key(id) || self.wallets.get(id).is_some_and(|w| w.initialized)
    }

    /// The initialized wallet record, or `NotInitialized`
    pub fn wallet(&self, account: &Identity) -> Result<&Account, WalletError> {
        self.wallets
            .get(account)
            .filter(|w| w.initialized)
            .ok_or(WalletError::NotInitialized(*account))
    }

    pub fn owner(&self, account: &Identity) -> Result<Identity, WalletError> {
        self.wallet(account).map(|w| w.owner)
    }

    pub fn initialize(
        &mut self,
        account: Identity,
        owner: Identity,
        modules: &[ModuleId],
        registry: &Registry,
    ) -> Result<(), WalletError> {
        if self.wallets.get(&account).is_some_and(|w| w.initialized) {
            return Err(WalletError::AlreadyInitialized(account));
        }
        if account.is_null() || owner.is_null() {
            return Err(WalletError::NullIdentity);
        }
        if modules.is_empty() {
            return Err(WalletError::EmptyModuleSet);
        }

        let mut authorized = BTreeSet::new();
        for module in modules {
            if module.is_null() {
                return Err(WalletError::NullIdentity);
            }
            if !authorized.insert(*module) {
                return Err(WalletError::DuplicateModule(*module));
            }
            if !registry.is_registered_module(module) {
                return Err(WalletError::ModuleNotRegistered(*module));
            }
        }

        self.wallets.insert(
            account,
            Account {
                owner,
                authorized_modules: authorized,
                initialized: true,
            },
        );
        Ok(())
    }

    /// Toggle `module` on the wallet. Only a currently authorized module may
    /// call this. Returns whether anything changed.
    pub fn set_module_authorization(
        &mut self,
        caller: &Identity,
        account: &Identity,
        module: ModuleId,
        authorized: bool,
    ) -> Result<bool, WalletError> {
        let wallet = self.wallet_mut(account)?;
        if !wallet.is_module_authorized(caller) {
            return Err(WalletError::CallerNotModule(*caller));
        }
        if module.is_null() {
            return Err(WalletError::NullIdentity);
        }
        if wallet.is_module_authorized(&module) == authorized {
            return Ok(false);
        }
        if authorized {
            wallet.authorized_modules.insert(module);
        } else {
            if wallet.module_count() == 1 {
                return Err(WalletError::LastModule);
            }
            wallet.authorized_modules.remove(&module);
        }
        Ok(true)
    }

    /// Authorize `module` on behalf of an already verified caller.
    pub(crate) fn grant_module(&mut self, account: &Identity, module: ModuleId) -> Result<(), WalletError> {
        let wallet = self.wallet_mut(account)?;
        wallet.authorized_modules.insert(module);
        Ok(())
    }

    /// Check the caller is the owner, or a module that is both authorized on
    /// the wallet and registered platform-wide. Returns the owner.
    pub fn ensure_owner_or_module(
        &self,
        account: &Identity,
        caller: &Identity,
        registry: &Registry,
    ) -> Result<Identity, WalletError> {
        let wallet = self.wallet(account)?;
        if wallet.is_owner(caller) {
            return Ok(wallet.owner);
        }
        if wallet.is_module_authorized(caller) && registry.is_registered_module(caller) {
            return Ok(wallet.owner);
        }
        Err(WalletError::CallerNotOwnerOrModule(*caller))
    }

    /// Check the caller is an authorized, registered module of the wallet.
    pub fn ensure_module(
        &self,
        account: &Identity,
        caller: &Identity,
        registry: &Registry,
    ) -> Result<(), WalletError> {
        let wallet = self.wallet(account)?;
        if wallet.is_module_authorized(caller) && registry.is_registered_module(caller) {
            return Ok(());
        }
        Err(WalletError::CallerNotModule(*caller))
    }

    /// Replace the wallet owner. Only an authorized module may call this.
    pub fn set_owner(&mut self, caller: &Identity, account: &Identity, new_owner: Identity) -> Result<(), WalletError> {
        let wallet = self.wallet_mut(account)?;
        if !wallet.is_module_authorized(caller) {
            return Err(WalletError::CallerNotModule(*caller));
        }
        if new_owner.is_null() {
            return Err(WalletError::NullIdentity);
        }
        wallet.owner = new_owner;
        Ok(())
    }

    /// Capability probe: classify `candidate` as a guardian variant.
    pub fn probe_guardian(&self, candidate: &Identity) -> Result<Guardian, WalletError> {
        if candidate.is_null() {
            return Err(WalletError::NullIdentity);
        }
        if !self.has_code(candidate) {
            return Ok(Guardian::Direct(*candidate));
        }
        match self.owner_of(candidate) {
            Some(_) => Ok(Guardian::OwnedDelegate(*candidate)),
            None => Err(WalletError::GuardianMustBeEOAOrHaveOwner(*candidate)),
        }
    }

    fn wallet_mut(&mut self, account: &Identity) -> Result<&mut Account, WalletError> {
        self.wallets
            .get_mut(account)
            .filter(|w| w.initialized)
            .ok_or(WalletError::NotInitialized(*account))
    }
}

impl OwnerResolver for AccountStore {
    fn owner_of(&self, identity: &Identity) -> Option<Identity> {
        if let Ok(wallet) = self.wallet(identity) {
            return Some(wallet.owner);
        }
        self.code.get(identity).copied().flatten()
    }
}
