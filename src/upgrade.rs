//! One-shot module set migration.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WalletError;
use crate::events::Event;
use crate::identity::{Identity, ModuleId, UpgraderId};
use crate::vm::{set_module_authorization, Vm};

/// Swaps a wallet's authorized modules in a single atomic step.
///
/// The coordinator is granted module authority just long enough to apply
/// its lists, then revokes itself. `apply_on_wallet` consumes the value, so
/// a coordinator cannot be applied twice.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UpgradeCoordinator {
    id: UpgraderId,
    modules_to_remove: Vec<ModuleId>,
    modules_to_add: Vec<ModuleId>,
}

impl UpgradeCoordinator {
    pub fn new(id: UpgraderId, modules_to_remove: Vec<ModuleId>, modules_to_add: Vec<ModuleId>) -> Self {
        Self {
            id,
            modules_to_remove,
            modules_to_add,
        }
    }

    pub fn id(&self) -> UpgraderId {
        self.id
    }

    /// `caller` must be the wallet owner or one of its authorized modules.
    pub fn apply_on_wallet(self, vm: &mut Vm, caller: &Identity, account: Identity) -> Result<(), WalletError> {
        vm.atomic(|vm| {
            let state = vm.state_mut();
            state
                .accounts
                .ensure_owner_or_module(&account, caller, &state.registry)?;
            if !state.registry.is_registered_upgrader(&self.id) {
                return Err(WalletError::UpgraderNotRegistered(self.id));
            }
            if state.accounts.wallet(&account)?.is_module_authorized(&self.id) {
                return Err(WalletError::UpgraderAlreadyAuthorized(self.id));
            }
            if let Some(unknown) = self
                .modules_to_add
                .iter()
                .find(|m| !state.registry.is_registered_module(m))
            {
                return Err(WalletError::ModuleNotRegistered(*unknown));
            }

            state.accounts.grant_module(&account, self.id)?;
            state.events.emit(Event::ModuleAuthorizationChanged {
                account,
                module: self.id,
                authorized: true,
            });
            for module in &self.modules_to_add {
                set_module_authorization(state, &self.id, account, *module, true)?;
            }
            for module in &self.modules_to_remove {
                set_module_authorization(state, &self.id, account, *module, false)?;
            }
            set_module_authorization(state, &self.id, account, self.id, false)?;

            state.events.emit(Event::WalletUpgraded {
                account,
                upgrader: self.id,
            });
            info!(
                "Wallet {} upgraded by {}: +{} -{} module(s)",
                account,
                self.id,
                self.modules_to_add.len(),
                self.modules_to_remove.len()
            );
            Ok(())
        })
    }
}
