//! In-process execution environment.
//!
//! Provides what the wallet core needs from a chain: authenticated caller
//! identities, all-or-nothing commits, module dispatch and a clock. Each
//! public entry point is one atomic unit; a failed call leaves no trace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::account::{AccountStore, AuthorizationStore, BalanceStore};
use crate::clock::Clock;
use crate::encoding::{Call, Selector};
use crate::error::WalletError;
use crate::events::{Event, EventLog};
use crate::identity::{Identity, ModuleId, Timestamp};
use crate::modules::{CallContext, Module};
use crate::registry::Registry;

/// Deployed module code by identity.
#[derive(Clone, Default)]
pub struct ModuleTable {
    modules: HashMap<ModuleId, Arc<dyn Module>>,
}

impl ModuleTable {
    pub fn get(&self, id: &ModuleId) -> Result<Arc<dyn Module>, WalletError> {
        self.modules
            .get(id)
            .cloned()
            .ok_or(WalletError::UnknownModule(*id))
    }

    fn insert(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.id(), module);
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.modules.iter().map(|(id, m)| (id, m.name())))
            .finish()
    }
}

/// Everything a call may mutate. Cloned to snapshot before each atomic unit.
#[derive(Clone, Debug)]
pub struct State {
    pub registry: Registry,
    pub accounts: AccountStore,
    pub authorizations: AuthorizationStore,
    pub balances: BalanceStore,
    pub events: EventLog,
    pub code: ModuleTable,
}

impl State {
    pub fn new(registry_owner: Identity) -> Self {
        Self {
            registry: Registry::new(registry_owner),
            accounts: AccountStore::new(),
            authorizations: AuthorizationStore::new(),
            balances: BalanceStore::new(),
            events: EventLog::new(),
            code: ModuleTable::default(),
        }
    }

    /// Forward a read-only call to `module` if it is authorized on `account`
    /// right now. Authorization is looked up on every call.
    pub fn delegate_static_call(
        &self,
        now: Timestamp,
        account: &Identity,
        module: &ModuleId,
        selector: Selector,
        args: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        if !self.accounts.wallet(account)?.is_module_authorized(module) {
            return Err(WalletError::ModuleNotAuthorized(*module));
        }
        let code = self.code.get(module)?;
        let call = Call {
            selector,
            account: *account,
            args: args.to_vec(),
        };
        code.static_call(self, now, &call)
    }

    /// Invoke a module entry point without opening a new atomic unit.
    pub fn dispatch(
        &mut self,
        now: Timestamp,
        caller: Identity,
        module: &ModuleId,
        call: &Call,
    ) -> Result<Vec<u8>, WalletError> {
        let code = self.code.get(module)?;
        debug!(module = code.name(), caller = %caller, account = %call.account, "dispatch");
        let mut ctx = CallContext {
            state: self,
            caller,
            now,
        };
        code.call(&mut ctx, call)
    }

    /// `is_guardian` as seen by recovery and relay checks
    pub fn is_guardian(&self, account: &Identity, identity: &Identity) -> bool {
        self.authorizations.is_guardian(&self.accounts, account, identity)
    }
}

pub struct Vm {
    state: State,
    clock: Arc<dyn Clock>,
}

impl Vm {
    pub fn new(registry_owner: Identity, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: State::new(registry_owner),
            clock,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// Run `f` as one atomic unit: on `Err` every state change is undone.
    pub fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, WalletError>) -> Result<T, WalletError> {
        let snapshot = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    /// Run `f` and always discard its state changes.
    pub fn simulate<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let snapshot = self.state.clone();
        let result = f(self);
        self.state = snapshot;
        result
    }

    // --- deployment ---

    /// Install module code. The module identity becomes a code identity.
    pub fn deploy_module(&mut self, module: Arc<dyn Module>) -> ModuleId {
        let id = module.id();
        info!("Deployed module {} at {}", module.name(), id);
        self.state.accounts.deploy_code(id, None);
        self.state.code.insert(module);
        id
    }

    /// Install opaque code, optionally exposing an owner.
    pub fn deploy_contract(&mut self, id: Identity, owner: Option<Identity>) {
        self.state.accounts.deploy_code(id, owner);
    }

    // --- registry ---

    pub fn register_module(&mut self, caller: &Identity, module: ModuleId, label: &str) -> Result<(), WalletError> {
        self.atomic(|vm| {
            vm.state.registry.register_module(caller, module, label)?;
            vm.state.events.emit(Event::ModuleRegistered {
                module,
                label: label.to_string(),
            });
            info!("Registry: module {} registered as '{}'", module, label);
            Ok(())
        })
    }

    pub fn deregister_module(&mut self, caller: &Identity, module: ModuleId) -> Result<(), WalletError> {
        self.atomic(|vm| {
            vm.state.registry.deregister_module(caller, &module)?;
            vm.state.events.emit(Event::ModuleDeregistered { module });
            info!("Registry: module {} deregistered", module);
            Ok(())
        })
    }

    pub fn register_upgrader(&mut self, caller: &Identity, upgrader: Identity, label: &str) -> Result<(), WalletError> {
        self.atomic(|vm| {
            vm.state.registry.register_upgrader(caller, upgrader, label)?;
            vm.state.events.emit(Event::UpgraderRegistered {
                upgrader,
                label: label.to_string(),
            });
            info!("Registry: upgrader {} registered as '{}'", upgrader, label);
            Ok(())
        })
    }

    pub fn deregister_upgrader(&mut self, caller: &Identity, upgrader: Identity) -> Result<(), WalletError> {
        self.atomic(|vm| {
            vm.state.registry.deregister_upgrader(caller, &upgrader)?;
            vm.state.events.emit(Event::UpgraderDeregistered { upgrader });
            info!("Registry: upgrader {} deregistered", upgrader);
            Ok(())
        })
    }

    pub fn transfer_registry_ownership(&mut self, caller: &Identity, new_owner: Identity) -> Result<(), WalletError> {
        self.atomic(|vm| {
            vm.state.registry.transfer_ownership(caller, new_owner)?;
            vm.state.events.emit(Event::RegistryOwnerChanged { new_owner });
            Ok(())
        })
    }

    // --- wallet ---

    /// One-time wallet setup. Every module must be registered.
    pub fn initialize_wallet(&mut self, account: Identity, owner: Identity, modules: &[ModuleId]) -> Result<(), WalletError> {
        self.atomic(|vm| {
            let state = &mut vm.state;
            state.accounts.initialize(account, owner, modules, &state.registry)?;
            state.events.emit(Event::WalletInitialized {
                account,
                owner,
                modules: modules.to_vec(),
            });
            info!("Wallet {} initialized with {} module(s)", account, modules.len());
            Ok(())
        })
    }

    /// Authorize or revoke `module`. Only an authorized module may call this.
    pub fn set_module_authorization(
        &mut self,
        caller: &Identity,
        account: Identity,
        module: ModuleId,
        authorized: bool,
    ) -> Result<(), WalletError> {
        self.atomic(|vm| set_module_authorization(&mut vm.state, caller, account, module, authorized))
    }

    pub fn delegate_static_call(
        &self,
        account: &Identity,
        module: &ModuleId,
        selector: Selector,
        args: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        self.state
            .delegate_static_call(self.now(), account, module, selector, args)
    }

    /// Accept value sent to `account`. The sender may be the null identity
    /// (system-level settlement).
    pub fn receive_value(&mut self, sender: Identity, account: Identity, amount: u64, native_asset: &str) -> Result<(), WalletError> {
        self.atomic(|vm| {
            vm.state.balances.credit(&account, native_asset, amount)?;
            vm.state.events.emit(Event::ValueReceived {
                account,
                sender,
                amount,
            });
            debug!("Wallet {} received {} from {}", account, amount, sender);
            Ok(())
        })
    }

    /// Seed a token balance (settlement primitive)
    pub fn credit_token(&mut self, holder: Identity, asset: &str, amount: u64) -> Result<(), WalletError> {
        self.atomic(|vm| vm.state.balances.credit(&holder, asset, amount))
    }

    pub fn balance_of(&self, holder: &Identity, asset: &str) -> u64 {
        self.state.balances.get_balance(holder, asset)
    }

    // --- modules ---

    /// Direct module invocation by `caller`.
    pub fn call(&mut self, caller: Identity, module: ModuleId, payload: &[u8]) -> Result<Vec<u8>, WalletError> {
        let call = Call::from_bytes(payload)?;
        self.execute(caller, module, &call)
    }

    pub fn execute(&mut self, caller: Identity, module: ModuleId, call: &Call) -> Result<Vec<u8>, WalletError> {
        let now = self.now();
        self.atomic(|vm| vm.state.dispatch(now, caller, &module, call))
    }

    /// Read-only module invocation.
    pub fn static_call(&self, module: ModuleId, payload: &[u8]) -> Result<Vec<u8>, WalletError> {
        let call = Call::from_bytes(payload)?;
        let code = self.state.code.get(&module)?;
        code.static_call(&self.state, self.now(), &call)
    }

    pub(crate) fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }
}

/// Wallet-level authorization toggle with its event.
pub(crate) fn set_module_authorization(
    state: &mut State,
    caller: &Identity,
    account: Identity,
    module: ModuleId,
    authorized: bool,
) -> Result<(), WalletError> {
    if state
        .accounts
        .set_module_authorization(caller, &account, module, authorized)?
    {
        state.events.emit(Event::ModuleAuthorizationChanged {
            account,
            module,
            authorized,
        });
        info!(
            "Wallet {}: module {} {}",
            account,
            module,
            if authorized { "authorized" } else { "revoked" }
        );
    }
    Ok(())
}
