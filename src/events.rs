//! Events exposed to external observers and indexers.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, ModuleId, Timestamp, UpgraderId};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    WalletInitialized {
        account: Identity,
        owner: Identity,
        modules: Vec<ModuleId>,
    },
    ModuleAuthorizationChanged {
        account: Identity,
        module: ModuleId,
        authorized: bool,
    },
    OwnerChanged {
        account: Identity,
        new_owner: Identity,
    },
    ValueReceived {
        account: Identity,
        sender: Identity,
        amount: u64,
    },

    ModuleRegistered {
        module: ModuleId,
        label: String,
    },
    ModuleDeregistered {
        module: ModuleId,
    },
    UpgraderRegistered {
        upgrader: UpgraderId,
        label: String,
    },
    UpgraderDeregistered {
        upgrader: UpgraderId,
    },
    RegistryOwnerChanged {
        new_owner: Identity,
    },

    GuardianAdditionRequested {
        account: Identity,
        guardian: Identity,
        execute_after: Timestamp,
    },
    GuardianAdded {
        account: Identity,
        guardian: Identity,
    },
    GuardianAdditionCancelled {
        account: Identity,
        guardian: Identity,
    },
    GuardianRevocationRequested {
        account: Identity,
        guardian: Identity,
        execute_after: Timestamp,
    },
    GuardianRevoked {
        account: Identity,
        guardian: Identity,
    },
    GuardianRevocationCancelled {
        account: Identity,
        guardian: Identity,
    },

    RecoveryExecuted {
        account: Identity,
        recovery_owner: Identity,
        execute_after: Timestamp,
    },
    RecoveryFinalized {
        account: Identity,
        new_owner: Identity,
    },
    RecoveryCancelled {
        account: Identity,
        recovery_owner: Identity,
    },
    OwnershipTransferred {
        account: Identity,
        new_owner: Identity,
    },

    RelayExecuted {
        account: Identity,
        success: bool,
        signed_hash: [u8; 32],
        refund_amount: u64,
    },
    Refund {
        account: Identity,
        refund_address: Identity,
        asset: String,
        amount: u64,
    },

    WalletUpgraded {
        account: Identity,
        upgrader: UpgraderId,
    },
}

/// Append-only log of emitted events.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    /// Events emitted after the first `from` entries
    pub fn since(&self, from: usize) -> &[Event] {
        self.events.get(from..).unwrap_or(&[])
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }
}
