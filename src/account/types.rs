//! Account, guardian and pending-change records

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::identity::{Identity, ModuleId, Timestamp};

/// Per-wallet record: who may act as this account.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub owner: Identity,
    pub authorized_modules: BTreeSet<ModuleId>,
    pub initialized: bool,
}

impl Account {
    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.initialized && self.owner == *identity
    }

    pub fn is_module_authorized(&self, module: &ModuleId) -> bool {
        self.authorized_modules.contains(module)
    }

    pub fn module_count(&self) -> usize {
        self.authorized_modules.len()
    }
}

/// Resolves the controlling owner of a code identity.
pub trait OwnerResolver {
    fn owner_of(&self, identity: &Identity) -> Option<Identity>;
}

/// Guardian capability.
///
/// A `Direct` guardian signs with its own key. An `OwnedDelegate` is code
/// (typically another wallet) whose authority is exercised by its owner,
/// resolved at the time of each check so an owner change on the delegate
/// moves guardian authority with it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guardian {
    Direct(Identity),
    OwnedDelegate(Identity),
}

impl Guardian {
    pub fn identity(&self) -> Identity {
        match self {
            Guardian::Direct(id) | Guardian::OwnedDelegate(id) => *id,
        }
    }

    /// The identity that signs for this guardian.
    pub fn controller<R: OwnerResolver + ?Sized>(&self, resolver: &R) -> Option<Identity> {
        match self {
            Guardian::Direct(id) => Some(*id),
            Guardian::OwnedDelegate(id) => resolver.owner_of(id),
        }
    }

    /// True for the guardian identity itself or the identity controlling it.
    pub fn is_held_by<R: OwnerResolver + ?Sized>(&self, identity: &Identity, resolver: &R) -> bool {
        self.identity() == *identity || self.controller(resolver) == Some(*identity)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    Addition,
    Revocation,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingGuardianChange {
    pub target: Identity,
    pub kind: ChangeKind,
    pub execute_after: Timestamp,
}

impl PendingGuardianChange {
    /// End of the confirmation window (exclusive)
    pub fn deadline(&self, window: u64) -> Timestamp {
        self.execute_after.saturating_add(window)
    }

    /// Whether the change still blocks a fresh request for the same target
    pub fn is_live(&self, now: Timestamp, window: u64) -> bool {
        now < self.deadline(window)
    }
}

/// An ongoing social recovery.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryRecord {
    pub recovery_owner: Identity,
    pub execute_after: Timestamp,
    pub guardian_count: u64,
}
