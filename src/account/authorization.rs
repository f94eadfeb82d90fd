//! Wallet-scoped guardian and owner-authorization bookkeeping.
//!
//! Reads are open. Every write names the module performing it and fails
//! unless that module is currently authorized on the wallet.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::store::AccountStore;
use super::types::{ChangeKind, Guardian, OwnerResolver, PendingGuardianChange, RecoveryRecord};
use crate::error::WalletError;
use crate::identity::{Identity, ModuleId, Timestamp};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct AccountAuthorization {
    /// Activation order
    guardians: Vec<Guardian>,
    pending: BTreeMap<(Identity, ChangeKind), Timestamp>,
    relay_nonce: u64,
    recovery: Option<RecoveryRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AuthorizationStore {
    records: HashMap<Identity, AccountAuthorization>,
}

fn ensure_writer(accounts: &AccountStore, writer: &ModuleId, account: &Identity) -> Result<(), WalletError> {
    if accounts.wallet(account)?.is_module_authorized(writer) {
        Ok(())
    } else {
        Err(WalletError::CallerNotModule(*writer))
    }
}

impl AuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_mut(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
    ) -> Result<&mut AccountAuthorization, WalletError> {
        ensure_writer(accounts, writer, account)?;
        Ok(self.records.entry(*account).or_default())
    }

    // --- guardians ---

    pub fn guardians(&self, account: &Identity) -> &[Guardian] {
        self.records
            .get(account)
            .map(|r| r.guardians.as_slice())
            .unwrap_or(&[])
    }

    pub fn guardian_count(&self, account: &Identity) -> usize {
        self.guardians(account).len()
    }

    /// Membership of the guardian identity itself
    pub fn is_active_guardian(&self, account: &Identity, identity: &Identity) -> bool {
        self.guardians(account).iter().any(|g| g.identity() == *identity)
    }

    /// True for an active guardian and for the resolved owner of an active
    /// delegate guardian. Never true for the wallet owner.
    pub fn is_guardian(&self, accounts: &AccountStore, account: &Identity, identity: &Identity) -> bool {
        let Ok(owner) = accounts.owner(account) else {
            return false;
        };
        if owner == *identity || identity.is_null() {
            return false;
        }
        self.guardians(account)
            .iter()
            .any(|g| g.is_held_by(identity, accounts))
    }

    /// Find the guardian entry held by `identity` among `candidates`.
    pub fn match_guardian<R: OwnerResolver + ?Sized>(
        candidates: &[Guardian],
        identity: &Identity,
        resolver: &R,
    ) -> Option<usize> {
        candidates.iter().position(|g| g.is_held_by(identity, resolver))
    }

    pub fn add_guardian(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
        guardian: Guardian,
    ) -> Result<(), WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        if record.guardians.iter().any(|g| g.identity() == guardian.identity()) {
            return Err(WalletError::AlreadyGuardian(guardian.identity()));
        }
        record.guardians.push(guardian);
        Ok(())
    }

    /// Remove a guardian, keeping the activation order of the rest
    pub fn revoke_guardian(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
        guardian: &Identity,
    ) -> Result<Guardian, WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        let index = record
            .guardians
            .iter()
            .position(|g| g.identity() == *guardian)
            .ok_or(WalletError::NotAnExistingGuardian(*guardian))?;
        Ok(record.guardians.remove(index))
    }

    // --- pending guardian changes ---

    pub fn pending_change(&self, account: &Identity, target: &Identity, kind: ChangeKind) -> Option<PendingGuardianChange> {
        self.records
            .get(account)
            .and_then(|r| r.pending.get(&(*target, kind)))
            .map(|execute_after| PendingGuardianChange {
                target: *target,
                kind,
                execute_after: *execute_after,
            })
    }

    pub fn pending_changes(&self, account: &Identity) -> Vec<PendingGuardianChange> {
        self.records
            .get(account)
            .map(|r| {
                r.pending
                    .iter()
                    .map(|((target, kind), execute_after)| PendingGuardianChange {
                        target: *target,
                        kind: *kind,
                        execute_after: *execute_after,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store a pending change, overwriting any dead record for the same target
    pub fn set_pending(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
        change: PendingGuardianChange,
    ) -> Result<(), WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        record
            .pending
            .insert((change.target, change.kind), change.execute_after);
        Ok(())
    }

    pub fn clear_pending(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
        target: &Identity,
        kind: ChangeKind,
    ) -> Result<Option<Timestamp>, WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        Ok(record.pending.remove(&(*target, kind)))
    }

    // --- relay nonce ---

    /// Next nonce a relayed request must carry
    pub fn next_nonce(&self, account: &Identity) -> u64 {
        self.records.get(account).map(|r| r.relay_nonce).unwrap_or(0)
    }

    /// Consume `nonce`; it must equal the next expected value.
    pub fn use_nonce(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
        nonce: u64,
    ) -> Result<(), WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        if nonce != record.relay_nonce {
            return Err(WalletError::InvalidNonce {
                expected: record.relay_nonce,
                got: nonce,
            });
        }
        record.relay_nonce += 1;
        Ok(())
    }

    // --- recovery ---

    pub fn recovery(&self, account: &Identity) -> Option<RecoveryRecord> {
        self.records.get(account).and_then(|r| r.recovery)
    }

    pub fn set_recovery(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
        recovery: RecoveryRecord,
    ) -> Result<(), WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        record.recovery = Some(recovery);
        Ok(())
    }

    pub fn clear_recovery(
        &mut self,
        accounts: &AccountStore,
        writer: &ModuleId,
        account: &Identity,
    ) -> Result<Option<RecoveryRecord>, WalletError> {
        let record = self.record_mut(accounts, writer, account)?;
        Ok(record.recovery.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    struct Setup {
        accounts: AccountStore,
        store: AuthorizationStore,
        account: Identity,
        owner: Identity,
        module: ModuleId,
    }

    fn setup() -> Setup {
        let admin = Identity::derive("admin");
        let module = Identity::derive("guardian-manager");
        let mut registry = Registry::new(admin);
        registry.register_module(&admin, module, "GM").unwrap();
        let account = Identity::derive("wallet");
        let owner = Identity::derive("owner");
        let mut accounts = AccountStore::new();
        accounts.initialize(account, owner, &[module], &registry).unwrap();
        Setup {
            accounts,
            store: AuthorizationStore::new(),
            account,
            owner,
            module,
        }
    }

    fn direct(label: &str) -> Guardian {
        Guardian::Direct(Identity::derive(label))
    }

    #[test]
    fn test_writes_require_authorized_module() {
        let mut s = setup();
        let outsider = Identity::derive("outsider");
        assert_eq!(
            s.store
                .add_guardian(&s.accounts, &outsider, &s.account, direct("g1")),
            Err(WalletError::CallerNotModule(outsider))
        );
        s.store
            .add_guardian(&s.accounts, &s.module, &s.account, direct("g1"))
            .unwrap();
        assert_eq!(s.store.guardian_count(&s.account), 1);
    }

    #[test]
    fn test_revoke_any_position_keeps_order() {
        let mut s = setup();
        for label in ["g1", "g2", "g3", "g4"] {
            s.store
                .add_guardian(&s.accounts, &s.module, &s.account, direct(label))
                .unwrap();
        }

        let last = Identity::derive("g4");
        s.store
            .revoke_guardian(&s.accounts, &s.module, &s.account, &last)
            .unwrap();
        assert_eq!(s.store.guardian_count(&s.account), 3);

        let first = Identity::derive("g1");
        s.store
            .revoke_guardian(&s.accounts, &s.module, &s.account, &first)
            .unwrap();
        let remaining: Vec<Identity> = s
            .store
            .guardians(&s.account)
            .iter()
            .map(Guardian::identity)
            .collect();
        assert_eq!(remaining, vec![Identity::derive("g2"), Identity::derive("g3")]);

        assert_eq!(
            s.store
                .revoke_guardian(&s.accounts, &s.module, &s.account, &first),
            Err(WalletError::NotAnExistingGuardian(first))
        );
    }

    #[test]
    fn test_owner_is_never_guardian() {
        let mut s = setup();
        s.store
            .add_guardian(&s.accounts, &s.module, &s.account, Guardian::Direct(s.owner))
            .unwrap();
        assert!(!s.store.is_guardian(&s.accounts, &s.account, &s.owner));
    }

    #[test]
    fn test_delegate_owner_counts_as_guardian() {
        let mut s = setup();
        let delegate = Identity::derive("delegate");
        let delegate_owner = Identity::derive("delegate-owner");
        s.accounts.deploy_code(delegate, Some(delegate_owner));
        s.store
            .add_guardian(&s.accounts, &s.module, &s.account, Guardian::OwnedDelegate(delegate))
            .unwrap();
        assert!(s.store.is_guardian(&s.accounts, &s.account, &delegate));
        assert!(s.store.is_guardian(&s.accounts, &s.account, &delegate_owner));
        assert!(!s.store.is_active_guardian(&s.account, &delegate_owner));
    }

    #[test]
    fn test_nonce_strictly_sequential() {
        let mut s = setup();
        assert_eq!(s.store.next_nonce(&s.account), 0);
        s.store
            .use_nonce(&s.accounts, &s.module, &s.account, 0)
            .unwrap();
        assert_eq!(
            s.store.use_nonce(&s.accounts, &s.module, &s.account, 0),
            Err(WalletError::InvalidNonce { expected: 1, got: 0 })
        );
        assert_eq!(
            s.store.use_nonce(&s.accounts, &s.module, &s.account, 5),
            Err(WalletError::InvalidNonce { expected: 1, got: 5 })
        );
        assert_eq!(s.store.next_nonce(&s.account), 1);
    }

    #[test]
    fn test_pending_overwrite_and_clear() {
        let mut s = setup();
        let target = Identity::derive("g");
        let change = PendingGuardianChange {
            target,
            kind: ChangeKind::Addition,
            execute_after: 10,
        };
        s.store
            .set_pending(&s.accounts, &s.module, &s.account, change)
            .unwrap();
        s.store
            .set_pending(
                &s.accounts,
                &s.module,
                &s.account,
                PendingGuardianChange { execute_after: 99, ..change },
            )
            .unwrap();
        assert_eq!(
            s.store
                .pending_change(&s.account, &target, ChangeKind::Addition)
                .map(|c| c.execute_after),
            Some(99)
        );
        assert!(s
            .store
            .pending_change(&s.account, &target, ChangeKind::Revocation)
            .is_none());
        assert_eq!(
            s.store
                .clear_pending(&s.accounts, &s.module, &s.account, &target, ChangeKind::Addition)
                .unwrap(),
            Some(99)
        );
        assert!(s.store.pending_changes(&s.account).is_empty());
    }
}
