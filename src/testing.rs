//! Test fixture: a VM with the standard modules deployed and one wallet.

use std::sync::Arc;

use crate::clock::ManualClock;
use crate::config::BastionConfig;
use crate::crypto::{Digest, SignatureRecovery};
use crate::encoding::decode_return;
use crate::error::WalletError;
use crate::identity::Identity;
use crate::modules::{AdditionOutcome, GuardianCall, GuardianManager, Module, RecoveryCall, RecoveryManager};
use crate::relay::RelayExecutor;
use crate::vm::Vm;

pub const NATIVE: &str = "native";
pub const GENESIS: u64 = 1_700_000_000;

/// Deterministic signatures: `signer || digest`.
pub struct FakeRecovery;

impl SignatureRecovery for FakeRecovery {
    fn recover(&self, digest: &Digest, signature: &[u8]) -> Option<Identity> {
        if signature.len() != 64 || signature[32..] != digest[..] {
            return None;
        }
        let signer: [u8; 32] = signature[..32].try_into().ok()?;
        Some(Identity(signer))
    }
}

pub fn fake_sign(signer: &Identity, digest: &Digest) -> Vec<u8> {
    [signer.as_bytes().as_slice(), digest.as_slice()].concat()
}

pub struct Fixture {
    pub vm: Vm,
    pub clock: ManualClock,
    pub config: BastionConfig,
    pub admin: Identity,
    pub account: Identity,
    pub guardian_manager: Arc<GuardianManager>,
    pub recovery_manager: Arc<RecoveryManager>,
    pub relay: Arc<RelayExecutor>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_owner(Identity::derive("owner"), Arc::new(FakeRecovery))
    }

    pub fn with_owner(owner: Identity, recovery: Arc<dyn SignatureRecovery>) -> Self {
        let config = BastionConfig::default();
        let clock = ManualClock::new(GENESIS);
        let admin = Identity::derive("admin");
        let mut vm = Vm::new(admin, Arc::new(clock.clone()));

        let guardian_manager = Arc::new(GuardianManager::new(
            Identity::derive("guardian-manager"),
            &config.guardians,
        ));
        let recovery_manager = Arc::new(RecoveryManager::new(
            Identity::derive("recovery-manager"),
            &config.recovery,
        ));
        let relay = Arc::new(RelayExecutor::new(
            Identity::derive("relay-executor"),
            recovery,
            config.relay.clone(),
        ));

        vm.deploy_module(guardian_manager.clone());
        vm.deploy_module(recovery_manager.clone());
        vm.deploy_contract(relay.id(), None);
        vm.register_module(&admin, guardian_manager.id(), "GuardianManager")
            .unwrap();
        vm.register_module(&admin, recovery_manager.id(), "RecoveryManager")
            .unwrap();
        vm.register_module(&admin, relay.id(), "RelayExecutor").unwrap();

        let account = Identity::derive("wallet");
        vm.initialize_wallet(
            account,
            owner,
            &[guardian_manager.id(), recovery_manager.id(), relay.id()],
        )
        .unwrap();

        Self {
            vm,
            clock,
            config,
            admin,
            account,
            guardian_manager,
            recovery_manager,
            relay,
        }
    }

    pub fn owner(&self) -> Identity {
        self.vm.state().accounts.owner(&self.account).unwrap()
    }

    pub fn guardian_count(&self) -> usize {
        self.vm.state().authorizations.guardian_count(&self.account)
    }

    pub fn guardian(&mut self, caller: Identity, call: GuardianCall) -> Result<Vec<u8>, WalletError> {
        let call = call.to_call(self.account)?;
        self.vm.execute(caller, self.guardian_manager.id(), &call)
    }

    pub fn guardian_view(&self, call: GuardianCall) -> Result<Vec<u8>, WalletError> {
        let call = call.to_call(self.account)?;
        self.vm.static_call(self.guardian_manager.id(), &call.to_bytes())
    }

    pub fn recovery(&mut self, caller: Identity, call: RecoveryCall) -> Result<Vec<u8>, WalletError> {
        let call = call.to_call(self.account)?;
        self.vm.execute(caller, self.recovery_manager.id(), &call)
    }

    /// Add and, when needed, confirm `guardian` after the security period.
    pub fn add_guardian(&mut self, guardian: Identity) {
        let owner = self.owner();
        let out = self
            .guardian(owner, GuardianCall::RequestAddition(guardian))
            .unwrap();
        if let AdditionOutcome::Pending { .. } = decode_return::<AdditionOutcome>(&out).unwrap() {
            self.clock.advance(self.guardian_manager.security_period());
            self.guardian(owner, GuardianCall::ConfirmAddition(guardian))
                .unwrap();
        }
    }

    /// Initialize another wallet owned by `owner` and return its identity.
    pub fn second_wallet(&mut self, owner: Identity) -> Identity {
        let wallet = Identity::derive(&format!("wallet-of-{}", owner));
        self.vm
            .initialize_wallet(wallet, owner, &[self.guardian_manager.id()])
            .unwrap();
        wallet
    }
}
