//! Meta-transaction relay.
//!
//! A relayer submits a request the owner (and, for sensitive actions, a
//! guardian majority) signed off-chain. The executor verifies the signer set
//! against the target entry point's policy, consumes the wallet nonce,
//! dispatches the call and refunds the relayer out of the wallet balance.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::AuthorizationStore;
use crate::config::RelayConfig;
use crate::crypto::{sha256, Digest, KeyPair, SignatureRecovery};
use crate::encoding::{hex_bytes, hex_bytes_list, Call, CanonicalSerialize};
use crate::error::WalletError;
use crate::events::Event;
use crate::identity::{Identity, ModuleId};
use crate::modules::SignaturePolicy;
use crate::vm::{State, Vm};

/// Domain prefix of every relay signing digest.
const DIGEST_PREFIX: &[u8] = b"\x19\x00bastion-relay";

pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// An off-chain signed request to run `payload` on `module` for `account`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RelayRequest {
    pub module: ModuleId,
    pub account: Identity,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    /// `None` refunds in the native asset
    pub refund_token: Option<String>,
    /// `None` refunds the relayer
    pub refund_address: Option<Identity>,
    #[serde(with = "hex_bytes_list", default)]
    pub signatures: Vec<Vec<u8>>,
}

impl RelayRequest {
    pub fn new(module: ModuleId, call: &Call, nonce: u64) -> Self {
        Self {
            module,
            account: call.account,
            payload: call.to_bytes(),
            nonce,
            gas_price: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
            refund_token: None,
            refund_address: None,
            signatures: Vec::new(),
        }
    }

    /// Digest covering every field a relayer could tamper with.
    pub fn signing_digest(&self) -> Digest {
        let mut body = Vec::new();
        self.module.write_canonical(&mut body);
        self.account.write_canonical(&mut body);
        // value carried by the call; relayed calls never move value directly
        0u64.write_canonical(&mut body);
        self.payload.as_slice().write_canonical(&mut body);
        self.nonce.write_canonical(&mut body);
        self.gas_price.write_canonical(&mut body);
        self.gas_limit.write_canonical(&mut body);
        self.refund_token.write_canonical(&mut body);
        self.refund_address.write_canonical(&mut body);
        sha256(&[DIGEST_PREFIX, &body])
    }

    /// Replace the signatures with ones from `signers`, in signer order.
    pub fn sign_with(&mut self, signers: &[&KeyPair]) {
        let digest = self.signing_digest();
        let mut ordered: Vec<&KeyPair> = signers.to_vec();
        ordered.sort_by_key(|k| k.identity());
        self.signatures = ordered.iter().map(|k| k.sign_digest(&digest)).collect();
    }
}

/// What happened to a relayed request that passed verification.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RelayOutcome {
    pub success: bool,
    #[serde(with = "hex_bytes")]
    pub return_data: Vec<u8>,
    pub error: Option<String>,
    pub gas_used: u64,
    pub refund: u64,
}

pub struct RelayExecutor {
    id: ModuleId,
    recovery: Arc<dyn SignatureRecovery>,
    gas: RelayConfig,
}

impl RelayExecutor {
    pub fn new(id: ModuleId, recovery: Arc<dyn SignatureRecovery>, gas: RelayConfig) -> Self {
        Self { id, recovery, gas }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Verify, consume the nonce, dispatch and refund, as one atomic unit.
    ///
    /// Verification failures reject the request outright. A failing inner
    /// call does not: its effects are rolled back but the nonce stays used
    /// and the relayer is still refunded.
    pub fn execute(&self, vm: &mut Vm, relayer: Identity, request: &RelayRequest) -> Result<RelayOutcome, WalletError> {
        vm.atomic(|vm| self.run(vm, relayer, request, true))
    }

    /// Same path as `execute` on a throwaway copy of the state, without
    /// paying the refund.
    pub fn estimate(&self, vm: &mut Vm, relayer: Identity, request: &RelayRequest) -> Result<RelayOutcome, WalletError> {
        vm.simulate(|vm| self.run(vm, relayer, request, false))
    }

    fn run(&self, vm: &mut Vm, relayer: Identity, request: &RelayRequest, pay: bool) -> Result<RelayOutcome, WalletError> {
        let digest = request.signing_digest();
        let call = Call::from_bytes(&request.payload)?;
        if call.account != request.account {
            return Err(WalletError::WalletMismatch {
                request: request.account,
                payload: call.account,
            });
        }
        let account = request.account;

        let policy = {
            let state = vm.state();
            if !state.accounts.wallet(&account)?.is_module_authorized(&request.module) {
                return Err(WalletError::ModuleNotAuthorized(request.module));
            }
            let signers = self.recover_signers(&digest, &request.signatures)?;
            let policy = state.code.get(&request.module)?.signature_policy(state, &call)?;
            validate_signers(state, &account, policy, &signers)?;
            policy
        };

        {
            let state = vm.state_mut();
            state
                .authorizations
                .use_nonce(&state.accounts, &self.id, &account, request.nonce)?;
        }

        let fixed_gas = self
            .gas
            .base_gas
            .saturating_add(self.gas.gas_per_signature.saturating_mul(request.signatures.len() as u64))
            .saturating_add(self.gas.gas_per_payload_byte.saturating_mul(request.payload.len() as u64))
            .saturating_add(self.gas.dispatch_gas);
        let refundable = pay_refund(policy, request);
        let refund_gas = if refundable { self.gas.refund_gas } else { 0 };

        let module = request.module;
        let inner = vm.atomic(|vm| {
            let events_before = vm.events().len();
            let now = vm.now();
            let return_data = vm.state_mut().dispatch(now, self.id, &module, &call)?;
            let emitted = (vm.events().len() - events_before) as u64;
            let needed = fixed_gas
                .saturating_add(self.gas.gas_per_event.saturating_mul(emitted))
                .saturating_add(refund_gas);
            if needed > request.gas_limit {
                return Err(WalletError::GasLimitExceeded {
                    limit: request.gas_limit,
                    needed,
                });
            }
            Ok((return_data, needed))
        });

        let (success, return_data, error, gas_used) = match inner {
            Ok((data, needed)) => (true, data, None, needed),
            Err(e) => {
                warn!("Relayed call on wallet {} failed ({:?}): {}", account, e.kind(), e);
                let needed = fixed_gas.saturating_add(refund_gas);
                (false, Vec::new(), Some(e.to_string()), needed)
            }
        };

        let mut refund = 0;
        if refundable {
            let charged = gas_used.min(request.gas_limit);
            refund = charged
                .checked_mul(request.gas_price)
                .ok_or_else(|| WalletError::BalanceOverflow(self.refund_asset(request).to_string()))?;
            if pay {
                self.pay(vm, relayer, request, refund)?;
            }
        }

        vm.state_mut().events.emit(Event::RelayExecuted {
            account,
            success,
            signed_hash: digest,
            refund_amount: refund,
        });
        info!(
            "Relayed nonce {} on wallet {}: success={}, gas={}, refund={}",
            request.nonce, account, success, gas_used, refund
        );

        Ok(RelayOutcome {
            success,
            return_data,
            error,
            gas_used,
            refund,
        })
    }

    fn refund_asset<'a>(&'a self, request: &'a RelayRequest) -> &'a str {
        request
            .refund_token
            .as_deref()
            .unwrap_or(&self.gas.native_asset)
    }

    fn pay(&self, vm: &mut Vm, relayer: Identity, request: &RelayRequest, amount: u64) -> Result<(), WalletError> {
        let asset = self.refund_asset(request).to_string();
        let refund_address = request.refund_address.unwrap_or(relayer);
        let state = vm.state_mut();
        state
            .balances
            .transfer(&request.account, &refund_address, &asset, amount)?;
        state.events.emit(Event::Refund {
            account: request.account,
            refund_address,
            asset,
            amount,
        });
        debug!("Refunded {} to {}", amount, refund_address);
        Ok(())
    }

    /// Recover every signer, requiring strictly increasing identities.
    fn recover_signers(&self, digest: &Digest, signatures: &[Vec<u8>]) -> Result<Vec<Identity>, WalletError> {
        let mut signers: Vec<Identity> = Vec::with_capacity(signatures.len());
        for signature in signatures {
            let signer = self
                .recovery
                .recover(digest, signature)
                .ok_or(WalletError::InvalidSignatures)?;
            if signers.last().is_some_and(|prev| *prev >= signer) {
                return Err(WalletError::InvalidSignatureOrder);
            }
            signers.push(signer);
        }
        Ok(signers)
    }
}

fn pay_refund(policy: SignaturePolicy, request: &RelayRequest) -> bool {
    policy.refundable() && request.gas_price > 0
}

/// The signer set must match the policy exactly: the owner when required,
/// plus exactly `ceil(n/2)` distinct guardian entries when required.
/// A signed tier with nobody able to sign (no guardians yet) never passes.
fn validate_signers(
    state: &State,
    account: &Identity,
    policy: SignaturePolicy,
    signers: &[Identity],
) -> Result<(), WalletError> {
    let guardians = state.authorizations.guardians(account);
    let required = policy.required_signatures(guardians.len());
    if policy != SignaturePolicy::Anyone && required == 0 {
        return Err(WalletError::InvalidSignatures);
    }
    if signers.len() != required {
        return Err(WalletError::InvalidSignatures);
    }
    let owner = state.accounts.owner(account)?;

    let mut rest: Vec<Identity> = signers.to_vec();
    if policy.requires_owner() {
        let position = rest
            .iter()
            .position(|s| *s == owner)
            .ok_or(WalletError::InvalidSignatures)?;
        rest.remove(position);
    }

    let mut unused = guardians.to_vec();
    for signer in &rest {
        if *signer == owner {
            return Err(WalletError::InvalidSignatures);
        }
        let index = AuthorizationStore::match_guardian(&unused, signer, &state.accounts)
            .ok_or(WalletError::InvalidSignatures)?;
        unused.remove(index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Recovery;
    use crate::encoding::decode_return;
    use crate::modules::{GuardianCall, Module, RecoveryCall};
    use crate::testing::{fake_sign, Fixture, NATIVE};

    fn signed(f: &Fixture, module: ModuleId, call: &Call, signers: &[Identity]) -> RelayRequest {
        let mut request = RelayRequest::new(module, call, f.vm.state().authorizations.next_nonce(&f.account));
        sign_fake(&mut request, signers);
        request
    }

    fn sign_fake(request: &mut RelayRequest, signers: &[Identity]) {
        let digest = request.signing_digest();
        let mut ordered = signers.to_vec();
        ordered.sort();
        request.signatures = ordered.iter().map(|s| fake_sign(s, &digest)).collect();
    }

    #[test]
    fn test_owner_only_request() {
        let mut f = Fixture::new();
        let relayer = Identity::derive("relayer");
        let g1 = Identity::derive("g1");
        let call = GuardianCall::RequestAddition(g1).to_call(f.account).unwrap();
        let request = signed(&f, f.guardian_manager.id(), &call, &[f.owner()]);

        let outcome = f.relay.execute(&mut f.vm, relayer, &request).unwrap();
        assert!(outcome.success);
        assert_eq!(f.guardian_count(), 1);
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 1);
        assert!(matches!(
            f.vm.events().last(),
            Some(Event::RelayExecuted { success: true, .. })
        ));
    }

    #[test]
    fn test_replayed_nonce_rejected() {
        let mut f = Fixture::new();
        let relayer = Identity::derive("relayer");
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let request = signed(&f, f.guardian_manager.id(), &call, &[f.owner()]);
        f.relay.execute(&mut f.vm, relayer, &request).unwrap();
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidNonce { expected: 1, got: 0 })
        );

        let mut ahead = RelayRequest::new(f.guardian_manager.id(), &call, 5);
        sign_fake(&mut ahead, &[f.owner()]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &ahead),
            Err(WalletError::InvalidNonce { expected: 1, got: 5 })
        );
    }

    #[test]
    fn test_tampered_field_breaks_signature_match() {
        let mut f = Fixture::new();
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let mut request = signed(&f, f.guardian_manager.id(), &call, &[f.owner()]);
        request.gas_price = 7;
        assert_eq!(
            f.relay.execute(&mut f.vm, Identity::derive("relayer"), &request),
            Err(WalletError::InvalidSignatures)
        );
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 0);
    }

    #[test]
    fn test_signer_order_and_count() {
        let mut f = Fixture::new();
        let guardians: Vec<Identity> = ["g1", "g2", "g3"].iter().map(|l| Identity::derive(l)).collect();
        for g in &guardians {
            f.add_guardian(*g);
        }
        let relayer = Identity::derive("relayer");
        let call = RecoveryCall::ExecuteRecovery(Identity::derive("new-owner"))
            .to_call(f.account)
            .unwrap();
        let module = f.recovery_manager.id();

        // duplicate signer
        let mut request = signed(&f, module, &call, &[]);
        let digest = request.signing_digest();
        request.signatures = vec![fake_sign(&guardians[0], &digest), fake_sign(&guardians[0], &digest)];
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatureOrder)
        );

        // descending order
        let mut sorted = guardians[..2].to_vec();
        sorted.sort();
        request.signatures = sorted.iter().rev().map(|g| fake_sign(g, &digest)).collect();
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatureOrder)
        );

        // one too few, one too many
        sign_fake(&mut request, &guardians[..1]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatures)
        );
        sign_fake(&mut request, &guardians);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatures)
        );

        // owner cannot stand in for a guardian
        sign_fake(&mut request, &[guardians[0], f.owner()]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatures)
        );

        sign_fake(&mut request, &guardians[1..]);
        let outcome = f.relay.execute(&mut f.vm, relayer, &request).unwrap();
        assert!(outcome.success, "{:?}", outcome.error);
        assert!(f.recovery_manager.get_recovery(f.vm.state(), &f.account).is_some());
    }

    #[test]
    fn test_owner_and_guardian_majority() {
        let mut f = Fixture::new();
        let (g1, g2) = (Identity::derive("g1"), Identity::derive("g2"));
        f.add_guardian(g1);
        f.add_guardian(g2);
        let next = Identity::derive("next-owner");
        let call = RecoveryCall::TransferOwnership(next).to_call(f.account).unwrap();
        let module = f.recovery_manager.id();
        let relayer = Identity::derive("relayer");

        let request = signed(&f, module, &call, &[g1, g2]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatures)
        );

        let request = signed(&f, module, &call, &[f.owner(), g2]);
        assert!(f.relay.execute(&mut f.vm, relayer, &request).unwrap().success);
        assert_eq!(f.owner(), next);
    }

    #[test]
    fn test_delegate_guardian_counts_once() {
        let mut f = Fixture::new();
        let delegate_owner = Identity::derive("delegate-owner");
        let delegate = f.second_wallet(delegate_owner);
        f.add_guardian(delegate);
        f.add_guardian(Identity::derive("g2"));
        f.add_guardian(Identity::derive("g3"));
        let call = RecoveryCall::ExecuteRecovery(Identity::derive("n"))
            .to_call(f.account)
            .unwrap();
        let module = f.recovery_manager.id();
        let relayer = Identity::derive("relayer");

        let request = signed(&f, module, &call, &[delegate, delegate_owner]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::InvalidSignatures)
        );
        let request = signed(&f, module, &call, &[delegate_owner, Identity::derive("g3")]);
        assert!(f.relay.execute(&mut f.vm, relayer, &request).unwrap().success);
    }

    #[test]
    fn test_inner_failure_consumes_nonce_and_refunds() {
        let mut f = Fixture::new();
        f.vm.receive_value(Identity::NULL, f.account, 10_000_000, NATIVE).unwrap();
        let relayer = Identity::derive("relayer");
        let owner = f.owner();
        // the owner cannot be its own guardian: inner call fails
        let call = GuardianCall::RequestAddition(owner).to_call(f.account).unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.gas_price = 2;
        sign_fake(&mut request, &[owner]);

        let outcome = f.relay.execute(&mut f.vm, relayer, &request).unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("resolves to the wallet owner"));
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 1);
        assert_eq!(outcome.refund, outcome.gas_used * 2);
        assert_eq!(f.vm.balance_of(&relayer, NATIVE), outcome.refund);
        assert_eq!(f.guardian_count(), 0);
    }

    #[test]
    fn test_refund_to_address_in_token() {
        let mut f = Fixture::new();
        f.vm.credit_token(f.account, "usdc", 1_000_000_000).unwrap();
        let collector = Identity::derive("collector");
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.gas_price = 3;
        request.refund_token = Some("usdc".to_string());
        request.refund_address = Some(collector);
        sign_fake(&mut request, &[f.owner()]);

        let outcome = f
            .relay
            .execute(&mut f.vm, Identity::derive("relayer"), &request)
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.refund > 0);
        assert_eq!(f.vm.balance_of(&collector, "usdc"), outcome.refund);
        assert!(f
            .vm
            .events()
            .all()
            .iter()
            .any(|e| matches!(e, Event::Refund { amount, .. } if *amount == outcome.refund)));
    }

    #[test]
    fn test_unaffordable_refund_rolls_back_everything() {
        let mut f = Fixture::new();
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.gas_price = 1;
        sign_fake(&mut request, &[f.owner()]);
        assert!(matches!(
            f.relay.execute(&mut f.vm, Identity::derive("relayer"), &request),
            Err(WalletError::InsufficientFunds { .. })
        ));
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 0);
        assert_eq!(f.guardian_count(), 0);
    }

    #[test]
    fn test_unsigned_guardian_call_rejected_without_guardians() {
        let mut f = Fixture::new();
        f.vm.receive_value(Identity::NULL, f.account, 1_000_000, NATIVE).unwrap();
        let relayer = Identity::derive("relayer");
        assert_eq!(f.guardian_count(), 0);

        for call in [RecoveryCall::CancelRecovery, RecoveryCall::ExecuteRecovery(Identity::derive("new-owner"))] {
            let call = call.to_call(f.account).unwrap();
            let mut request = signed(&f, f.recovery_manager.id(), &call, &[]);
            request.gas_price = 22;
            assert!(matches!(
                f.relay.execute(&mut f.vm, relayer, &request),
                Err(WalletError::InvalidSignatures)
            ));
        }
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 0);
        assert_eq!(f.vm.balance_of(&relayer, NATIVE), 0);
        assert_eq!(f.vm.balance_of(&f.account, NATIVE), 1_000_000);

        // the owner's pre-signed request still lands on nonce 0
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let request = signed(&f, f.guardian_manager.id(), &call, &[f.owner()]);
        assert!(f.relay.execute(&mut f.vm, relayer, &request).unwrap().success);
    }

    #[test]
    fn test_anyone_tier_needs_no_signature_and_no_refund() {
        let mut f = Fixture::new();
        let (g1, g2) = (Identity::derive("g1"), Identity::derive("g2"));
        f.add_guardian(g1);
        f.guardian(f.owner(), GuardianCall::RequestAddition(g2)).unwrap();
        f.clock.advance(f.guardian_manager.security_period());

        let call = GuardianCall::ConfirmAddition(g2).to_call(f.account).unwrap();
        let mut request = signed(&f, f.guardian_manager.id(), &call, &[]);
        request.gas_price = 5;
        let outcome = f
            .relay
            .execute(&mut f.vm, Identity::derive("relayer"), &request)
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.refund, 0);
        assert_eq!(f.guardian_count(), 2);
    }

    #[test]
    fn test_request_checks() {
        let mut f = Fixture::new();
        let relayer = Identity::derive("relayer");
        let other = Identity::derive("other-wallet");
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(other)
            .unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.account = f.account;
        sign_fake(&mut request, &[f.owner()]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::WalletMismatch {
                request: f.account,
                payload: other
            })
        );

        let rogue = Identity::derive("rogue-module");
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let request = signed(&f, rogue, &call, &[f.owner()]);
        assert_eq!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::ModuleNotAuthorized(rogue))
        );

        let view = GuardianCall::GuardianCount.to_call(f.account).unwrap();
        let request = signed(&f, f.guardian_manager.id(), &view, &[f.owner()]);
        assert!(matches!(
            f.relay.execute(&mut f.vm, relayer, &request),
            Err(WalletError::UnknownSelector(_))
        ));
    }

    #[test]
    fn test_gas_limit_fails_inner_call() {
        let mut f = Fixture::new();
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.gas_limit = 1_000;
        sign_fake(&mut request, &[f.owner()]);
        let outcome = f
            .relay
            .execute(&mut f.vm, Identity::derive("relayer"), &request)
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(f.guardian_count(), 0);
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 1);
    }

    #[test]
    fn test_estimate_does_not_commit() {
        let mut f = Fixture::new();
        f.vm.receive_value(Identity::NULL, f.account, 10_000_000, NATIVE).unwrap();
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.gas_price = 1;
        sign_fake(&mut request, &[f.owner()]);
        let relayer = Identity::derive("relayer");

        let estimate = f.relay.estimate(&mut f.vm, relayer, &request).unwrap();
        assert!(estimate.success);
        assert_eq!(f.guardian_count(), 0);
        assert_eq!(f.vm.state().authorizations.next_nonce(&f.account), 0);

        let outcome = f.relay.execute(&mut f.vm, relayer, &request).unwrap();
        assert_eq!(outcome.gas_used, estimate.gas_used);
        assert_eq!(outcome.refund, estimate.refund);
    }

    #[test]
    fn test_ed25519_signatures() {
        let owner = KeyPair::from_seed(&[7u8; 32]);
        let mut f = Fixture::with_owner(owner.identity(), Arc::new(Ed25519Recovery));
        let call = GuardianCall::RequestAddition(Identity::derive("g1"))
            .to_call(f.account)
            .unwrap();
        let mut request = RelayRequest::new(f.guardian_manager.id(), &call, 0);
        request.sign_with(&[&owner]);
        let outcome = f
            .relay
            .execute(&mut f.vm, Identity::derive("relayer"), &request)
            .unwrap();
        assert!(outcome.success);
        let added: Vec<Identity> = decode_return(
            &f.guardian_view(GuardianCall::GetGuardians).unwrap(),
        )
        .unwrap();
        assert_eq!(added, vec![Identity::derive("g1")]);
    }

    #[test]
    fn test_request_json_shape() {
        let call = GuardianCall::GuardianCount
            .to_call(Identity::derive("wallet"))
            .unwrap();
        let request = RelayRequest::new(Identity::derive("module"), &call, 3);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"payload\":\"0x"));
        let back: RelayRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.signing_digest(), request.signing_digest());
    }
}
