//! Guardian lifecycle: timed additions and revocations.
//!
//! Per (wallet, candidate):
//!
//! ```text
//! None --request_addition--> PendingAddition --confirm_addition--> Active
//! Active --request_revocation--> PendingRevocation --confirm_revocation--> None
//! ```
//!
//! A pending change is confirmable in `[execute_after, execute_after + window)`.
//! Past the window the record is dead: confirming fails `TooLate`, and a new
//! request for the same target overwrites it and restarts the timer. The
//! very first guardian of an empty set activates immediately.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CallContext, Module, SignaturePolicy};
use crate::account::{ChangeKind, Guardian, PendingGuardianChange};
use crate::config::GuardianConfig;
use crate::encoding::{encode_return, Call};
use crate::error::WalletError;
use crate::events::Event;
use crate::identity::{Identity, ModuleId, Timestamp};
use crate::vm::State;

const REQUEST_ADDITION: &str = "request_guardian_addition(Identity)";
const CONFIRM_ADDITION: &str = "confirm_guardian_addition(Identity)";
const CANCEL_ADDITION: &str = "cancel_guardian_addition(Identity)";
const REQUEST_REVOCATION: &str = "request_guardian_revocation(Identity)";
const CONFIRM_REVOCATION: &str = "confirm_guardian_revocation(Identity)";
const CANCEL_REVOCATION: &str = "cancel_guardian_revocation(Identity)";
const GUARDIAN_COUNT: &str = "guardian_count()";
const IS_GUARDIAN: &str = "is_guardian(Identity)";
const GET_GUARDIANS: &str = "get_guardians()";
const PENDING_ADDITION: &str = "pending_addition(Identity)";
const PENDING_REVOCATION: &str = "pending_revocation(Identity)";

/// Result of `request_addition`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdditionOutcome {
    /// Empty guardian set: the candidate is active right away.
    Activated,
    Pending { execute_after: Timestamp },
}

/// Entry points of the guardian manager, in payload form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardianCall {
    RequestAddition(Identity),
    ConfirmAddition(Identity),
    CancelAddition(Identity),
    RequestRevocation(Identity),
    ConfirmRevocation(Identity),
    CancelRevocation(Identity),
    GuardianCount,
    IsGuardian(Identity),
    GetGuardians,
    PendingAddition(Identity),
    PendingRevocation(Identity),
}

impl GuardianCall {
    fn signature(&self) -> &'static str {
        match self {
            GuardianCall::RequestAddition(_) => REQUEST_ADDITION,
            GuardianCall::ConfirmAddition(_) => CONFIRM_ADDITION,
            GuardianCall::CancelAddition(_) => CANCEL_ADDITION,
            GuardianCall::RequestRevocation(_) => REQUEST_REVOCATION,
            GuardianCall::ConfirmRevocation(_) => CONFIRM_REVOCATION,
            GuardianCall::CancelRevocation(_) => CANCEL_REVOCATION,
            GuardianCall::GuardianCount => GUARDIAN_COUNT,
            GuardianCall::IsGuardian(_) => IS_GUARDIAN,
            GuardianCall::GetGuardians => GET_GUARDIANS,
            GuardianCall::PendingAddition(_) => PENDING_ADDITION,
            GuardianCall::PendingRevocation(_) => PENDING_REVOCATION,
        }
    }

    fn target(&self) -> Option<Identity> {
        match self {
            GuardianCall::RequestAddition(t)
            | GuardianCall::ConfirmAddition(t)
            | GuardianCall::CancelAddition(t)
            | GuardianCall::RequestRevocation(t)
            | GuardianCall::ConfirmRevocation(t)
            | GuardianCall::CancelRevocation(t)
            | GuardianCall::IsGuardian(t)
            | GuardianCall::PendingAddition(t)
            | GuardianCall::PendingRevocation(t) => Some(*t),
            GuardianCall::GuardianCount | GuardianCall::GetGuardians => None,
        }
    }

    /// Build the payload acting on `account`.
    pub fn to_call(&self, account: Identity) -> Result<Call, WalletError> {
        match self.target() {
            Some(target) => Call::new(self.signature(), account, &target),
            None => Call::new(self.signature(), account, &()),
        }
    }

    pub fn decode(call: &Call) -> Result<Self, WalletError> {
        let with_target = |f: fn(Identity) -> GuardianCall| -> Result<GuardianCall, WalletError> {
            Ok(f(call.decode_args::<Identity>()?))
        };
        if call.is(REQUEST_ADDITION) {
            with_target(GuardianCall::RequestAddition)
        } else if call.is(CONFIRM_ADDITION) {
            with_target(GuardianCall::ConfirmAddition)
        } else if call.is(CANCEL_ADDITION) {
            with_target(GuardianCall::CancelAddition)
        } else if call.is(REQUEST_REVOCATION) {
            with_target(GuardianCall::RequestRevocation)
        } else if call.is(CONFIRM_REVOCATION) {
            with_target(GuardianCall::ConfirmRevocation)
        } else if call.is(CANCEL_REVOCATION) {
            with_target(GuardianCall::CancelRevocation)
        } else if call.is(GUARDIAN_COUNT) {
            Ok(GuardianCall::GuardianCount)
        } else if call.is(IS_GUARDIAN) {
            with_target(GuardianCall::IsGuardian)
        } else if call.is(GET_GUARDIANS) {
            Ok(GuardianCall::GetGuardians)
        } else if call.is(PENDING_ADDITION) {
            with_target(GuardianCall::PendingAddition)
        } else if call.is(PENDING_REVOCATION) {
            with_target(GuardianCall::PendingRevocation)
        } else {
            Err(call.unknown_selector())
        }
    }

    fn is_view(&self) -> bool {
        matches!(
            self,
            GuardianCall::GuardianCount
                | GuardianCall::IsGuardian(_)
                | GuardianCall::GetGuardians
                | GuardianCall::PendingAddition(_)
                | GuardianCall::PendingRevocation(_)
        )
    }
}

pub struct GuardianManager {
    id: ModuleId,
    security_period: u64,
    security_window: u64,
}

impl GuardianManager {
    pub fn new(id: ModuleId, config: &GuardianConfig) -> Self {
        Self {
            id,
            security_period: config.security_period_secs,
            security_window: config.security_window_secs,
        }
    }

    pub fn security_period(&self) -> u64 {
        self.security_period
    }

    pub fn security_window(&self) -> u64 {
        self.security_window
    }

    /// Classify and vet a candidate against the current owner.
    fn eligible_guardian(&self, state: &State, account: &Identity, candidate: &Identity) -> Result<Guardian, WalletError> {
        let owner = state.accounts.owner(account)?;
        if *candidate == owner {
            return Err(WalletError::GuardianIsOwner(*candidate));
        }
        let guardian = state.accounts.probe_guardian(candidate)?;
        if guardian.controller(&state.accounts) == Some(owner) {
            return Err(WalletError::GuardianIsOwner(*candidate));
        }
        if state.authorizations.is_active_guardian(account, candidate) {
            return Err(WalletError::AlreadyGuardian(*candidate));
        }
        Ok(guardian)
    }

    /// Fetch a pending change and check `now` falls in its confirmation window.
    fn matured(
        &self,
        state: &State,
        now: Timestamp,
        account: &Identity,
        target: &Identity,
        kind: ChangeKind,
    ) -> Result<PendingGuardianChange, WalletError> {
        let pending = state
            .authorizations
            .pending_change(account, target, kind)
            .ok_or(match kind {
                ChangeKind::Addition => WalletError::NoPendingAddition(*target),
                ChangeKind::Revocation => WalletError::NoPendingRevocation(*target),
            })?;
        if now < pending.execute_after {
            return Err(WalletError::TooEarly {
                now,
                execute_after: pending.execute_after,
            });
        }
        let deadline = pending.deadline(self.security_window);
        if now >= deadline {
            return Err(WalletError::TooLate { now, deadline });
        }
        Ok(pending)
    }

    fn live_pending(&self, state: &State, now: Timestamp, account: &Identity, target: &Identity, kind: ChangeKind) -> bool {
        state
            .authorizations
            .pending_change(account, target, kind)
            .is_some_and(|p| p.is_live(now, self.security_window))
    }

    pub fn request_addition(
        &self,
        ctx: &mut CallContext<'_>,
        account: Identity,
        candidate: Identity,
    ) -> Result<AdditionOutcome, WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_owner_or_module(&account, &ctx.caller, &state.registry)?;
        let guardian = self.eligible_guardian(state, &account, &candidate)?;
        if self.live_pending(state, ctx.now, &account, &candidate, ChangeKind::Addition) {
            return Err(WalletError::AdditionAlreadyPending(candidate));
        }

        if state.authorizations.guardian_count(&account) == 0 {
            state
                .authorizations
                .add_guardian(&state.accounts, &self.id, &account, guardian)?;
            state
                .authorizations
                .clear_pending(&state.accounts, &self.id, &account, &candidate, ChangeKind::Addition)?;
            state.events.emit(Event::GuardianAdded {
                account,
                guardian: candidate,
            });
            info!("Wallet {}: first guardian {} active", account, candidate);
            return Ok(AdditionOutcome::Activated);
        }

        let execute_after = ctx.now.saturating_add(self.security_period);
        state.authorizations.set_pending(
            &state.accounts,
            &self.id,
            &account,
            PendingGuardianChange {
                target: candidate,
                kind: ChangeKind::Addition,
                execute_after,
            },
        )?;
        state.events.emit(Event::GuardianAdditionRequested {
            account,
            guardian: candidate,
            execute_after,
        });
        info!(
            "Wallet {}: guardian addition of {} requested, executable after {}",
            account, candidate, execute_after
        );
        Ok(AdditionOutcome::Pending { execute_after })
    }

    /// Anyone may confirm a matured addition.
    pub fn confirm_addition(&self, ctx: &mut CallContext<'_>, account: Identity, candidate: Identity) -> Result<(), WalletError> {
        let state = &mut *ctx.state;
        state.accounts.wallet(&account)?;
        self.matured(state, ctx.now, &account, &candidate, ChangeKind::Addition)?;
        let guardian = self.eligible_guardian(state, &account, &candidate)?;

        state
            .authorizations
            .clear_pending(&state.accounts, &self.id, &account, &candidate, ChangeKind::Addition)?;
        state
            .authorizations
            .add_guardian(&state.accounts, &self.id, &account, guardian)?;
        state.events.emit(Event::GuardianAdded {
            account,
            guardian: candidate,
        });
        info!("Wallet {}: guardian {} added", account, candidate);
        Ok(())
    }

    pub fn cancel_addition(&self, ctx: &mut CallContext<'_>, account: Identity, candidate: Identity) -> Result<(), WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_owner_or_module(&account, &ctx.caller, &state.registry)?;
        state
            .authorizations
            .clear_pending(&state.accounts, &self.id, &account, &candidate, ChangeKind::Addition)?
            .ok_or(WalletError::NoPendingAddition(candidate))?;
        state.events.emit(Event::GuardianAdditionCancelled {
            account,
            guardian: candidate,
        });
        info!("Wallet {}: guardian addition of {} cancelled", account, candidate);
        Ok(())
    }

    pub fn request_revocation(
        &self,
        ctx: &mut CallContext<'_>,
        account: Identity,
        guardian: Identity,
    ) -> Result<Timestamp, WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_owner_or_module(&account, &ctx.caller, &state.registry)?;
        if !state.authorizations.is_active_guardian(&account, &guardian) {
            return Err(WalletError::NotAnExistingGuardian(guardian));
        }
        if self.live_pending(state, ctx.now, &account, &guardian, ChangeKind::Revocation) {
            return Err(WalletError::RevocationAlreadyPending(guardian));
        }

        let execute_after = ctx.now.saturating_add(self.security_period);
        state.authorizations.set_pending(
            &state.accounts,
            &self.id,
            &account,
            PendingGuardianChange {
                target: guardian,
                kind: ChangeKind::Revocation,
                execute_after,
            },
        )?;
        state.events.emit(Event::GuardianRevocationRequested {
            account,
            guardian,
            execute_after,
        });
        info!(
            "Wallet {}: guardian revocation of {} requested, executable after {}",
            account, guardian, execute_after
        );
        Ok(execute_after)
    }

    /// Anyone may confirm a matured revocation.
    pub fn confirm_revocation(&self, ctx: &mut CallContext<'_>, account: Identity, guardian: Identity) -> Result<(), WalletError> {
        let state = &mut *ctx.state;
        state.accounts.wallet(&account)?;
        self.matured(state, ctx.now, &account, &guardian, ChangeKind::Revocation)?;
        if !state.authorizations.is_active_guardian(&account, &guardian) {
            return Err(WalletError::NotAnExistingGuardian(guardian));
        }

        state
            .authorizations
            .clear_pending(&state.accounts, &self.id, &account, &guardian, ChangeKind::Revocation)?;
        state
            .authorizations
            .revoke_guardian(&state.accounts, &self.id, &account, &guardian)?;
        state.events.emit(Event::GuardianRevoked { account, guardian });
        info!("Wallet {}: guardian {} revoked", account, guardian);
        Ok(())
    }

    pub fn cancel_revocation(&self, ctx: &mut CallContext<'_>, account: Identity, guardian: Identity) -> Result<(), WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_owner_or_module(&account, &ctx.caller, &state.registry)?;
        state
            .authorizations
            .clear_pending(&state.accounts, &self.id, &account, &guardian, ChangeKind::Revocation)?
            .ok_or(WalletError::NoPendingRevocation(guardian))?;
        state.events.emit(Event::GuardianRevocationCancelled { account, guardian });
        info!("Wallet {}: guardian revocation of {} cancelled", account, guardian);
        Ok(())
    }

    // --- views ---

    pub fn guardian_count(&self, state: &State, account: &Identity) -> usize {
        state.authorizations.guardian_count(account)
    }

    pub fn is_guardian(&self, state: &State, account: &Identity, identity: &Identity) -> bool {
        state.is_guardian(account, identity)
    }

    /// Active guardian identities in activation order
    pub fn get_guardians(&self, state: &State, account: &Identity) -> Vec<Identity> {
        state
            .authorizations
            .guardians(account)
            .iter()
            .map(Guardian::identity)
            .collect()
    }

    fn pending(&self, state: &State, account: &Identity, target: &Identity, kind: ChangeKind) -> Option<Timestamp> {
        state
            .authorizations
            .pending_change(account, target, kind)
            .map(|p| p.execute_after)
    }
}

impl Module for GuardianManager {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &'static str {
        "GuardianManager"
    }

    fn call(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Vec<u8>, WalletError> {
        let account = call.account;
        match GuardianCall::decode(call)? {
            GuardianCall::RequestAddition(t) => encode_return(&self.request_addition(ctx, account, t)?),
            GuardianCall::ConfirmAddition(t) => encode_return(&self.confirm_addition(ctx, account, t)?),
            GuardianCall::CancelAddition(t) => encode_return(&self.cancel_addition(ctx, account, t)?),
            GuardianCall::RequestRevocation(t) => encode_return(&self.request_revocation(ctx, account, t)?),
            GuardianCall::ConfirmRevocation(t) => encode_return(&self.confirm_revocation(ctx, account, t)?),
            GuardianCall::CancelRevocation(t) => encode_return(&self.cancel_revocation(ctx, account, t)?),
            _ => self.static_call(ctx.state, ctx.now, call),
        }
    }

    fn static_call(&self, state: &State, _now: Timestamp, call: &Call) -> Result<Vec<u8>, WalletError> {
        let account = call.account;
        let decoded = GuardianCall::decode(call)?;
        debug!(?decoded, account = %account, "guardian view");
        match decoded {
            GuardianCall::GuardianCount => encode_return(&(self.guardian_count(state, &account) as u64)),
            GuardianCall::IsGuardian(id) => encode_return(&self.is_guardian(state, &account, &id)),
            GuardianCall::GetGuardians => encode_return(&self.get_guardians(state, &account)),
            GuardianCall::PendingAddition(t) => encode_return(&self.pending(state, &account, &t, ChangeKind::Addition)),
            GuardianCall::PendingRevocation(t) => {
                encode_return(&self.pending(state, &account, &t, ChangeKind::Revocation))
            }
            _ => Err(call.unknown_selector()),
        }
    }

    fn signature_policy(&self, _state: &State, call: &Call) -> Result<SignaturePolicy, WalletError> {
        let decoded = GuardianCall::decode(call)?;
        if decoded.is_view() {
            return Err(call.unknown_selector());
        }
        Ok(match decoded {
            GuardianCall::ConfirmAddition(_) | GuardianCall::ConfirmRevocation(_) => SignaturePolicy::Anyone,
            _ => SignaturePolicy::OwnerOnly,
        })
    }
}
