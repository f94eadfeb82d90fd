//! Social recovery: a guardian quorum replaces a lost owner key.
//!
//! Recovery entry points are reached through the relay, which has already
//! verified the guardian signatures, so the state-changing calls only accept
//! an authorized module as caller. Finalization is open to anyone once the
//! recovery period has elapsed.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{CallContext, Module, SignaturePolicy};
use crate::account::RecoveryRecord;
use crate::config::RecoveryConfig;
use crate::encoding::{encode_return, Call};
use crate::error::WalletError;
use crate::events::Event;
use crate::identity::{Identity, ModuleId, Timestamp};
use crate::vm::State;

const EXECUTE_RECOVERY: &str = "execute_recovery(Identity)";
const FINALIZE_RECOVERY: &str = "finalize_recovery()";
const CANCEL_RECOVERY: &str = "cancel_recovery()";
const TRANSFER_OWNERSHIP: &str = "transfer_ownership(Identity)";
const GET_RECOVERY: &str = "get_recovery()";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryCall {
    ExecuteRecovery(Identity),
    FinalizeRecovery,
    CancelRecovery,
    TransferOwnership(Identity),
    GetRecovery,
}

impl RecoveryCall {
    pub fn to_call(&self, account: Identity) -> Result<Call, WalletError> {
        match self {
            RecoveryCall::ExecuteRecovery(owner) => Call::new(EXECUTE_RECOVERY, account, owner),
            RecoveryCall::FinalizeRecovery => Call::new(FINALIZE_RECOVERY, account, &()),
            RecoveryCall::CancelRecovery => Call::new(CANCEL_RECOVERY, account, &()),
            RecoveryCall::TransferOwnership(owner) => Call::new(TRANSFER_OWNERSHIP, account, owner),
            RecoveryCall::GetRecovery => Call::new(GET_RECOVERY, account, &()),
        }
    }

    pub fn decode(call: &Call) -> Result<Self, WalletError> {
        if call.is(EXECUTE_RECOVERY) {
            Ok(RecoveryCall::ExecuteRecovery(call.decode_args()?))
        } else if call.is(FINALIZE_RECOVERY) {
            Ok(RecoveryCall::FinalizeRecovery)
        } else if call.is(CANCEL_RECOVERY) {
            Ok(RecoveryCall::CancelRecovery)
        } else if call.is(TRANSFER_OWNERSHIP) {
            Ok(RecoveryCall::TransferOwnership(call.decode_args()?))
        } else if call.is(GET_RECOVERY) {
            Ok(RecoveryCall::GetRecovery)
        } else {
            Err(call.unknown_selector())
        }
    }
}

pub struct RecoveryManager {
    id: ModuleId,
    recovery_period: u64,
}

impl RecoveryManager {
    pub fn new(id: ModuleId, config: &RecoveryConfig) -> Self {
        Self {
            id,
            recovery_period: config.recovery_period_secs,
        }
    }

    pub fn recovery_period(&self) -> u64 {
        self.recovery_period
    }

    /// A new owner must be set, differ from the current one and not be a
    /// guardian of the wallet.
    fn validate_new_owner(&self, state: &State, account: &Identity, new_owner: &Identity) -> Result<(), WalletError> {
        let owner = state.accounts.owner(account)?;
        if new_owner.is_null() || *new_owner == owner || state.is_guardian(account, new_owner) {
            return Err(WalletError::InvalidNewOwner(*new_owner));
        }
        Ok(())
    }

    pub fn execute_recovery(
        &self,
        ctx: &mut CallContext<'_>,
        account: Identity,
        recovery_owner: Identity,
    ) -> Result<Timestamp, WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_module(&account, &ctx.caller, &state.registry)?;
        self.validate_new_owner(state, &account, &recovery_owner)?;
        if state.authorizations.recovery(&account).is_some() {
            return Err(WalletError::RecoveryAlreadyPending(account));
        }
        let guardian_count = state.authorizations.guardian_count(&account);
        if guardian_count == 0 {
            return Err(WalletError::NoGuardians(account));
        }

        let execute_after = ctx.now.saturating_add(self.recovery_period);
        state.authorizations.set_recovery(
            &state.accounts,
            &self.id,
            &account,
            RecoveryRecord {
                recovery_owner,
                execute_after,
                guardian_count: guardian_count as u64,
            },
        )?;
        state.events.emit(Event::RecoveryExecuted {
            account,
            recovery_owner,
            execute_after,
        });
        warn!(
            "Wallet {}: recovery to {} started, finalizable after {}",
            account, recovery_owner, execute_after
        );
        Ok(execute_after)
    }

    pub fn finalize_recovery(&self, ctx: &mut CallContext<'_>, account: Identity) -> Result<Identity, WalletError> {
        let state = &mut *ctx.state;
        let record = state
            .authorizations
            .recovery(&account)
            .ok_or(WalletError::NoOngoingRecovery(account))?;
        if ctx.now < record.execute_after {
            return Err(WalletError::TooEarly {
                now: ctx.now,
                execute_after: record.execute_after,
            });
        }
        // a guardian may have been added since the recovery started
        self.validate_new_owner(state, &account, &record.recovery_owner)?;

        state
            .authorizations
            .clear_recovery(&state.accounts, &self.id, &account)?;
        state
            .accounts
            .set_owner(&self.id, &account, record.recovery_owner)?;
        state.events.emit(Event::RecoveryFinalized {
            account,
            new_owner: record.recovery_owner,
        });
        state.events.emit(Event::OwnerChanged {
            account,
            new_owner: record.recovery_owner,
        });
        info!("Wallet {}: recovery finalized, owner is now {}", account, record.recovery_owner);
        Ok(record.recovery_owner)
    }

    pub fn cancel_recovery(&self, ctx: &mut CallContext<'_>, account: Identity) -> Result<(), WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_module(&account, &ctx.caller, &state.registry)?;
        let record = state
            .authorizations
            .clear_recovery(&state.accounts, &self.id, &account)?
            .ok_or(WalletError::NoOngoingRecovery(account))?;
        state.events.emit(Event::RecoveryCancelled {
            account,
            recovery_owner: record.recovery_owner,
        });
        info!("Wallet {}: recovery to {} cancelled", account, record.recovery_owner);
        Ok(())
    }

    /// Immediate owner change, authorized by the owner together with a
    /// guardian majority. Not allowed while a recovery is pending.
    pub fn transfer_ownership(&self, ctx: &mut CallContext<'_>, account: Identity, new_owner: Identity) -> Result<(), WalletError> {
        let state = &mut *ctx.state;
        state
            .accounts
            .ensure_module(&account, &ctx.caller, &state.registry)?;
        self.validate_new_owner(state, &account, &new_owner)?;
        if state.authorizations.recovery(&account).is_some() {
            return Err(WalletError::RecoveryAlreadyPending(account));
        }

        state.accounts.set_owner(&self.id, &account, new_owner)?;
        state.events.emit(Event::OwnershipTransferred { account, new_owner });
        state.events.emit(Event::OwnerChanged { account, new_owner });
        info!("Wallet {}: ownership transferred to {}", account, new_owner);
        Ok(())
    }

    pub fn get_recovery(&self, state: &State, account: &Identity) -> Option<RecoveryRecord> {
        state.authorizations.recovery(account)
    }
}

impl Module for RecoveryManager {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &'static str {
        "RecoveryManager"
    }

    fn call(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Vec<u8>, WalletError> {
        let account = call.account;
        match RecoveryCall::decode(call)? {
            RecoveryCall::ExecuteRecovery(owner) => encode_return(&self.execute_recovery(ctx, account, owner)?),
            RecoveryCall::FinalizeRecovery => encode_return(&self.finalize_recovery(ctx, account)?),
            RecoveryCall::CancelRecovery => encode_return(&self.cancel_recovery(ctx, account)?),
            RecoveryCall::TransferOwnership(owner) => encode_return(&self.transfer_ownership(ctx, account, owner)?),
            RecoveryCall::GetRecovery => encode_return(&self.get_recovery(ctx.state, &account)),
        }
    }

    fn static_call(&self, state: &State, _now: Timestamp, call: &Call) -> Result<Vec<u8>, WalletError> {
        match RecoveryCall::decode(call)? {
            RecoveryCall::GetRecovery => encode_return(&self.get_recovery(state, &call.account)),
            _ => Err(call.unknown_selector()),
        }
    }

    fn signature_policy(&self, _state: &State, call: &Call) -> Result<SignaturePolicy, WalletError> {
        match RecoveryCall::decode(call)? {
            RecoveryCall::ExecuteRecovery(_) | RecoveryCall::CancelRecovery => Ok(SignaturePolicy::GuardianMajority),
            RecoveryCall::FinalizeRecovery => Ok(SignaturePolicy::Anyone),
            RecoveryCall::TransferOwnership(_) => Ok(SignaturePolicy::OwnerAndGuardianMajority),
            RecoveryCall::GetRecovery => Err(call.unknown_selector()),
        }
    }
}
