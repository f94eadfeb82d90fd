//! Pluggable modules: code units a wallet authorizes to act on it.

pub mod guardian_manager;
pub mod recovery_manager;

pub use guardian_manager::{AdditionOutcome, GuardianCall, GuardianManager};
pub use recovery_manager::{RecoveryCall, RecoveryManager};

use serde::{Deserialize, Serialize};

use crate::encoding::Call;
use crate::error::WalletError;
use crate::identity::{Identity, ModuleId, Timestamp};
use crate::vm::State;

/// Execution context of one module invocation.
pub struct CallContext<'a> {
    pub state: &'a mut State,
    /// Authenticated caller of this invocation
    pub caller: Identity,
    pub now: Timestamp,
}

pub trait Module: Send + Sync {
    fn id(&self) -> ModuleId;

    fn name(&self) -> &'static str;

    /// State-changing entry point. Runs inside the caller's atomic unit.
    fn call(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Vec<u8>, WalletError>;

    /// Read-only entry point.
    fn static_call(&self, state: &State, now: Timestamp, call: &Call) -> Result<Vec<u8>, WalletError>;

    /// Signatures a relayed `call` must carry.
    fn signature_policy(&self, state: &State, call: &Call) -> Result<SignaturePolicy, WalletError>;
}

/// Signer sets accepted for a relayed action.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// No signatures; anyone may relay. Never refunded.
    Anyone,
    OwnerOnly,
    /// `ceil(n/2)` guardians, owner excluded.
    GuardianMajority,
    /// The owner plus `ceil(n/2)` guardians.
    OwnerAndGuardianMajority,
}

impl SignaturePolicy {
    pub fn requires_owner(&self) -> bool {
        matches!(self, Self::OwnerOnly | Self::OwnerAndGuardianMajority)
    }

    pub fn guardian_signatures(&self, guardian_count: usize) -> usize {
        match self {
            Self::Anyone | Self::OwnerOnly => 0,
            Self::GuardianMajority | Self::OwnerAndGuardianMajority => guardian_count.div_ceil(2),
        }
    }

    /// Exact number of signatures a request must carry
    pub fn required_signatures(&self, guardian_count: usize) -> usize {
        usize::from(self.requires_owner()) + self.guardian_signatures(guardian_count)
    }

    pub fn refundable(&self) -> bool {
        !matches!(self, Self::Anyone)
    }
}
