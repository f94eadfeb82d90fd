use thiserror::Error;

use crate::identity::{Identity, Timestamp};

/// Broad failure categories. Every error aborts the triggering call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the owner, module or guardian-quorum capability.
    Authorization,
    /// Operation is invalid for the current lifecycle state.
    State,
    /// Too early or too late relative to a stored deadline.
    Timing,
    /// Malformed or disallowed input.
    Input,
    /// Stale or reused relay nonce.
    Replay,
    /// Balance movement could not be settled.
    Ledger,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet {0} is already initialized")]
    AlreadyInitialized(Identity),
    #[error("wallet {0} is not initialized")]
    NotInitialized(Identity),
    #[error("module set must not be empty")]
    EmptyModuleSet,
    #[error("module {0} appears more than once")]
    DuplicateModule(Identity),
    #[error("null identity is not allowed here")]
    NullIdentity,
    #[error("module {0} is not authorized on this wallet")]
    ModuleNotAuthorized(Identity),
    #[error("module {0} is not registered")]
    ModuleNotRegistered(Identity),
    #[error("module {0} is already registered")]
    ModuleAlreadyRegistered(Identity),
    #[error("upgrader {0} is not registered")]
    UpgraderNotRegistered(Identity),
    #[error("upgrader {0} is already registered")]
    UpgraderAlreadyRegistered(Identity),
    #[error("upgrader {0} is already an authorized module")]
    UpgraderAlreadyAuthorized(Identity),
    #[error("wallet must keep at least one authorized module")]
    LastModule,
    #[error("no code deployed for module {0}")]
    UnknownModule(Identity),
    #[error("caller {0} is neither the wallet owner nor an authorized module")]
    CallerNotOwnerOrModule(Identity),
    #[error("caller {0} is not an authorized module")]
    CallerNotModule(Identity),
    #[error("caller {0} does not own the registry")]
    CallerNotRegistryOwner(Identity),
    #[error("guardian {0} resolves to the wallet owner")]
    GuardianIsOwner(Identity),
    #[error("{0} is already a guardian")]
    AlreadyGuardian(Identity),
    #[error("addition of {0} as guardian is already pending")]
    AdditionAlreadyPending(Identity),
    #[error("revocation of guardian {0} is already pending")]
    RevocationAlreadyPending(Identity),
    #[error("no pending addition for {0}")]
    NoPendingAddition(Identity),
    #[error("no pending revocation for {0}")]
    NoPendingRevocation(Identity),
    #[error("{0} is not an existing guardian")]
    NotAnExistingGuardian(Identity),
    #[error("guardian {0} must be an externally owned identity or expose an owner")]
    GuardianMustBeEOAOrHaveOwner(Identity),
    #[error("too early: now {now}, executable after {execute_after}")]
    TooEarly {
        now: Timestamp,
        execute_after: Timestamp,
    },
    #[error("too late: now {now}, window closed at {deadline}")]
    TooLate { now: Timestamp, deadline: Timestamp },
    #[error("signatures are not ordered by strictly increasing signer")]
    InvalidSignatureOrder,
    #[error("signatures do not satisfy the required policy")]
    InvalidSignatures,
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("payload targets wallet {payload} but request is for {request}")]
    WalletMismatch {
        request: Identity,
        payload: Identity,
    },
    #[error("unknown selector 0x{0}")]
    UnknownSelector(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("wallet {0} has no guardians")]
    NoGuardians(Identity),
    #[error("a recovery is already pending for wallet {0}")]
    RecoveryAlreadyPending(Identity),
    #[error("no ongoing recovery for wallet {0}")]
    NoOngoingRecovery(Identity),
    #[error("invalid new owner {0}")]
    InvalidNewOwner(Identity),
    #[error("insufficient {asset} balance: need {needed}, have {available}")]
    InsufficientFunds {
        asset: String,
        needed: u64,
        available: u64,
    },
    #[error("{0} balance overflow")]
    BalanceOverflow(String),
    #[error("gas limit {limit} exceeded: call needs {needed}")]
    GasLimitExceeded { limit: u64, needed: u64 },
    #[error("configuration error: {0}")]
    Config(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        use WalletError::*;
        match self {
            ModuleNotAuthorized(_)
            | CallerNotOwnerOrModule(_)
            | CallerNotModule(_)
            | CallerNotRegistryOwner(_)
            | InvalidSignatures => ErrorKind::Authorization,
            AlreadyInitialized(_)
            | NotInitialized(_)
            | ModuleNotRegistered(_)
            | ModuleAlreadyRegistered(_)
            | UpgraderNotRegistered(_)
            | UpgraderAlreadyRegistered(_)
            | UpgraderAlreadyAuthorized(_)
            | LastModule
            | UnknownModule(_)
            | AlreadyGuardian(_)
            | AdditionAlreadyPending(_)
            | RevocationAlreadyPending(_)
            | NoPendingAddition(_)
            | NoPendingRevocation(_)
            | NotAnExistingGuardian(_)
            | NoGuardians(_)
            | RecoveryAlreadyPending(_)
            | NoOngoingRecovery(_) => ErrorKind::State,
            TooEarly { .. } | TooLate { .. } => ErrorKind::Timing,
            EmptyModuleSet
            | DuplicateModule(_)
            | NullIdentity
            | GuardianIsOwner(_)
            | GuardianMustBeEOAOrHaveOwner(_)
            | InvalidSignatureOrder
            | WalletMismatch { .. }
            | UnknownSelector(_)
            | MalformedPayload(_)
            | InvalidNewOwner(_)
            | Config(_) => ErrorKind::Input,
            InvalidNonce { .. } => ErrorKind::Replay,
            InsufficientFunds { .. } | BalanceOverflow(_) | GasLimitExceeded { .. } => ErrorKind::Ledger,
        }
    }
}

impl From<bincode::Error> for WalletError {
    fn from(err: bincode::Error) -> Self {
        WalletError::MalformedPayload(err.to_string())
    }
}
