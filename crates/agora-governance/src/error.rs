use agora_types::TypesError;
use thiserror::Error;

/// Errors that can occur in governance operations.
///
/// Every error is recoverable: the failed call leaves no state behind and the
/// caller may correct its input or timing and resubmit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("Insufficient stake: staked {staked}, requested {requested}")]
    InsufficientStake { staked: u128, requested: u128 },

    #[error("Insufficient treasury funds: available {available}, requested {requested}")]
    InsufficientTreasuryFunds { available: u128, requested: u128 },

    #[error("Insufficient voting power: have {actual}, threshold {required}")]
    InsufficientVotingPower { actual: u128, required: u128 },

    #[error("Already voted")]
    AlreadyVoted,

    #[error("Voting closed for proposal {0}")]
    VotingClosed(u64),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(u64),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Invalid proposal state: {0}")]
    InvalidState(String),

    #[error("Proposal {0} expired")]
    ProposalExpired(u64),

    #[error("Operation not ready: eta {eta}, now {now}")]
    NotReady { eta: u64, now: u64 },

    #[error("Operation hash mismatch")]
    HashMismatch,

    #[error("Operation already queued")]
    AlreadyQueued,

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Lookup in the future: {requested} > {now}")]
    FutureLookup { requested: u64, now: u64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<TypesError> for GovernanceError {
    fn from(e: TypesError) -> Self {
        match e {
            TypesError::Overflow | TypesError::DivisionByZero => {
                GovernanceError::InvalidAmount(e.to_string())
            }
            other => GovernanceError::InvalidParameter(other.to_string()),
        }
    }
}

impl From<agora_storage::StorageError> for GovernanceError {
    fn from(e: agora_storage::StorageError) -> Self {
        GovernanceError::Storage(e.to_string())
    }
}
