//! Calls a proposal can make, and the component addresses they target.

use crate::error::GovernanceError;
use crate::proposal::Action;
use crate::roles::Role;
use agora_types::amount::serde_tokens;
use agora_types::{Address, Amount, BasisPoints};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub const TREASURY_ADDRESS: Address = Address::system(1);
pub const REPUTATION_ADDRESS: Address = Address::system(2);
pub const LEDGER_ADDRESS: Address = Address::system(3);
pub const ROLES_ADDRESS: Address = Address::system(4);
/// Identity actions execute as; holds `Governor`.
pub const TIMELOCK_ADDRESS: Address = Address::system(5);
/// Identity of the proposal engine; holds `Proposer` and `Executor`.
pub const GOVERNOR_ADDRESS: Address = Address::system(6);

/// Component operation encoded into an action payload.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    AllocateFunds {
        recipient: Address,
        #[serde(with = "serde_tokens")]
        amount: Amount,
        purpose: String,
    },
    AllocateTokens {
        token: Address,
        recipient: Address,
        #[serde(with = "serde_tokens")]
        amount: Amount,
        purpose: String,
    },
    UpdateTreasurySplits {
        transaction_fee_bps: BasisPoints,
        burn_bps: BasisPoints,
        reserve_bps: BasisPoints,
    },
    SetDecayRate {
        account: Address,
        rate_bps: BasisPoints,
    },
    SetDefaultDecayRate {
        rate_bps: BasisPoints,
    },
    GrantRole {
        role: Role,
        account: Address,
    },
    RevokeRole {
        role: Role,
        account: Address,
    },
    SetStakingRate {
        rate_bps: BasisPoints,
    },
}

impl Call {
    /// Component the call is addressed to.
    pub fn target(&self) -> Address {
        match self {
            Call::AllocateFunds { .. }
            | Call::AllocateTokens { .. }
            | Call::UpdateTreasurySplits { .. } => TREASURY_ADDRESS,
            Call::SetDecayRate { .. } | Call::SetDefaultDecayRate { .. } => REPUTATION_ADDRESS,
            Call::GrantRole { .. } | Call::RevokeRole { .. } => ROLES_ADDRESS,
            Call::SetStakingRate { .. } => LEDGER_ADDRESS,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, GovernanceError> {
        borsh::to_vec(self)
            .map_err(|e| GovernanceError::InvalidParameter(format!("call encoding: {}", e)))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, GovernanceError> {
        borsh::from_slice(payload)
            .map_err(|e| GovernanceError::InvalidProposal(format!("undecodable payload: {}", e)))
    }

    /// Wrap into an action with the matching target and no value.
    pub fn into_action(self) -> Result<Action, GovernanceError> {
        Ok(Action {
            target: self.target(),
            value: 0,
            payload: self.encode()?,
        })
    }
}

impl Action {
    /// Native payment from the treasury to `recipient`.
    pub fn payment(recipient: Address, amount: Amount) -> Self {
        Action {
            target: recipient,
            value: amount,
            payload: Vec::new(),
        }
    }

    /// Decoded call, or `None` for a plain payment.
    pub fn call(&self) -> Result<Option<Call>, GovernanceError> {
        if self.payload.is_empty() {
            return Ok(None);
        }
        Call::decode(&self.payload).map(Some)
    }

    /// Check the action is well formed before it is proposed or executed.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        match self.call()? {
            None if self.value == 0 => Err(GovernanceError::InvalidProposal(
                "action has neither payload nor value".to_string(),
            )),
            None => Ok(()),
            Some(call) if call.target() != self.target => Err(GovernanceError::InvalidProposal(
                format!("call targets {} but action targets {}", call.target(), self.target),
            )),
            Some(_) if self.value != 0 => Err(GovernanceError::InvalidProposal(
                "component calls carry no value".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}
