//! Role-based access control shared by every component.
//!
//! Membership checks fail closed: an account holds a role only if it was
//! explicitly granted.

use crate::error::GovernanceError;
use agora_types::Address;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Capabilities an account may hold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum Role {
    /// Treasury allocations, decay rates, role administration
    Governor,
    /// Grants reputation
    ReputationManager,
    /// May queue operations on the timelock
    Proposer,
    /// May execute matured timelock operations
    Executor,
}

impl Role {
    pub fn all() -> [Role; 4] {
        [Role::Governor, Role::ReputationManager, Role::Proposer, Role::Executor]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Governor => "governor",
            Role::ReputationManager => "reputation-manager",
            Role::Proposer => "proposer",
            Role::Executor => "executor",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "governor" => Ok(Role::Governor),
            "reputation-manager" => Ok(Role::ReputationManager),
            "proposer" => Ok(Role::Proposer),
            "executor" => Ok(Role::Executor),
            other => Err(GovernanceError::InvalidParameter(format!("unknown role: {}", other))),
        }
    }
}

/// Role membership sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// Fail with `Unauthorized` unless `account` holds `role`.
    pub fn require(&self, role: Role, account: &Address) -> Result<(), GovernanceError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized(format!(
                "{} lacks role {}",
                account, role
            )))
        }
    }

    /// Fail unless `account` holds at least one of `roles`.
    pub fn require_any(&self, roles: &[Role], account: &Address) -> Result<(), GovernanceError> {
        if roles.iter().any(|role| self.has_role(*role, account)) {
            return Ok(());
        }
        let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        Err(GovernanceError::Unauthorized(format!(
            "{} lacks any of [{}]",
            account,
            names.join(", ")
        )))
    }

    /// Genesis-time grant without an authority check.
    pub(crate) fn bootstrap(&mut self, role: Role, account: Address) {
        self.members.entry(role).or_default().insert(account);
    }

    /// Grant `role` to `account`. Governor only.
    ///
    /// Returns `false` if the account already held the role.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> Result<bool, GovernanceError> {
        self.require(Role::Governor, caller)?;
        let added = self.members.entry(role).or_default().insert(account);
        if added {
            tracing::info!(%role, %account, by = %caller, "Role granted");
        }
        Ok(added)
    }

    /// Revoke `role` from `account`. Governor only; the last governor stays.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: &Address,
    ) -> Result<bool, GovernanceError> {
        self.require(Role::Governor, caller)?;

        if role == Role::Governor
            && self.has_role(Role::Governor, account)
            && self.members(Role::Governor).len() == 1
        {
            return Err(GovernanceError::InvalidParameter(
                "cannot revoke the last governor".to_string(),
            ));
        }

        let removed = self
            .members
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false);
        if removed {
            tracing::info!(%role, %account, by = %caller, "Role revoked");
        }
        Ok(removed)
    }

    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
