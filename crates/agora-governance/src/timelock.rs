//! Delay gate between approval and execution.
//!
//! Operations are keyed by `blake3(borsh(targets, values, payloads, eta))`;
//! execution must present exactly the queued actions and eta.

use crate::error::GovernanceError;
use crate::proposal::Action;
use crate::roles::{Role, RoleRegistry};
use agora_types::{Address, Amount, Hash, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a queued operation.
pub fn operation_id(actions: &[Action], eta: Timestamp) -> Result<Hash, GovernanceError> {
    let targets: Vec<Address> = actions.iter().map(|a| a.target).collect();
    let values: Vec<Amount> = actions.iter().map(|a| a.value).collect();
    let payloads: Vec<&[u8]> = actions.iter().map(|a| a.payload.as_slice()).collect();

    Ok(Hash::of_borsh(&(targets, values, payloads, eta))?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockGate {
    min_delay: Timestamp,
    grace_period: Timestamp,
    /// operation id -> eta
    #[serde(default)]
    queued: BTreeMap<Hash, Timestamp>,
}

impl TimelockGate {
    pub fn new(min_delay: Timestamp, grace_period: Timestamp) -> Self {
        Self {
            min_delay,
            grace_period,
            queued: BTreeMap::new(),
        }
    }

    pub fn min_delay(&self) -> Timestamp {
        self.min_delay
    }

    pub fn grace_period(&self) -> Timestamp {
        self.grace_period
    }

    pub fn is_queued(&self, id: &Hash) -> bool {
        self.queued.contains_key(id)
    }

    pub fn eta_of(&self, id: &Hash) -> Option<Timestamp> {
        self.queued.get(id).copied()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Drop operations whose grace period ended before `now`.
    pub fn prune_expired(&mut self, now: Timestamp) -> usize {
        let grace_period = self.grace_period;
        let before = self.queued.len();
        self.queued
            .retain(|_, eta| eta.saturating_add(grace_period) >= now);
        before - self.queued.len()
    }

    /// Queue `actions` for execution at `now + min_delay`.
    ///
    /// The caller must hold `Proposer` or `Executor`. Expired operations are
    /// pruned first.
    pub fn queue(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        actions: &[Action],
        now: Timestamp,
    ) -> Result<(Hash, Timestamp), GovernanceError> {
        roles.require_any(&[Role::Proposer, Role::Executor], caller)?;

        let pruned = self.prune_expired(now);
        if pruned > 0 {
            tracing::debug!(pruned, "Expired operations dropped");
        }

        let eta = now
            .checked_add(self.min_delay)
            .ok_or_else(|| GovernanceError::InvalidParameter("eta overflow".to_string()))?;
        let id = operation_id(actions, eta)?;
        if self.queued.contains_key(&id) {
            return Err(GovernanceError::AlreadyQueued);
        }
        self.queued.insert(id, eta);

        tracing::debug!(operation = %id, eta, "Operation queued");
        Ok((id, eta))
    }

    /// Release a matured operation, removing it from the queue.
    ///
    /// The caller must hold `Executor`.
    pub fn execute(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        actions: &[Action],
        eta: Timestamp,
        now: Timestamp,
    ) -> Result<Hash, GovernanceError> {
        roles.require(Role::Executor, caller)?;

        let id = operation_id(actions, eta)?;
        if !self.queued.contains_key(&id) {
            return Err(GovernanceError::HashMismatch);
        }
        if now < eta {
            return Err(GovernanceError::NotReady { eta, now });
        }
        if now > eta.saturating_add(self.grace_period) {
            return Err(GovernanceError::InvalidState(format!(
                "operation {} is past its grace period",
                id
            )));
        }
        self.queued.remove(&id);

        tracing::debug!(operation = %id, "Operation released");
        Ok(id)
    }
}
