//! Proposal lifecycle management.
//!
//! Proposals go through states:
//! Pending -> Active -> Succeeded/Defeated -> Queued -> Executed/Expired,
//! with Canceled reachable from Pending or Active.
//!
//! Only the terminal markers (canceled, queued eta, executed) are stored;
//! every other state is derived from the clock on each read.

use crate::error::GovernanceError;
use agora_types::{Address, Amount, BasisPoints, Hash, Timestamp};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One step of a proposal's execution.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Action {
    /// Component address, or payment recipient when `payload` is empty
    pub target: Address,
    /// Native currency paid from the treasury
    pub value: Amount,
    /// Borsh-encoded call
    pub payload: Vec<u8>,
}

/// Proposal state in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    /// Created, voting has not started
    Pending,
    /// Voting is open
    Active,
    /// Canceled by the proposer
    Canceled,
    /// Voting ended without passing
    Defeated,
    /// Voting ended and passed, not yet queued
    Succeeded,
    /// Waiting in the timelock
    Queued,
    /// Not executed within the grace window
    Expired,
    /// Actions were executed
    Executed,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Canceled
                | ProposalState::Defeated
                | ProposalState::Expired
                | ProposalState::Executed
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Vote support options.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum VoteSupport {
    Against,
    For,
    /// Counts toward quorum only
    Abstain,
}

impl FromStr for VoteSupport {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "for" | "yes" => Ok(VoteSupport::For),
            "against" | "no" => Ok(VoteSupport::Against),
            "abstain" => Ok(VoteSupport::Abstain),
            other => Err(GovernanceError::InvalidParameter(format!(
                "unknown vote support: {}",
                other
            ))),
        }
    }
}

/// A cast vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub support: VoteSupport,
    pub weight: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: Timestamp,
}

/// Tally of one proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVotes {
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub abstain_votes: Amount,
}

impl ProposalVotes {
    pub fn total(&self) -> Amount {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Address,
    pub actions: Vec<Action>,
    /// Off-chain description identifier
    pub description_hash: Hash,
    pub created_at: Timestamp,
    /// Voting power is measured at the start of this instant
    pub snapshot_time: Timestamp,
    /// Last instant votes are accepted
    pub deadline: Timestamp,
    /// Quorum share in force when the proposal was created
    pub quorum_bps: BasisPoints,
    pub votes: ProposalVotes,
    #[serde(default)]
    pub receipts: BTreeMap<Address, VoteReceipt>,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub execution_eta: Option<Timestamp>,
    #[serde(default)]
    pub executed_at: Option<Timestamp>,
}

impl Proposal {
    /// Derive the current state.
    ///
    /// `quorum` is only evaluated once voting has ended.
    pub fn state(
        &self,
        now: Timestamp,
        grace_period: Timestamp,
        quorum: impl FnOnce() -> Amount,
    ) -> ProposalState {
        if self.executed_at.is_some() {
            return ProposalState::Executed;
        }
        if self.canceled {
            return ProposalState::Canceled;
        }
        if let Some(eta) = self.execution_eta {
            return if now > eta.saturating_add(grace_period) {
                ProposalState::Expired
            } else {
                ProposalState::Queued
            };
        }
        if now < self.snapshot_time {
            return ProposalState::Pending;
        }
        if now <= self.deadline {
            return ProposalState::Active;
        }
        if self.votes.for_votes > self.votes.against_votes && self.votes.total() >= quorum() {
            ProposalState::Succeeded
        } else {
            ProposalState::Defeated
        }
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.receipts.contains_key(voter)
    }

    /// Add a vote to the tally. The caller checks the state first.
    pub(crate) fn record_vote(
        &mut self,
        voter: Address,
        receipt: VoteReceipt,
    ) -> Result<(), GovernanceError> {
        if self.has_voted(&voter) {
            return Err(GovernanceError::AlreadyVoted);
        }

        let tally = match receipt.support {
            VoteSupport::For => &mut self.votes.for_votes,
            VoteSupport::Against => &mut self.votes.against_votes,
            VoteSupport::Abstain => &mut self.votes.abstain_votes,
        };
        *tally = tally
            .checked_add(receipt.weight)
            .ok_or_else(|| GovernanceError::InvalidAmount("tally overflow".to_string()))?;

        self.receipts.insert(voter, receipt);
        Ok(())
    }
}

/// Parameters of a new proposal.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub proposer: Address,
    pub actions: Vec<Action>,
    pub description_hash: Hash,
    pub created_at: Timestamp,
    pub snapshot_time: Timestamp,
    pub deadline: Timestamp,
    pub quorum_bps: BasisPoints,
}

/// All proposals, keyed by id (starting at 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRegistry {
    next_id: u64,
    proposals: BTreeMap<u64, Proposal>,
}

impl Default for ProposalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            proposals: BTreeMap::new(),
        }
    }

    pub fn create(&mut self, params: NewProposal) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let proposal = Proposal {
            id,
            proposer: params.proposer,
            actions: params.actions,
            description_hash: params.description_hash,
            created_at: params.created_at,
            snapshot_time: params.snapshot_time,
            deadline: params.deadline,
            quorum_bps: params.quorum_bps,
            votes: ProposalVotes::default(),
            receipts: BTreeMap::new(),
            canceled: false,
            execution_eta: None,
            executed_at: None,
        };
        self.proposals.insert(id, proposal);
        id
    }

    pub fn get(&self, id: u64) -> Result<&Proposal, GovernanceError> {
        self.proposals.get(&id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    pub fn get_mut(&mut self, id: u64) -> Result<&mut Proposal, GovernanceError> {
        self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    pub(crate) fn from_parts(next_id: u64, proposals: BTreeMap<u64, Proposal>) -> Self {
        Self { next_id, proposals }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn proposal_map(&self) -> &BTreeMap<u64, Proposal> {
        &self.proposals
    }

    /// Number of proposals ever created.
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Timestamp = 1_000;

    fn proposal() -> Proposal {
        let mut registry = ProposalRegistry::new();
        let id = registry.create(NewProposal {
            proposer: Address::from_label("proposer"),
            actions: vec![],
            description_hash: Hash::compute(b"fund the audit"),
            created_at: T0,
            snapshot_time: T0 + 10,
            deadline: T0 + 110,
            quorum_bps: 400,
        });
        registry.get(id).unwrap().clone()
    }

    fn receipt(support: VoteSupport, weight: Amount) -> VoteReceipt {
        VoteReceipt { support, weight, reason: None, timestamp: T0 + 20 }
    }

    #[test]
    fn test_time_driven_states() {
        let p = proposal();
        assert_eq!(p.state(T0, 50, || 0), ProposalState::Pending);
        assert_eq!(p.state(T0 + 10, 50, || 0), ProposalState::Active);
        assert_eq!(p.state(T0 + 110, 50, || 0), ProposalState::Active);
        // no votes: for == against
        assert_eq!(p.state(T0 + 111, 50, || 0), ProposalState::Defeated);
    }

    #[test]
    fn test_quorum_is_inclusive() {
        let mut p = proposal();
        p.record_vote(Address::from_label("a"), receipt(VoteSupport::For, 60)).unwrap();
        p.record_vote(Address::from_label("b"), receipt(VoteSupport::Abstain, 40)).unwrap();

        assert_eq!(p.state(T0 + 111, 50, || 100), ProposalState::Succeeded);
        assert_eq!(p.state(T0 + 111, 50, || 101), ProposalState::Defeated);
    }

    #[test]
    fn test_quorum_not_evaluated_while_active() {
        let p = proposal();
        let state = p.state(T0 + 50, 50, || panic!("quorum read during voting"));
        assert_eq!(state, ProposalState::Active);
    }

    #[test]
    fn test_queued_then_expired() {
        let mut p = proposal();
        p.execution_eta = Some(T0 + 200);
        assert_eq!(p.state(T0 + 250, 50, || 0), ProposalState::Queued);
        assert_eq!(p.state(T0 + 251, 50, || 0), ProposalState::Expired);
        p.executed_at = Some(T0 + 220);
        assert_eq!(p.state(T0 + 251, 50, || 0), ProposalState::Executed);
    }

    #[test]
    fn test_double_vote_leaves_tally() {
        let mut p = proposal();
        let voter = Address::from_label("a");
        p.record_vote(voter, receipt(VoteSupport::For, 5)).unwrap();
        assert_eq!(
            p.record_vote(voter, receipt(VoteSupport::Against, 7)),
            Err(GovernanceError::AlreadyVoted)
        );
        assert_eq!(p.votes, ProposalVotes { for_votes: 5, against_votes: 0, abstain_votes: 0 });
    }

    #[test]
    fn test_registry_ids() {
        let mut registry = ProposalRegistry::new();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.get(1).unwrap_err(), GovernanceError::ProposalNotFound(1));
        let p = proposal();
        let id = registry.create(NewProposal {
            proposer: p.proposer,
            actions: p.actions,
            description_hash: p.description_hash,
            created_at: p.created_at,
            snapshot_time: p.snapshot_time,
            deadline: p.deadline,
            quorum_bps: p.quorum_bps,
        });
        assert_eq!(id, 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_support_parse() {
        assert_eq!("FOR".parse::<VoteSupport>().unwrap(), VoteSupport::For);
        assert_eq!("abstain".parse::<VoteSupport>().unwrap(), VoteSupport::Abstain);
        assert!("maybe".parse::<VoteSupport>().is_err());
    }
}
