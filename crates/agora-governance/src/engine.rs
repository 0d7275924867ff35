//! The engine context.
//!
//! [`Dao`] owns every component behind one `RwLock`. A mutation works on a
//! draft copy of the state, commits it to the store when one is attached, and
//! only then replaces the live state; any error leaves the live state as it
//! was. Readers share the lock and always observe a committed state.

use crate::call::{Call, GOVERNOR_ADDRESS, TIMELOCK_ADDRESS, TREASURY_ADDRESS};
use crate::clock::Clock;
use crate::config::{EngineConfig, GovernanceConfig};
use crate::error::GovernanceError;
use crate::ledger::Ledger;
use crate::proposal::{
    Action, NewProposal, Proposal, ProposalRegistry, ProposalState, ProposalVotes, VoteReceipt,
    VoteSupport,
};
use crate::reputation::ReputationStore;
use crate::roles::{Role, RoleRegistry};
use crate::timelock::TimelockGate;
use crate::treasury::{AllocationRecord, Asset, CrowdfundingReceipt, RevenueBook, RevenueSplit, Treasury};
use crate::voting::{BlendedCurve, WeightCurve, WeightInputs};
use crate::persist;
use agora_storage::StateStore;
use agora_types::amount::bps_of;
use agora_types::{Address, Amount, BasisPoints, Hash, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

type Result<T> = std::result::Result<T, GovernanceError>;

/// Complete engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoState {
    pub params: GovernanceConfig,
    pub ledger: Ledger,
    pub reputation: ReputationStore,
    pub treasury: Treasury,
    pub roles: RoleRegistry,
    pub proposals: ProposalRegistry,
    pub timelock: TimelockGate,
}

impl DaoState {
    /// Build the initial state from configuration.
    pub fn genesis(config: &EngineConfig, now: Timestamp) -> Result<Self> {
        config.validate()?;
        let genesis = &config.genesis;

        let mut ledger = Ledger::new(genesis.token, config.staking.annual_rate_bps);
        for allocation in genesis.balances.iter().filter(|a| a.amount > 0) {
            ledger.mint(allocation.address, allocation.amount, now)?;
        }
        if genesis.treasury_governance_tokens > 0 {
            ledger.mint(TREASURY_ADDRESS, genesis.treasury_governance_tokens, now)?;
        }

        let mut treasury = Treasury::new(
            config.treasury.transaction_fee_bps,
            config.treasury.burn_bps,
            config.treasury.reserve_bps,
        )?;
        if genesis.treasury_native > 0 {
            treasury.deposit_native(genesis.treasury_native)?;
        }
        for holding in genesis.treasury_tokens.iter().filter(|h| h.amount > 0) {
            treasury.deposit_tokens(&mut ledger, holding.token, TREASURY_ADDRESS, holding.amount, now)?;
        }

        let mut roles = RoleRegistry::new();
        roles.bootstrap(Role::Governor, TIMELOCK_ADDRESS);
        roles.bootstrap(Role::Proposer, GOVERNOR_ADDRESS);
        roles.bootstrap(Role::Executor, GOVERNOR_ADDRESS);
        for governor in &genesis.governors {
            roles.bootstrap(Role::Governor, *governor);
        }
        for manager in &genesis.reputation_managers {
            roles.bootstrap(Role::ReputationManager, *manager);
        }

        Ok(Self {
            params: config.governance.clone(),
            ledger,
            reputation: ReputationStore::new(config.reputation.default_decay_rate_bps),
            treasury,
            roles,
            proposals: ProposalRegistry::new(),
            timelock: TimelockGate::new(
                config.governance.timelock_min_delay,
                config.governance.grace_period,
            ),
        })
    }

    fn quorum_at(&self, snapshot: Timestamp, quorum_bps: BasisPoints) -> Amount {
        bps_of(self.ledger.supply_before(snapshot), quorum_bps)
    }

    pub fn proposal_state(&self, id: u64, now: Timestamp) -> Result<ProposalState> {
        let proposal = self.proposals.get(id)?;
        Ok(proposal.state(now, self.timelock.grace_period(), || {
            self.quorum_at(proposal.snapshot_time, proposal.quorum_bps)
        }))
    }

    /// Weight `voter` would carry on a proposal snapshotted at `snapshot`.
    pub fn vote_weight_at(
        &self,
        curve: &dyn WeightCurve,
        voter: &Address,
        snapshot: Timestamp,
    ) -> Result<Amount> {
        let inputs = WeightInputs {
            token_votes: self.ledger.votes_before(voter, snapshot),
            reputation: self.reputation.get_reputation_at(voter, snapshot),
            total_reputation: self.reputation.get_total_reputation_at(snapshot),
            total_supply: self.ledger.supply_before(snapshot),
        };
        curve.weight(&inputs)
    }

    fn set_staking_rate(&mut self, caller: &Address, rate_bps: BasisPoints) -> Result<()> {
        self.roles.require(Role::Governor, caller)?;
        self.ledger.set_annual_rate(rate_bps)?;
        tracing::info!(rate_bps, by = %caller, "Staking rate updated");
        Ok(())
    }

    fn propose(
        &mut self,
        proposer: Address,
        actions: Vec<Action>,
        description_hash: Hash,
        now: Timestamp,
    ) -> Result<u64> {
        if actions.is_empty() {
            return Err(GovernanceError::InvalidProposal("no actions".to_string()));
        }
        if actions.len() > self.params.max_actions {
            return Err(GovernanceError::InvalidProposal(format!(
                "{} actions exceed the limit of {}",
                actions.len(),
                self.params.max_actions
            )));
        }
        for action in &actions {
            action.validate()?;
        }

        let threshold = self.params.proposal_threshold;
        if threshold > 0 {
            let votes = self.ledger.votes_before(&proposer, now);
            if votes < threshold {
                return Err(GovernanceError::InsufficientVotingPower {
                    actual: votes,
                    required: threshold,
                });
            }
        }

        let overflow = || GovernanceError::InvalidParameter("voting window overflow".to_string());
        let snapshot_time = now.checked_add(self.params.voting_delay).ok_or_else(overflow)?;
        let deadline = snapshot_time
            .checked_add(self.params.voting_period)
            .ok_or_else(overflow)?;

        let action_count = actions.len();
        let id = self.proposals.create(NewProposal {
            proposer,
            actions,
            description_hash,
            created_at: now,
            snapshot_time,
            deadline,
            quorum_bps: self.params.quorum_bps,
        });

        tracing::info!(
            id,
            %proposer,
            actions = action_count,
            snapshot_time,
            deadline,
            "Proposal created"
        );
        Ok(id)
    }

    fn cast_vote(
        &mut self,
        curve: &dyn WeightCurve,
        voter: Address,
        id: u64,
        support: VoteSupport,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<Amount> {
        if self.proposal_state(id, now)? != ProposalState::Active {
            return Err(GovernanceError::VotingClosed(id));
        }
        let proposal = self.proposals.get(id)?;
        if proposal.has_voted(&voter) {
            return Err(GovernanceError::AlreadyVoted);
        }

        let weight = self.vote_weight_at(curve, &voter, proposal.snapshot_time)?;
        let receipt = VoteReceipt { support, weight, reason, timestamp: now };
        self.proposals.get_mut(id)?.record_vote(voter, receipt)?;

        tracing::info!(id, %voter, ?support, weight, "Vote cast");
        Ok(weight)
    }

    fn cancel(&mut self, caller: Address, id: u64, now: Timestamp) -> Result<()> {
        let proposal = self.proposals.get(id)?;
        if proposal.proposer != caller {
            return Err(GovernanceError::Unauthorized(
                "only the proposer can cancel".to_string(),
            ));
        }
        match self.proposal_state(id, now)? {
            ProposalState::Pending | ProposalState::Active => {}
            other => {
                return Err(GovernanceError::InvalidState(format!(
                    "proposal {} is {} and cannot be canceled",
                    id, other
                )))
            }
        }
        self.proposals.get_mut(id)?.canceled = true;
        tracing::info!(id, "Proposal canceled");
        Ok(())
    }

    fn queue(&mut self, id: u64, now: Timestamp) -> Result<Timestamp> {
        match self.proposal_state(id, now)? {
            ProposalState::Succeeded => {}
            other => {
                return Err(GovernanceError::InvalidState(format!(
                    "proposal {} is {}, not Succeeded",
                    id, other
                )))
            }
        }

        let actions = self.proposals.get(id)?.actions.clone();
        let (operation, eta) = self.timelock.queue(&self.roles, &GOVERNOR_ADDRESS, &actions, now)?;
        self.proposals.get_mut(id)?.execution_eta = Some(eta);

        tracing::info!(id, %operation, eta, "Proposal queued");
        Ok(eta)
    }

    fn execute(&mut self, id: u64, now: Timestamp) -> Result<()> {
        match self.proposal_state(id, now)? {
            ProposalState::Queued => {}
            ProposalState::Expired => return Err(GovernanceError::ProposalExpired(id)),
            other => {
                return Err(GovernanceError::InvalidState(format!(
                    "proposal {} is {}, not Queued",
                    id, other
                )))
            }
        }

        let proposal = self.proposals.get(id)?;
        let actions = proposal.actions.clone();
        let eta = proposal
            .execution_eta
            .ok_or_else(|| GovernanceError::InvalidState(format!("proposal {} has no eta", id)))?;

        self.timelock.execute(&self.roles, &GOVERNOR_ADDRESS, &actions, eta, now)?;
        for (index, action) in actions.iter().enumerate() {
            self.dispatch(action, now).map_err(|e| {
                GovernanceError::ExecutionFailed(format!("action {}: {}", index, e))
            })?;
        }
        self.proposals.get_mut(id)?.executed_at = Some(now);

        tracing::info!(id, actions = actions.len(), "Proposal executed");
        Ok(())
    }

    // Runs one action with the timelock's authority.
    fn dispatch(&mut self, action: &Action, now: Timestamp) -> Result<()> {
        action.validate()?;
        let caller = TIMELOCK_ADDRESS;

        let Some(call) = action.call()? else {
            self.treasury.pay_native(action.target, action.value, now)?;
            return Ok(());
        };

        match call {
            Call::AllocateFunds { recipient, amount, purpose } => {
                self.treasury
                    .allocate_funds(&self.roles, &caller, recipient, amount, &purpose, now)?;
            }
            Call::AllocateTokens { token, recipient, amount, purpose } => {
                self.treasury.allocate_tokens(
                    &self.roles,
                    &mut self.ledger,
                    &caller,
                    token,
                    recipient,
                    amount,
                    &purpose,
                    now,
                )?;
            }
            Call::UpdateTreasurySplits { transaction_fee_bps, burn_bps, reserve_bps } => {
                self.treasury.update_splits(
                    &self.roles,
                    &caller,
                    transaction_fee_bps,
                    burn_bps,
                    reserve_bps,
                )?;
            }
            Call::SetDecayRate { account, rate_bps } => {
                self.reputation.set_decay_rate(&self.roles, &caller, account, rate_bps, now)?;
            }
            Call::SetDefaultDecayRate { rate_bps } => {
                self.reputation.set_default_decay_rate(&self.roles, &caller, rate_bps, now)?;
            }
            Call::GrantRole { role, account } => {
                self.roles.grant_role(&caller, role, account)?;
            }
            Call::RevokeRole { role, account } => {
                self.roles.revoke_role(&caller, role, &account)?;
            }
            Call::SetStakingRate { rate_bps } => {
                self.set_staking_rate(&caller, rate_bps)?;
            }
        }
        Ok(())
    }
}

/// Governance engine: every public operation runs atomically.
#[derive(Debug)]
pub struct Dao {
    state: RwLock<DaoState>,
    clock: Arc<dyn Clock>,
    store: Option<StateStore>,
    curve: Arc<dyn WeightCurve>,
}

impl Dao {
    /// In-memory engine starting from genesis.
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let state = DaoState::genesis(config, clock.now())?;
        Ok(Self::from_parts(state, clock, None))
    }

    /// Open the engine persisted at `path`, applying genesis on first use.
    pub fn open(path: &Path, config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = StateStore::open(path)?;
        let state = if store.is_empty() {
            let state = DaoState::genesis(config, clock.now())?;
            persist::commit(&store, None, &state)?;
            tracing::info!(?path, "Initialized governance state");
            state
        } else {
            let state = persist::load(&store)?;
            tracing::info!(?path, generation = store.generation(), "Loaded governance state");
            state
        };
        Ok(Self::from_parts(state, clock, Some(store)))
    }

    fn from_parts(state: DaoState, clock: Arc<dyn Clock>, store: Option<StateStore>) -> Self {
        let curve = Arc::new(BlendedCurve::from_config(&state.params));
        Self {
            state: RwLock::new(state),
            clock,
            store,
            curve,
        }
    }

    /// Replace the vote weight curve.
    pub fn with_curve(mut self, curve: Arc<dyn WeightCurve>) -> Self {
        self.curve = curve;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> DaoState {
        self.state.read().clone()
    }

    /// Latest committed store generation, if persistent.
    pub fn generation(&self) -> Option<u64> {
        self.store.as_ref().map(|s| s.generation())
    }

    fn read<R>(&self, f: impl FnOnce(&DaoState, Timestamp) -> R) -> R {
        let now = self.clock.now();
        let state = self.state.read();
        f(&state, now)
    }

    fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut DaoState, Timestamp) -> Result<R>,
    ) -> Result<R> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let mut draft = state.clone();

        let result = f(&mut draft, now).and_then(|value| {
            if let Some(store) = &self.store {
                persist::commit(store, Some(&*state), &draft)?;
            }
            Ok(value)
        });

        match result {
            Ok(value) => {
                *state = draft;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(operation, error = %e, "Operation rolled back");
                Err(e)
            }
        }
    }

    // ---- Ledger ----

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.read(|s, _| s.ledger.balance_of(account))
    }

    pub fn staked_balance_of(&self, account: &Address) -> Amount {
        self.read(|s, _| s.ledger.staked_balance_of(account))
    }

    pub fn pending_rewards(&self, account: &Address) -> Result<Amount> {
        self.read(|s, now| s.ledger.pending_rewards(account, now))
    }

    pub fn delegates(&self, account: &Address) -> Address {
        self.read(|s, _| s.ledger.delegates(account))
    }

    pub fn get_votes(&self, account: &Address) -> Amount {
        self.read(|s, _| s.ledger.get_votes(account))
    }

    pub fn get_past_votes(&self, account: &Address, timestamp: Timestamp) -> Result<Amount> {
        self.read(|s, now| s.ledger.get_past_votes(account, timestamp, now))
    }

    pub fn get_past_total_supply(&self, timestamp: Timestamp) -> Result<Amount> {
        self.read(|s, now| s.ledger.get_past_total_supply(timestamp, now))
    }

    pub fn total_supply(&self) -> Amount {
        self.read(|s, _| s.ledger.total_supply())
    }

    pub fn transfer(&self, caller: Address, to: Address, amount: Amount) -> Result<()> {
        self.mutate("transfer", |s, now| s.ledger.transfer(caller, to, amount, now))
    }

    pub fn delegate(&self, caller: Address, delegatee: Address) -> Result<()> {
        self.mutate("delegate", |s, now| s.ledger.delegate(caller, delegatee, now))
    }

    pub fn burn(&self, caller: Address, amount: Amount) -> Result<()> {
        self.mutate("burn", |s, now| s.ledger.burn(caller, amount, now))
    }

    /// Returns the rewards settled before the stake changed.
    pub fn stake(&self, caller: Address, amount: Amount) -> Result<Amount> {
        self.mutate("stake", |s, now| s.ledger.stake(caller, amount, now))
    }

    pub fn unstake(&self, caller: Address, amount: Amount) -> Result<Amount> {
        self.mutate("unstake", |s, now| s.ledger.unstake(caller, amount, now))
    }

    pub fn claim_staking_rewards(&self, caller: Address) -> Result<Amount> {
        self.mutate("claim_staking_rewards", |s, now| {
            s.ledger.claim_staking_rewards(caller, now)
        })
    }

    pub fn set_staking_rate(&self, caller: Address, rate_bps: BasisPoints) -> Result<()> {
        self.mutate("set_staking_rate", |s, _| s.set_staking_rate(&caller, rate_bps))
    }

    // ---- Reputation ----

    pub fn get_reputation(&self, account: &Address) -> Amount {
        self.read(|s, now| s.reputation.get_reputation(account, now))
    }

    pub fn get_reputation_by_category(&self, account: &Address, category: &str) -> Amount {
        self.read(|s, now| s.reputation.get_reputation_by_category(account, category, now))
    }

    pub fn get_total_reputation(&self) -> Amount {
        self.read(|s, now| s.reputation.get_total_reputation(now))
    }

    pub fn decay_rate_of(&self, account: &Address) -> BasisPoints {
        self.read(|s, _| s.reputation.decay_rate_of(account))
    }

    pub fn add_reputation(
        &self,
        caller: Address,
        account: Address,
        category: &str,
        amount: Amount,
    ) -> Result<()> {
        self.mutate("add_reputation", |s, now| {
            s.reputation
                .add_reputation(&s.roles, &caller, account, category, amount, now)
        })
    }

    pub fn set_decay_rate(&self, caller: Address, account: Address, rate_bps: BasisPoints) -> Result<()> {
        self.mutate("set_decay_rate", |s, now| {
            s.reputation.set_decay_rate(&s.roles, &caller, account, rate_bps, now)
        })
    }

    pub fn set_default_decay_rate(&self, caller: Address, rate_bps: BasisPoints) -> Result<()> {
        self.mutate("set_default_decay_rate", |s, now| {
            s.reputation.set_default_decay_rate(&s.roles, &caller, rate_bps, now)
        })
    }

    // ---- Roles ----

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.read(|s, _| s.roles.has_role(role, account))
    }

    pub fn role_members(&self, role: Role) -> Vec<Address> {
        self.read(|s, _| s.roles.members(role))
    }

    pub fn grant_role(&self, caller: Address, role: Role, account: Address) -> Result<bool> {
        self.mutate("grant_role", |s, _| s.roles.grant_role(&caller, role, account))
    }

    pub fn revoke_role(&self, caller: Address, role: Role, account: Address) -> Result<bool> {
        self.mutate("revoke_role", |s, _| s.roles.revoke_role(&caller, role, &account))
    }

    // ---- Treasury ----

    /// Spendable native balance.
    pub fn treasury_balance(&self) -> Amount {
        self.read(|s, _| s.treasury.get_balance())
    }

    pub fn treasury_token_balance(&self, token: &Address) -> Amount {
        self.read(|s, _| s.treasury.get_token_balance(&s.ledger, token))
    }

    pub fn revenue_book(&self, asset: &Asset) -> Option<RevenueBook> {
        self.read(|s, _| s.treasury.book(asset).cloned())
    }

    pub fn allocations(&self) -> Vec<AllocationRecord> {
        self.read(|s, _| s.treasury.allocations().to_vec())
    }

    /// Record revenue reported by a role holder.
    pub fn capture_revenue(&self, caller: Address, stream: &str, amount: Amount) -> Result<RevenueSplit> {
        self.mutate("capture_revenue", |s, now| {
            s.roles.require_any(&Role::all(), &caller)?;
            let split = s.treasury.capture_revenue(stream, amount, now)?;
            tracing::debug!(%caller, stream, "Revenue reported");
            Ok(split)
        })
    }

    pub fn deposit_native(&self, caller: Address, amount: Amount) -> Result<()> {
        self.mutate("deposit_native", |s, _| {
            s.treasury.deposit_native(amount)?;
            tracing::debug!(%caller, amount, "Native deposited");
            Ok(())
        })
    }

    pub fn deposit_tokens(&self, caller: Address, token: Address, amount: Amount) -> Result<()> {
        self.mutate("deposit_tokens", |s, now| {
            s.treasury.deposit_tokens(&mut s.ledger, token, caller, amount, now)
        })
    }

    pub fn allocate_funds(
        &self,
        caller: Address,
        recipient: Address,
        amount: Amount,
        purpose: &str,
    ) -> Result<AllocationRecord> {
        self.mutate("allocate_funds", |s, now| {
            s.treasury
                .allocate_funds(&s.roles, &caller, recipient, amount, purpose, now)
        })
    }

    pub fn allocate_tokens(
        &self,
        caller: Address,
        token: Address,
        recipient: Address,
        amount: Amount,
        purpose: &str,
    ) -> Result<AllocationRecord> {
        self.mutate("allocate_tokens", |s, now| {
            s.treasury.allocate_tokens(
                &s.roles,
                &mut s.ledger,
                &caller,
                token,
                recipient,
                amount,
                purpose,
                now,
            )
        })
    }

    pub fn process_crowdfunding(
        &self,
        caller: Address,
        token: Address,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<CrowdfundingReceipt> {
        self.mutate("process_crowdfunding", |s, now| {
            s.treasury
                .process_crowdfunding(&mut s.ledger, &caller, token, sender, recipient, amount, now)
        })
    }

    pub fn update_splits(
        &self,
        caller: Address,
        transaction_fee_bps: BasisPoints,
        burn_bps: BasisPoints,
        reserve_bps: BasisPoints,
    ) -> Result<()> {
        self.mutate("update_splits", |s, _| {
            s.treasury
                .update_splits(&s.roles, &caller, transaction_fee_bps, burn_bps, reserve_bps)
        })
    }

    // ---- Proposals ----

    pub fn get_proposal(&self, id: u64) -> Result<Proposal> {
        self.read(|s, _| s.proposals.get(id).cloned())
    }

    pub fn proposal_count(&self) -> u64 {
        self.read(|s, _| s.proposals.count())
    }

    pub fn state(&self, id: u64) -> Result<ProposalState> {
        self.read(|s, now| s.proposal_state(id, now))
    }

    pub fn proposal_votes(&self, id: u64) -> Result<ProposalVotes> {
        self.read(|s, _| s.proposals.get(id).map(|p| p.votes))
    }

    pub fn has_voted(&self, id: u64, account: &Address) -> Result<bool> {
        self.read(|s, _| s.proposals.get(id).map(|p| p.has_voted(account)))
    }

    pub fn get_receipt(&self, id: u64, account: &Address) -> Result<Option<VoteReceipt>> {
        self.read(|s, _| s.proposals.get(id).map(|p| p.receipts.get(account).cloned()))
    }

    /// Quorum for a snapshot at `timestamp` under the current quorum share.
    pub fn quorum(&self, timestamp: Timestamp) -> Result<Amount> {
        self.read(|s, now| {
            let supply = s.ledger.get_past_total_supply(timestamp, now)?;
            Ok(bps_of(supply, s.params.quorum_bps))
        })
    }

    /// Weight `account` would carry on a proposal snapshotted at `timestamp`.
    pub fn vote_weight(&self, account: &Address, timestamp: Timestamp) -> Result<Amount> {
        self.read(|s, now| {
            if timestamp > now {
                return Err(GovernanceError::FutureLookup { requested: timestamp, now });
            }
            s.vote_weight_at(self.curve.as_ref(), account, timestamp)
        })
    }

    pub fn propose(&self, caller: Address, actions: Vec<Action>, description_hash: Hash) -> Result<u64> {
        self.mutate("propose", |s, now| s.propose(caller, actions, description_hash, now))
    }

    /// Returns the weight counted.
    pub fn cast_vote(&self, caller: Address, id: u64, support: VoteSupport) -> Result<Amount> {
        self.mutate("cast_vote", |s, now| {
            s.cast_vote(self.curve.as_ref(), caller, id, support, None, now)
        })
    }

    pub fn cast_vote_with_reason(
        &self,
        caller: Address,
        id: u64,
        support: VoteSupport,
        reason: &str,
    ) -> Result<Amount> {
        self.mutate("cast_vote", |s, now| {
            s.cast_vote(self.curve.as_ref(), caller, id, support, Some(reason.to_string()), now)
        })
    }

    pub fn cancel(&self, caller: Address, id: u64) -> Result<()> {
        self.mutate("cancel", |s, now| s.cancel(caller, id, now))
    }

    /// Any caller may queue a succeeded proposal. Returns the eta.
    pub fn queue(&self, caller: Address, id: u64) -> Result<Timestamp> {
        self.mutate("queue", |s, now| {
            tracing::debug!(id, %caller, "Queue requested");
            s.queue(id, now)
        })
    }

    /// Any caller may execute a matured proposal.
    pub fn execute(&self, caller: Address, id: u64) -> Result<()> {
        self.mutate("execute", |s, now| {
            tracing::debug!(id, %caller, "Execution requested");
            s.execute(id, now)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Allocation;
    use agora_types::amount::tokens;
    use tempfile::TempDir;

    const T0: Timestamp = 1_700_000_000;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.genesis.balances = vec![Allocation { address: alice(), amount: tokens(100) }];
        config.genesis.governors = vec![Address::from_label("governor")];
        config
    }

    #[test]
    fn test_genesis_roles() {
        let dao = Dao::new(&config(), Arc::new(ManualClock::new(T0))).unwrap();
        assert!(dao.has_role(Role::Governor, &TIMELOCK_ADDRESS));
        assert!(dao.has_role(Role::Executor, &GOVERNOR_ADDRESS));
        assert!(dao.has_role(Role::Governor, &Address::from_label("governor")));
        assert!(!dao.has_role(Role::Governor, &alice()));
        assert_eq!(dao.total_supply(), tokens(100));
    }

    #[test]
    fn test_failed_operation_leaves_state() {
        let dao = Dao::new(&config(), Arc::new(ManualClock::new(T0))).unwrap();
        let before = dao.snapshot();
        assert!(dao.stake(alice(), tokens(101)).is_err());
        assert_eq!(dao.snapshot(), before);
    }

    #[test]
    fn test_dao_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dao>();
    }

    #[test]
    fn test_persisted_state_reloads() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        {
            let dao = Dao::open(dir.path(), &config(), clock.clone()).unwrap();
            clock.advance(10);
            dao.stake(alice(), tokens(40)).unwrap();
        }

        let mut other = config();
        other.genesis.balances.clear();
        let dao = Dao::open(dir.path(), &other, clock).unwrap();
        // genesis is not reapplied
        assert_eq!(dao.staked_balance_of(&alice()), tokens(40));
        assert_eq!(dao.balance_of(&alice()), tokens(60));
        assert_eq!(dao.generation(), Some(2));
    }
}
