//! End-to-end proposal lifecycle tests against the engine.

use agora_governance::config::Allocation;
use agora_governance::{
    Action, Call, Dao, EngineConfig, GovernanceError, LinearCurve, ManualClock, ProposalState,
    Role, VoteSupport, GOVERNOR_ADDRESS, TREASURY_ADDRESS,
};
use agora_types::amount::tokens;
use agora_types::{Address, Amount, Hash, Timestamp, SECONDS_PER_DAY};
use std::sync::Arc;

const T0: Timestamp = 1_700_000_000;
const DELAY: Timestamp = SECONDS_PER_DAY;
const PERIOD: Timestamp = 7 * SECONDS_PER_DAY;
const TIMELOCK: Timestamp = 2 * SECONDS_PER_DAY;
const GRACE: Timestamp = 14 * SECONDS_PER_DAY;

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

/// Supply of 1000 tokens: quorum (4%) is exactly 40 tokens.
fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.governance.voting_delay = DELAY;
    config.governance.voting_period = PERIOD;
    config.governance.timelock_min_delay = TIMELOCK;
    config.governance.grace_period = GRACE;
    config.genesis.balances = vec![
        Allocation { address: addr("proposer"), amount: tokens(10) },
        Allocation { address: addr("alice"), amount: tokens(40) },
        Allocation { address: addr("bob"), amount: tokens(40) - 1 },
        Allocation { address: addr("carol"), amount: tokens(910) + 1 },
    ];
    config.genesis.treasury_native = tokens(100);
    config.genesis.governors = vec![addr("governor")];
    config
}

struct Harness {
    dao: Dao,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let dao = Dao::new(&config(), clock.clone())
            .unwrap()
            .with_curve(Arc::new(LinearCurve));
        Self { dao, clock }
    }

    fn advance(&self, secs: u64) -> Timestamp {
        self.clock.advance(secs)
    }

    fn propose(&self, actions: Vec<Action>) -> u64 {
        self.advance(1);
        self.dao
            .propose(addr("proposer"), actions, Hash::compute(b"proposal"))
            .unwrap()
    }

    /// Propose, advance into the voting window and return the proposal id.
    fn open_vote(&self, actions: Vec<Action>) -> u64 {
        let id = self.propose(actions);
        self.advance(DELAY);
        assert_eq!(self.dao.state(id).unwrap(), ProposalState::Active);
        id
    }

    fn close_vote(&self) {
        self.advance(PERIOD + 1);
    }
}

fn payment(amount: Amount) -> Vec<Action> {
    vec![Action::payment(addr("grantee"), amount)]
}

#[test]
fn test_full_lifecycle_executes_actions() {
    let h = Harness::new();
    let actions = vec![
        Action::payment(addr("grantee"), tokens(5)),
        Call::AllocateFunds {
            recipient: addr("auditor"),
            amount: tokens(20),
            purpose: "security audit".to_string(),
        }
        .into_action()
        .unwrap(),
        Call::GrantRole { role: Role::ReputationManager, account: addr("alice") }
            .into_action()
            .unwrap(),
        Call::SetStakingRate { rate_bps: 800 }.into_action().unwrap(),
    ];

    let id = h.propose(actions);
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Pending);
    assert_eq!(
        h.dao.cast_vote(addr("alice"), id, VoteSupport::For),
        Err(GovernanceError::VotingClosed(id))
    );

    h.advance(DELAY);
    h.dao.cast_vote(addr("alice"), id, VoteSupport::For).unwrap();
    h.close_vote();
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Succeeded);

    let eta = h.dao.queue(addr("anyone"), id).unwrap();
    assert_eq!(eta, h.dao.now() + TIMELOCK);
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Queued);
    assert!(matches!(
        h.dao.execute(addr("anyone"), id),
        Err(GovernanceError::NotReady { .. })
    ));

    h.advance(TIMELOCK);
    h.dao.execute(addr("anyone"), id).unwrap();
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Executed);

    assert_eq!(h.dao.treasury_balance(), tokens(75));
    assert!(h.dao.has_role(Role::ReputationManager, &addr("alice")));
    assert_eq!(h.dao.snapshot().ledger.annual_rate_bps(), 800);
    assert_eq!(h.dao.allocations().len(), 2);

    assert!(matches!(
        h.dao.execute(addr("anyone"), id),
        Err(GovernanceError::InvalidState(_))
    ));
}

#[test]
fn test_failed_action_keeps_proposal_queued() {
    let h = Harness::new();
    // second action overdraws the treasury
    let actions = vec![
        Action::payment(addr("grantee"), tokens(60)),
        Action::payment(addr("grantee"), tokens(60)),
    ];
    let id = h.open_vote(actions);
    h.dao.cast_vote(addr("alice"), id, VoteSupport::For).unwrap();
    h.close_vote();
    h.dao.queue(addr("anyone"), id).unwrap();
    h.advance(TIMELOCK);

    let before = h.dao.snapshot();
    let result = h.dao.execute(addr("anyone"), id);
    assert!(matches!(result, Err(GovernanceError::ExecutionFailed(_))));
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Queued);
    assert_eq!(h.dao.treasury_balance(), tokens(100));
    assert_eq!(h.dao.snapshot(), before);
}

#[test]
fn test_quorum_boundary_is_inclusive() {
    let h = Harness::new();

    // alice holds exactly the quorum
    let exact = h.open_vote(payment(tokens(1)));
    let weight = h.dao.cast_vote(addr("alice"), exact, VoteSupport::For).unwrap();
    assert_eq!(weight, tokens(40));
    assert_eq!(h.dao.quorum(h.dao.get_proposal(exact).unwrap().snapshot_time).unwrap(), tokens(40));
    h.close_vote();
    assert_eq!(h.dao.state(exact).unwrap(), ProposalState::Succeeded);

    // bob holds one unit less
    let short = h.open_vote(payment(tokens(1)));
    h.dao.cast_vote(addr("bob"), short, VoteSupport::For).unwrap();
    h.close_vote();
    assert_eq!(h.dao.state(short).unwrap(), ProposalState::Defeated);
}

#[test]
fn test_majority_against_is_defeated() {
    let h = Harness::new();
    let id = h.open_vote(payment(tokens(1)));
    h.dao.cast_vote(addr("alice"), id, VoteSupport::For).unwrap();
    h.dao.cast_vote(addr("carol"), id, VoteSupport::Against).unwrap();
    h.close_vote();
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Defeated);
    assert!(matches!(
        h.dao.queue(addr("anyone"), id),
        Err(GovernanceError::InvalidState(_))
    ));
}

#[test]
fn test_snapshot_weight_ignores_later_transfers() {
    let h = Harness::new();
    let id = h.open_vote(payment(tokens(1)));
    let snapshot = h.dao.get_proposal(id).unwrap().snapshot_time;
    let expected = h.dao.vote_weight(&addr("alice"), snapshot).unwrap();

    h.advance(10);
    h.dao.transfer(addr("alice"), addr("bob"), tokens(40)).unwrap();
    assert_eq!(h.dao.balance_of(&addr("alice")), 0);

    let counted = h.dao.cast_vote(addr("alice"), id, VoteSupport::For).unwrap();
    assert_eq!(counted, expected);
    // bob's snapshot weight does not include the received tokens
    let bob = h.dao.cast_vote(addr("bob"), id, VoteSupport::Against).unwrap();
    assert_eq!(bob, tokens(40) - 1);
}

#[test]
fn test_double_vote_rejected() {
    let h = Harness::new();
    let id = h.open_vote(payment(tokens(1)));
    h.dao
        .cast_vote_with_reason(addr("alice"), id, VoteSupport::For, "needed")
        .unwrap();
    let tally = h.dao.proposal_votes(id).unwrap();

    assert_eq!(
        h.dao.cast_vote(addr("alice"), id, VoteSupport::Against),
        Err(GovernanceError::AlreadyVoted)
    );
    assert_eq!(h.dao.proposal_votes(id).unwrap(), tally);
    assert!(h.dao.has_voted(id, &addr("alice")).unwrap());
    let receipt = h.dao.get_receipt(id, &addr("alice")).unwrap().unwrap();
    assert_eq!(receipt.reason.as_deref(), Some("needed"));
}

#[test]
fn test_unknown_proposal() {
    let h = Harness::new();
    assert_eq!(
        h.dao.cast_vote(addr("alice"), 42, VoteSupport::For),
        Err(GovernanceError::ProposalNotFound(42))
    );
    assert_eq!(h.dao.state(42), Err(GovernanceError::ProposalNotFound(42)));
}

#[test]
fn test_queued_proposal_expires() {
    let h = Harness::new();
    let id = h.open_vote(payment(tokens(1)));
    h.dao.cast_vote(addr("alice"), id, VoteSupport::For).unwrap();
    h.close_vote();
    h.dao.queue(addr("anyone"), id).unwrap();

    h.advance(TIMELOCK + GRACE + 1);
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Expired);
    assert_eq!(
        h.dao.execute(addr("anyone"), id),
        Err(GovernanceError::ProposalExpired(id))
    );
}

#[test]
fn test_cancel_only_by_proposer_before_close() {
    let h = Harness::new();
    let id = h.propose(payment(tokens(1)));
    assert!(matches!(
        h.dao.cancel(addr("alice"), id),
        Err(GovernanceError::Unauthorized(_))
    ));
    h.dao.cancel(addr("proposer"), id).unwrap();
    assert_eq!(h.dao.state(id).unwrap(), ProposalState::Canceled);

    let closed = h.open_vote(payment(tokens(1)));
    h.close_vote();
    assert!(matches!(
        h.dao.cancel(addr("proposer"), closed),
        Err(GovernanceError::InvalidState(_))
    ));
}

#[test]
fn test_proposal_validation() {
    let h = Harness::new();
    h.advance(1);
    let hash = Hash::compute(b"empty");

    assert!(matches!(
        h.dao.propose(addr("proposer"), vec![], hash),
        Err(GovernanceError::InvalidProposal(_))
    ));

    let too_many = vec![Action::payment(addr("grantee"), 1); 11];
    assert!(matches!(
        h.dao.propose(addr("proposer"), too_many, hash),
        Err(GovernanceError::InvalidProposal(_))
    ));

    assert!(matches!(
        h.dao.propose(addr("nobody"), payment(1), hash),
        Err(GovernanceError::InsufficientVotingPower { actual: 0, .. })
    ));
    assert_eq!(h.dao.proposal_count(), 0);
}

#[test]
fn test_timelock_identity_cannot_be_used_directly() {
    let h = Harness::new();
    // the engine identity holds executor rights, not governor rights
    assert!(h.dao.has_role(Role::Executor, &GOVERNOR_ADDRESS));
    assert!(matches!(
        h.dao.allocate_funds(GOVERNOR_ADDRESS, addr("grantee"), 1, "direct"),
        Err(GovernanceError::Unauthorized(_))
    ));
    assert_eq!(h.dao.balance_of(&TREASURY_ADDRESS), 0);
}

/// Engine with the default blended curve and two reputation holders.
fn blended_engine(decay_rate_bps: u16) -> (Dao, Arc<ManualClock>) {
    let mut config = config();
    config.reputation.default_decay_rate_bps = decay_rate_bps;
    config.genesis.reputation_managers = vec![addr("manager")];
    let clock = Arc::new(ManualClock::new(T0));
    let dao = Dao::new(&config, clock.clone()).unwrap();
    (dao, clock)
}

#[test]
fn test_default_curve_blends_tokens_and_reputation() {
    let (dao, clock) = blended_engine(0);
    dao.add_reputation(addr("manager"), addr("alice"), "code", 30).unwrap();
    dao.add_reputation(addr("manager"), addr("bob"), "code", 70).unwrap();

    clock.advance(1);
    let id = dao
        .propose(addr("proposer"), payment(tokens(1)), Hash::compute(b"blend"))
        .unwrap();
    clock.advance(DELAY);
    assert_eq!(dao.state(id).unwrap(), ProposalState::Active);

    // contributions after the snapshot do not count
    clock.advance(1);
    dao.add_reputation(addr("manager"), addr("alice"), "code", 1_000).unwrap();

    // token = 20 + sqrt(40e18) * 1e9 / 2 = 23.16227766
    // reputation = 30 / 100 of a 1000 token supply = 300
    // weight = 0.7 * token + 0.3 * reputation
    let alice = dao.cast_vote(addr("alice"), id, VoteSupport::For).unwrap();
    assert_eq!(alice, 106_213_594_362_000_000_000);

    let bob = dao.cast_vote(addr("bob"), id, VoteSupport::Against).unwrap();
    assert_eq!(bob, 226_213_594_361_999_999_999);

    let votes = dao.get_proposal(id).unwrap().votes;
    assert_eq!(votes.for_votes, alice);
    assert_eq!(votes.against_votes, bob);
}

#[test]
fn test_decay_rate_change_after_snapshot_keeps_weight() {
    let (dao, clock) = blended_engine(1_000);
    dao.add_reputation(addr("manager"), addr("alice"), "code", tokens(30)).unwrap();
    dao.add_reputation(addr("manager"), addr("bob"), "code", tokens(70)).unwrap();

    clock.advance(1);
    let id = dao
        .propose(addr("proposer"), payment(tokens(1)), Hash::compute(b"decay"))
        .unwrap();
    clock.advance(DELAY);
    let snapshot = dao.get_proposal(id).unwrap().snapshot_time;
    let expected = dao.vote_weight(&addr("bob"), snapshot).unwrap();

    clock.advance(1);
    dao.set_decay_rate(addr("governor"), addr("bob"), 0).unwrap();
    dao.set_default_decay_rate(addr("governor"), 5_000).unwrap();
    // live reads follow the new rate
    assert_eq!(dao.get_reputation(&addr("bob")), tokens(70));

    assert_eq!(dao.vote_weight(&addr("bob"), snapshot).unwrap(), expected);
    let counted = dao.cast_vote(addr("bob"), id, VoteSupport::For).unwrap();
    assert_eq!(counted, expected);
}
