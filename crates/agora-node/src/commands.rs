//! CLI command definitions and their execution against the engine.
//!
//! Every invocation opens the persisted engine, applies exactly one command
//! and exits. Write commands commit a new state generation on success.

use agora_governance::{Action, Call, Dao, ProposalState, Role, VoteSupport};
use agora_types::amount::{format_amount, parse_amount, serde_tokens};
use agora_types::{Address, Amount, BasisPoints, Hash, Timestamp};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main CLI.
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(about = "Agora - DAO governance and treasury engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, value_name = "FILE", env = "AGORA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log filter (overrides the config file)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Evaluate the command at this Unix timestamp instead of the wall clock
    #[arg(long, global = true)]
    pub now: Option<Timestamp>,

    /// Account issuing the command
    #[arg(long, global = true, env = "AGORA_CALLER", value_parser = parse_address)]
    pub caller: Option<Address>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply genesis to an empty data directory
    Init,

    /// Show supply, treasury and proposal totals, or one account
    Status {
        #[arg(long, value_parser = parse_address)]
        account: Option<Address>,
    },

    /// Show a proposal
    Proposal { id: u64 },

    /// Submit a proposal from a JSON file of actions
    Propose {
        /// JSON array of calls and payments
        #[arg(long, value_name = "FILE")]
        actions: PathBuf,
        /// Description text; its hash is stored with the proposal
        #[arg(long)]
        description: String,
    },

    /// Vote on an active proposal (for, against or abstain)
    Vote {
        id: u64,
        #[arg(value_parser = VoteSupport::from_str)]
        support: VoteSupport,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Queue a succeeded proposal on the timelock
    Queue { id: u64 },

    /// Execute a queued proposal whose delay has passed
    Execute { id: u64 },

    /// Cancel a proposal before voting ends
    Cancel { id: u64 },

    /// Move tokens into stake
    Stake {
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },

    /// Move tokens out of stake
    Unstake {
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },

    /// Pay out accrued staking rewards
    Claim,

    /// Delegate voting units
    Delegate {
        #[arg(value_parser = parse_address)]
        to: Address,
    },

    /// Transfer governance tokens
    Transfer {
        #[arg(value_parser = parse_address)]
        to: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },

    /// Grant reputation points (reputation managers only)
    AddReputation {
        #[arg(value_parser = parse_address)]
        account: Address,
        category: String,
        points: Amount,
    },

    /// Show decayed reputation
    Reputation {
        #[arg(value_parser = parse_address)]
        account: Address,
        #[arg(long)]
        category: Option<String>,
    },

    /// Report native revenue to the treasury
    CaptureRevenue {
        stream: String,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },

    /// Pay native currency from the treasury (governors only)
    AllocateFunds {
        #[arg(value_parser = parse_address)]
        recipient: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        purpose: String,
    },

    /// Pay treasury-held tokens (governors only)
    AllocateTokens {
        #[arg(value_parser = parse_address)]
        recipient: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        purpose: String,
        /// Token paid; defaults to the governance token
        #[arg(long, value_parser = parse_address)]
        token: Option<Address>,
    },

    /// Override one account's reputation decay rate (governors only)
    SetDecayRate {
        #[arg(value_parser = parse_address)]
        account: Address,
        rate_bps: BasisPoints,
    },

    /// Change the default reputation decay rate (governors only)
    SetDefaultDecayRate { rate_bps: BasisPoints },

    /// Change the annual staking reward rate (governors only)
    SetStakingRate { rate_bps: BasisPoints },

    /// Grant a role: governor, reputation-manager, proposer or executor
    GrantRole {
        #[arg(value_parser = Role::from_str)]
        role: Role,
        #[arg(value_parser = parse_address)]
        account: Address,
    },

    /// Revoke a role
    RevokeRole {
        #[arg(value_parser = Role::from_str)]
        role: Role,
        #[arg(value_parser = parse_address)]
        account: Address,
    },

    /// Show the members of a role
    Members {
        #[arg(value_parser = Role::from_str)]
        role: Role,
    },

    /// Forward a contribution to a project, taking the treasury fee
    Crowdfund {
        #[arg(value_parser = parse_address)]
        recipient: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        /// Token contributed; defaults to the governance token
        #[arg(long, value_parser = parse_address)]
        token: Option<Address>,
    },
}

impl Commands {
    /// Whether the command acts on behalf of `--caller`.
    pub fn needs_caller(&self) -> bool {
        !matches!(
            self,
            Commands::Init
                | Commands::Status { .. }
                | Commands::Proposal { .. }
                | Commands::Reputation { .. }
                | Commands::Members { .. }
        )
    }
}

/// Parse `agora1...` or `0x...`; any other string names a labelled account.
pub fn parse_address(s: &str) -> Result<Address, String> {
    if s.starts_with("agora1") || s.starts_with("0x") || s.starts_with("0X") {
        Address::from_str(s).map_err(|e| e.to_string())
    } else if s.is_empty() {
        Err("address cannot be empty".to_string())
    } else {
        Ok(Address::from_label(s))
    }
}

/// One entry of a `propose --actions` file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionSpec {
    /// `{"pay": "<address>", "amount": "1.5"}`
    Payment {
        pay: Address,
        #[serde(with = "serde_tokens")]
        amount: Amount,
    },
    /// `{"call": "allocate_funds", ...}`
    Call(Call),
}

impl ActionSpec {
    fn into_action(self) -> anyhow::Result<Action> {
        match self {
            ActionSpec::Payment { pay, amount } => Ok(Action::payment(pay, amount)),
            ActionSpec::Call(call) => Ok(call.into_action()?),
        }
    }
}

/// Read and encode the actions of a proposal file.
pub fn load_actions(path: &Path) -> anyhow::Result<Vec<Action>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read actions file '{}': {}", path.display(), e))?;
    let specs: Vec<ActionSpec> = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse actions file '{}': {}", path.display(), e))?;
    specs.into_iter().map(ActionSpec::into_action).collect()
}

/// Execute one command.
pub fn execute(cmd: Commands, dao: &Dao, caller: Option<Address>) -> anyhow::Result<()> {
    let require_caller =
        || caller.ok_or_else(|| anyhow::anyhow!("this command requires --caller"));

    match cmd {
        Commands::Init => {
            println!("State at generation {}", dao.generation().unwrap_or(0));
            print_status(dao);
        }
        Commands::Status { account } => match account {
            Some(account) => print_account(dao, &account)?,
            None => print_status(dao),
        },
        Commands::Proposal { id } => print_proposal(dao, id)?,
        Commands::Propose { actions, description } => {
            let actions = load_actions(&actions)?;
            let count = actions.len();
            let id = dao.propose(require_caller()?, actions, Hash::compute(description.as_bytes()))?;
            let proposal = dao.get_proposal(id)?;
            println!("Proposal {} created with {} action(s)", id, count);
            println!("Voting opens at {} and closes after {}", proposal.snapshot_time, proposal.deadline);
        }
        Commands::Vote { id, support, reason } => {
            let weight = match reason {
                Some(reason) => dao.cast_vote_with_reason(require_caller()?, id, support, &reason)?,
                None => dao.cast_vote(require_caller()?, id, support)?,
            };
            println!("Voted {:?} on proposal {} with weight {}", support, id, format_amount(weight));
        }
        Commands::Queue { id } => {
            let eta = dao.queue(require_caller()?, id)?;
            println!("Proposal {} queued, executable from {}", id, eta);
        }
        Commands::Execute { id } => {
            dao.execute(require_caller()?, id)?;
            println!("Proposal {} executed", id);
        }
        Commands::Cancel { id } => {
            dao.cancel(require_caller()?, id)?;
            println!("Proposal {} canceled", id);
        }
        Commands::Stake { amount } => {
            let reward = dao.stake(require_caller()?, amount)?;
            println!("Staked {} (paid out {} pending reward)", format_amount(amount), format_amount(reward));
        }
        Commands::Unstake { amount } => {
            let reward = dao.unstake(require_caller()?, amount)?;
            println!("Unstaked {} (paid out {} pending reward)", format_amount(amount), format_amount(reward));
        }
        Commands::Claim => {
            let reward = dao.claim_staking_rewards(require_caller()?)?;
            println!("Claimed {}", format_amount(reward));
        }
        Commands::Delegate { to } => {
            let from = require_caller()?;
            dao.delegate(from, to)?;
            println!("Delegated votes of {} to {}", from, to);
        }
        Commands::Transfer { to, amount } => {
            dao.transfer(require_caller()?, to, amount)?;
            println!("Transferred {} to {}", format_amount(amount), to);
        }
        Commands::AddReputation { account, category, points } => {
            dao.add_reputation(require_caller()?, account, &category, points)?;
            println!("Added {} {} reputation to {}", points, category, account);
        }
        Commands::Reputation { account, category } => {
            let points = match &category {
                Some(category) => dao.get_reputation_by_category(&account, category),
                None => dao.get_reputation(&account),
            };
            println!("{}", points);
        }
        Commands::CaptureRevenue { stream, amount } => {
            let split = dao.capture_revenue(require_caller()?, &stream, amount)?;
            println!(
                "Captured {}: burned {}, reserved {}, available {}",
                format_amount(amount),
                format_amount(split.burned),
                format_amount(split.reserved),
                format_amount(split.available),
            );
        }
        Commands::AllocateFunds { recipient, amount, purpose } => {
            dao.allocate_funds(require_caller()?, recipient, amount, &purpose)?;
            println!("Allocated {} to {} for {:?}", format_amount(amount), recipient, purpose);
        }
        Commands::AllocateTokens { recipient, amount, purpose, token } => {
            let token = token.unwrap_or_else(|| dao.snapshot().ledger.token());
            dao.allocate_tokens(require_caller()?, token, recipient, amount, &purpose)?;
            println!("Allocated {} of {} to {} for {:?}", format_amount(amount), token, recipient, purpose);
        }
        Commands::SetDecayRate { account, rate_bps } => {
            dao.set_decay_rate(require_caller()?, account, rate_bps)?;
            println!("Decay rate of {} set to {} bps", account, rate_bps);
        }
        Commands::SetDefaultDecayRate { rate_bps } => {
            dao.set_default_decay_rate(require_caller()?, rate_bps)?;
            println!("Default decay rate set to {} bps", rate_bps);
        }
        Commands::SetStakingRate { rate_bps } => {
            dao.set_staking_rate(require_caller()?, rate_bps)?;
            println!("Staking rate set to {} bps", rate_bps);
        }
        Commands::GrantRole { role, account } => {
            if dao.grant_role(require_caller()?, role, account)? {
                println!("Granted {} to {}", role, account);
            } else {
                println!("{} already holds {}", account, role);
            }
        }
        Commands::RevokeRole { role, account } => {
            if dao.revoke_role(require_caller()?, role, account)? {
                println!("Revoked {} from {}", role, account);
            } else {
                println!("{} does not hold {}", account, role);
            }
        }
        Commands::Members { role } => {
            for member in dao.role_members(role) {
                println!("{}", member);
            }
        }
        Commands::Crowdfund { recipient, amount, token } => {
            let sender = require_caller()?;
            let token = token.unwrap_or_else(|| dao.snapshot().ledger.token());
            let receipt = dao.process_crowdfunding(sender, token, sender, recipient, amount)?;
            println!(
                "Forwarded {} to {} (fee {})",
                format_amount(receipt.forwarded),
                recipient,
                format_amount(receipt.fee),
            );
        }
    }
    Ok(())
}

fn print_status(dao: &Dao) {
    let state = dao.snapshot();
    let ledger = &state.ledger;
    println!("Token:            {}", ledger.token());
    println!("Total supply:     {}", format_amount(ledger.total_supply()));
    println!("Minted / burned:  {} / {}", format_amount(ledger.total_minted()), format_amount(ledger.total_burned()));
    println!("Staking rate:     {} bps", ledger.annual_rate_bps());
    println!("Treasury native:  {}", format_amount(dao.treasury_balance()));
    println!("Treasury tokens:  {}", format_amount(dao.treasury_token_balance(&ledger.token())));
    println!("Total reputation: {}", dao.get_total_reputation());
    println!("Proposals:        {}", dao.proposal_count());
}

fn print_account(dao: &Dao, account: &Address) -> anyhow::Result<()> {
    println!("Account:         {}", account);
    println!("Balance:         {}", format_amount(dao.balance_of(account)));
    println!("Staked:          {}", format_amount(dao.staked_balance_of(account)));
    println!("Pending rewards: {}", format_amount(dao.pending_rewards(account)?));
    println!("Delegates to:    {}", dao.delegates(account));
    println!("Votes:           {}", format_amount(dao.get_votes(account)));
    println!("Reputation:      {}", dao.get_reputation(account));
    Ok(())
}

fn print_proposal(dao: &Dao, id: u64) -> anyhow::Result<()> {
    let proposal = dao.get_proposal(id)?;
    let state = dao.state(id)?;
    println!("Proposal {}", proposal.id);
    println!("  State:       {}", state);
    println!("  Proposer:    {}", proposal.proposer);
    println!("  Description: {}", proposal.description_hash);
    println!("  Snapshot:    {}", proposal.snapshot_time);
    println!("  Deadline:    {}", proposal.deadline);
    println!("  For:         {}", format_amount(proposal.votes.for_votes));
    println!("  Against:     {}", format_amount(proposal.votes.against_votes));
    println!("  Abstain:     {}", format_amount(proposal.votes.abstain_votes));
    if let Some(eta) = proposal.execution_eta {
        println!("  Eta:         {}", eta);
    }
    if state == ProposalState::Executed {
        if let Some(at) = proposal.executed_at {
            println!("  Executed at: {}", at);
        }
    }
    for (i, action) in proposal.actions.iter().enumerate() {
        match action.call()? {
            Some(call) => println!("  Action {}: {:?}", i, call),
            None => println!("  Action {}: pay {} to {}", i, format_amount(action.value), action.target),
        }
    }
    Ok(())
}
