//! Agora Governance - DAO governance and treasury settlement engine.
//!
//! This crate provides:
//! - Token ledger with staking rewards and vote checkpoints
//! - Decaying per-category reputation
//! - Treasury revenue splits, allocations and crowdfunding
//! - Proposal lifecycle with blended token/reputation vote weight
//! - Timelocked execution of approved actions
//!
//! [`Dao`] ties the components together behind a single lock so every
//! operation is all-or-nothing.

pub mod call;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
mod persist;
pub mod proposal;
pub mod reputation;
pub mod roles;
pub mod timelock;
pub mod treasury;
pub mod voting;

pub use call::{
    Call, GOVERNOR_ADDRESS, LEDGER_ADDRESS, REPUTATION_ADDRESS, ROLES_ADDRESS, TIMELOCK_ADDRESS,
    TREASURY_ADDRESS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{Dao, DaoState};
pub use error::GovernanceError;
pub use proposal::{Action, Proposal, ProposalState, ProposalVotes, VoteReceipt, VoteSupport};
pub use roles::{Role, RoleRegistry};
pub use treasury::{Asset, RevenueSplit};
pub use voting::{BlendedCurve, LinearCurve, WeightCurve, WeightInputs};
