//! Per-account, per-category reputation with linear annual decay.
//!
//! Raw scores only ever grow. The effective score is recomputed from the raw
//! score and the time elapsed since the account's first contribution on
//! every read, so nothing stored is ever reduced.

use crate::checkpoint::Checkpoints;
use crate::error::GovernanceError;
use crate::roles::{Role, RoleRegistry};
use agora_types::amount::{check_bps, mul_div};
use agora_types::{Address, Amount, BasisPoints, Timestamp, BPS_DENOMINATOR, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DECAY_DENOMINATOR: u128 = BPS_DENOMINATOR * SECONDS_PER_YEAR as u128;

/// Linear decay: `raw * max(0, 1 - rate * elapsed / (10000 * year))`.
pub fn decay(raw: Amount, elapsed: Timestamp, rate_bps: BasisPoints) -> Amount {
    let lost = u128::from(rate_bps) * u128::from(elapsed);
    if lost >= DECAY_DENOMINATOR {
        return 0;
    }
    // quotient is at most `raw`
    mul_div(raw, DECAY_DENOMINATOR - lost, DECAY_DENOMINATOR).unwrap_or(0)
}

/// Stored reputation of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub raw_by_category: BTreeMap<String, Amount>,
    /// Set on the first contribution, never moved afterwards
    pub last_decay_timestamp: Timestamp,
    /// Sum of raw scores over time, for snapshot reads
    #[serde(default)]
    pub raw_history: Checkpoints,
}

impl ReputationRecord {
    pub fn raw_total(&self) -> Amount {
        self.raw_history.latest()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationStore {
    default_decay_rate_bps: BasisPoints,
    #[serde(default)]
    rate_overrides: BTreeMap<Address, BasisPoints>,
    /// Default rate over time
    #[serde(default)]
    default_rate_history: Checkpoints,
    /// Per-account override rates over time
    #[serde(default)]
    override_history: BTreeMap<Address, Checkpoints>,
    #[serde(default)]
    records: BTreeMap<Address, ReputationRecord>,
}

/// Decay settings persisted apart from the per-account records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DecaySettings {
    pub default_decay_rate_bps: BasisPoints,
    #[serde(default)]
    pub rate_overrides: BTreeMap<Address, BasisPoints>,
    #[serde(default)]
    pub default_rate_history: Checkpoints,
    #[serde(default)]
    pub override_history: BTreeMap<Address, Checkpoints>,
}

/// Borrowed view of [`DecaySettings`].
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct DecaySettingsRef<'a> {
    pub default_decay_rate_bps: &'a BasisPoints,
    pub rate_overrides: &'a BTreeMap<Address, BasisPoints>,
    pub default_rate_history: &'a Checkpoints,
    pub override_history: &'a BTreeMap<Address, Checkpoints>,
}

impl ReputationStore {
    pub fn new(default_decay_rate_bps: BasisPoints) -> Self {
        let mut default_rate_history = Checkpoints::new();
        default_rate_history.record(0, u128::from(default_decay_rate_bps));
        Self {
            default_decay_rate_bps,
            rate_overrides: BTreeMap::new(),
            default_rate_history,
            override_history: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        settings: DecaySettings,
        records: BTreeMap<Address, ReputationRecord>,
    ) -> Self {
        Self {
            default_decay_rate_bps: settings.default_decay_rate_bps,
            rate_overrides: settings.rate_overrides,
            default_rate_history: settings.default_rate_history,
            override_history: settings.override_history,
            records,
        }
    }

    pub(crate) fn settings(&self) -> DecaySettingsRef<'_> {
        DecaySettingsRef {
            default_decay_rate_bps: &self.default_decay_rate_bps,
            rate_overrides: &self.rate_overrides,
            default_rate_history: &self.default_rate_history,
            override_history: &self.override_history,
        }
    }

    pub(crate) fn records(&self) -> &BTreeMap<Address, ReputationRecord> {
        &self.records
    }

    pub fn record(&self, account: &Address) -> Option<&ReputationRecord> {
        self.records.get(account)
    }

    pub fn default_decay_rate(&self) -> BasisPoints {
        self.default_decay_rate_bps
    }

    /// Decay rate in force for `account`.
    pub fn decay_rate_of(&self, account: &Address) -> BasisPoints {
        self.rate_overrides
            .get(account)
            .copied()
            .unwrap_or(self.default_decay_rate_bps)
    }

    /// Decay rate that was in force for `account` at the start of `timestamp`.
    pub fn decay_rate_at(&self, account: &Address, timestamp: Timestamp) -> BasisPoints {
        self.override_history
            .get(account)
            .and_then(|history| history.checkpoint_before(timestamp))
            .or_else(|| self.default_rate_history.checkpoint_before(timestamp))
            .and_then(|rate| BasisPoints::try_from(rate).ok())
            .unwrap_or_else(|| self.decay_rate_of(account))
    }

    /// Increase `account`'s raw score in `category`. ReputationManager only.
    pub fn add_reputation(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        account: Address,
        category: &str,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        roles.require(Role::ReputationManager, caller)?;
        if amount == 0 {
            return Err(GovernanceError::InvalidAmount(
                "reputation amount must be > 0".to_string(),
            ));
        }
        if category.is_empty() {
            return Err(GovernanceError::InvalidParameter(
                "reputation category must not be empty".to_string(),
            ));
        }

        let overflow = || GovernanceError::InvalidAmount("reputation overflow".to_string());
        let is_new = !self.records.contains_key(&account);
        let record = self.records.entry(account).or_default();
        let total = record.raw_total().checked_add(amount).ok_or_else(overflow)?;
        let score = record
            .raw_by_category
            .get(category)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(overflow)?;

        if is_new {
            record.last_decay_timestamp = now;
        }
        record.raw_by_category.insert(category.to_string(), score);
        record.raw_history.record(now, total);

        tracing::debug!(%account, category, amount, by = %caller, "Reputation added");
        Ok(())
    }

    /// Effective reputation summed over categories.
    pub fn get_reputation(&self, account: &Address, now: Timestamp) -> Amount {
        let Some(record) = self.records.get(account) else {
            return 0;
        };
        let elapsed = now.saturating_sub(record.last_decay_timestamp);
        let rate = self.decay_rate_of(account);
        record
            .raw_by_category
            .values()
            .fold(0u128, |acc, raw| acc.saturating_add(decay(*raw, elapsed, rate)))
    }

    pub fn get_reputation_by_category(
        &self,
        account: &Address,
        category: &str,
        now: Timestamp,
    ) -> Amount {
        let Some(record) = self.records.get(account) else {
            return 0;
        };
        let raw = record.raw_by_category.get(category).copied().unwrap_or(0);
        let elapsed = now.saturating_sub(record.last_decay_timestamp);
        decay(raw, elapsed, self.decay_rate_of(account))
    }

    /// Effective reputation at the start of `timestamp`, ignoring later contributions.
    pub fn get_reputation_at(&self, account: &Address, timestamp: Timestamp) -> Amount {
        let Some(record) = self.records.get(account) else {
            return 0;
        };
        let raw = record.raw_history.value_before(timestamp);
        let elapsed = timestamp.saturating_sub(record.last_decay_timestamp);
        decay(raw, elapsed, self.decay_rate_at(account, timestamp))
    }

    pub fn get_total_reputation(&self, now: Timestamp) -> Amount {
        self.records
            .keys()
            .fold(0u128, |acc, account| acc.saturating_add(self.get_reputation(account, now)))
    }

    pub fn get_total_reputation_at(&self, timestamp: Timestamp) -> Amount {
        self.records.keys().fold(0u128, |acc, account| {
            acc.saturating_add(self.get_reputation_at(account, timestamp))
        })
    }

    /// Override `account`'s decay rate. Governor only.
    pub fn set_decay_rate(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        account: Address,
        rate_bps: BasisPoints,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        roles.require(Role::Governor, caller)?;
        let rate_bps = check_bps(rate_bps)?;
        self.rate_overrides.insert(account, rate_bps);
        self.override_history
            .entry(account)
            .or_default()
            .record(now, u128::from(rate_bps));
        tracing::info!(%account, rate_bps, "Decay rate overridden");
        Ok(())
    }

    pub fn set_default_decay_rate(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        rate_bps: BasisPoints,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        roles.require(Role::Governor, caller)?;
        self.default_decay_rate_bps = check_bps(rate_bps)?;
        self.default_rate_history
            .record(now, u128::from(self.default_decay_rate_bps));
        tracing::info!(rate_bps, "Default decay rate updated");
        Ok(())
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.records.keys()
    }
}
