//! Governance token ledger with staking and vote checkpoints.
//!
//! Conservation: `Σ(spendable + staked) == total_minted - total_burned`
//! after every operation. Staking moves tokens between the two sub-balances
//! of one account, so an account's voting units (spendable + staked) are not
//! changed by staking.

use crate::checkpoint::Checkpoints;
use crate::error::GovernanceError;
use agora_types::amount::{check_bps, mul_div};
use agora_types::{Address, Amount, BasisPoints, Timestamp, BPS_DENOMINATOR, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balances of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Spendable balance
    pub balance: Amount,
    /// Staked sub-balance
    pub staked: Amount,
    /// Start of the current reward accrual period
    pub stake_start: Timestamp,
    /// Receiver of this account's voting units (None = self)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegatee: Option<Address>,
    /// Voting power delegated to this account over time
    #[serde(default)]
    pub votes: Checkpoints,
}

impl Account {
    /// Units this account contributes to its delegatee.
    pub fn voting_units(&self) -> Amount {
        self.balance.saturating_add(self.staked)
    }
}

/// Fungible governance token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    token: Address,
    annual_rate_bps: BasisPoints,
    accounts: BTreeMap<Address, Account>,
    total_supply: Checkpoints,
    total_minted: Amount,
    total_burned: Amount,
}

/// Ledger totals persisted apart from the per-account rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LedgerHeader {
    pub token: Address,
    pub annual_rate_bps: BasisPoints,
    pub total_supply: Checkpoints,
    pub total_minted: Amount,
    pub total_burned: Amount,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct LedgerHeaderRef<'a> {
    pub token: &'a Address,
    pub annual_rate_bps: &'a BasisPoints,
    pub total_supply: &'a Checkpoints,
    pub total_minted: &'a Amount,
    pub total_burned: &'a Amount,
}

fn require_positive(amount: Amount, what: &str) -> Result<(), GovernanceError> {
    if amount == 0 {
        return Err(GovernanceError::InvalidAmount(format!("{} must be > 0", what)));
    }
    Ok(())
}

impl Ledger {
    pub fn new(token: Address, annual_rate_bps: BasisPoints) -> Self {
        Self {
            token,
            annual_rate_bps,
            accounts: BTreeMap::new(),
            total_supply: Checkpoints::new(),
            total_minted: 0,
            total_burned: 0,
        }
    }

    pub(crate) fn from_parts(header: LedgerHeader, accounts: BTreeMap<Address, Account>) -> Self {
        Self {
            token: header.token,
            annual_rate_bps: header.annual_rate_bps,
            accounts,
            total_supply: header.total_supply,
            total_minted: header.total_minted,
            total_burned: header.total_burned,
        }
    }

    pub(crate) fn header(&self) -> LedgerHeaderRef<'_> {
        LedgerHeaderRef {
            token: &self.token,
            annual_rate_bps: &self.annual_rate_bps,
            total_supply: &self.total_supply,
            total_minted: &self.total_minted,
            total_burned: &self.total_burned,
        }
    }

    pub(crate) fn account_map(&self) -> &BTreeMap<Address, Account> {
        &self.accounts
    }

    /// Identifier of the governance token.
    pub fn token(&self) -> Address {
        self.token
    }

    pub fn annual_rate_bps(&self) -> BasisPoints {
        self.annual_rate_bps
    }

    pub fn set_annual_rate(&mut self, rate_bps: BasisPoints) -> Result<(), GovernanceError> {
        self.annual_rate_bps = check_bps(rate_bps)?;
        Ok(())
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    pub fn staked_balance_of(&self, address: &Address) -> Amount {
        self.accounts.get(address).map(|a| a.staked).unwrap_or(0)
    }

    /// Account receiving `address`'s voting units.
    pub fn delegates(&self, address: &Address) -> Address {
        self.accounts
            .get(address)
            .and_then(|a| a.delegatee)
            .unwrap_or(*address)
    }

    /// Current voting power held by `address` (own units plus delegations).
    pub fn get_votes(&self, address: &Address) -> Amount {
        self.accounts.get(address).map(|a| a.votes.latest()).unwrap_or(0)
    }

    /// Voting power of `address` in force at the start of `timestamp`.
    pub fn get_past_votes(
        &self,
        address: &Address,
        timestamp: Timestamp,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        if timestamp > now {
            return Err(GovernanceError::FutureLookup { requested: timestamp, now });
        }
        Ok(self.votes_before(address, timestamp))
    }

    pub(crate) fn votes_before(&self, address: &Address, timestamp: Timestamp) -> Amount {
        self.accounts
            .get(address)
            .map(|a| a.votes.value_before(timestamp))
            .unwrap_or(0)
    }

    /// Total supply in force at the start of `timestamp`.
    pub fn get_past_total_supply(
        &self,
        timestamp: Timestamp,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        if timestamp > now {
            return Err(GovernanceError::FutureLookup { requested: timestamp, now });
        }
        Ok(self.supply_before(timestamp))
    }

    pub(crate) fn supply_before(&self, timestamp: Timestamp) -> Amount {
        self.total_supply.value_before(timestamp)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply.latest()
    }

    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }

    pub fn total_burned(&self) -> Amount {
        self.total_burned
    }

    /// Sum of spendable and staked balances across all accounts.
    pub fn circulating(&self) -> Amount {
        self.accounts
            .values()
            .fold(0u128, |acc, a| acc.saturating_add(a.voting_units()))
    }

    fn add_votes(&mut self, delegatee: Address, amount: Amount, now: Timestamp) {
        let account = self.accounts.entry(delegatee).or_default();
        let votes = account.votes.latest().saturating_add(amount);
        account.votes.record(now, votes);
    }

    fn sub_votes(&mut self, delegatee: Address, amount: Amount, now: Timestamp) {
        let account = self.accounts.entry(delegatee).or_default();
        let votes = account.votes.latest().saturating_sub(amount);
        account.votes.record(now, votes);
    }

    fn move_votes(&mut self, src: Address, dst: Address, amount: Amount, now: Timestamp) {
        if src == dst || amount == 0 {
            return;
        }
        self.sub_votes(src, amount, now);
        self.add_votes(dst, amount, now);
    }

    /// Create new tokens (genesis allocations and staking rewards).
    pub(crate) fn mint(
        &mut self,
        to: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        require_positive(amount, "mint amount")?;

        let overflow = || GovernanceError::InvalidAmount("supply overflow".to_string());
        let supply = self.total_supply.latest().checked_add(amount).ok_or_else(overflow)?;
        let minted = self.total_minted.checked_add(amount).ok_or_else(overflow)?;

        let delegatee = self.delegates(&to);
        let account = self.accounts.entry(to).or_default();
        account.balance = account.balance.checked_add(amount).ok_or_else(overflow)?;

        self.total_minted = minted;
        self.total_supply.record(now, supply);
        self.add_votes(delegatee, amount, now);

        tracing::debug!(%to, amount, "Minted");
        Ok(())
    }

    /// Destroy tokens from `from`'s spendable balance.
    pub fn burn(
        &mut self,
        from: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        require_positive(amount, "burn amount")?;

        let available = self.balance_of(&from);
        if available < amount {
            return Err(GovernanceError::InsufficientBalance { available, required: amount });
        }

        let delegatee = self.delegates(&from);
        if let Some(account) = self.accounts.get_mut(&from) {
            account.balance -= amount;
        }
        self.total_burned += amount;
        let supply = self.total_supply.latest() - amount;
        self.total_supply.record(now, supply);
        self.sub_votes(delegatee, amount, now);

        tracing::debug!(%from, amount, "Burned");
        Ok(())
    }

    /// Move spendable tokens between accounts.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        require_positive(amount, "transfer amount")?;

        let available = self.balance_of(&from);
        if available < amount {
            return Err(GovernanceError::InsufficientBalance { available, required: amount });
        }
        if from == to {
            return Ok(());
        }

        let recipient_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("balance overflow".to_string()))?;

        let src = self.delegates(&from);
        let dst = self.delegates(&to);
        if let Some(account) = self.accounts.get_mut(&from) {
            account.balance -= amount;
        }
        self.accounts.entry(to).or_default().balance = recipient_balance;
        self.move_votes(src, dst, amount, now);

        tracing::debug!(%from, %to, amount, "Transferred");
        Ok(())
    }

    /// Point `account`'s voting units at `delegatee` (itself to undelegate).
    pub fn delegate(
        &mut self,
        account: Address,
        delegatee: Address,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let previous = self.delegates(&account);
        if previous == delegatee {
            return Ok(());
        }

        let entry = self.accounts.entry(account).or_default();
        let units = entry.voting_units();
        entry.delegatee = if delegatee == account { None } else { Some(delegatee) };
        self.move_votes(previous, delegatee, units, now);

        tracing::debug!(%account, from = %previous, to = %delegatee, units, "Delegation changed");
        Ok(())
    }

    /// Rewards accrued since the last stake/unstake/claim.
    ///
    /// `staked * rate_bps * elapsed / (10000 * SECONDS_PER_YEAR)`, truncated.
    pub fn pending_rewards(
        &self,
        address: &Address,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        let Some(account) = self.accounts.get(address) else {
            return Ok(0);
        };
        if account.staked == 0 {
            return Ok(0);
        }
        let elapsed = now.saturating_sub(account.stake_start);
        if elapsed == 0 {
            return Ok(0);
        }

        let rate_time = u128::from(self.annual_rate_bps) * u128::from(elapsed);
        let denominator = BPS_DENOMINATOR * u128::from(SECONDS_PER_YEAR);
        Ok(mul_div(account.staked, rate_time, denominator)?)
    }

    // Mint pending rewards and restart the accrual clock.
    fn settle_rewards(&mut self, address: Address, now: Timestamp) -> Result<Amount, GovernanceError> {
        let reward = self.pending_rewards(&address, now)?;
        if reward > 0 {
            self.mint(address, reward, now)?;
        }
        if let Some(account) = self.accounts.get_mut(&address) {
            account.stake_start = now;
        }
        Ok(reward)
    }

    /// Move `amount` from spendable to staked. Returns rewards settled first.
    pub fn stake(
        &mut self,
        address: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        require_positive(amount, "stake amount")?;

        let available = self.balance_of(&address);
        if available < amount {
            return Err(GovernanceError::InsufficientBalance { available, required: amount });
        }

        let reward = if self.staked_balance_of(&address) > 0 {
            self.settle_rewards(address, now)?
        } else {
            0
        };

        let account = self.accounts.entry(address).or_default();
        account.balance -= amount;
        account.staked = account
            .staked
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("stake overflow".to_string()))?;
        account.stake_start = now;

        tracing::debug!(%address, amount, reward, "Staked");
        Ok(reward)
    }

    /// Move `amount` from staked back to spendable. Returns rewards settled first.
    pub fn unstake(
        &mut self,
        address: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        require_positive(amount, "unstake amount")?;

        let staked = self.staked_balance_of(&address);
        if amount > staked {
            return Err(GovernanceError::InsufficientStake { staked, requested: amount });
        }

        let reward = self.settle_rewards(address, now)?;

        let account = self.accounts.entry(address).or_default();
        account.staked -= amount;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("balance overflow".to_string()))?;

        tracing::debug!(%address, amount, reward, "Unstaked");
        Ok(reward)
    }

    /// Mint accrued rewards into the spendable balance and reset the clock.
    pub fn claim_staking_rewards(
        &mut self,
        address: Address,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        if self.staked_balance_of(&address) == 0 {
            return Ok(0);
        }
        let reward = self.settle_rewards(address, now)?;
        tracing::debug!(%address, reward, "Rewards claimed");
        Ok(reward)
    }
}
