//! Treasury: revenue capture with burn/reserve splits, allocations and
//! crowdfunding pass-through.
//!
//! Every revenue event of amount `A` burns `A * burn_bps / 10000`, reserves
//! `A * reserve_bps / 10000` and leaves the remainder spendable, so each
//! asset's book satisfies `total_burned + reserve_fund <= total_revenue`.
//!
//! The governance token is held in the ledger under [`TREASURY_ADDRESS`];
//! its reserve stays in that account but is not spendable.

use crate::call::TREASURY_ADDRESS;
use crate::config::validate_splits;
use crate::error::GovernanceError;
use crate::ledger::Ledger;
use crate::roles::{Role, RoleRegistry};
use agora_types::amount::bps_of;
use agora_types::{Address, Amount, BasisPoints, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Revenue stream used for crowdfunding fees.
pub const CROWDFUNDING_STREAM: &str = "crowdfunding";

/// Something the treasury holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Asset {
    Native,
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Token(token) => write!(f, "token:{}", token),
        }
    }
}

impl FromStr for Asset {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "native" {
            return Ok(Asset::Native);
        }
        let token = s
            .strip_prefix("token:")
            .ok_or_else(|| GovernanceError::InvalidParameter(format!("unknown asset: {}", s)))?;
        Ok(Asset::Token(token.parse()?))
    }
}

// String form so assets can key JSON maps.
impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Asset::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// How one revenue event was divided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub burned: Amount,
    pub reserved: Amount,
    pub available: Amount,
}

/// Accumulated revenue accounting for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueBook {
    pub by_stream: BTreeMap<String, Amount>,
    pub total_revenue: Amount,
    pub total_burned: Amount,
    pub reserve_fund: Amount,
}

impl RevenueBook {
    fn record(
        &mut self,
        stream: &str,
        amount: Amount,
        burn_bps: BasisPoints,
        reserve_bps: BasisPoints,
    ) -> Result<RevenueSplit, GovernanceError> {
        let overflow = || GovernanceError::InvalidAmount("revenue overflow".to_string());

        let burned = bps_of(amount, burn_bps);
        let reserved = bps_of(amount, reserve_bps);
        let available = amount - burned - reserved;

        let stream_total = self
            .by_stream
            .get(stream)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(overflow)?;
        let total_revenue = self.total_revenue.checked_add(amount).ok_or_else(overflow)?;

        self.by_stream.insert(stream.to_string(), stream_total);
        self.total_revenue = total_revenue;
        self.total_burned += burned;
        self.reserve_fund += reserved;

        Ok(RevenueSplit { burned, reserved, available })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKind {
    /// Governor-approved grant
    Allocation,
    /// Native payment attached to an executed proposal
    Payment,
    /// Contribution forwarded to a crowdfunding recipient
    Crowdfunding,
}

/// Audit record of funds leaving the treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub kind: AllocationKind,
    pub asset: Asset,
    pub recipient: Address,
    pub amount: Amount,
    pub purpose: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdfundingReceipt {
    pub fee: Amount,
    pub split: RevenueSplit,
    pub forwarded: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    transaction_fee_bps: BasisPoints,
    burn_bps: BasisPoints,
    reserve_bps: BasisPoints,
    /// Spendable native currency
    native_balance: Amount,
    /// Spendable balances of tokens other than the governance token
    #[serde(default)]
    token_balances: BTreeMap<Address, Amount>,
    #[serde(default)]
    books: BTreeMap<Asset, RevenueBook>,
    #[serde(default)]
    allocations: Vec<AllocationRecord>,
}

fn require_positive(amount: Amount) -> Result<(), GovernanceError> {
    if amount == 0 {
        return Err(GovernanceError::InvalidAmount("amount must be > 0".to_string()));
    }
    Ok(())
}

impl Treasury {
    pub fn new(
        transaction_fee_bps: BasisPoints,
        burn_bps: BasisPoints,
        reserve_bps: BasisPoints,
    ) -> Result<Self, GovernanceError> {
        validate_splits(transaction_fee_bps, burn_bps, reserve_bps)?;
        Ok(Self {
            transaction_fee_bps,
            burn_bps,
            reserve_bps,
            native_balance: 0,
            token_balances: BTreeMap::new(),
            books: BTreeMap::new(),
            allocations: Vec::new(),
        })
    }

    /// `(transaction_fee_bps, burn_bps, reserve_bps)`
    pub fn splits(&self) -> (BasisPoints, BasisPoints, BasisPoints) {
        (self.transaction_fee_bps, self.burn_bps, self.reserve_bps)
    }

    /// Spendable native balance.
    pub fn get_balance(&self) -> Amount {
        self.native_balance
    }

    /// Spendable balance of `token`; for the governance token this is the
    /// treasury's ledger balance minus its reserve.
    pub fn get_token_balance(&self, ledger: &Ledger, token: &Address) -> Amount {
        if *token == ledger.token() {
            let reserve = self.book(&Asset::Token(*token)).map(|b| b.reserve_fund).unwrap_or(0);
            ledger.balance_of(&TREASURY_ADDRESS).saturating_sub(reserve)
        } else {
            self.token_balances.get(token).copied().unwrap_or(0)
        }
    }

    pub fn book(&self, asset: &Asset) -> Option<&RevenueBook> {
        self.books.get(asset)
    }

    pub fn books(&self) -> impl Iterator<Item = (&Asset, &RevenueBook)> {
        self.books.iter()
    }

    pub fn allocations(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    fn book_revenue(
        &mut self,
        asset: Asset,
        stream: &str,
        amount: Amount,
    ) -> Result<RevenueSplit, GovernanceError> {
        let (burn_bps, reserve_bps) = (self.burn_bps, self.reserve_bps);
        self.books
            .entry(asset)
            .or_default()
            .record(stream, amount, burn_bps, reserve_bps)
    }

    /// Book native revenue and split it into burn, reserve and spendable parts.
    pub fn capture_revenue(
        &mut self,
        stream: &str,
        amount: Amount,
        now: Timestamp,
    ) -> Result<RevenueSplit, GovernanceError> {
        require_positive(amount)?;
        if stream.is_empty() {
            return Err(GovernanceError::InvalidParameter(
                "revenue stream must not be empty".to_string(),
            ));
        }

        let split = self.book_revenue(Asset::Native, stream, amount)?;
        self.native_balance = self
            .native_balance
            .checked_add(split.available)
            .ok_or_else(|| GovernanceError::InvalidAmount("treasury overflow".to_string()))?;

        tracing::info!(
            stream,
            amount,
            burned = split.burned,
            reserved = split.reserved,
            available = split.available,
            timestamp = now,
            "Revenue captured"
        );
        Ok(split)
    }

    /// Native funds received without a fee split.
    pub fn deposit_native(&mut self, amount: Amount) -> Result<(), GovernanceError> {
        require_positive(amount)?;
        self.native_balance = self
            .native_balance
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("treasury overflow".to_string()))?;
        tracing::debug!(amount, "Native deposit");
        Ok(())
    }

    /// Tokens received without a fee split. Governance tokens are moved out
    /// of `from`'s ledger balance; other tokens are credited as received.
    pub fn deposit_tokens(
        &mut self,
        ledger: &mut Ledger,
        token: Address,
        from: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        require_positive(amount)?;
        if token == ledger.token() {
            ledger.transfer(from, TREASURY_ADDRESS, amount, now)?;
        } else {
            self.credit_token(token, amount)?;
        }
        tracing::debug!(%token, %from, amount, "Token deposit");
        Ok(())
    }

    fn credit_token(&mut self, token: Address, amount: Amount) -> Result<(), GovernanceError> {
        let balance = self.token_balances.entry(token).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("treasury overflow".to_string()))?;
        Ok(())
    }

    fn push_record(
        &mut self,
        kind: AllocationKind,
        asset: Asset,
        recipient: Address,
        amount: Amount,
        purpose: &str,
        now: Timestamp,
    ) -> AllocationRecord {
        let record = AllocationRecord {
            kind,
            asset,
            recipient,
            amount,
            purpose: purpose.to_string(),
            timestamp: now,
        };
        self.allocations.push(record.clone());
        record
    }

    fn debit_native(&mut self, amount: Amount) -> Result<(), GovernanceError> {
        if self.native_balance < amount {
            return Err(GovernanceError::InsufficientTreasuryFunds {
                available: self.native_balance,
                requested: amount,
            });
        }
        self.native_balance -= amount;
        Ok(())
    }

    /// Grant native funds. Governor only.
    pub fn allocate_funds(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        recipient: Address,
        amount: Amount,
        purpose: &str,
        now: Timestamp,
    ) -> Result<AllocationRecord, GovernanceError> {
        roles.require(Role::Governor, caller)?;
        require_positive(amount)?;
        self.debit_native(amount)?;

        let record =
            self.push_record(AllocationKind::Allocation, Asset::Native, recipient, amount, purpose, now);
        tracing::info!(%recipient, amount, purpose, by = %caller, "Funds allocated");
        Ok(record)
    }

    /// Grant tokens. Governor only.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate_tokens(
        &mut self,
        roles: &RoleRegistry,
        ledger: &mut Ledger,
        caller: &Address,
        token: Address,
        recipient: Address,
        amount: Amount,
        purpose: &str,
        now: Timestamp,
    ) -> Result<AllocationRecord, GovernanceError> {
        roles.require(Role::Governor, caller)?;
        require_positive(amount)?;

        let available = self.get_token_balance(ledger, &token);
        if available < amount {
            return Err(GovernanceError::InsufficientTreasuryFunds { available, requested: amount });
        }
        if token == ledger.token() {
            ledger.transfer(TREASURY_ADDRESS, recipient, amount, now)?;
        } else if let Some(balance) = self.token_balances.get_mut(&token) {
            *balance -= amount;
        }

        let record = self.push_record(
            AllocationKind::Allocation,
            Asset::Token(token),
            recipient,
            amount,
            purpose,
            now,
        );
        tracing::info!(%token, %recipient, amount, purpose, by = %caller, "Tokens allocated");
        Ok(record)
    }

    /// Native payment carried by an executed proposal action.
    pub(crate) fn pay_native(
        &mut self,
        recipient: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<AllocationRecord, GovernanceError> {
        require_positive(amount)?;
        self.debit_native(amount)?;
        let record =
            self.push_record(AllocationKind::Payment, Asset::Native, recipient, amount, "", now);
        tracing::info!(%recipient, amount, "Proposal payment");
        Ok(record)
    }

    /// Route a contribution from `sender` to `recipient` through the
    /// treasury, capturing the transaction fee as crowdfunding revenue.
    #[allow(clippy::too_many_arguments)]
    pub fn process_crowdfunding(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        token: Address,
        sender: Address,
        recipient: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<CrowdfundingReceipt, GovernanceError> {
        if *caller != sender {
            return Err(GovernanceError::Unauthorized(format!(
                "{} cannot contribute on behalf of {}",
                caller, sender
            )));
        }
        require_positive(amount)?;

        let fee = bps_of(amount, self.transaction_fee_bps);
        let forwarded = amount - fee;
        let asset = Asset::Token(token);

        let split = if token == ledger.token() {
            ledger.transfer(sender, TREASURY_ADDRESS, amount, now)?;
            let split = if fee > 0 {
                self.book_revenue(asset, CROWDFUNDING_STREAM, fee)?
            } else {
                RevenueSplit::default()
            };
            if split.burned > 0 {
                ledger.burn(TREASURY_ADDRESS, split.burned, now)?;
            }
            if forwarded > 0 {
                ledger.transfer(TREASURY_ADDRESS, recipient, forwarded, now)?;
            }
            split
        } else {
            let split = if fee > 0 {
                self.book_revenue(asset, CROWDFUNDING_STREAM, fee)?
            } else {
                RevenueSplit::default()
            };
            if split.available > 0 {
                self.credit_token(token, split.available)?;
            }
            split
        };

        if forwarded > 0 {
            let purpose = format!("crowdfunding from {}", sender);
            self.push_record(AllocationKind::Crowdfunding, asset, recipient, forwarded, &purpose, now);
        }

        tracing::info!(
            %token,
            %sender,
            %recipient,
            amount,
            fee,
            burned = split.burned,
            forwarded,
            "Crowdfunding processed"
        );
        Ok(CrowdfundingReceipt { fee, split, forwarded })
    }

    /// Replace the fee/burn/reserve parameters. Governor only.
    pub fn update_splits(
        &mut self,
        roles: &RoleRegistry,
        caller: &Address,
        transaction_fee_bps: BasisPoints,
        burn_bps: BasisPoints,
        reserve_bps: BasisPoints,
    ) -> Result<(), GovernanceError> {
        roles.require(Role::Governor, caller)?;
        validate_splits(transaction_fee_bps, burn_bps, reserve_bps)?;
        self.transaction_fee_bps = transaction_fee_bps;
        self.burn_bps = burn_bps;
        self.reserve_bps = reserve_bps;
        tracing::info!(transaction_fee_bps, burn_bps, reserve_bps, "Treasury splits updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::amount::tokens;

    const T0: Timestamp = 1_700_000_000;

    fn governor() -> Address {
        Address::from_label("governor")
    }

    fn roles() -> RoleRegistry {
        let mut roles = RoleRegistry::new();
        roles.bootstrap(Role::Governor, governor());
        roles
    }

    fn treasury() -> Treasury {
        Treasury::new(250, 3_000, 2_000).unwrap()
    }

    #[test]
    fn test_split_exactness() {
        let mut treasury = treasury();
        let split = treasury.capture_revenue("fees", 100, T0).unwrap();
        assert_eq!(split, RevenueSplit { burned: 30, reserved: 20, available: 50 });

        let book = treasury.book(&Asset::Native).unwrap();
        assert_eq!(book.total_burned, 30);
        assert_eq!(book.reserve_fund, 20);
        assert_eq!(book.total_revenue, 100);
        assert_eq!(book.by_stream["fees"], 100);
        assert_eq!(treasury.get_balance(), 50);
    }

    #[test]
    fn test_capture_rejects_zero() {
        let mut treasury = treasury();
        assert!(matches!(
            treasury.capture_revenue("fees", 0, T0),
            Err(GovernanceError::InvalidAmount(_))
        ));
        assert!(treasury.book(&Asset::Native).is_none());
    }

    #[test]
    fn test_allocate_funds() {
        let mut treasury = treasury();
        let roles = roles();
        let grantee = Address::from_label("grantee");
        treasury.deposit_native(tokens(10)).unwrap();

        let outsider = Address::from_label("outsider");
        assert!(matches!(
            treasury.allocate_funds(&roles, &outsider, grantee, tokens(1), "audit", T0),
            Err(GovernanceError::Unauthorized(_))
        ));
        assert_eq!(
            treasury.allocate_funds(&roles, &governor(), grantee, tokens(11), "audit", T0),
            Err(GovernanceError::InsufficientTreasuryFunds {
                available: tokens(10),
                requested: tokens(11)
            })
        );

        let record = treasury
            .allocate_funds(&roles, &governor(), grantee, tokens(4), "audit", T0)
            .unwrap();
        assert_eq!(record.purpose, "audit");
        assert_eq!(treasury.get_balance(), tokens(6));
        assert_eq!(treasury.allocations().len(), 1);
    }

    #[test]
    fn test_governance_token_reserve_is_not_spendable() {
        let mut treasury = treasury();
        let roles = roles();
        let token = Address::from_label("agora-token");
        let mut ledger = Ledger::new(token, 0);
        let backer = Address::from_label("backer");
        let project = Address::from_label("project");
        ledger.mint(backer, tokens(1_000), T0).unwrap();

        let receipt = treasury
            .process_crowdfunding(&mut ledger, &backer, token, backer, project, tokens(400), T0)
            .unwrap();
        // 2.5% fee of 400 = 10; 3 burned, 2 reserved, 5 spendable
        assert_eq!(receipt.fee, tokens(10));
        assert_eq!(receipt.forwarded, tokens(390));
        assert_eq!(receipt.split.burned, tokens(3));
        assert_eq!(ledger.balance_of(&project), tokens(390));
        assert_eq!(ledger.balance_of(&TREASURY_ADDRESS), tokens(7));
        assert_eq!(ledger.total_burned(), tokens(3));
        assert_eq!(treasury.get_token_balance(&ledger, &token), tokens(5));

        assert!(matches!(
            treasury.allocate_tokens(
                &roles, &mut ledger, &governor(), token, project, tokens(6), "grant", T0
            ),
            Err(GovernanceError::InsufficientTreasuryFunds { .. })
        ));
    }

    #[test]
    fn test_crowdfunding_foreign_token() {
        let mut treasury = treasury();
        let mut ledger = Ledger::new(Address::from_label("agora-token"), 0);
        let usdc = Address::from_label("usdc");
        let backer = Address::from_label("backer");
        let project = Address::from_label("project");

        let receipt = treasury
            .process_crowdfunding(&mut ledger, &backer, usdc, backer, project, 10_000, T0)
            .unwrap();
        assert_eq!(receipt.fee, 250);
        assert_eq!(receipt.forwarded, 9_750);
        assert_eq!(treasury.get_token_balance(&ledger, &usdc), 125);
        assert_eq!(treasury.book(&Asset::Token(usdc)).unwrap().by_stream[CROWDFUNDING_STREAM], 250);

        let mallory = Address::from_label("mallory");
        assert!(matches!(
            treasury.process_crowdfunding(&mut ledger, &mallory, usdc, backer, project, 1, T0),
            Err(GovernanceError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_update_splits() {
        let mut treasury = treasury();
        let roles = roles();
        assert!(treasury.update_splits(&roles, &governor(), 100, 9_000, 2_000).is_err());
        treasury.update_splits(&roles, &governor(), 100, 1_000, 0).unwrap();
        assert_eq!(treasury.splits(), (100, 1_000, 0));
    }

    #[test]
    fn test_asset_string_form() {
        let usdc = Asset::Token(Address::from_label("usdc"));
        assert_eq!(usdc.to_string().parse::<Asset>().unwrap(), usdc);
        assert_eq!("native".parse::<Asset>().unwrap(), Asset::Native);
        assert!("gold".parse::<Asset>().is_err());
    }
}
