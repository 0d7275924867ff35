//! Engine parameters and genesis allocation.
//!
//! Every parameter set here is frozen into the persisted state when the
//! engine is first initialized; later changes go through governance calls.

use crate::error::GovernanceError;
use agora_types::amount::{check_bps, serde_tokens, tokens};
use agora_types::{Address, Amount, BasisPoints, Timestamp, BPS_DENOMINATOR, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};

/// Proposal lifecycle and vote-weight parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Seconds between proposal creation and its snapshot
    pub voting_delay: Timestamp,
    /// Length of the voting window in seconds
    pub voting_period: Timestamp,
    /// Quorum as a share of total supply at the snapshot
    pub quorum_bps: BasisPoints,
    /// Votes a proposer needs to submit a proposal
    #[serde(with = "serde_tokens")]
    pub proposal_threshold: Amount,
    /// Minimum delay between queueing and execution
    pub timelock_min_delay: Timestamp,
    /// Window after the eta during which a queued proposal may execute
    pub grace_period: Timestamp,
    /// Share of token power taken from the square-root curve
    pub quadratic_factor_bps: BasisPoints,
    /// Multiplier applied to `sqrt(token_votes)`
    pub scaling_constant: u64,
    /// Share of total weight taken from reputation
    pub reputation_weight_bps: BasisPoints,
    /// Maximum actions per proposal
    pub max_actions: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting_delay: SECONDS_PER_DAY,
            voting_period: 7 * SECONDS_PER_DAY,
            quorum_bps: 400,
            proposal_threshold: tokens(1),
            timelock_min_delay: 2 * SECONDS_PER_DAY,
            grace_period: 14 * SECONDS_PER_DAY,
            quadratic_factor_bps: 5_000,
            scaling_constant: 1_000_000_000,
            reputation_weight_bps: 3_000,
            max_actions: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    pub annual_rate_bps: BasisPoints,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self { annual_rate_bps: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Annual linear decay applied to accounts without an override
    pub default_decay_rate_bps: BasisPoints,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self { default_decay_rate_bps: 1_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasuryConfig {
    /// Fee taken from crowdfunding contributions
    pub transaction_fee_bps: BasisPoints,
    pub burn_bps: BasisPoints,
    pub reserve_bps: BasisPoints,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            transaction_fee_bps: 250,
            burn_bps: 3_000,
            reserve_bps: 2_000,
        }
    }
}

/// Initial token balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub address: Address,
    #[serde(with = "serde_tokens")]
    pub amount: Amount,
}

/// Initial holding of a token other than the governance token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHolding {
    pub token: Address,
    #[serde(with = "serde_tokens")]
    pub amount: Amount,
}

/// State created once when the engine is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Identifier of the governance token
    pub token: Address,
    pub balances: Vec<Allocation>,
    /// Spendable native currency held by the treasury
    #[serde(with = "serde_tokens")]
    pub treasury_native: Amount,
    /// Governance tokens minted to the treasury
    #[serde(with = "serde_tokens")]
    pub treasury_governance_tokens: Amount,
    pub treasury_tokens: Vec<TokenHolding>,
    pub governors: Vec<Address>,
    pub reputation_managers: Vec<Address>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            token: Address::from_label("agora-token"),
            balances: Vec::new(),
            treasury_native: 0,
            treasury_governance_tokens: 0,
            treasury_tokens: Vec::new(),
            governors: Vec::new(),
            reputation_managers: Vec::new(),
        }
    }
}

/// Everything the engine needs to start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub governance: GovernanceConfig,
    pub staking: StakingConfig,
    pub reputation: ReputationConfig,
    pub treasury: TreasuryConfig,
    pub genesis: GenesisConfig,
}

impl EngineConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        let gov = &self.governance;
        check_bps(gov.quorum_bps)?;
        check_bps(gov.quadratic_factor_bps)?;
        check_bps(gov.reputation_weight_bps)?;
        check_bps(self.staking.annual_rate_bps)?;
        check_bps(self.reputation.default_decay_rate_bps)?;
        validate_splits(
            self.treasury.transaction_fee_bps,
            self.treasury.burn_bps,
            self.treasury.reserve_bps,
        )?;

        if gov.voting_period == 0 {
            return Err(GovernanceError::InvalidParameter(
                "voting_period must be > 0".to_string(),
            ));
        }
        if gov.max_actions == 0 {
            return Err(GovernanceError::InvalidParameter(
                "max_actions must be > 0".to_string(),
            ));
        }
        if gov.scaling_constant == 0 && gov.quadratic_factor_bps > 0 {
            return Err(GovernanceError::InvalidParameter(
                "scaling_constant must be > 0 when quadratic voting is enabled".to_string(),
            ));
        }

        if self.genesis.token.is_zero() {
            return Err(GovernanceError::InvalidParameter(
                "genesis token must not be the zero address".to_string(),
            ));
        }
        if let Some(holding) = self
            .genesis
            .treasury_tokens
            .iter()
            .find(|h| h.token == self.genesis.token)
        {
            return Err(GovernanceError::InvalidParameter(format!(
                "treasury_tokens lists the governance token {}; use treasury_governance_tokens",
                holding.token
            )));
        }

        Ok(())
    }
}

/// Reject a fee/burn/reserve triple that is out of range.
pub(crate) fn validate_splits(
    fee_bps: BasisPoints,
    burn_bps: BasisPoints,
    reserve_bps: BasisPoints,
) -> Result<(), GovernanceError> {
    check_bps(fee_bps)?;
    check_bps(burn_bps)?;
    check_bps(reserve_bps)?;
    if u128::from(burn_bps) + u128::from(reserve_bps) > BPS_DENOMINATOR {
        return Err(GovernanceError::InvalidParameter(format!(
            "burn ({}) + reserve ({}) exceeds 10000 bps",
            burn_bps, reserve_bps
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_split() {
        let mut config = EngineConfig::default();
        config.treasury.burn_bps = 6_000;
        config.treasury.reserve_bps = 5_000;
        assert!(matches!(
            config.validate(),
            Err(GovernanceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_bps_over_hundred_percent() {
        let mut config = EngineConfig::default();
        config.governance.quorum_bps = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_governance_token_in_foreign_holdings() {
        let mut config = EngineConfig::default();
        config.genesis.treasury_tokens.push(TokenHolding {
            token: config.genesis.token,
            amount: 1,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_amounts_as_token_strings() {
        let json = r#"{"governance": {"proposal_threshold": "2.5"},
                       "genesis": {"treasury_native": "1000"}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.governance.proposal_threshold, tokens(2) + tokens(1) / 2);
        assert_eq!(config.genesis.treasury_native, tokens(1_000));
        assert_eq!(config.governance.voting_delay, SECONDS_PER_DAY);
    }
}
