//! Vote weight model.
//!
//! ```text
//! token      = votes * (1 - q) + sqrt(votes) * scaling * q
//! reputation = rep * supply / total_rep          (0 when total_rep == 0)
//! weight     = token * (1 - r) + reputation * r
//! ```
//!
//! `q` is the quadratic factor and `r` the reputation weight, both in basis
//! points. Every input is read at the proposal snapshot.

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use agora_types::amount::{bps_of, isqrt, mul_div};
use agora_types::{Amount, BasisPoints, BPS_DENOMINATOR};
use std::fmt;

/// Snapshot values a weight is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightInputs {
    /// Token voting power (own plus delegated units)
    pub token_votes: Amount,
    /// Effective reputation of the voter
    pub reputation: Amount,
    /// Effective reputation of all accounts
    pub total_reputation: Amount,
    /// Total token supply
    pub total_supply: Amount,
}

/// Maps snapshot inputs to a vote weight.
pub trait WeightCurve: Send + Sync + fmt::Debug {
    fn weight(&self, inputs: &WeightInputs) -> Result<Amount, GovernanceError>;
}

/// Linear/quadratic token blend mixed with normalized reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendedCurve {
    pub quadratic_factor_bps: BasisPoints,
    pub scaling_constant: u64,
    pub reputation_weight_bps: BasisPoints,
}

impl BlendedCurve {
    pub fn from_config(config: &GovernanceConfig) -> Self {
        Self {
            quadratic_factor_bps: config.quadratic_factor_bps,
            scaling_constant: config.scaling_constant,
            reputation_weight_bps: config.reputation_weight_bps,
        }
    }

    pub fn token_component(&self, token_votes: Amount) -> Amount {
        let q = self.quadratic_factor_bps;
        let linear = bps_of(token_votes, complement(q));
        let quadratic = isqrt(token_votes).saturating_mul(u128::from(self.scaling_constant));
        linear.saturating_add(bps_of(quadratic, q))
    }

    pub fn reputation_component(&self, inputs: &WeightInputs) -> Result<Amount, GovernanceError> {
        if inputs.total_reputation == 0 {
            return Ok(0);
        }
        Ok(mul_div(inputs.reputation, inputs.total_supply, inputs.total_reputation)?)
    }
}

fn complement(bps: BasisPoints) -> BasisPoints {
    (BPS_DENOMINATOR as BasisPoints).saturating_sub(bps)
}

impl WeightCurve for BlendedCurve {
    fn weight(&self, inputs: &WeightInputs) -> Result<Amount, GovernanceError> {
        let r = self.reputation_weight_bps;
        let token = self.token_component(inputs.token_votes);
        let reputation = self.reputation_component(inputs)?;

        bps_of(token, complement(r))
            .checked_add(bps_of(reputation, r))
            .ok_or_else(|| GovernanceError::InvalidAmount("vote weight overflow".to_string()))
    }
}

/// Plain token voting: one unit, one vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearCurve;

impl WeightCurve for LinearCurve {
    fn weight(&self, inputs: &WeightInputs) -> Result<Amount, GovernanceError> {
        Ok(inputs.token_votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::amount::tokens;

    fn curve(q: BasisPoints, r: BasisPoints) -> BlendedCurve {
        BlendedCurve {
            quadratic_factor_bps: q,
            scaling_constant: 1_000_000_000,
            reputation_weight_bps: r,
        }
    }

    #[test]
    fn test_one_token_is_scale_neutral() {
        // sqrt(10^18) * 10^9 == 10^18
        let blended = curve(5_000, 0);
        assert_eq!(blended.token_component(tokens(1)), tokens(1));
    }

    #[test]
    fn test_quadratic_dampens_whales() {
        let linear = curve(0, 0);
        let quadratic = curve(10_000, 0);
        let whale = tokens(10_000);
        assert_eq!(linear.token_component(whale), whale);
        assert_eq!(quadratic.token_component(whale), tokens(100));
    }

    #[test]
    fn test_reputation_share() {
        let blended = curve(0, 5_000);
        let inputs = WeightInputs {
            token_votes: 0,
            reputation: 25,
            total_reputation: 100,
            total_supply: tokens(1_000),
        };
        // 25% of supply, half weighted
        assert_eq!(blended.weight(&inputs).unwrap(), tokens(125));

        let no_reputation = WeightInputs { total_reputation: 0, reputation: 0, ..inputs };
        assert_eq!(blended.weight(&no_reputation).unwrap(), 0);
    }

    #[test]
    fn test_default_blend() {
        let blended = BlendedCurve::from_config(&GovernanceConfig::default());
        let inputs = WeightInputs {
            token_votes: tokens(100),
            reputation: 0,
            total_reputation: 0,
            total_supply: tokens(1_000),
        };
        // token = 50 + 10 * 0.5 = 55; weight = 55 * 0.7
        assert_eq!(blended.weight(&inputs).unwrap(), tokens(55) * 7 / 10);
    }

    #[test]
    fn test_linear_curve() {
        let inputs = WeightInputs { token_votes: 42, ..Default::default() };
        assert_eq!(LinearCurve.weight(&inputs).unwrap(), 42);
    }
}
