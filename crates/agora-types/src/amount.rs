//! Token amounts, timestamps and basis-point arithmetic.
//!
//! Amounts are integers in the smallest denomination (1 token = 10^18 units).
//! Every rate or percentage is expressed in basis points and every division
//! truncates toward zero.

use crate::error::TypesError;
use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// Token amount in the smallest denomination.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Rate or percentage in basis points (1/100 of a percent).
pub type BasisPoints = u16;

/// 100% in basis points.
pub const BPS_DENOMINATOR: u128 = 10_000;

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Decimal places of the governance token.
pub const DECIMALS: u32 = 18;

/// One whole token in base units.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Whole tokens to base units.
pub const fn tokens(whole: u64) -> Amount {
    whole as Amount * UNIT
}

/// Reject basis points above 100%.
pub fn check_bps(bps: BasisPoints) -> Result<BasisPoints, TypesError> {
    if u128::from(bps) > BPS_DENOMINATOR {
        return Err(TypesError::BasisPointsOutOfRange(bps as u32));
    }
    Ok(bps)
}

/// `floor(amount * bps / 10000)` without intermediate overflow.
///
/// Splits `amount` into `q * 10000 + r`; exact for any `bps <= 10000`.
pub fn bps_of(amount: Amount, bps: BasisPoints) -> Amount {
    let bps = u128::from(bps);
    let q = amount / BPS_DENOMINATOR;
    let r = amount % BPS_DENOMINATOR;
    q.saturating_mul(bps).saturating_add(r * bps / BPS_DENOMINATOR)
}

/// `floor(a * b / denom)` with a 256-bit-safe intermediate product.
pub fn mul_div(a: Amount, b: Amount, denom: Amount) -> Result<Amount, TypesError> {
    if denom == 0 {
        return Err(TypesError::DivisionByZero);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / denom);
    }
    let wide = BigUint::from(a) * BigUint::from(b) / BigUint::from(denom);
    wide.to_u128().ok_or(TypesError::Overflow)
}

/// Integer square root using Newton's method.
/// Returns floor(sqrt(n)).
pub fn isqrt(n: u128) -> u128 {
    if n <= 1 {
        return n;
    }

    let mut x = n;
    let mut y = half_sum(x, 1);

    while y < x {
        x = y;
        y = half_sum(x, n / x);
    }

    x
}

// floor((a + b) / 2) for values whose sum may not fit
fn half_sum(a: u128, b: u128) -> u128 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

/// Parse a decimal token string ("12.5") into base units.
pub fn parse_amount(s: &str) -> Result<Amount, TypesError> {
    let invalid = || TypesError::InvalidAmountString(s.to_string());
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > DECIMALS as usize {
        return Err(invalid());
    }
    // `u128::from_str` alone would accept a leading '+'
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || !digits_only(frac) {
        return Err(invalid());
    }

    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut frac_units: Amount = 0;
    if !frac.is_empty() {
        let digits: Amount = frac.parse().map_err(|_| invalid())?;
        frac_units = digits * 10u128.pow(DECIMALS - frac.len() as u32);
    }

    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or(TypesError::Overflow)
}

/// Format base units as a decimal token string, trimming trailing zeros.
pub fn format_amount(amount: Amount) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Serde helper writing amounts as decimal token strings ("1500.25").
///
/// TOML integers are 64-bit, so configuration files carry amounts this way.
#[cfg(feature = "serde")]
pub mod serde_tokens {
    use super::{format_amount, parse_amount, Amount};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_amount(*amount))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_amount(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(UNIT), 1_000_000_000);
        assert_eq!(isqrt(u128::MAX), u64::MAX as u128);
    }

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(100, 3000), 30);
        assert_eq!(bps_of(100, 2000), 20);
        assert_eq!(bps_of(99, 5000), 49);
        assert_eq!(bps_of(u128::MAX, 10_000), u128::MAX);
        assert_eq!(bps_of(12345, 0), 0);
    }

    #[test]
    fn test_mul_div_wide() {
        // 10^30 * 10^12 overflows u128 but the quotient fits
        let a = 10u128.pow(30);
        assert_eq!(mul_div(a, 10u128.pow(12), 10u128.pow(12)).unwrap(), a);
        assert_eq!(mul_div(1, 1, 0), Err(TypesError::DivisionByZero));
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(TypesError::Overflow));
    }

    #[test]
    fn test_parse_and_format_amount() {
        assert_eq!(parse_amount("1").unwrap(), UNIT);
        assert_eq!(parse_amount("0.5").unwrap(), UNIT / 2);
        assert_eq!(parse_amount(".25").unwrap(), UNIT / 4);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("1.0000000000000000001").is_err());
        assert!(parse_amount("abc").is_err());

        assert_eq!(parse_amount("+5"), Err(TypesError::InvalidAmountString("+5".to_string())));
        assert!(parse_amount("1.+5").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount(" 1").is_err());
        assert!(parse_amount("1._5").is_err());
        assert!(parse_amount("١").is_err());

        assert_eq!(format_amount(tokens(3)), "3");
        assert_eq!(format_amount(UNIT + UNIT / 2), "1.5");
    }

    #[test]
    fn test_check_bps() {
        assert!(check_bps(10_000).is_ok());
        assert!(check_bps(10_001).is_err());
    }

    proptest! {
        #[test]
        fn prop_isqrt_is_floor(n in any::<u128>()) {
            let r = isqrt(n);
            prop_assert!(r.checked_mul(r).map_or(false, |sq| sq <= n));
            let next = r + 1;
            prop_assert!(next.checked_mul(next).map_or(true, |sq| sq > n));
        }

        #[test]
        fn prop_bps_of_matches_wide_division(amount in any::<u128>(), bps in 0u16..=10_000) {
            prop_assert_eq!(bps_of(amount, bps), mul_div(amount, bps as u128, BPS_DENOMINATOR).unwrap());
        }
    }
}
