//! Shared primitive types
//!
//! Principals are 20-byte addresses, amounts are unsigned 256-bit integers in
//! asset base units and reputation scores are signed 256-bit integers.

use alloy_primitives::{Address, I256, U256, U512};

/// Identity of any participating account (lender, borrower, admin)
pub type Principal = Address;

/// Asset amount in base units (18 decimals)
pub type Amount = U256;

/// Signed reputation balance
pub type Score = I256;

/// Loan identifier, assigned monotonically from 1
pub type LoanId = u64;

/// Fixed-point scale for the interest-per-share accumulator (1e18)
pub const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Basis points in 100%
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Days per year used by the simple interest formula
pub const DAYS_PER_YEAR: u64 = 365;

/// Base units per whole asset token
pub const TOKEN_UNIT: U256 = SCALE;

/// Serde adapter writing `U256` as a decimal string
pub mod decimal {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_amount(&raw).map_err(D::Error::custom)
    }
}

/// Serde adapter writing `I256` as a signed decimal string
pub mod signed_decimal {
    use alloy_primitives::I256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &I256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        I256::from_dec_str(raw.trim()).map_err(D::Error::custom)
    }
}

/// Parse a decimal amount string (no sign, no fraction)
pub fn parse_amount(raw: &str) -> Result<Amount, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid amount: {:?}", raw));
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| format!("invalid amount {:?}: {}", raw, e))
}

/// Parse a `0x`-prefixed principal address
pub fn parse_principal(raw: &str) -> Result<Principal, String> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| format!("invalid principal {:?}: {}", raw, e))
}

/// `floor(a * b / denominator)` with a 512-bit intermediate product.
/// `None` on a zero denominator or when the quotient exceeds 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let wide = U512::from(a) * U512::from(b) / U512::from(denominator);
    U256::checked_from_uint(wide)
}

/// Whole tokens to base units
pub fn tokens(whole: u64) -> Amount {
    U256::from(whole) * TOKEN_UNIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_is_one_e18() {
        assert_eq!(SCALE, U256::from(10u64).pow(U256::from(18u64)));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1200").unwrap(), U256::from(1200u64));
        assert_eq!(parse_amount(" 7 ").unwrap(), U256::from(7u64));
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("0x10").is_err());
    }

    #[test]
    fn test_mul_div_is_wide() {
        // a * b overflows 256 bits, the quotient does not
        let a = U256::MAX;
        assert_eq!(mul_div(a, U256::from(3u64), U256::from(3u64)), Some(a));
        assert_eq!(mul_div(U256::from(7u64), U256::from(3u64), U256::from(2u64)), Some(U256::from(10u64)));
        assert_eq!(mul_div(a, U256::from(2u64), U256::from(1u64)), None);
        assert_eq!(mul_div(a, a, U256::ZERO), None);
    }

    #[test]
    fn test_parse_principal() {
        let addr = parse_principal("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC").unwrap();
        assert!(!addr.is_zero());
        assert!(parse_principal("not-an-address").is_err());
    }

    #[test]
    fn test_decimal_serde() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Wrapper {
            #[serde(with = "decimal")]
            amount: U256,
        }

        let json = serde_json::to_string(&Wrapper { amount: tokens(3) }).unwrap();
        assert_eq!(json, r#"{"amount":"3000000000000000000"}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount, tokens(3));
    }
}
