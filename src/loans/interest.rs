//! Simple Interest

use alloy_primitives::U256;

use crate::error::{LendingError, LendingResult};
use crate::types::{Amount, BPS_DENOMINATOR, DAYS_PER_YEAR, mul_div};

/// `floor(principal * apr_bps * term_days / (10_000 * 365))`, computed wide
pub fn calc_interest(principal: Amount, apr_bps: u32, term_days: u32) -> LendingResult<Amount> {
    let rate_days = U256::from(apr_bps as u64 * term_days as u64);
    let denominator = U256::from(BPS_DENOMINATOR * DAYS_PER_YEAR);
    mul_div(principal, rate_days, denominator).ok_or(LendingError::Overflow)
}

/// Principal plus interest for the full term
pub fn amount_due(principal: Amount, apr_bps: u32, term_days: u32) -> LendingResult<Amount> {
    principal
        .checked_add(calc_interest(principal, apr_bps, term_days)?)
        .ok_or(LendingError::Overflow)
}

/// Reputation minted on repayment: full principal when on time, half otherwise
pub fn repayment_reward(principal: Amount, on_time: bool) -> Amount {
    if on_time {
        principal
    } else {
        principal / U256::from(2u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tokens;

    #[test]
    fn test_interest_reference_loan() {
        // 5 tokens at 12% for 30 days
        let interest = calc_interest(tokens(5), 1200, 30).unwrap();
        let expected = tokens(5) * U256::from(1200u64 * 30) / U256::from(3_650_000u64);
        assert_eq!(interest, expected);
        assert_eq!(interest, U256::from(49_315_068_493_150_684u64));
    }

    #[test]
    fn test_interest_truncates() {
        assert_eq!(calc_interest(U256::from(1u64), 1, 1).unwrap(), U256::ZERO);
        assert_eq!(calc_interest(U256::from(3_650_000u64), 1, 1).unwrap(), U256::from(1u64));
        assert_eq!(calc_interest(U256::from(7_299_999u64), 1, 1).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_interest_wide_intermediate() {
        // principal * rate overflows 256 bits, the result does not
        let principal = U256::MAX / U256::from(2u64);
        let interest = calc_interest(principal, 10_000, 365).unwrap();
        assert_eq!(interest, principal);

        assert_eq!(calc_interest(U256::MAX, u32::MAX, u32::MAX), Err(LendingError::Overflow));
        assert_eq!(amount_due(U256::MAX, 10_000, 365), Err(LendingError::Overflow));
    }

    #[test]
    fn test_reward() {
        assert_eq!(repayment_reward(tokens(5), true), tokens(5));
        assert_eq!(repayment_reward(U256::from(5u64), false), U256::from(2u64));
        assert_eq!(repayment_reward(U256::from(1u64), false), U256::ZERO);
    }
}
