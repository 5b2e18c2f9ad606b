//! Pool Account Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LendingError, LendingResult};
use crate::types::{Amount, Principal, SCALE, decimal, mul_div};

/// Per-lender position. Created on first deposit and never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolAccount {
    pub principal: Principal,

    #[serde(with = "decimal")]
    pub principal_deposited: Amount,

    /// Accrued-interest baseline at the last settlement of this account
    #[serde(with = "decimal")]
    pub interest_debt: Amount,

    /// Lifetime interest paid out
    #[serde(with = "decimal")]
    pub interest_paid: Amount,

    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PoolAccount {
    pub fn new(principal: Principal) -> Self {
        let now = Utc::now();
        Self {
            principal,
            principal_deposited: Amount::ZERO,
            interest_debt: Amount::ZERO,
            interest_paid: Amount::ZERO,
            opened_at: now,
            updated_at: now,
        }
    }

    pub fn accrued(&self, acc_interest_per_share: Amount) -> LendingResult<Amount> {
        accrued(self.principal_deposited, acc_interest_per_share)
    }

    /// Interest earned since the last settlement of this account
    pub fn pending(&self, acc_interest_per_share: Amount) -> LendingResult<Amount> {
        Ok(self
            .accrued(acc_interest_per_share)?
            .saturating_sub(self.interest_debt))
    }
}

pub(crate) fn accrued(principal_deposited: Amount, acc_interest_per_share: Amount) -> LendingResult<Amount> {
    mul_div(principal_deposited, acc_interest_per_share, SCALE).ok_or(LendingError::Overflow)
}

/// Point-in-time view of the pool's global state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub at: DateTime<Utc>,
    #[serde(with = "decimal")]
    pub total_pool: Amount,
    #[serde(with = "decimal")]
    pub total_principal: Amount,
    #[serde(with = "decimal")]
    pub acc_interest_per_share: Amount,
    pub lender_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tokens;
    use alloy_primitives::{Address, U256};

    #[test]
    fn test_pending_against_baseline() {
        let mut account = PoolAccount::new(Address::repeat_byte(0x11));
        account.principal_deposited = tokens(20);

        // 0.03 per unit of principal
        let acc = SCALE * U256::from(3u64) / U256::from(100u64);
        assert_eq!(account.pending(acc).unwrap(), tokens(20) * U256::from(3u64) / U256::from(100u64));

        account.interest_debt = account.accrued(acc).unwrap();
        assert_eq!(account.pending(acc).unwrap(), Amount::ZERO);
    }
}
