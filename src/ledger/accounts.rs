//! Ledger Account Definitions
//!
//! Custody accounts are ordinary addresses derived from a domain tag, so they
//! can never collide with a user-supplied principal by accident.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{LoanId, Principal};

pub mod account_codes {
    pub const EXTERNAL: u16 = 1;
    pub const POOL: u16 = 2;
    pub const ESCROW: u16 = 3;
}

const POOL_TAG: &[u8] = b"ftc-lending/pool";
const ESCROW_TAG: &[u8] = b"ftc-lending/escrow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    External,
    Pool,
    Escrow { loan_id: LoanId },
}

impl AccountKind {
    pub fn code(&self) -> u16 {
        match self {
            AccountKind::External => account_codes::EXTERNAL,
            AccountKind::Pool => account_codes::POOL,
            AccountKind::Escrow { .. } => account_codes::ESCROW,
        }
    }

    pub fn is_custody(&self) -> bool {
        !matches!(self, AccountKind::External)
    }
}

/// Custody address of the liquidity pool
pub fn pool_address() -> Principal {
    custody_address(POOL_TAG, 0)
}

/// Custody address of a loan's escrow cell
pub fn escrow_address(loan_id: LoanId) -> Principal {
    custody_address(ESCROW_TAG, loan_id)
}

fn custody_address(tag: &[u8], id: u64) -> Principal {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(id.to_be_bytes());
    let hash = hasher.finalize();

    Principal::from_slice(&hash[12..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_addresses_are_deterministic_and_distinct() {
        assert_eq!(escrow_address(1), escrow_address(1));
        assert_ne!(escrow_address(1), escrow_address(2));
        assert_ne!(escrow_address(0), pool_address());
        assert!(!escrow_address(1).is_zero());
    }

    #[test]
    fn test_account_codes() {
        assert_eq!(AccountKind::Pool.code(), account_codes::POOL);
        assert_eq!(AccountKind::Escrow { loan_id: 4 }.code(), account_codes::ESCROW);
        assert!(AccountKind::Escrow { loan_id: 4 }.is_custody());
        assert!(!AccountKind::External.is_custody());
    }
}
