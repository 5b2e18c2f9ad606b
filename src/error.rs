//! Lending engine errors
//!
//! Every variant is a precondition failure: the operation that returned it
//! made no state change and the caller decides whether to retry.

use crate::loans::LoanState;
use crate::types::{Amount, LoanId, Principal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    /// Caller lacks the admin/controller role required by the operation
    Unauthorized { caller: Principal, required: &'static str },
    /// Loan is not in the source state the transition requires
    InvalidState { loan_id: LoanId, expected: LoanState, actual: LoanState },
    /// Zero or out-of-range argument
    InvalidAmount(&'static str),
    /// Null principal where a real account is required
    InvalidPrincipal,
    AlreadyInitialized(Principal),
    NotInitialized(Principal),
    /// Pool liquid balance cannot cover the requested amount
    InsufficientPool { available: Amount, required: Amount },
    /// Lender is withdrawing more principal than deposited
    InsufficientPrincipal { deposited: Amount, requested: Amount },
    /// Tendered repayment is below principal + interest
    InsufficientRepayment { due: Amount, tendered: Amount },
    /// Account in the asset ledger cannot cover a transfer
    InsufficientBalance { principal: Principal, available: Amount, required: Amount },
    /// Escrow custody disagrees with the loan record
    EscrowMismatch { loan_id: LoanId, expected: Amount, actual: Amount },
    LoanNotFound(LoanId),
    Overflow,
    Underflow,
}

impl LendingError {
    /// Stable machine-readable kind, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            LendingError::Unauthorized { .. } => "Unauthorized",
            LendingError::InvalidState { .. } => "InvalidState",
            LendingError::InvalidAmount(_) => "InvalidAmount",
            LendingError::InvalidPrincipal => "InvalidPrincipal",
            LendingError::AlreadyInitialized(_) => "AlreadyInitialized",
            LendingError::NotInitialized(_) => "NotInitialized",
            LendingError::InsufficientPool { .. } => "InsufficientPool",
            LendingError::InsufficientPrincipal { .. } => "InsufficientPrincipal",
            LendingError::InsufficientRepayment { .. } => "InsufficientRepayment",
            LendingError::InsufficientBalance { .. } => "InsufficientBalance",
            LendingError::EscrowMismatch { .. } => "EscrowMismatch",
            LendingError::LoanNotFound(_) => "LoanNotFound",
            LendingError::Overflow => "Overflow",
            LendingError::Underflow => "Underflow",
        }
    }
}

impl std::fmt::Display for LendingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LendingError::Unauthorized { caller, required } => {
                write!(f, "{} is not the {}", caller, required)
            }
            LendingError::InvalidState { loan_id, expected, actual } => write!(
                f,
                "Loan {} is {}, operation requires {}",
                loan_id, actual, expected
            ),
            LendingError::InvalidAmount(what) => write!(f, "Invalid amount: {}", what),
            LendingError::InvalidPrincipal => write!(f, "Null principal is not allowed"),
            LendingError::AlreadyInitialized(principal) => {
                write!(f, "Reputation for {} already initialized", principal)
            }
            LendingError::NotInitialized(principal) => {
                write!(f, "Reputation for {} not initialized", principal)
            }
            LendingError::InsufficientPool { available, required } => write!(
                f,
                "Insufficient pool liquidity: have {}, need {}",
                available, required
            ),
            LendingError::InsufficientPrincipal { deposited, requested } => write!(
                f,
                "Insufficient principal: deposited {}, requested {}",
                deposited, requested
            ),
            LendingError::InsufficientRepayment { due, tendered } => write!(
                f,
                "Insufficient repayment: due {}, tendered {}",
                due, tendered
            ),
            LendingError::InsufficientBalance { principal, available, required } => write!(
                f,
                "Insufficient balance for {}: have {}, need {}",
                principal, available, required
            ),
            LendingError::EscrowMismatch { loan_id, expected, actual } => write!(
                f,
                "Escrow for loan {} holds {}, expected {}",
                loan_id, actual, expected
            ),
            LendingError::LoanNotFound(loan_id) => write!(f, "Loan {} not found", loan_id),
            LendingError::Overflow => write!(f, "Arithmetic overflow"),
            LendingError::Underflow => write!(f, "Arithmetic underflow"),
        }
    }
}

impl std::error::Error for LendingError {}

pub type LendingResult<T> = Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(LendingError::Overflow.kind(), "Overflow");
        assert_eq!(
            LendingError::InvalidState {
                loan_id: 1,
                expected: LoanState::Created,
                actual: LoanState::Funded,
            }
            .kind(),
            "InvalidState"
        );
    }

    #[test]
    fn test_error_display() {
        let err = LendingError::InsufficientRepayment {
            due: U256::from(105u64),
            tendered: U256::from(100u64),
        };
        assert_eq!(err.to_string(), "Insufficient repayment: due 105, tendered 100");

        let err = LendingError::InvalidState {
            loan_id: 7,
            expected: LoanState::Created,
            actual: LoanState::Funded,
        };
        assert_eq!(err.to_string(), "Loan 7 is Funded, operation requires Created");
    }
}
