//! Per-Loan Escrow Cell
//!
//! Holds the loan principal between funding and disbursement, and the
//! repayment between receipt and settlement into the pool. The asset ledger
//! holds the matching balance under `address`.

use serde::{Deserialize, Serialize};

use super::loan::LoanState;
use crate::error::{LendingError, LendingResult};
use crate::types::{Amount, LoanId, Principal, decimal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowState {
    Uninitialized,
    Funded,
    Released,
    Settled,
}

impl EscrowState {
    /// Loan state in which the escrow is expected to be in `self`
    fn loan_state(&self) -> LoanState {
        match self {
            EscrowState::Uninitialized => LoanState::Created,
            EscrowState::Funded => LoanState::Funded,
            EscrowState::Released => LoanState::Disbursed,
            EscrowState::Settled => LoanState::Repaid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowUnit {
    loan_id: LoanId,
    address: Principal,
    #[serde(with = "decimal")]
    expected: Amount,
    #[serde(with = "decimal")]
    balance: Amount,
    state: EscrowState,
}

impl EscrowUnit {
    pub fn new(loan_id: LoanId, address: Principal, expected: Amount) -> Self {
        Self {
            loan_id,
            address,
            expected,
            balance: Amount::ZERO,
            state: EscrowState::Uninitialized,
        }
    }

    pub fn address(&self) -> Principal {
        self.address
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn state(&self) -> EscrowState {
        self.state
    }

    pub fn fund(&mut self, amount: Amount) -> LendingResult<()> {
        self.require(EscrowState::Uninitialized)?;
        if amount != self.expected {
            return Err(LendingError::EscrowMismatch {
                loan_id: self.loan_id,
                expected: self.expected,
                actual: amount,
            });
        }
        self.balance = amount;
        self.state = EscrowState::Funded;
        Ok(())
    }

    /// Hand the full balance over for transfer to the borrower
    pub fn release(&mut self) -> LendingResult<Amount> {
        self.require(EscrowState::Funded)?;
        let amount = std::mem::take(&mut self.balance);
        self.state = EscrowState::Released;
        Ok(amount)
    }

    pub fn accept_repayment(&mut self, amount: Amount) -> LendingResult<()> {
        self.require(EscrowState::Released)?;
        self.balance = self.balance.checked_add(amount).ok_or(LendingError::Overflow)?;
        Ok(())
    }

    /// Give back the part of a repayment above the amount due
    pub fn return_excess(&mut self, amount: Amount) -> LendingResult<Amount> {
        self.require(EscrowState::Released)?;
        self.balance = self.balance.checked_sub(amount).ok_or(LendingError::Underflow)?;
        Ok(amount)
    }

    /// Hand the entire balance over for forwarding to the pool
    pub fn settle(&mut self) -> LendingResult<Amount> {
        self.require(EscrowState::Released)?;
        let amount = std::mem::take(&mut self.balance);
        self.state = EscrowState::Settled;
        Ok(amount)
    }

    fn require(&self, expected: EscrowState) -> LendingResult<()> {
        if self.state != expected {
            return Err(LendingError::InvalidState {
                loan_id: self.loan_id,
                expected: expected.loan_state(),
                actual: self.state.loan_state(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tokens;
    use alloy_primitives::Address;

    fn escrow() -> EscrowUnit {
        EscrowUnit::new(1, Address::repeat_byte(0xE5), tokens(5))
    }

    #[test]
    fn test_full_cycle() {
        let mut escrow = escrow();
        escrow.fund(tokens(5)).unwrap();
        assert_eq!(escrow.balance(), tokens(5));

        assert_eq!(escrow.release().unwrap(), tokens(5));
        assert_eq!(escrow.balance(), Amount::ZERO);

        escrow.accept_repayment(tokens(6)).unwrap();
        escrow.return_excess(tokens(1)).unwrap();
        assert_eq!(escrow.settle().unwrap(), tokens(5));
        assert_eq!(escrow.state(), EscrowState::Settled);
        assert_eq!(escrow.balance(), Amount::ZERO);
    }

    #[test]
    fn test_fund_requires_exact_principal() {
        let mut escrow = escrow();
        let err = escrow.fund(tokens(4)).unwrap_err();
        assert_eq!(err.kind(), "EscrowMismatch");
        assert_eq!(escrow.state(), EscrowState::Uninitialized);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut escrow = escrow();
        assert_eq!(escrow.release().unwrap_err().kind(), "InvalidState");
        assert_eq!(escrow.settle().unwrap_err().kind(), "InvalidState");

        escrow.fund(tokens(5)).unwrap();
        assert_eq!(escrow.fund(tokens(5)).unwrap_err().kind(), "InvalidState");
        assert_eq!(escrow.accept_repayment(tokens(1)).unwrap_err().kind(), "InvalidState");
    }
}
