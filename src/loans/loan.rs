//! Loan Record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::escrow::EscrowUnit;
use crate::types::{Amount, LoanId, Principal, decimal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoanState {
    Created,
    Funded,
    Disbursed,
    Repaid,
    Defaulted,
}

impl LoanState {
    /// Numeric state code as reported to the bot backend
    pub fn code(&self) -> u8 {
        match self {
            LoanState::Created => 0,
            LoanState::Funded => 1,
            LoanState::Disbursed => 2,
            LoanState::Repaid => 3,
            LoanState::Defaulted => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanState::Repaid | LoanState::Defaulted)
    }

    /// Whether `next` is the successor of `self` in the lifecycle
    pub fn can_transition_to(&self, next: LoanState) -> bool {
        matches!(
            (self, next),
            (LoanState::Created, LoanState::Funded)
                | (LoanState::Funded, LoanState::Disbursed)
                | (LoanState::Disbursed, LoanState::Repaid)
                | (LoanState::Disbursed, LoanState::Defaulted)
        )
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoanState::Created => "Created",
            LoanState::Funded => "Funded",
            LoanState::Disbursed => "Disbursed",
            LoanState::Repaid => "Repaid",
            LoanState::Defaulted => "Defaulted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: Principal,
    #[serde(with = "decimal")]
    pub principal: Amount,
    pub apr_bps: u32,
    pub term_days: u32,
    pub state: LoanState,
    pub escrow: EscrowUnit,

    /// Set at disbursement: disbursement time + term
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    /// Repayment or default time
    pub settled_at: Option<DateTime<Utc>>,

    #[serde(with = "decimal")]
    pub interest_paid: Amount,
    pub repaid_on_time: Option<bool>,
}

impl Loan {
    pub fn new(
        id: LoanId,
        borrower: Principal,
        principal: Amount,
        apr_bps: u32,
        term_days: u32,
        escrow: EscrowUnit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            borrower,
            principal,
            apr_bps,
            term_days,
            state: LoanState::Created,
            escrow,
            due_date: None,
            created_at: now,
            funded_at: None,
            disbursed_at: None,
            settled_at: None,
            interest_paid: Amount::ZERO,
            repaid_on_time: None,
        }
    }

    pub fn escrow_balance(&self) -> Amount {
        self.escrow.balance()
    }

    /// Disbursed and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == LoanState::Disbursed && self.due_date.is_some_and(|due| now > due)
    }
}
