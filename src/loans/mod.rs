//! Loan Lifecycle
//!
//! ```text
//! Created --fund--> Funded --disburse--> Disbursed --repay--> Repaid
//!                                                 \--default--> Defaulted
//! ```
//!
//! The registry is the only writer of loan records. Each loan owns an escrow
//! cell whose custody account in the asset ledger is derived from the loan id.

mod escrow;
mod interest;
mod loan;
mod registry;

pub use escrow::{EscrowState, EscrowUnit};
pub use interest::{amount_due, calc_interest, repayment_reward};
pub use loan::{Loan, LoanState};
pub use registry::{LoanContext, LoanRegistry};
