//! Reputation Ledger for Borrowers
//!
//! Tracks a signed score per principal and classifies it into credit tiers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │ LoanRegistry    │────►│ ReputationLedger │────►│ ReputationScore │
//! │ (controller)    │     │ (mint / burn)    │     │ (signed I256)   │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                                  │
//!                                  ▼
//!                          ┌──────────────────┐
//!                          │ TierTable        │
//!                          │ (advisory caps)  │
//!                          └──────────────────┘
//! ```
//!
//! ## Score Model
//!
//! - Records start at an explicit initial score (0 for new borrowers)
//! - On-time repayment mints the loan principal, late repayment half of it
//! - Default burns the loan principal; the balance may go negative
//! - Negative balances classify as Ineligible

mod ledger;
mod score;

pub use ledger::{Adjustment, ReputationLedger};
pub use score::{CreditTier, ReputationScore, TierTable, TierTerms};
