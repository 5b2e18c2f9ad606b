//! FTCT Asset Ledger
//!
//! In-memory custody ledger for the deposit asset. Every movement is a coded
//! transfer between two principals, so the history of a lender, borrower, the
//! pool or a loan escrow can be replayed from the transfer log.
//!
//! ## Account Kinds
//!
//! - External: lenders, borrowers and repayment payers
//! - Pool: the liquidity pool's custody account
//! - Escrow: one custody account per loan, derived from the loan id
//!
//! ## Transfer Codes
//!
//! - Mint: admin issuance to an external account
//! - Deposit / Withdrawal / InterestPayout: lender <-> pool
//! - EscrowFunding / Disbursement: pool -> escrow -> borrower
//! - Repayment / Refund / Settlement: payer -> escrow -> payer, pool

pub mod accounts;
pub mod assets;
pub mod transfers;

pub use accounts::*;
pub use assets::*;
pub use transfers::*;
