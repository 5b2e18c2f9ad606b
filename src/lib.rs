//! FTC Micro-Lending Engine
//!
//! Pooled micro-lending for a chat-based loan orchestrator: lenders deposit
//! the FTCT asset into a shared pool, loans move funds through per-loan
//! escrow, and borrowers carry a signed reputation score that grows with
//! repayments and shrinks with defaults.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── types.rs       - Principals, 256-bit amounts, fixed-point helpers
//! ├── error.rs       - LendingError
//! ├── events.rs      - Outbound event log and live subscription
//! ├── engine.rs      - Single-lock serialization boundary
//! ├── ledger/        - FTCT asset custody
//! │   ├── accounts.rs  - Account kinds and derived custody addresses
//! │   ├── transfers.rs - Coded transfer records
//! │   └── assets.rs    - Balances, mint, transfer
//! ├── pool/          - Liquidity pool
//! │   ├── account.rs   - Per-lender position
//! │   └── liquidity.rs - Deposits, withdrawals, interest accumulator
//! ├── loans/         - Loan lifecycle
//! │   ├── loan.rs      - Loan record and state machine
//! │   ├── escrow.rs    - Per-loan escrow cell
//! │   ├── interest.rs  - Simple interest and reputation reward
//! │   └── registry.rs  - Lifecycle transitions
//! ├── reputation/    - Borrower reputation
//! │   ├── score.rs     - Score records and credit tiers
//! │   └── ledger.rs    - Controller-gated mint / burn
//! └── api/           - HTTP API endpoints
//!     ├── assets.rs, pool.rs, loans.rs, reputation.rs, events.rs
//!     └── middleware.rs - Auth, rate limiting, headers, logging
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod loans;
pub mod pool;
pub mod reputation;
pub mod types;

// Re-export main types for convenience
pub use config::LendingConfig;
pub use engine::{EngineSettings, LendingEngine, LendingState};
pub use error::{LendingError, LendingResult};
pub use events::{EventLog, EventRecord, LendingEvent};
pub use types::{Amount, LoanId, Principal, Score};

pub use ledger::{AccountKind, AssetLedger, TransferCode, TransferRecord};
pub use loans::{EscrowState, EscrowUnit, Loan, LoanRegistry, LoanState, calc_interest};
pub use pool::{LiquidityPool, PoolAccount, PoolSnapshot};
pub use reputation::{CreditTier, ReputationLedger, ReputationScore, TierTable, TierTerms};

// Re-export API types
pub use api::{LendingApiState, SecurityMiddlewareConfig, SecurityState, create_app};
