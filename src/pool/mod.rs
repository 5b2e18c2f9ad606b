//! Liquidity Pool
//!
//! Lenders deposit the asset and receive one share per unit of principal.
//! Loan settlements flow back into the pool and their interest portion is
//! spread over the outstanding principal through a 1e18-scaled accumulator.
//!
//! ## Accounting
//!
//! ```text
//! accrued(lender) = principal_deposited * acc_interest_per_share / SCALE
//! pending(lender) = accrued(lender) - interest_debt
//! ```
//!
//! Every deposit and withdrawal pays out `pending` and resets `interest_debt`
//! to `accrued`, so a lender only earns on settlements that happen while
//! their principal is in the pool. All divisions floor; dust stays pooled.

mod account;
mod liquidity;

pub use account::{PoolAccount, PoolSnapshot};
pub use liquidity::LiquidityPool;
