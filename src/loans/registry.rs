//! Loan Registry
//!
//! Each operation validates every precondition against the loan, the pool,
//! the asset ledger and the reputation ledger before it writes anything, so a
//! returned error always means nothing changed.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::escrow::EscrowUnit;
use super::interest::{calc_interest, repayment_reward};
use super::loan::{Loan, LoanState};
use crate::error::{LendingError, LendingResult};
use crate::events::{EventLog, LendingEvent};
use crate::ledger::{AssetLedger, TransferCode};
use crate::pool::LiquidityPool;
use crate::reputation::{Adjustment, ReputationLedger};
use crate::types::{Amount, LoanId, Principal};

/// Components a lifecycle transition touches besides the loan itself
pub struct LoanContext<'a> {
    pub pool: &'a mut LiquidityPool,
    pub assets: &'a mut AssetLedger,
    pub reputation: &'a mut ReputationLedger,
    pub events: &'a mut EventLog,
}

pub struct LoanRegistry {
    admin: Principal,
    /// Caller identity used toward the reputation ledger
    system: Principal,
    loans: BTreeMap<LoanId, Loan>,
    next_id: LoanId,
}

impl LoanRegistry {
    pub fn new(admin: Principal, system: Principal) -> Self {
        Self {
            admin,
            system,
            loans: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn system(&self) -> Principal {
        self.system
    }

    pub fn create_loan(
        &mut self,
        ctx: LoanContext<'_>,
        caller: Principal,
        borrower: Principal,
        amount: Amount,
        apr_bps: u32,
        term_days: u32,
        now: DateTime<Utc>,
    ) -> LendingResult<LoanId> {
        self.require_admin(caller)?;
        ctx.assets.ensure_external(&borrower)?;
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("loan principal must be positive"));
        }
        if apr_bps == 0 {
            return Err(LendingError::InvalidAmount("apr must be positive"));
        }
        if term_days == 0 {
            return Err(LendingError::InvalidAmount("term must be positive"));
        }
        // Reject loans whose repayment could never be computed
        calc_interest(amount, apr_bps, term_days)?
            .checked_add(amount)
            .ok_or(LendingError::Overflow)?;
        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(LendingError::Overflow)?;

        ctx.reputation
            .ensure_initialized(self.system, borrower, ctx.events)?;

        let escrow = EscrowUnit::new(id, ctx.assets.open_escrow(id), amount);
        self.loans.insert(
            id,
            Loan::new(id, borrower, amount, apr_bps, term_days, escrow, now),
        );
        self.next_id = next_id;

        info!(
            loan_id = id,
            borrower = %borrower,
            principal = %amount,
            apr_bps = apr_bps,
            term_days = term_days,
            "Loan created"
        );
        ctx.events.emit(LendingEvent::LoanCreated {
            loan_id: id,
            borrower,
            principal: amount,
            apr_bps,
            term_days,
        });
        Ok(id)
    }

    /// Reserve the principal from the pool into the loan's escrow
    pub fn mark_funded(
        &mut self,
        ctx: LoanContext<'_>,
        caller: Principal,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> LendingResult<()> {
        self.require_admin(caller)?;
        let loan = self.loan_in(loan_id, LoanState::Created)?;
        let amount = loan.principal;
        ctx.pool.check_fund_escrow(caller, amount)?;

        let loan = self.loan_mut(loan_id)?;
        loan.escrow.fund(amount)?;
        let escrow = loan.escrow.address();
        let borrower = loan.borrower;
        ctx.pool
            .fund_escrow(ctx.assets, caller, loan_id, escrow, amount)?;
        loan.state = LoanState::Funded;
        loan.funded_at = Some(now);

        info!(loan_id = loan_id, amount = %amount, escrow = %escrow, "Loan funded");
        ctx.events.emit(LendingEvent::LoanFunded {
            loan_id,
            borrower,
            escrow,
            amount,
        });
        Ok(())
    }

    /// Release the escrow to the borrower and start the term
    pub fn mark_disbursed(
        &mut self,
        ctx: LoanContext<'_>,
        caller: Principal,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> LendingResult<()> {
        self.require_admin(caller)?;
        let loan = self.loan_in(loan_id, LoanState::Funded)?;
        let custody = ctx.assets.balance_of(&loan.escrow.address());
        for held in [loan.escrow_balance(), custody] {
            if held != loan.principal {
                return Err(LendingError::EscrowMismatch {
                    loan_id,
                    expected: loan.principal,
                    actual: held,
                });
            }
        }
        let due_date = now
            .checked_add_signed(Duration::days(loan.term_days as i64))
            .ok_or(LendingError::Overflow)?;

        let loan = self.loan_mut(loan_id)?;
        let amount = loan.escrow.release()?;
        ctx.assets.transfer(
            loan.escrow.address(),
            loan.borrower,
            amount,
            TransferCode::Disbursement,
        )?;
        loan.state = LoanState::Disbursed;
        loan.disbursed_at = Some(now);
        loan.due_date = Some(due_date);

        info!(
            loan_id = loan_id,
            borrower = %loan.borrower,
            amount = %amount,
            due_date = %due_date,
            "Loan disbursed"
        );
        ctx.events.emit(LendingEvent::LoanDisbursed {
            loan_id,
            borrower: loan.borrower,
            amount,
            due_date,
        });
        Ok(())
    }

    /// Accept a repayment from any payer, settle it into the pool and reward
    /// the borrower's reputation
    pub fn mark_repaid(
        &mut self,
        ctx: LoanContext<'_>,
        payer: Principal,
        loan_id: LoanId,
        on_time: bool,
        tendered: Amount,
        now: DateTime<Utc>,
    ) -> LendingResult<Amount> {
        ctx.assets.ensure_external(&payer)?;
        let loan = self.loan_in(loan_id, LoanState::Disbursed)?;
        let interest = calc_interest(loan.principal, loan.apr_bps, loan.term_days)?;
        let due = loan
            .principal
            .checked_add(interest)
            .ok_or(LendingError::Overflow)?;
        if tendered < due {
            return Err(LendingError::InsufficientRepayment { due, tendered });
        }
        ctx.assets.ensure_balance(&payer, tendered)?;
        let reward = repayment_reward(loan.principal, on_time);
        if !reward.is_zero() {
            ctx.reputation
                .check_adjust(self.system, loan.borrower, reward, Adjustment::Mint)?;
        }
        ctx.pool.settlement_effect(due, interest)?;

        let system = self.system;
        let pool_account = ctx.assets.pool_account();
        let loan = self.loan_mut(loan_id)?;
        let escrow = loan.escrow.address();
        let excess = tendered - due;

        ctx.assets
            .transfer(payer, escrow, tendered, TransferCode::Repayment)?;
        loan.escrow.accept_repayment(tendered)?;
        if !excess.is_zero() {
            loan.escrow.return_excess(excess)?;
            ctx.assets
                .transfer(escrow, payer, excess, TransferCode::Refund)?;
        }
        let settled = loan.escrow.settle()?;
        ctx.assets
            .transfer(escrow, pool_account, settled, TransferCode::Settlement)?;
        ctx.pool.receive_settlement(loan_id, settled, interest)?;

        loan.state = LoanState::Repaid;
        loan.settled_at = Some(now);
        loan.interest_paid = interest;
        loan.repaid_on_time = Some(on_time);
        let borrower = loan.borrower;

        info!(
            loan_id = loan_id,
            payer = %payer,
            amount = %settled,
            interest = %interest,
            refunded = %excess,
            on_time = on_time,
            "Loan repaid"
        );
        ctx.events.emit(LendingEvent::LoanRepaid {
            loan_id,
            borrower,
            payer,
            amount: settled,
            interest,
            on_time,
        });

        if reward.is_zero() {
            debug!(loan_id = loan_id, "Late repayment reward rounds to zero, skipped");
        } else {
            ctx.reputation.mint(system, borrower, reward, ctx.events)?;
        }
        Ok(settled)
    }

    /// Write the loan off against the borrower's reputation. No funds move.
    pub fn mark_defaulted(
        &mut self,
        ctx: LoanContext<'_>,
        caller: Principal,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> LendingResult<()> {
        self.require_admin(caller)?;
        let loan = self.loan_in(loan_id, LoanState::Disbursed)?;
        ctx.reputation
            .check_adjust(self.system, loan.borrower, loan.principal, Adjustment::Burn)?;

        let system = self.system;
        let loan = self.loan_mut(loan_id)?;
        loan.state = LoanState::Defaulted;
        loan.settled_at = Some(now);
        let (borrower, principal) = (loan.borrower, loan.principal);

        info!(loan_id = loan_id, borrower = %borrower, principal = %principal, "Loan defaulted");
        ctx.events.emit(LendingEvent::LoanDefaulted {
            loan_id,
            borrower,
            principal,
        });
        ctx.reputation.burn(system, borrower, principal, ctx.events)?;
        Ok(())
    }

    pub fn get_loan(&self, loan_id: LoanId) -> LendingResult<&Loan> {
        self.loans
            .get(&loan_id)
            .ok_or(LendingError::LoanNotFound(loan_id))
    }

    /// Id the next created loan will receive
    pub fn next_loan_id(&self) -> LoanId {
        self.next_id
    }

    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    pub fn loans_of(&self, borrower: &Principal) -> Vec<&Loan> {
        self.loans
            .values()
            .filter(|l| &l.borrower == borrower)
            .collect()
    }

    pub fn amount_due(&self, loan_id: LoanId) -> LendingResult<Amount> {
        let loan = self.get_loan(loan_id)?;
        super::interest::amount_due(loan.principal, loan.apr_bps, loan.term_days)
    }

    fn require_admin(&self, caller: Principal) -> LendingResult<()> {
        if caller != self.admin {
            return Err(LendingError::Unauthorized { caller, required: "admin" });
        }
        Ok(())
    }

    fn loan_in(&self, loan_id: LoanId, expected: LoanState) -> LendingResult<&Loan> {
        let loan = self.get_loan(loan_id)?;
        if loan.state != expected {
            return Err(LendingError::InvalidState {
                loan_id,
                expected,
                actual: loan.state,
            });
        }
        Ok(loan)
    }

    fn loan_mut(&mut self, loan_id: LoanId) -> LendingResult<&mut Loan> {
        self.loans
            .get_mut(&loan_id)
            .ok_or(LendingError::LoanNotFound(loan_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reputation::TierTable;
    use crate::types::{Score, tokens};
    use alloy_primitives::Address;

    fn admin() -> Principal {
        Address::repeat_byte(0xAA)
    }

    fn system() -> Principal {
        Address::repeat_byte(0x5E)
    }

    fn lender() -> Principal {
        Address::repeat_byte(0x01)
    }

    fn borrower() -> Principal {
        Address::repeat_byte(0x02)
    }

    struct World {
        registry: LoanRegistry,
        pool: LiquidityPool,
        assets: AssetLedger,
        reputation: ReputationLedger,
        events: EventLog,
    }

    impl World {
        fn new() -> Self {
            let mut assets = AssetLedger::new(admin());
            let mut reputation = ReputationLedger::new(admin(), TierTable::default());
            let mut events = EventLog::default();
            let mut pool = LiquidityPool::new(admin());

            reputation.set_controller(admin(), system(), &mut events).unwrap();
            assets.mint(admin(), lender(), tokens(100)).unwrap();
            assets.mint(admin(), borrower(), tokens(10)).unwrap();
            pool.deposit(&mut assets, &mut events, lender(), tokens(20)).unwrap();

            Self {
                registry: LoanRegistry::new(admin(), system()),
                pool,
                assets,
                reputation,
                events,
            }
        }

        fn ctx(&mut self) -> (&mut LoanRegistry, LoanContext<'_>) {
            (
                &mut self.registry,
                LoanContext {
                    pool: &mut self.pool,
                    assets: &mut self.assets,
                    reputation: &mut self.reputation,
                    events: &mut self.events,
                },
            )
        }

        fn create(&mut self) -> LoanId {
            let (registry, ctx) = self.ctx();
            registry
                .create_loan(ctx, admin(), borrower(), tokens(5), 1200, 30, Utc::now())
                .unwrap()
        }

        fn disbursed(&mut self) -> LoanId {
            let id = self.create();
            let (registry, ctx) = self.ctx();
            registry.mark_funded(ctx, admin(), id, Utc::now()).unwrap();
            let (registry, ctx) = self.ctx();
            registry.mark_disbursed(ctx, admin(), id, Utc::now()).unwrap();
            id
        }
    }

    #[test]
    fn test_create_assigns_ids_and_initializes_borrower() {
        let mut world = World::new();
        assert_eq!(world.registry.next_loan_id(), 1);
        assert_eq!(world.create(), 1);
        assert_eq!(world.create(), 2);
        assert!(world.reputation.is_initialized(&borrower()));
        assert_eq!(world.registry.loans_of(&borrower()).len(), 2);
        assert_eq!(world.registry.get_loan(1).unwrap().state, LoanState::Created);
    }

    #[test]
    fn test_create_validation() {
        let mut world = World::new();
        let now = Utc::now();
        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry
                .create_loan(ctx, lender(), borrower(), tokens(5), 1200, 30, now)
                .unwrap_err()
                .kind(),
            "Unauthorized"
        );
        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry.create_loan(ctx, admin(), borrower(), tokens(5), 0, 30, now),
            Err(LendingError::InvalidAmount("apr must be positive"))
        );
        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry.create_loan(ctx, admin(), Address::ZERO, tokens(5), 1200, 30, now),
            Err(LendingError::InvalidPrincipal)
        );
        assert_eq!(world.registry.next_loan_id(), 1);
        assert!(!world.reputation.is_initialized(&borrower()));
    }

    #[test]
    fn test_fund_and_disburse_move_assets() {
        let mut world = World::new();
        let id = world.create();
        let escrow = world.registry.get_loan(id).unwrap().escrow.address();

        let (registry, ctx) = world.ctx();
        registry.mark_funded(ctx, admin(), id, Utc::now()).unwrap();
        assert_eq!(world.assets.balance_of(&escrow), tokens(5));
        assert_eq!(world.pool.total_pool(), tokens(15));
        assert_eq!(world.registry.get_loan(id).unwrap().escrow_balance(), tokens(5));

        let now = Utc::now();
        let (registry, ctx) = world.ctx();
        registry.mark_disbursed(ctx, admin(), id, now).unwrap();
        let loan = world.registry.get_loan(id).unwrap();
        assert_eq!(loan.state, LoanState::Disbursed);
        assert_eq!(loan.escrow_balance(), Amount::ZERO);
        assert_eq!(loan.due_date, Some(now + Duration::days(30)));
        assert_eq!(world.assets.balance_of(&escrow), Amount::ZERO);
        assert_eq!(world.assets.balance_of(&borrower()), tokens(15));
    }

    #[test]
    fn test_double_funding_rejected() {
        let mut world = World::new();
        let id = world.create();
        let (registry, ctx) = world.ctx();
        registry.mark_funded(ctx, admin(), id, Utc::now()).unwrap();

        let (registry, ctx) = world.ctx();
        let err = registry.mark_funded(ctx, admin(), id, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LendingError::InvalidState {
                loan_id: id,
                expected: LoanState::Created,
                actual: LoanState::Funded,
            }
        );
        assert_eq!(world.pool.total_pool(), tokens(15));
    }

    #[test]
    fn test_funding_beyond_pool_rejected() {
        let mut world = World::new();
        let now = Utc::now();
        let (registry, ctx) = world.ctx();
        let id = registry
            .create_loan(ctx, admin(), borrower(), tokens(21), 1200, 30, now)
            .unwrap();
        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry.mark_funded(ctx, admin(), id, now).unwrap_err().kind(),
            "InsufficientPool"
        );
        assert_eq!(world.registry.get_loan(id).unwrap().state, LoanState::Created);
    }

    #[test]
    fn test_repay_settles_into_pool_and_refunds_excess() {
        let mut world = World::new();
        let id = world.disbursed();
        let due = world.registry.amount_due(id).unwrap();
        let interest = due - tokens(5);

        let (registry, ctx) = world.ctx();
        let settled = registry
            .mark_repaid(ctx, borrower(), id, true, tokens(6), Utc::now())
            .unwrap();
        assert_eq!(settled, due);

        // 10 minted + 5 disbursed - due
        assert_eq!(world.assets.balance_of(&borrower()), tokens(15) - due);
        assert_eq!(world.pool.total_pool(), tokens(15) + due);
        // acc floors to a multiple of 1/20e18 per unit of principal
        let pending = world.pool.pending_interest(&lender()).unwrap();
        assert!(pending <= interest);
        assert!(interest - pending < Amount::from(20u64));
        assert_eq!(
            world.reputation.get_balance(&borrower()),
            Score::try_from(tokens(5)).unwrap()
        );

        let loan = world.registry.get_loan(id).unwrap();
        assert_eq!(loan.state, LoanState::Repaid);
        assert_eq!(loan.interest_paid, interest);
        assert_eq!(loan.escrow_balance(), Amount::ZERO);
    }

    #[test]
    fn test_custody_accounts_cannot_repay_or_borrow() {
        let mut world = World::new();
        let id = world.disbursed();
        let due = world.registry.amount_due(id).unwrap();
        let pool_account = world.assets.pool_account();
        let escrow = world.registry.get_loan(id).unwrap().escrow.address();
        let pool_before = world.pool.total_pool();
        let events_before = world.events.len();

        for payer in [pool_account, escrow] {
            let (registry, ctx) = world.ctx();
            assert_eq!(
                registry.mark_repaid(ctx, payer, id, true, due, Utc::now()),
                Err(LendingError::InvalidPrincipal)
            );
        }
        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry.create_loan(ctx, admin(), pool_account, tokens(1), 1200, 30, Utc::now()),
            Err(LendingError::InvalidPrincipal)
        );

        assert_eq!(world.registry.get_loan(id).unwrap().state, LoanState::Disbursed);
        assert_eq!(world.pool.total_pool(), pool_before);
        assert_eq!(world.pool.total_pool(), world.assets.balance_of(&pool_account));
        assert_eq!(world.reputation.get_balance(&borrower()), Score::ZERO);
        assert_eq!(world.events.len(), events_before);
    }

    #[test]
    fn test_insufficient_repayment_keeps_disbursed() {
        let mut world = World::new();
        let id = world.disbursed();
        let events_before = world.events.len();

        let (registry, ctx) = world.ctx();
        let err = registry
            .mark_repaid(ctx, borrower(), id, true, tokens(5), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientRepayment");
        assert_eq!(world.registry.get_loan(id).unwrap().state, LoanState::Disbursed);
        assert_eq!(world.assets.balance_of(&borrower()), tokens(15));
        assert_eq!(world.events.len(), events_before);
    }

    #[test]
    fn test_payer_without_funds_rejected() {
        let mut world = World::new();
        let id = world.disbursed();
        let stranger = Address::repeat_byte(0x33);

        let (registry, ctx) = world.ctx();
        let err = registry
            .mark_repaid(ctx, stranger, id, true, tokens(6), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientBalance");
        assert_eq!(world.registry.get_loan(id).unwrap().state, LoanState::Disbursed);
    }

    #[test]
    fn test_late_repayment_mints_half() {
        let mut world = World::new();
        let id = world.disbursed();
        let (registry, ctx) = world.ctx();
        registry
            .mark_repaid(ctx, borrower(), id, false, tokens(6), Utc::now())
            .unwrap();
        assert_eq!(
            world.reputation.get_balance(&borrower()),
            Score::try_from(tokens(5) / Amount::from(2u64)).unwrap()
        );
    }

    #[test]
    fn test_default_burns_without_moving_funds() {
        let mut world = World::new();
        let id = world.disbursed();
        let pool_before = world.pool.total_pool();

        let (registry, ctx) = world.ctx();
        registry.mark_defaulted(ctx, admin(), id, Utc::now()).unwrap();

        assert_eq!(
            world.reputation.get_balance(&borrower()),
            Score::try_from(tokens(5)).unwrap().wrapping_neg()
        );
        assert_eq!(world.pool.total_pool(), pool_before);
        assert_eq!(world.pool.total_principal(), tokens(20));
        assert_eq!(world.registry.get_loan(id).unwrap().state, LoanState::Defaulted);

        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry.mark_defaulted(ctx, admin(), id, Utc::now()).unwrap_err().kind(),
            "InvalidState"
        );
    }

    #[test]
    fn test_rotated_controller_blocks_reputation_updates() {
        let mut world = World::new();
        let id = world.disbursed();
        let other = Address::repeat_byte(0x44);
        world
            .reputation
            .set_controller(system(), other, &mut world.events)
            .unwrap();

        let (registry, ctx) = world.ctx();
        let err = registry.mark_defaulted(ctx, admin(), id, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "Unauthorized");
        assert_eq!(world.registry.get_loan(id).unwrap().state, LoanState::Disbursed);
    }

    #[test]
    fn test_unknown_loan() {
        let mut world = World::new();
        let (registry, ctx) = world.ctx();
        assert_eq!(
            registry.mark_funded(ctx, admin(), 9, Utc::now()),
            Err(LendingError::LoanNotFound(9))
        );
        assert_eq!(world.registry.amount_due(9), Err(LendingError::LoanNotFound(9)));
    }
}
