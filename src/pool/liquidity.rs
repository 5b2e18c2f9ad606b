//! Liquidity Pool State and Operations
//!
//! `total_pool` mirrors the pool's balance in the asset ledger; loan principal
//! sitting in escrow or with a borrower is outside it until settlement.

use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

use super::account::{PoolAccount, PoolSnapshot, accrued};
use crate::error::{LendingError, LendingResult};
use crate::events::{EventLog, LendingEvent};
use crate::ledger::{AssetLedger, TransferCode};
use crate::types::{Amount, LoanId, Principal, SCALE, mul_div};

pub struct LiquidityPool {
    admin: Principal,
    total_pool: Amount,
    total_principal: Amount,
    acc_interest_per_share: Amount,
    accounts: HashMap<Principal, PoolAccount>,
}

/// Pool totals after a settlement, computed before anything is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementEffect {
    pub total_pool: Amount,
    pub acc_interest_per_share: Amount,
}

impl LiquidityPool {
    pub fn new(admin: Principal) -> Self {
        Self {
            admin,
            total_pool: Amount::ZERO,
            total_principal: Amount::ZERO,
            acc_interest_per_share: Amount::ZERO,
            accounts: HashMap::new(),
        }
    }

    pub fn deposit(
        &mut self,
        assets: &mut AssetLedger,
        events: &mut EventLog,
        principal: Principal,
        amount: Amount,
    ) -> LendingResult<Amount> {
        assets.ensure_external(&principal)?;
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("deposit amount must be positive"));
        }

        let acc = self.acc_interest_per_share;
        let account = self
            .accounts
            .get(&principal)
            .cloned()
            .unwrap_or_else(|| PoolAccount::new(principal));
        let pending = account.pending(acc)?;
        if pending > self.total_pool {
            return Err(LendingError::InsufficientPool {
                available: self.total_pool,
                required: pending,
            });
        }
        assets.ensure_balance(&principal, amount)?;

        let deposited = account
            .principal_deposited
            .checked_add(amount)
            .ok_or(LendingError::Overflow)?;
        let total_principal = self
            .total_principal
            .checked_add(amount)
            .ok_or(LendingError::Overflow)?;
        let total_pool = (self.total_pool - pending)
            .checked_add(amount)
            .ok_or(LendingError::Overflow)?;
        let interest_debt = accrued(deposited, acc)?;

        let pool_account = assets.pool_account();
        assets.transfer(principal, pool_account, amount, TransferCode::Deposit)?;
        if !pending.is_zero() {
            assets.transfer(pool_account, principal, pending, TransferCode::InterestPayout)?;
        }

        let account = self.accounts.entry(principal).or_insert(account);
        account.principal_deposited = deposited;
        account.interest_debt = interest_debt;
        account.interest_paid = account.interest_paid.saturating_add(pending);
        account.updated_at = Utc::now();
        self.total_principal = total_principal;
        self.total_pool = total_pool;

        info!(
            principal = %principal,
            amount = %amount,
            interest_paid = %pending,
            total_pool = %self.total_pool,
            "Deposit accepted"
        );
        events.emit(LendingEvent::Deposited {
            principal,
            amount,
            interest_paid: pending,
        });
        Ok(pending)
    }

    /// Withdraw `amount` of principal plus all pending interest.
    /// Returns the interest portion paid.
    pub fn withdraw(
        &mut self,
        assets: &mut AssetLedger,
        events: &mut EventLog,
        principal: Principal,
        amount: Amount,
    ) -> LendingResult<Amount> {
        assets.ensure_external(&principal)?;
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("withdraw amount must be positive"));
        }
        let account = self.accounts.get(&principal).cloned().ok_or(
            LendingError::InsufficientPrincipal {
                deposited: Amount::ZERO,
                requested: amount,
            },
        )?;
        if amount > account.principal_deposited {
            return Err(LendingError::InsufficientPrincipal {
                deposited: account.principal_deposited,
                requested: amount,
            });
        }

        let acc = self.acc_interest_per_share;
        let pending = account.pending(acc)?;
        let payout = amount.checked_add(pending).ok_or(LendingError::Overflow)?;
        if payout > self.total_pool {
            return Err(LendingError::InsufficientPool {
                available: self.total_pool,
                required: payout,
            });
        }

        let deposited = account.principal_deposited - amount;
        let interest_debt = accrued(deposited, acc)?;

        let pool_account = assets.pool_account();
        assets.ensure_balance(&pool_account, payout)?;
        assets.transfer(pool_account, principal, amount, TransferCode::Withdrawal)?;
        if !pending.is_zero() {
            assets.transfer(pool_account, principal, pending, TransferCode::InterestPayout)?;
        }

        if let Some(account) = self.accounts.get_mut(&principal) {
            account.principal_deposited = deposited;
            account.interest_debt = interest_debt;
            account.interest_paid = account.interest_paid.saturating_add(pending);
            account.updated_at = Utc::now();
        }
        self.total_principal -= amount;
        self.total_pool -= payout;

        info!(
            principal = %principal,
            amount = %amount,
            interest_paid = %pending,
            total_pool = %self.total_pool,
            "Withdrawal paid"
        );
        events.emit(LendingEvent::Withdrawn {
            principal,
            amount,
            interest_paid: pending,
        });
        Ok(pending)
    }

    /// Move `amount` of liquid balance into a loan escrow. Admin only.
    pub fn fund_escrow(
        &mut self,
        assets: &mut AssetLedger,
        caller: Principal,
        loan_id: LoanId,
        escrow: Principal,
        amount: Amount,
    ) -> LendingResult<()> {
        self.check_fund_escrow(caller, amount)?;

        let pool_account = assets.pool_account();
        assets.transfer(pool_account, escrow, amount, TransferCode::EscrowFunding)?;
        self.total_pool -= amount;

        info!(
            loan_id = loan_id,
            escrow = %escrow,
            amount = %amount,
            total_pool = %self.total_pool,
            "Escrow funded from pool"
        );
        Ok(())
    }

    pub fn check_fund_escrow(&self, caller: Principal, amount: Amount) -> LendingResult<()> {
        if caller != self.admin {
            return Err(LendingError::Unauthorized { caller, required: "admin" });
        }
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("escrow amount must be positive"));
        }
        if amount > self.total_pool {
            return Err(LendingError::InsufficientPool {
                available: self.total_pool,
                required: amount,
            });
        }
        Ok(())
    }

    /// Resulting totals if `total_amount` with `interest_portion` were received
    pub fn settlement_effect(
        &self,
        total_amount: Amount,
        interest_portion: Amount,
    ) -> LendingResult<SettlementEffect> {
        if interest_portion > total_amount {
            return Err(LendingError::InvalidAmount("interest exceeds settlement"));
        }
        let total_pool = self
            .total_pool
            .checked_add(total_amount)
            .ok_or(LendingError::Overflow)?;

        let mut acc_interest_per_share = self.acc_interest_per_share;
        if !interest_portion.is_zero() && !self.total_principal.is_zero() {
            let increment = mul_div(interest_portion, SCALE, self.total_principal)
                .ok_or(LendingError::Overflow)?;
            acc_interest_per_share = acc_interest_per_share
                .checked_add(increment)
                .ok_or(LendingError::Overflow)?;
        }

        Ok(SettlementEffect {
            total_pool,
            acc_interest_per_share,
        })
    }

    /// Account for assets already credited to the pool's ledger account
    pub fn receive_settlement(
        &mut self,
        loan_id: LoanId,
        total_amount: Amount,
        interest_portion: Amount,
    ) -> LendingResult<()> {
        let effect = self.settlement_effect(total_amount, interest_portion)?;

        debug!(
            loan_id = loan_id,
            total = %total_amount,
            interest = %interest_portion,
            acc_before = %self.acc_interest_per_share,
            acc_after = %effect.acc_interest_per_share,
            "Settlement received"
        );

        self.total_pool = effect.total_pool;
        self.acc_interest_per_share = effect.acc_interest_per_share;
        Ok(())
    }

    pub fn pending_interest(&self, principal: &Principal) -> LendingResult<Amount> {
        match self.accounts.get(principal) {
            Some(account) => account.pending(self.acc_interest_per_share),
            None => Ok(Amount::ZERO),
        }
    }

    pub fn account(&self, principal: &Principal) -> Option<&PoolAccount> {
        self.accounts.get(principal)
    }

    pub fn total_pool(&self) -> Amount {
        self.total_pool
    }

    pub fn total_principal(&self) -> Amount {
        self.total_principal
    }

    pub fn acc_interest_per_share(&self) -> Amount {
        self.acc_interest_per_share
    }

    pub fn total_shares(&self) -> Amount {
        self.total_principal
    }

    pub fn shares_of(&self, principal: &Principal) -> Amount {
        self.accounts
            .get(principal)
            .map(|a| a.principal_deposited)
            .unwrap_or(Amount::ZERO)
    }

    /// Liquid value of `shares`, zero while the pool has no shares
    pub fn share_value(&self, shares: Amount) -> Amount {
        mul_div(shares, self.total_pool, self.total_shares()).unwrap_or(Amount::ZERO)
    }

    pub fn lenders(&self) -> impl Iterator<Item = &Principal> {
        self.accounts.keys()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            at: Utc::now(),
            total_pool: self.total_pool,
            total_principal: self.total_principal,
            acc_interest_per_share: self.acc_interest_per_share,
            lender_count: self
                .accounts
                .values()
                .filter(|a| !a.principal_deposited.is_zero())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tokens;
    use alloy_primitives::{Address, U256};

    fn admin() -> Principal {
        Address::repeat_byte(0xAA)
    }

    fn alice() -> Principal {
        Address::repeat_byte(0x01)
    }

    fn bob() -> Principal {
        Address::repeat_byte(0x02)
    }

    struct Fixture {
        pool: LiquidityPool,
        assets: AssetLedger,
        events: EventLog,
    }

    fn fixture() -> Fixture {
        let mut assets = AssetLedger::new(admin());
        assets.mint(admin(), alice(), tokens(100)).unwrap();
        assets.mint(admin(), bob(), tokens(100)).unwrap();
        Fixture {
            pool: LiquidityPool::new(admin()),
            assets,
            events: EventLog::default(),
        }
    }

    /// Simulate a loan round trip returning `interest` to the pool
    fn settle_interest(f: &mut Fixture, interest: Amount) {
        let payer = Address::repeat_byte(0x77);
        f.assets.mint(admin(), payer, interest).unwrap();
        let pool_account = f.assets.pool_account();
        f.assets
            .transfer(payer, pool_account, interest, TransferCode::Settlement)
            .unwrap();
        f.pool.receive_settlement(1, interest, interest).unwrap();
    }

    #[test]
    fn test_deposit_and_withdraw_principal() {
        let mut f = fixture();
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(20)).unwrap();

        assert_eq!(f.pool.total_pool(), tokens(20));
        assert_eq!(f.pool.total_principal(), tokens(20));
        assert_eq!(f.pool.shares_of(&alice()), tokens(20));
        assert_eq!(f.assets.balance_of(&alice()), tokens(80));
        assert_eq!(f.assets.balance_of(&f.assets.pool_account()), tokens(20));

        f.pool.withdraw(&mut f.assets, &mut f.events, alice(), tokens(5)).unwrap();
        assert_eq!(f.pool.total_pool(), tokens(15));
        assert_eq!(f.assets.balance_of(&alice()), tokens(85));
        assert_eq!(f.events.len(), 2);
    }

    #[test]
    fn test_deposit_rejections_change_nothing() {
        let mut f = fixture();
        assert_eq!(
            f.pool.deposit(&mut f.assets, &mut f.events, alice(), Amount::ZERO).unwrap_err().kind(),
            "InvalidAmount"
        );
        assert_eq!(
            f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(101)).unwrap_err().kind(),
            "InsufficientBalance"
        );
        assert!(f.pool.account(&alice()).is_none());
        assert!(f.events.is_empty());
    }

    #[test]
    fn test_custody_accounts_cannot_lend() {
        let mut f = fixture();
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(20)).unwrap();
        let pool_account = f.assets.pool_account();
        let escrow = f.assets.open_escrow(1);

        for custody in [pool_account, escrow] {
            assert_eq!(
                f.pool.deposit(&mut f.assets, &mut f.events, custody, tokens(1)),
                Err(LendingError::InvalidPrincipal)
            );
            assert_eq!(
                f.pool.withdraw(&mut f.assets, &mut f.events, custody, tokens(1)),
                Err(LendingError::InvalidPrincipal)
            );
        }

        assert_eq!(f.pool.total_principal(), tokens(20));
        assert_eq!(f.pool.total_pool(), f.assets.balance_of(&pool_account));
        assert!(f.pool.account(&pool_account).is_none());
        assert_eq!(f.events.len(), 1);
    }

    #[test]
    fn test_withdraw_more_than_deposited() {
        let mut f = fixture();
        assert_eq!(
            f.pool.withdraw(&mut f.assets, &mut f.events, alice(), tokens(1)).unwrap_err().kind(),
            "InsufficientPrincipal"
        );
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(10)).unwrap();
        let err = f.pool.withdraw(&mut f.assets, &mut f.events, alice(), tokens(11)).unwrap_err();
        assert_eq!(
            err,
            LendingError::InsufficientPrincipal {
                deposited: tokens(10),
                requested: tokens(11),
            }
        );
    }

    #[test]
    fn test_interest_split_pro_rata() {
        let mut f = fixture();
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(30)).unwrap();
        f.pool.deposit(&mut f.assets, &mut f.events, bob(), tokens(10)).unwrap();

        settle_interest(&mut f, tokens(4));

        assert_eq!(f.pool.pending_interest(&alice()).unwrap(), tokens(3));
        assert_eq!(f.pool.pending_interest(&bob()).unwrap(), tokens(1));

        let paid = f.pool.withdraw(&mut f.assets, &mut f.events, alice(), tokens(30)).unwrap();
        assert_eq!(paid, tokens(3));
        assert_eq!(f.assets.balance_of(&alice()), tokens(103));
        assert_eq!(f.pool.pending_interest(&alice()).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_late_depositor_earns_nothing_retroactively() {
        let mut f = fixture();
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(10)).unwrap();
        settle_interest(&mut f, tokens(2));

        f.pool.deposit(&mut f.assets, &mut f.events, bob(), tokens(10)).unwrap();
        assert_eq!(f.pool.pending_interest(&bob()).unwrap(), Amount::ZERO);
        assert_eq!(f.pool.pending_interest(&alice()).unwrap(), tokens(2));
    }

    #[test]
    fn test_deposit_pays_pending_first() {
        let mut f = fixture();
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(10)).unwrap();
        settle_interest(&mut f, tokens(1));

        let paid = f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(10)).unwrap();
        assert_eq!(paid, tokens(1));
        assert_eq!(f.pool.account(&alice()).unwrap().interest_paid, tokens(1));
        assert_eq!(f.pool.total_pool(), tokens(20));
        assert_eq!(f.pool.pending_interest(&alice()).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_settlement_without_principal_keeps_accumulator() {
        let mut pool = LiquidityPool::new(admin());
        pool.receive_settlement(1, tokens(5), tokens(1)).unwrap();
        assert_eq!(pool.total_pool(), tokens(5));
        assert_eq!(pool.acc_interest_per_share(), Amount::ZERO);

        assert_eq!(
            pool.receive_settlement(2, tokens(1), tokens(2)).unwrap_err().kind(),
            "InvalidAmount"
        );
    }

    #[test]
    fn test_fund_escrow_checks() {
        let mut f = fixture();
        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(10)).unwrap();
        let escrow = f.assets.open_escrow(1);

        assert_eq!(
            f.pool
                .fund_escrow(&mut f.assets, alice(), 1, escrow, tokens(5))
                .unwrap_err()
                .kind(),
            "Unauthorized"
        );
        assert_eq!(
            f.pool
                .fund_escrow(&mut f.assets, admin(), 1, escrow, tokens(11))
                .unwrap_err()
                .kind(),
            "InsufficientPool"
        );

        f.pool.fund_escrow(&mut f.assets, admin(), 1, escrow, tokens(5)).unwrap();
        assert_eq!(f.pool.total_pool(), tokens(5));
        assert_eq!(f.pool.total_principal(), tokens(10));
        assert_eq!(f.assets.balance_of(&escrow), tokens(5));
    }

    #[test]
    fn test_share_views() {
        let mut f = fixture();
        assert_eq!(f.pool.share_value(tokens(1)), Amount::ZERO);

        f.pool.deposit(&mut f.assets, &mut f.events, alice(), tokens(10)).unwrap();
        f.pool.deposit(&mut f.assets, &mut f.events, bob(), tokens(10)).unwrap();
        assert_eq!(f.pool.total_shares(), tokens(20));
        assert_eq!(f.pool.share_value(tokens(10)), tokens(10));

        let escrow = f.assets.open_escrow(1);
        f.pool.fund_escrow(&mut f.assets, admin(), 1, escrow, tokens(4)).unwrap();
        assert_eq!(f.pool.share_value(tokens(10)), tokens(8));

        let snapshot = f.pool.snapshot();
        assert_eq!(snapshot.lender_count, 2);
        assert_eq!(snapshot.total_pool, tokens(16));
        assert_eq!(snapshot.acc_interest_per_share, U256::ZERO);
    }
}
