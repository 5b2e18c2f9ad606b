//! Asset Ledger
//!
//! Balances of the deposit asset per principal plus the posted transfer log.
//! Every balance is bounded by the total supply, and mint refuses to push the
//! supply past `U256::MAX`, so credits cannot overflow.

use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

use super::accounts::{AccountKind, escrow_address, pool_address};
use super::transfers::{TransferCode, TransferRecord};
use crate::error::{LendingError, LendingResult};
use crate::types::{Amount, LoanId, Principal};

pub struct AssetLedger {
    admin: Principal,
    pool: Principal,
    balances: HashMap<Principal, Amount>,
    kinds: HashMap<Principal, AccountKind>,
    total_supply: Amount,
    transfers: Vec<TransferRecord>,
}

impl AssetLedger {
    pub fn new(admin: Principal) -> Self {
        let pool = pool_address();
        let mut kinds = HashMap::new();
        kinds.insert(pool, AccountKind::Pool);

        Self {
            admin,
            pool,
            balances: HashMap::new(),
            kinds,
            total_supply: Amount::ZERO,
            transfers: Vec::new(),
        }
    }

    pub fn admin(&self) -> Principal {
        self.admin
    }

    pub fn pool_account(&self) -> Principal {
        self.pool
    }

    /// Register (idempotently) and return the custody account of a loan escrow
    pub fn open_escrow(&mut self, loan_id: LoanId) -> Principal {
        let address = escrow_address(loan_id);
        self.kinds.insert(address, AccountKind::Escrow { loan_id });
        address
    }

    pub fn kind_of(&self, who: &Principal) -> AccountKind {
        self.kinds.get(who).copied().unwrap_or(AccountKind::External)
    }

    pub fn balance_of(&self, who: &Principal) -> Amount {
        self.balances.get(who).copied().unwrap_or(Amount::ZERO)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Issue new asset to an external account
    pub fn mint(&mut self, caller: Principal, to: Principal, amount: Amount) -> LendingResult<Amount> {
        if caller != self.admin {
            return Err(LendingError::Unauthorized { caller, required: "admin" });
        }
        self.ensure_external(&to)?;
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("mint amount must be positive"));
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LendingError::Overflow)?;

        self.total_supply = supply;
        let balance = self.credit(to, amount);
        self.record(None, to, amount, TransferCode::Mint);

        info!(to = %to, amount = %amount, balance = %balance, "Asset minted");
        Ok(balance)
    }

    /// Reject the null address and custody accounts where a lender, borrower
    /// or payer is expected
    pub fn ensure_external(&self, who: &Principal) -> LendingResult<()> {
        if who.is_zero() || self.kind_of(who).is_custody() {
            return Err(LendingError::InvalidPrincipal);
        }
        Ok(())
    }

    /// Fail with `InsufficientBalance` unless `from` can cover `amount`
    pub fn ensure_balance(&self, from: &Principal, amount: Amount) -> LendingResult<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(LendingError::InsufficientBalance {
                principal: *from,
                available,
                required: amount,
            });
        }
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: Principal,
        to: Principal,
        amount: Amount,
        code: TransferCode,
    ) -> LendingResult<u64> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("transfer amount must be positive"));
        }
        self.ensure_balance(&from, amount)?;

        let remaining = self.balance_of(&from) - amount;
        self.balances.insert(from, remaining);
        self.credit(to, amount);
        let id = self.record(Some(from), to, amount, code);

        debug!(
            transfer_id = id,
            from = %from,
            to = %to,
            amount = %amount,
            code = code.code(),
            "Transfer posted"
        );
        Ok(id)
    }

    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }

    pub fn transfers_of(&self, who: &Principal) -> Vec<TransferRecord> {
        self.transfers
            .iter()
            .filter(|t| t.touches(who))
            .cloned()
            .collect()
    }

    fn credit(&mut self, to: Principal, amount: Amount) -> Amount {
        let balance = self.balances.entry(to).or_insert(Amount::ZERO);
        *balance = balance.saturating_add(amount);
        *balance
    }

    fn record(&mut self, from: Option<Principal>, to: Principal, amount: Amount, code: TransferCode) -> u64 {
        let id = self.transfers.len() as u64 + 1;
        self.transfers.push(TransferRecord {
            id,
            from,
            to,
            amount,
            code,
            at: Utc::now(),
        });
        id
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

    fn user() -> Principal {
        Address::repeat_byte(0x01)
    }

    #[test]
    fn test_mint_requires_admin() {
        let mut ledger = AssetLedger::new(admin());
        let err = ledger.mint(user(), user(), tokens(1)).unwrap_err();
        assert_eq!(err.kind(), "Unauthorized");
        assert_eq!(ledger.total_supply(), Amount::ZERO);
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut ledger = AssetLedger::new(admin());
        assert_eq!(ledger.mint(admin(), user(), tokens(10)).unwrap(), tokens(10));

        let pool = ledger.pool_account();
        ledger.transfer(user(), pool, tokens(4), TransferCode::Deposit).unwrap();

        assert_eq!(ledger.balance_of(&user()), tokens(6));
        assert_eq!(ledger.balance_of(&pool), tokens(4));
        assert_eq!(ledger.total_supply(), tokens(10));
        assert_eq!(ledger.transfers_of(&user()).len(), 2);
        assert_eq!(ledger.transfers_of(&pool)[0].code, TransferCode::Deposit);
    }

    #[test]
    fn test_transfer_insufficient_balance_changes_nothing() {
        let mut ledger = AssetLedger::new(admin());
        ledger.mint(admin(), user(), tokens(1)).unwrap();

        let err = ledger
            .transfer(user(), admin(), tokens(2), TransferCode::Repayment)
            .unwrap_err();
        assert!(matches!(err, LendingError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&user()), tokens(1));
        assert_eq!(ledger.transfers().len(), 1);
    }

    #[test]
    fn test_mint_rejects_null_and_custody_accounts() {
        let mut ledger = AssetLedger::new(admin());
        assert_eq!(
            ledger.mint(admin(), Address::ZERO, tokens(1)),
            Err(LendingError::InvalidPrincipal)
        );
        let pool = ledger.pool_account();
        assert_eq!(
            ledger.mint(admin(), pool, tokens(1)),
            Err(LendingError::InvalidPrincipal)
        );
        let escrow = ledger.open_escrow(3);
        assert_eq!(ledger.kind_of(&escrow), AccountKind::Escrow { loan_id: 3 });
        assert_eq!(
            ledger.mint(admin(), escrow, tokens(1)),
            Err(LendingError::InvalidPrincipal)
        );
    }

    #[test]
    fn test_supply_overflow() {
        let mut ledger = AssetLedger::new(admin());
        ledger.mint(admin(), user(), U256::MAX).unwrap();
        assert_eq!(
            ledger.mint(admin(), admin(), U256::from(1u64)),
            Err(LendingError::Overflow)
        );
    }
}
