//! Lending Engine
//!
//! Owns every component behind one `RwLock`. Each mutating method takes the
//! write lock and runs one synchronous component operation to completion, so
//! operations are serialized and readers never see a loan mid-transition.

use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tracing::info;

use crate::error::{LendingError, LendingResult};
use crate::events::{EventLog, EventRecord};
use crate::ledger::{AccountKind, AssetLedger, TransferRecord};
use crate::loans::{Loan, LoanContext, LoanRegistry};
use crate::pool::{LiquidityPool, PoolAccount, PoolSnapshot};
use crate::reputation::{ReputationLedger, ReputationScore, TierTable, TierTerms};
use crate::types::{Amount, LoanId, Principal, Score};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub admin: Principal,
    pub loan_system: Principal,
    pub event_capacity: usize,
    pub tiers: TierTable,
}

impl EngineSettings {
    pub fn new(admin: Principal, loan_system: Principal) -> Self {
        Self {
            admin,
            loan_system,
            event_capacity: 1024,
            tiers: TierTable::default(),
        }
    }
}

/// All engine state. Only reachable through `LendingEngine`.
pub struct LendingState {
    assets: AssetLedger,
    pool: LiquidityPool,
    loans: LoanRegistry,
    reputation: ReputationLedger,
    events: EventLog,
}

impl LendingState {
    fn split(&mut self) -> (&mut LoanRegistry, LoanContext<'_>) {
        (
            &mut self.loans,
            LoanContext {
                pool: &mut self.pool,
                assets: &mut self.assets,
                reputation: &mut self.reputation,
                events: &mut self.events,
            },
        )
    }

    pub fn assets(&self) -> &AssetLedger {
        &self.assets
    }

    pub fn pool(&self) -> &LiquidityPool {
        &self.pool
    }

    pub fn loans(&self) -> &LoanRegistry {
        &self.loans
    }

    pub fn reputation(&self) -> &ReputationLedger {
        &self.reputation
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

pub struct LendingEngine {
    admin: Principal,
    loan_system: Principal,
    state: RwLock<LendingState>,
}

impl LendingEngine {
    /// Build an empty engine and seed the loan system as reputation controller
    pub fn new(settings: EngineSettings) -> LendingResult<Self> {
        let EngineSettings {
            admin,
            loan_system,
            event_capacity,
            tiers,
        } = settings;
        if admin.is_zero() || loan_system.is_zero() {
            return Err(LendingError::InvalidPrincipal);
        }

        let mut events = EventLog::new(event_capacity);
        let mut reputation = ReputationLedger::new(admin, tiers);
        reputation.set_controller(admin, loan_system, &mut events)?;

        info!(admin = %admin, loan_system = %loan_system, "Lending engine initialized");

        Ok(Self {
            admin,
            loan_system,
            state: RwLock::new(LendingState {
                assets: AssetLedger::new(admin),
                pool: LiquidityPool::new(admin),
                loans: LoanRegistry::new(admin, loan_system),
                reputation,
                events,
            }),
        })
    }

    pub fn admin(&self) -> Principal {
        self.admin
    }

    pub fn loan_system(&self) -> Principal {
        self.loan_system
    }

    /// Run `f` against a consistent snapshot under the read lock
    pub async fn inspect<R>(&self, f: impl FnOnce(&LendingState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    // ---- asset ledger ----

    pub async fn mint_asset(&self, caller: Principal, to: Principal, amount: Amount) -> LendingResult<Amount> {
        self.state.write().await.assets.mint(caller, to, amount)
    }

    pub async fn balance_of(&self, who: Principal) -> Amount {
        self.state.read().await.assets.balance_of(&who)
    }

    pub async fn total_supply(&self) -> Amount {
        self.state.read().await.assets.total_supply()
    }

    pub async fn account_kind(&self, who: Principal) -> AccountKind {
        self.state.read().await.assets.kind_of(&who)
    }

    pub async fn transfers_of(&self, who: Principal) -> Vec<TransferRecord> {
        self.state.read().await.assets.transfers_of(&who)
    }

    // ---- liquidity pool ----

    /// Deposit and return the pending interest paid out on the way
    pub async fn deposit(&self, principal: Principal, amount: Amount) -> LendingResult<Amount> {
        let mut state = self.state.write().await;
        let LendingState {
            assets, pool, events, ..
        } = &mut *state;
        pool.deposit(assets, events, principal, amount)
    }

    /// Withdraw principal and return the pending interest paid with it
    pub async fn withdraw(&self, principal: Principal, amount: Amount) -> LendingResult<Amount> {
        let mut state = self.state.write().await;
        let LendingState {
            assets, pool, events, ..
        } = &mut *state;
        pool.withdraw(assets, events, principal, amount)
    }

    pub async fn pending_interest(&self, principal: Principal) -> LendingResult<Amount> {
        self.state.read().await.pool.pending_interest(&principal)
    }

    pub async fn pool_account(&self, principal: Principal) -> Option<PoolAccount> {
        self.state.read().await.pool.account(&principal).cloned()
    }

    pub async fn pool_snapshot(&self) -> PoolSnapshot {
        self.state.read().await.pool.snapshot()
    }

    pub async fn total_shares(&self) -> Amount {
        self.state.read().await.pool.total_shares()
    }

    pub async fn shares_of(&self, principal: Principal) -> Amount {
        self.state.read().await.pool.shares_of(&principal)
    }

    pub async fn share_value(&self, shares: Amount) -> Amount {
        self.state.read().await.pool.share_value(shares)
    }

    // ---- loan registry ----

    pub async fn create_loan(
        &self,
        caller: Principal,
        borrower: Principal,
        amount: Amount,
        apr_bps: u32,
        term_days: u32,
    ) -> LendingResult<LoanId> {
        let mut state = self.state.write().await;
        let (loans, ctx) = state.split();
        loans.create_loan(ctx, caller, borrower, amount, apr_bps, term_days, Utc::now())
    }

    pub async fn mark_funded(&self, caller: Principal, loan_id: LoanId) -> LendingResult<()> {
        let mut state = self.state.write().await;
        let (loans, ctx) = state.split();
        loans.mark_funded(ctx, caller, loan_id, Utc::now())
    }

    pub async fn mark_disbursed(&self, caller: Principal, loan_id: LoanId) -> LendingResult<()> {
        let mut state = self.state.write().await;
        let (loans, ctx) = state.split();
        loans.mark_disbursed(ctx, caller, loan_id, Utc::now())
    }

    /// Repay from `payer`; returns the amount settled into the pool
    pub async fn mark_repaid(
        &self,
        payer: Principal,
        loan_id: LoanId,
        on_time: bool,
        amount: Amount,
    ) -> LendingResult<Amount> {
        let mut state = self.state.write().await;
        let (loans, ctx) = state.split();
        loans.mark_repaid(ctx, payer, loan_id, on_time, amount, Utc::now())
    }

    pub async fn mark_defaulted(&self, caller: Principal, loan_id: LoanId) -> LendingResult<()> {
        let mut state = self.state.write().await;
        let (loans, ctx) = state.split();
        loans.mark_defaulted(ctx, caller, loan_id, Utc::now())
    }

    pub async fn get_loan(&self, loan_id: LoanId) -> LendingResult<Loan> {
        self.state.read().await.loans.get_loan(loan_id).cloned()
    }

    pub async fn loans_of(&self, borrower: Principal) -> Vec<Loan> {
        self.state
            .read()
            .await
            .loans
            .loans_of(&borrower)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn next_loan_id(&self) -> LoanId {
        self.state.read().await.loans.next_loan_id()
    }

    pub async fn amount_due(&self, loan_id: LoanId) -> LendingResult<Amount> {
        self.state.read().await.loans.amount_due(loan_id)
    }

    // ---- reputation ----

    pub async fn initialize_reputation(
        &self,
        caller: Principal,
        principal: Principal,
        initial_score: Amount,
    ) -> LendingResult<()> {
        let mut state = self.state.write().await;
        let LendingState {
            reputation, events, ..
        } = &mut *state;
        reputation.initialize(caller, principal, initial_score, events)
    }

    pub async fn mint_reputation(&self, caller: Principal, principal: Principal, amount: Amount) -> LendingResult<Score> {
        let mut state = self.state.write().await;
        let LendingState {
            reputation, events, ..
        } = &mut *state;
        reputation.mint(caller, principal, amount, events)
    }

    pub async fn burn_reputation(&self, caller: Principal, principal: Principal, amount: Amount) -> LendingResult<Score> {
        let mut state = self.state.write().await;
        let LendingState {
            reputation, events, ..
        } = &mut *state;
        reputation.burn(caller, principal, amount, events)
    }

    pub async fn set_controller(&self, caller: Principal, new_controller: Principal) -> LendingResult<()> {
        let mut state = self.state.write().await;
        let LendingState {
            reputation, events, ..
        } = &mut *state;
        reputation.set_controller(caller, new_controller, events)
    }

    pub async fn controller(&self) -> Option<Principal> {
        self.state.read().await.reputation.controller()
    }

    pub async fn reputation_of(&self, principal: Principal) -> Score {
        self.state.read().await.reputation.get_balance(&principal)
    }

    pub async fn is_initialized(&self, principal: Principal) -> bool {
        self.state.read().await.reputation.is_initialized(&principal)
    }

    pub async fn reputation_record(&self, principal: Principal) -> Option<ReputationScore> {
        self.state.read().await.reputation.record(&principal).cloned()
    }

    pub async fn tier_for(&self, principal: Principal) -> TierTerms {
        self.state.read().await.reputation.tier_for(&principal)
    }

    // ---- events ----

    pub async fn events_since(&self, after: u64) -> Vec<EventRecord> {
        self.state.read().await.events.since(after).to_vec()
    }

    pub async fn events_for_principal(&self, who: Principal) -> Vec<EventRecord> {
        self.state.read().await.events.for_principal(&who)
    }

    pub async fn events_for_loan(&self, loan_id: LoanId) -> Vec<EventRecord> {
        self.state.read().await.events.for_loan(loan_id)
    }

    pub async fn latest_event_seq(&self) -> u64 {
        self.state.read().await.events.latest_seq()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.state.read().await.events.subscribe()
    }
}
