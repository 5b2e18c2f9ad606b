//! Reputation Ledger
//!
//! Soulbound signed scores. Only the current controller may mint or burn; the
//! admin may seed the first controller and may initialize records. There are
//! no transfer or approval operations.

use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

use super::score::{ReputationScore, TierTable, TierTerms};
use crate::error::{LendingError, LendingResult};
use crate::events::{EventLog, LendingEvent};
use crate::types::{Amount, Principal, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Mint,
    Burn,
}

pub struct ReputationLedger {
    admin: Principal,
    controller: Option<Principal>,
    scores: HashMap<Principal, ReputationScore>,
    tiers: TierTable,
}

impl ReputationLedger {
    pub fn new(admin: Principal, tiers: TierTable) -> Self {
        Self {
            admin,
            controller: None,
            scores: HashMap::new(),
            tiers,
        }
    }

    pub fn controller(&self) -> Option<Principal> {
        self.controller
    }

    pub fn set_controller(
        &mut self,
        caller: Principal,
        new_controller: Principal,
        events: &mut EventLog,
    ) -> LendingResult<()> {
        let allowed = match self.controller {
            Some(current) => caller == current,
            None => caller == self.admin,
        };
        if !allowed {
            return Err(LendingError::Unauthorized { caller, required: "controller" });
        }
        if new_controller.is_zero() {
            return Err(LendingError::InvalidPrincipal);
        }

        let previous = self.controller.replace(new_controller);
        info!(controller = %new_controller, "Reputation controller changed");
        events.emit(LendingEvent::ControllerChanged {
            previous,
            current: new_controller,
        });
        Ok(())
    }

    pub fn initialize(
        &mut self,
        caller: Principal,
        principal: Principal,
        initial_score: Amount,
        events: &mut EventLog,
    ) -> LendingResult<()> {
        if !self.is_controller(&caller) && caller != self.admin {
            return Err(LendingError::Unauthorized {
                caller,
                required: "controller or admin",
            });
        }
        if principal.is_zero() {
            return Err(LendingError::InvalidPrincipal);
        }
        if self.scores.contains_key(&principal) {
            return Err(LendingError::AlreadyInitialized(principal));
        }
        let balance = Score::try_from(initial_score).map_err(|_| LendingError::Overflow)?;

        self.scores
            .insert(principal, ReputationScore::new(principal, balance));

        info!(principal = %principal, initial_score = %initial_score, "Reputation initialized");
        events.emit(LendingEvent::UserInitialized {
            principal,
            initial_score,
        });
        Ok(())
    }

    /// Initialize at zero unless a record exists; returns whether one was created
    pub fn ensure_initialized(
        &mut self,
        caller: Principal,
        principal: Principal,
        events: &mut EventLog,
    ) -> LendingResult<bool> {
        if self.scores.contains_key(&principal) {
            return Ok(false);
        }
        self.initialize(caller, principal, Amount::ZERO, events)?;
        Ok(true)
    }

    /// Validate an adjustment without applying it, returning the would-be balance
    pub fn check_adjust(
        &self,
        caller: Principal,
        principal: Principal,
        amount: Amount,
        direction: Adjustment,
    ) -> LendingResult<Score> {
        if !self.is_controller(&caller) {
            return Err(LendingError::Unauthorized { caller, required: "controller" });
        }
        let record = self
            .scores
            .get(&principal)
            .ok_or(LendingError::NotInitialized(principal))?;
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount("reputation amount must be positive"));
        }

        match direction {
            Adjustment::Mint => {
                let delta = Score::try_from(amount).map_err(|_| LendingError::Overflow)?;
                record.balance.checked_add(delta).ok_or(LendingError::Overflow)
            }
            Adjustment::Burn => {
                let delta = Score::try_from(amount).map_err(|_| LendingError::Underflow)?;
                record.balance.checked_sub(delta).ok_or(LendingError::Underflow)
            }
        }
    }

    pub fn mint(
        &mut self,
        caller: Principal,
        principal: Principal,
        amount: Amount,
        events: &mut EventLog,
    ) -> LendingResult<Score> {
        let new_balance = self.check_adjust(caller, principal, amount, Adjustment::Mint)?;
        self.apply(principal, new_balance, Adjustment::Mint);

        info!(principal = %principal, amount = %amount, balance = %new_balance, "Reputation minted");
        events.emit(LendingEvent::Minted {
            principal,
            amount,
            new_balance,
        });
        Ok(new_balance)
    }

    pub fn burn(
        &mut self,
        caller: Principal,
        principal: Principal,
        amount: Amount,
        events: &mut EventLog,
    ) -> LendingResult<Score> {
        let new_balance = self.check_adjust(caller, principal, amount, Adjustment::Burn)?;
        self.apply(principal, new_balance, Adjustment::Burn);

        info!(principal = %principal, amount = %amount, balance = %new_balance, "Reputation burned");
        events.emit(LendingEvent::Burned {
            principal,
            amount,
            new_balance,
        });
        Ok(new_balance)
    }

    pub fn get_balance(&self, principal: &Principal) -> Score {
        self.scores
            .get(principal)
            .map(|s| s.balance)
            .unwrap_or(Score::ZERO)
    }

    pub fn is_initialized(&self, principal: &Principal) -> bool {
        self.scores.contains_key(principal)
    }

    pub fn record(&self, principal: &Principal) -> Option<&ReputationScore> {
        self.scores.get(principal)
    }

    pub fn tier_for(&self, principal: &Principal) -> TierTerms {
        let terms = self.tiers.classify(self.get_balance(principal));
        debug!(principal = %principal, tier = terms.tier.label(), "Tier lookup");
        terms
    }

    fn is_controller(&self, caller: &Principal) -> bool {
        self.controller.as_ref() == Some(caller)
    }

    fn apply(&mut self, principal: Principal, balance: Score, direction: Adjustment) {
        if let Some(record) = self.scores.get_mut(&principal) {
            record.balance = balance;
            record.updated_at = Utc::now();
            match direction {
                Adjustment::Mint => record.mint_count += 1,
                Adjustment::Burn => record.burn_count += 1,
            }
        }
    }
}
