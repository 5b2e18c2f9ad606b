//! Reputation Score Records and Credit Tiers
//!
//! A score is a signed balance in asset base units: it grows by the principal
//! of each repaid loan and shrinks by the principal of each default, so it can
//! go negative. Tiers classify the balance in whole tokens and give the
//! orchestrator an advisory loan cap and base APR.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Principal, Score, TOKEN_UNIT, signed_decimal};

/// Reputation record for one principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationScore {
    pub principal: Principal,

    /// Current balance, may be negative after defaults
    #[serde(with = "signed_decimal")]
    pub balance: Score,

    pub mint_count: u64,
    pub burn_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReputationScore {
    pub fn new(principal: Principal, balance: Score) -> Self {
        let now = Utc::now();
        Self {
            principal,
            balance,
            mint_count: 0,
            burn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.balance.is_negative()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditTier {
    Excellent,
    Good,
    New,
    MediumRisk,
    HighRisk,
    /// Negative balance
    Ineligible,
}

impl CreditTier {
    pub fn label(&self) -> &'static str {
        match self {
            CreditTier::Excellent => "Excellent",
            CreditTier::Good => "Good",
            CreditTier::New => "New",
            CreditTier::MediumRisk => "Medium Risk",
            CreditTier::HighRisk => "High Risk",
            CreditTier::Ineligible => "Ineligible",
        }
    }

    pub fn can_borrow(&self) -> bool {
        !matches!(self, CreditTier::Ineligible)
    }
}

/// Lending terms attached to a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTerms {
    pub tier: CreditTier,
    /// Minimum balance in whole tokens
    pub min_balance: u64,
    /// Loan cap in whole tokens
    pub max_loan: u64,
    pub base_apr_bps: u32,
}

/// Governance-configurable tier table, ordered from best to worst
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTable {
    pub tiers: Vec<TierTerms>,
}

impl Default for TierTable {
    fn default() -> Self {
        let terms = |tier, min_balance, max_loan, base_apr_bps| TierTerms {
            tier,
            min_balance,
            max_loan,
            base_apr_bps,
        };
        Self {
            tiers: vec![
                terms(CreditTier::Excellent, 201, 7500, 1500),
                terms(CreditTier::Good, 121, 5000, 2000),
                terms(CreditTier::New, 100, 2000, 2500),
                terms(CreditTier::MediumRisk, 20, 1500, 3000),
                terms(CreditTier::HighRisk, 0, 500, 3500),
            ],
        }
    }
}

impl TierTable {
    pub fn classify(&self, balance: Score) -> TierTerms {
        let ineligible = TierTerms {
            tier: CreditTier::Ineligible,
            min_balance: 0,
            max_loan: 0,
            base_apr_bps: 0,
        };
        if balance.is_negative() {
            return ineligible;
        }

        let whole = balance.into_raw() / TOKEN_UNIT;
        self.tiers
            .iter()
            .find(|t| whole >= U256::from(t.min_balance))
            .copied()
            .unwrap_or(ineligible)
    }
}
