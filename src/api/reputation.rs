//! Reputation API Endpoints
//!
//! Provides score lookups with advisory credit tiers, and the controller-gated
//! mint, burn and initialize operations.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, LendingApiState, principal_param};
use crate::reputation::{CreditTier, TierTerms};
use crate::types::{Amount, Principal, Score, decimal, signed_decimal};

// Request types

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    pub caller: Principal,
    pub principal: Principal,
    #[serde(with = "decimal", default)]
    pub initial_score: Amount,
}

/// Body of both mint and burn
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub caller: Principal,
    pub principal: Principal,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct SetControllerRequest {
    pub caller: Principal,
    pub controller: Principal,
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct ReputationResponse {
    pub principal: Principal,
    pub initialized: bool,
    #[serde(with = "signed_decimal")]
    pub balance: Score,
    pub mint_count: u64,
    pub burn_count: u64,
    pub tier: CreditTier,
    pub tier_label: String,
    pub can_borrow: bool,
    /// Advisory loan cap in whole tokens
    pub max_loan: u64,
    pub base_apr_bps: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub principal: Principal,
    #[serde(with = "signed_decimal")]
    pub balance: Score,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControllerResponse {
    pub controller: Option<Principal>,
}

// Endpoints

/// GET /reputation/{principal} - Score, counters and credit tier
pub async fn get_reputation(
    State(state): State<LendingApiState>,
    Path(principal): Path<String>,
) -> ApiResult<ReputationResponse> {
    let principal = principal_param(&principal)?;
    let record = state.engine.reputation_record(principal).await;
    let TierTerms {
        tier,
        max_loan,
        base_apr_bps,
        ..
    } = state.engine.tier_for(principal).await;

    Ok(Json(ReputationResponse {
        principal,
        initialized: record.is_some(),
        balance: record.as_ref().map(|r| r.balance).unwrap_or(Score::ZERO),
        mint_count: record.as_ref().map(|r| r.mint_count).unwrap_or(0),
        burn_count: record.as_ref().map(|r| r.burn_count).unwrap_or(0),
        tier,
        tier_label: tier.label().to_string(),
        can_borrow: tier.can_borrow(),
        max_loan,
        base_apr_bps,
    }))
}

/// POST /reputation/initialize
pub async fn initialize(
    State(state): State<LendingApiState>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> ApiResult<BalanceResponse> {
    let Json(req) = payload?;
    state
        .engine
        .initialize_reputation(req.caller, req.principal, req.initial_score)
        .await?;

    Ok(Json(BalanceResponse {
        principal: req.principal,
        balance: state.engine.reputation_of(req.principal).await,
    }))
}

/// POST /reputation/mint - Controller only
pub async fn mint(
    State(state): State<LendingApiState>,
    payload: Result<Json<AdjustRequest>, JsonRejection>,
) -> ApiResult<BalanceResponse> {
    let Json(req) = payload?;
    let balance = state
        .engine
        .mint_reputation(req.caller, req.principal, req.amount)
        .await?;

    Ok(Json(BalanceResponse {
        principal: req.principal,
        balance,
    }))
}

/// POST /reputation/burn - Controller only
pub async fn burn(
    State(state): State<LendingApiState>,
    payload: Result<Json<AdjustRequest>, JsonRejection>,
) -> ApiResult<BalanceResponse> {
    let Json(req) = payload?;
    let balance = state
        .engine
        .burn_reputation(req.caller, req.principal, req.amount)
        .await?;

    Ok(Json(BalanceResponse {
        principal: req.principal,
        balance,
    }))
}

/// GET /reputation/controller
pub async fn get_controller(State(state): State<LendingApiState>) -> Json<ControllerResponse> {
    Json(ControllerResponse {
        controller: state.engine.controller().await,
    })
}

/// PUT /reputation/controller - Rotate the controller (governance only)
pub async fn set_controller(
    State(state): State<LendingApiState>,
    payload: Result<Json<SetControllerRequest>, JsonRejection>,
) -> ApiResult<ControllerResponse> {
    let Json(req) = payload?;
    state.engine.set_controller(req.caller, req.controller).await?;
    info!(controller = %req.controller, "Controller rotated via API");

    Ok(Json(ControllerResponse {
        controller: Some(req.controller),
    }))
}

pub fn create_router(state: LendingApiState) -> Router {
    Router::new()
        .route("/controller", get(get_controller).put(set_controller))
        .route("/initialize", post(initialize))
        .route("/mint", post(mint))
        .route("/burn", post(burn))
        .route("/{principal}", get(get_reputation))
        .with_state(state)
}
