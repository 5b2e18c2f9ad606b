//! Liquidity Pool API Endpoints

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, ApiResult, LendingApiState, principal_param};
use crate::pool::{PoolAccount, PoolSnapshot};
use crate::types::{Amount, Principal, decimal, parse_amount};

/// Body of both deposit and withdraw
#[derive(Debug, Deserialize)]
pub struct PoolMovementRequest {
    pub principal: Principal,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolMovementResponse {
    pub principal: Principal,
    #[serde(with = "decimal")]
    pub amount: Amount,
    /// Pending interest paid out alongside the movement
    #[serde(with = "decimal")]
    pub interest_paid: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolAccountResponse {
    pub principal: Principal,
    pub account: Option<PoolAccount>,
    #[serde(with = "decimal")]
    pub shares: Amount,
    #[serde(with = "decimal")]
    pub pending_interest: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareValueResponse {
    #[serde(with = "decimal")]
    pub shares: Amount,
    #[serde(with = "decimal")]
    pub value: Amount,
    #[serde(with = "decimal")]
    pub total_shares: Amount,
}

/// GET /pool - Global pool state
pub async fn get_snapshot(State(state): State<LendingApiState>) -> Json<PoolSnapshot> {
    Json(state.engine.pool_snapshot().await)
}

/// POST /pool/deposit
pub async fn deposit(
    State(state): State<LendingApiState>,
    payload: Result<Json<PoolMovementRequest>, JsonRejection>,
) -> ApiResult<PoolMovementResponse> {
    let Json(req) = payload?;
    let interest_paid = state.engine.deposit(req.principal, req.amount).await?;
    info!(principal = %req.principal, amount = %req.amount, "Deposit accepted via API");

    Ok(Json(PoolMovementResponse {
        principal: req.principal,
        amount: req.amount,
        interest_paid,
    }))
}

/// POST /pool/withdraw
pub async fn withdraw(
    State(state): State<LendingApiState>,
    payload: Result<Json<PoolMovementRequest>, JsonRejection>,
) -> ApiResult<PoolMovementResponse> {
    let Json(req) = payload?;
    let interest_paid = state.engine.withdraw(req.principal, req.amount).await?;
    info!(principal = %req.principal, amount = %req.amount, "Withdrawal accepted via API");

    Ok(Json(PoolMovementResponse {
        principal: req.principal,
        amount: req.amount,
        interest_paid,
    }))
}

/// GET /pool/accounts/{principal} - Lender position and pending interest
pub async fn get_account(
    State(state): State<LendingApiState>,
    Path(principal): Path<String>,
) -> ApiResult<PoolAccountResponse> {
    let principal = principal_param(&principal)?;

    Ok(Json(PoolAccountResponse {
        principal,
        account: state.engine.pool_account(principal).await,
        shares: state.engine.shares_of(principal).await,
        pending_interest: state.engine.pending_interest(principal).await?,
    }))
}

/// GET /pool/share-value/{shares} - Asset value of a share count
pub async fn get_share_value(
    State(state): State<LendingApiState>,
    Path(shares): Path<String>,
) -> ApiResult<ShareValueResponse> {
    let shares = parse_amount(&shares).map_err(ApiError::BadRequest)?;

    Ok(Json(ShareValueResponse {
        shares,
        value: state.engine.share_value(shares).await,
        total_shares: state.engine.total_shares().await,
    }))
}

pub fn create_router(state: LendingApiState) -> Router {
    Router::new()
        .route("/", get(get_snapshot))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/accounts/{principal}", get(get_account))
        .route("/share-value/{shares}", get(get_share_value))
        .with_state(state)
}
