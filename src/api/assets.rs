//! Asset Ledger API Endpoints

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, LendingApiState, principal_param};
use crate::ledger::{AccountKind, TransferRecord};
use crate::types::{Amount, Principal, decimal};

#[derive(Debug, Deserialize)]
pub struct MintRequest {
    pub caller: Principal,
    pub to: Principal,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub principal: Principal,
    pub kind: AccountKind,
    /// Ledger account code: 1 external, 2 pool, 3 escrow
    pub kind_code: u16,
    #[serde(with = "decimal")]
    pub balance: Amount,
}

impl BalanceResponse {
    fn new(principal: Principal, kind: AccountKind, balance: Amount) -> Self {
        Self {
            principal,
            kind,
            kind_code: kind.code(),
            balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupplyResponse {
    #[serde(with = "decimal")]
    pub total_supply: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransfersResponse {
    pub principal: Principal,
    pub total: usize,
    pub transfers: Vec<TransferRecord>,
}

/// POST /assets/mint - Mint asset to a principal (admin only)
pub async fn mint(
    State(state): State<LendingApiState>,
    payload: Result<Json<MintRequest>, JsonRejection>,
) -> ApiResult<BalanceResponse> {
    let Json(req) = payload?;
    let balance = state.engine.mint_asset(req.caller, req.to, req.amount).await?;
    info!(to = %req.to, amount = %req.amount, "Asset minted via API");

    Ok(Json(BalanceResponse::new(req.to, AccountKind::External, balance)))
}

/// GET /assets/supply - Total minted supply
pub async fn get_supply(State(state): State<LendingApiState>) -> Json<SupplyResponse> {
    Json(SupplyResponse {
        total_supply: state.engine.total_supply().await,
    })
}

/// GET /assets/{principal} - Balance and account kind
pub async fn get_balance(
    State(state): State<LendingApiState>,
    Path(principal): Path<String>,
) -> ApiResult<BalanceResponse> {
    let principal = principal_param(&principal)?;

    let kind = state.engine.account_kind(principal).await;
    let balance = state.engine.balance_of(principal).await;

    Ok(Json(BalanceResponse::new(principal, kind, balance)))
}

/// GET /assets/{principal}/transfers - Every movement touching the principal
pub async fn get_transfers(
    State(state): State<LendingApiState>,
    Path(principal): Path<String>,
) -> ApiResult<TransfersResponse> {
    let principal = principal_param(&principal)?;
    let transfers = state.engine.transfers_of(principal).await;

    Ok(Json(TransfersResponse {
        principal,
        total: transfers.len(),
        transfers,
    }))
}

pub fn create_router(state: LendingApiState) -> Router {
    Router::new()
        .route("/mint", post(mint))
        .route("/supply", get(get_supply))
        .route("/{principal}", get(get_balance))
        .route("/{principal}/transfers", get(get_transfers))
        .with_state(state)
}
