//! Loan Lifecycle API Endpoints
//!
//! Every transition takes the acting principal in the body; the registry
//! decides whether it is allowed.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, LendingApiState, loan_id_param, principal_param};
use crate::loans::{Loan, LoanState};
use crate::types::{Amount, LoanId, Principal, decimal};

#[derive(Debug, Deserialize)]
pub struct CreateLoanRequest {
    pub caller: Principal,
    pub borrower: Principal,
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub apr_bps: u32,
    pub term_days: u32,
}

/// Body of fund, disburse and default
#[derive(Debug, Deserialize)]
pub struct LoanActionRequest {
    pub caller: Principal,
}

#[derive(Debug, Deserialize)]
pub struct RepayRequest {
    pub payer: Principal,
    pub on_time: bool,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateLoanResponse {
    pub loan_id: LoanId,
    #[serde(with = "decimal")]
    pub amount_due: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoanStateResponse {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub state_code: u8,
}

impl LoanStateResponse {
    fn new(loan_id: LoanId, state: LoanState) -> Self {
        Self {
            loan_id,
            state,
            state_code: state.code(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepayResponse {
    pub loan_id: LoanId,
    pub state: LoanState,
    /// Principal plus interest moved into the pool
    #[serde(with = "decimal")]
    pub settled: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountDueResponse {
    pub loan_id: LoanId,
    #[serde(with = "decimal")]
    pub amount_due: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextIdResponse {
    pub next_loan_id: LoanId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowerLoansResponse {
    pub borrower: Principal,
    pub total: usize,
    pub active: usize,
    /// Disbursed loans past their due date
    pub overdue: usize,
    pub loans: Vec<Loan>,
}

/// POST /loans - Register a new loan (admin only)
pub async fn create_loan(
    State(state): State<LendingApiState>,
    payload: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> ApiResult<CreateLoanResponse> {
    let Json(req) = payload?;
    let loan_id = state
        .engine
        .create_loan(req.caller, req.borrower, req.amount, req.apr_bps, req.term_days)
        .await?;
    let amount_due = state.engine.amount_due(loan_id).await?;
    info!(loan_id, borrower = %req.borrower, "Loan created via API");

    Ok(Json(CreateLoanResponse {
        loan_id,
        amount_due,
    }))
}

/// GET /loans/next-id
pub async fn get_next_id(State(state): State<LendingApiState>) -> Json<NextIdResponse> {
    Json(NextIdResponse {
        next_loan_id: state.engine.next_loan_id().await,
    })
}

/// GET /loans/{id}
pub async fn get_loan(
    State(state): State<LendingApiState>,
    Path(loan_id): Path<String>,
) -> ApiResult<Loan> {
    let loan_id = loan_id_param(&loan_id)?;
    Ok(Json(state.engine.get_loan(loan_id).await?))
}

/// GET /loans/{id}/due - Principal plus simple interest
pub async fn get_amount_due(
    State(state): State<LendingApiState>,
    Path(loan_id): Path<String>,
) -> ApiResult<AmountDueResponse> {
    let loan_id = loan_id_param(&loan_id)?;

    Ok(Json(AmountDueResponse {
        loan_id,
        amount_due: state.engine.amount_due(loan_id).await?,
    }))
}

/// POST /loans/{id}/fund - Move principal from the pool into escrow
pub async fn fund_loan(
    State(state): State<LendingApiState>,
    Path(loan_id): Path<String>,
    payload: Result<Json<LoanActionRequest>, JsonRejection>,
) -> ApiResult<LoanStateResponse> {
    let loan_id = loan_id_param(&loan_id)?;
    let Json(req) = payload?;
    state.engine.mark_funded(req.caller, loan_id).await?;

    Ok(Json(LoanStateResponse::new(loan_id, LoanState::Funded)))
}

/// POST /loans/{id}/disburse - Release escrow to the borrower
pub async fn disburse_loan(
    State(state): State<LendingApiState>,
    Path(loan_id): Path<String>,
    payload: Result<Json<LoanActionRequest>, JsonRejection>,
) -> ApiResult<LoanStateResponse> {
    let loan_id = loan_id_param(&loan_id)?;
    let Json(req) = payload?;
    state.engine.mark_disbursed(req.caller, loan_id).await?;

    Ok(Json(LoanStateResponse::new(loan_id, LoanState::Disbursed)))
}

/// POST /loans/{id}/repay - Settle a disbursed loan from the payer's balance
pub async fn repay_loan(
    State(state): State<LendingApiState>,
    Path(loan_id): Path<String>,
    payload: Result<Json<RepayRequest>, JsonRejection>,
) -> ApiResult<RepayResponse> {
    let loan_id = loan_id_param(&loan_id)?;
    let Json(req) = payload?;
    let settled = state
        .engine
        .mark_repaid(req.payer, loan_id, req.on_time, req.amount)
        .await?;

    Ok(Json(RepayResponse {
        loan_id,
        state: LoanState::Repaid,
        settled,
    }))
}

/// POST /loans/{id}/default - Write the loan off against the borrower's reputation
pub async fn default_loan(
    State(state): State<LendingApiState>,
    Path(loan_id): Path<String>,
    payload: Result<Json<LoanActionRequest>, JsonRejection>,
) -> ApiResult<LoanStateResponse> {
    let loan_id = loan_id_param(&loan_id)?;
    let Json(req) = payload?;
    state.engine.mark_defaulted(req.caller, loan_id).await?;

    Ok(Json(LoanStateResponse::new(loan_id, LoanState::Defaulted)))
}

/// GET /loans/borrower/{principal}
pub async fn get_borrower_loans(
    State(state): State<LendingApiState>,
    Path(borrower): Path<String>,
) -> ApiResult<BorrowerLoansResponse> {
    let borrower = principal_param(&borrower)?;
    let mut loans = state.engine.loans_of(borrower).await;
    loans.sort_by_key(|l| l.id);
    let active = loans.iter().filter(|l| !l.state.is_terminal()).count();
    let now = Utc::now();
    let overdue = loans.iter().filter(|l| l.is_overdue(now)).count();

    Ok(Json(BorrowerLoansResponse {
        borrower,
        total: loans.len(),
        active,
        overdue,
        loans,
    }))
}

pub fn create_router(state: LendingApiState) -> Router {
    Router::new()
        .route("/", post(create_loan))
        .route("/next-id", get(get_next_id))
        .route("/borrower/{principal}", get(get_borrower_loans))
        .route("/{id}", get(get_loan))
        .route("/{id}/due", get(get_amount_due))
        .route("/{id}/fund", post(fund_loan))
        .route("/{id}/disburse", post(disburse_loan))
        .route("/{id}/repay", post(repay_loan))
        .route("/{id}/default", post(default_loan))
        .with_state(state)
}
