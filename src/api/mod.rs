//! HTTP API for the lending engine
//!
//! Provides REST APIs for:
//! - Asset ledger (mint, balances, transfer history)
//! - Liquidity pool (deposit, withdraw, share and interest views)
//! - Loan lifecycle (create, fund, disburse, repay, default)
//! - Reputation ledger (initialize, mint, burn, controller, tiers)
//! - Event replay
//! - Security middleware (auth, rate limiting, headers)
//!
//! Amounts travel as decimal strings and principals as `0x` hex. Every
//! rejected operation answers `{ "error": <kind>, "message": <text> }`.

pub mod assets;
pub mod events;
pub mod loans;
pub mod middleware;
pub mod pool;
pub mod reputation;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::engine::LendingEngine;
use crate::error::LendingError;
use crate::types::{LoanId, Principal, parse_principal};

pub use middleware::{
    RateLimiter, SecurityMiddlewareConfig, SecurityState, auth_middleware, body_size_middleware,
    logging_middleware, rate_limit_middleware, security_headers_middleware,
};

/// Shared state for every API router
#[derive(Clone)]
pub struct LendingApiState {
    pub engine: Arc<LendingEngine>,
}

impl LendingApiState {
    pub fn new(engine: Arc<LendingEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Lending(LendingError),
    BadRequest(String),
}

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError::Lending(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// HTTP status for a domain error
pub fn status_for(err: &LendingError) -> StatusCode {
    match err {
        LendingError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        LendingError::InvalidState { .. } | LendingError::AlreadyInitialized(_) => {
            StatusCode::CONFLICT
        }
        LendingError::InvalidAmount(_) | LendingError::InvalidPrincipal => StatusCode::BAD_REQUEST,
        LendingError::NotInitialized(_) | LendingError::LoanNotFound(_) => StatusCode::NOT_FOUND,
        LendingError::InsufficientPool { .. }
        | LendingError::InsufficientPrincipal { .. }
        | LendingError::InsufficientRepayment { .. }
        | LendingError::InsufficientBalance { .. }
        | LendingError::Overflow
        | LendingError::Underflow => StatusCode::UNPROCESSABLE_ENTITY,
        LendingError::EscrowMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Lending(err) => (
                status_for(&err),
                ErrorBody {
                    error: err.kind().to_string(),
                    message: err.to_string(),
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "InvalidRequest".to_string(),
                    message,
                },
            ),
        };

        warn!(status = status.as_u16(), error = %body.error, message = %body.message, "Operation rejected");
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub(crate) fn principal_param(raw: &str) -> Result<Principal, ApiError> {
    parse_principal(raw).map_err(ApiError::BadRequest)
}

pub(crate) fn loan_id_param(raw: &str) -> Result<LoanId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid loan id: {:?}", raw)))
}

/// All routers nested under their prefixes, plus `/health`, behind the
/// security middleware stack
pub fn create_app(state: LendingApiState, security: SecurityState) -> Router {
    Router::new()
        .nest("/assets", assets::create_router(state.clone()))
        .nest("/pool", pool::create_router(state.clone()))
        .nest("/loans", loans::create_router(state.clone()))
        .nest("/reputation", reputation::create_router(state.clone()))
        .nest("/events", events::create_router(state))
        .route("/health", get(|| async { "OK" }))
        // Applied bottom-up: headers, logging, rate limit, auth, body size
        .layer(axum::middleware::from_fn_with_state(
            security.clone(),
            body_size_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            security.clone(),
            auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            security.clone(),
            rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            security,
            logging_middleware,
        ))
        .layer(axum::middleware::from_fn(security_headers_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loans::LoanState;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&LendingError::InvalidState {
                loan_id: 1,
                expected: LoanState::Created,
                actual: LoanState::Funded,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&LendingError::LoanNotFound(3)), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&LendingError::InvalidPrincipal), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_params() {
        assert_eq!(loan_id_param("12").unwrap(), 12);
        assert!(loan_id_param("-1").is_err());
        assert!(principal_param("0x01").is_err());
    }
}
