//! Event Replay Endpoint

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, ApiResult, LendingApiState, principal_param};
use crate::events::EventRecord;
use crate::types::LoanId;

const MAX_PAGE: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Only records with a greater sequence number
    #[serde(default)]
    pub after: u64,
    pub principal: Option<String>,
    pub loan_id: Option<LoanId>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub latest_seq: u64,
    pub events: Vec<EventRecord>,
}

/// GET /events?after=&principal=&loan_id=&limit=
pub async fn get_events(
    State(state): State<LendingApiState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<EventsResponse> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let principal = query.principal.as_deref().map(principal_param).transpose()?;
    let limit = query.limit.unwrap_or(MAX_PAGE).min(MAX_PAGE);

    let events: Vec<EventRecord> = state
        .engine
        .events_since(query.after)
        .await
        .into_iter()
        .filter(|r| principal.is_none_or(|p| r.event.involves(&p)))
        .filter(|r| query.loan_id.is_none_or(|id| r.event.loan_id() == Some(id)))
        .take(limit)
        .collect();

    debug!(after = query.after, returned = events.len(), "Event replay");

    Ok(Json(EventsResponse {
        latest_seq: state.engine.latest_event_seq().await,
        events,
    }))
}

pub fn create_router(state: LendingApiState) -> Router {
    Router::new()
        .route("/", get(get_events))
        .with_state(state)
}
