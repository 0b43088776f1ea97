//! HTTP handlers for the procurement approver

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{AuditEntry, Decision, PurchaseRequest, PurchaseStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::DecisionInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateQuery {
    pub request_id: Uuid,
}

/// Accept a request forwarded by the inventory ledger
pub async fn submit_request(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> AppResult<Json<PurchaseRequest>> {
    let stored = state.finance()?.submit(request).await?;
    Ok(Json(stored))
}

/// Approve or reject a pending request
pub async fn decide_request(
    State(state): State<AppState>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<PurchaseRequest>> {
    let request = state
        .finance()?
        .decide(input.request_id, input.decision)
        .await?;
    Ok(Json(request))
}

/// What the budget policy would decide for a request
pub async fn evaluate_request(
    State(state): State<AppState>,
    Query(query): Query<EvaluateQuery>,
) -> AppResult<Json<Decision>> {
    let decision = state.finance()?.evaluate(query.request_id).await?;
    Ok(Json(decision))
}

/// Re-send inventory callbacks that did not go through
pub async fn reconcile_decisions(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PurchaseRequest>>> {
    let synced = state.finance()?.reconcile().await?;
    Ok(Json(synced))
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<PurchaseRequest>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            PurchaseStatus::parse(s)
                .ok_or_else(|| AppError::validation("status", format!("unknown status '{}'", s)))
        })
        .transpose()?;
    let history = state.finance()?.list_history(status).await?;
    Ok(Json(history))
}

pub async fn get_request_log(State(state): State<AppState>) -> AppResult<Json<Vec<AuditEntry>>> {
    let log = state.finance()?.list_request_log().await?;
    Ok(Json(log))
}
