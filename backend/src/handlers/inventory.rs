//! HTTP handlers for the inventory ledger

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{ProcurementLogEntry, PurchaseRequest, StockItem};

use super::DateQuery;
use crate::error::AppResult;
use crate::services::{ConsumeOutcome, PurchaseRequestInput};
use crate::AppState;

/// Current stock levels
pub async fn get_stock(State(state): State<AppState>) -> AppResult<Json<Vec<StockItem>>> {
    let stock = state.inventory()?.get_stock().await?;
    Ok(Json(stock))
}

/// Consume the kitchen's batch for a day
pub async fn consume(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<ConsumeOutcome>> {
    let outcome = state.inventory()?.consume_for_date(query.date).await?;
    Ok(Json(outcome))
}

/// Raise a manual purchase request
pub async fn request_purchase(
    State(state): State<AppState>,
    Json(input): Json<PurchaseRequestInput>,
) -> AppResult<Json<PurchaseRequest>> {
    let request = state.inventory()?.request_purchase(input).await?;
    Ok(Json(request))
}

/// Finance callback: stock arrives for an approved request
pub async fn apply_approved_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> AppResult<Json<StockItem>> {
    let item = state.inventory()?.apply_approved_purchase(&request).await?;
    Ok(Json(item))
}

/// Finance callback: a request was rejected
pub async fn release_rejected_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> AppResult<Json<ProcurementLogEntry>> {
    let entry = state
        .inventory()?
        .release_rejected_purchase(&request)
        .await?;
    Ok(Json(entry))
}

pub async fn get_procurement_log(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ProcurementLogEntry>>> {
    let log = state.inventory()?.procurement_log().await?;
    Ok(Json(log))
}

/// Re-forward requests finance never received
pub async fn reconcile_forwarding(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PurchaseRequest>>> {
    let delivered = state.inventory()?.reconcile_forwarding().await?;
    Ok(Json(delivered))
}
