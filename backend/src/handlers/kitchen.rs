//! HTTP handlers for the production planner

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{ProductionBatch, RecipeBook};

use super::DateQuery;
use crate::error::AppResult;
use crate::services::ProductionSummary;
use crate::AppState;

/// Plan (or re-plan) the batch for a day
pub async fn start_production(
    State(state): State<AppState>,
    Json(input): Json<DateQuery>,
) -> AppResult<Json<ProductionSummary>> {
    let summary = state.kitchen()?.start_production(input.date).await?;
    Ok(Json(summary))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<ProductionBatch>> {
    let batch = state.kitchen()?.get_batch(query.date).await?;
    Ok(Json(batch))
}

pub async fn list_recipes(State(state): State<AppState>) -> AppResult<Json<RecipeBook>> {
    Ok(Json(state.kitchen()?.recipes().clone()))
}
