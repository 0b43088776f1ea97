//! HTTP handlers for the sales scorer

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::SalesScore;

use super::WeekQuery;
use crate::error::AppResult;
use crate::services::SalesService;
use crate::AppState;

#[derive(Deserialize)]
pub struct LogsQuery {
    pub format: Option<String>, // "json" or "csv"
}

/// Score one week
pub async fn score_weekly(
    State(state): State<AppState>,
    Json(input): Json<WeekQuery>,
) -> AppResult<Json<SalesScore>> {
    let score = state.sales()?.score_week(input.week_start).await?;
    Ok(Json(score))
}

/// All weekly scores
pub async fn get_sales_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<impl IntoResponse> {
    let data = state.sales()?.get_logs().await?;

    if query.format.as_deref() == Some("csv") {
        let csv = SalesService::export_to_csv(&data)?;
        Ok((
            [(header::CONTENT_TYPE, "text/csv"), (header::CONTENT_DISPOSITION, "attachment; filename=\"sales_logs.csv\"")],
            csv,
        ).into_response())
    } else {
        Ok(Json(data).into_response())
    }
}
