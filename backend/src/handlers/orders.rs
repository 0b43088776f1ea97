//! HTTP handlers for the order aggregator

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{NewOrder, Order, WeeklyAggregate};

use super::WeekQuery;
use crate::error::AppResult;
use crate::services::OrderFilter;
use crate::AppState;

/// Record a customer order
pub async fn record_order(
    State(state): State<AppState>,
    Json(input): Json<NewOrder>,
) -> AppResult<Json<Order>> {
    let order = state.orders()?.record_order(input).await?;
    Ok(Json(order))
}

/// List orders, optionally within `[from, to)`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.orders()?.list_orders(filter).await?;
    Ok(Json(orders))
}

/// Recompute one week's aggregate
pub async fn aggregate_week(
    State(state): State<AppState>,
    Json(input): Json<WeekQuery>,
) -> AppResult<Json<WeeklyAggregate>> {
    let aggregate = state.orders()?.aggregate_week(input.week_start).await?;
    Ok(Json(aggregate))
}

/// Recompute every week that has orders
pub async fn aggregate_all(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<WeeklyAggregate>>> {
    let aggregates = state.orders()?.aggregate_all().await?;
    Ok(Json(aggregates))
}

pub async fn get_weekly_aggregate(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> AppResult<Json<WeeklyAggregate>> {
    let aggregate = state
        .orders()?
        .get_weekly_aggregate(query.week_start)
        .await?;
    Ok(Json(aggregate))
}
