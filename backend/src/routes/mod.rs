//! Route definitions for the Indago pipeline
//!
//! Each component's routes are mounted only when this process hosts it.

use axum::{
    routing::{get, post},
    Router,
};
use shared::Component;

use crate::{config::ServiceConfig, handlers, AppState};

/// Create API routes for the hosted roles
pub fn api_routes(service: &ServiceConfig) -> Router<AppState> {
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/audit", get(handlers::list_audit));

    for component in service.hosted() {
        router = router.merge(match component {
            Component::Orders => order_routes(),
            Component::Kitchen => kitchen_routes(),
            Component::Inventory => inventory_routes(),
            Component::Finance => finance_routes(),
            Component::Sales => sales_routes(),
        });
    }
    router
}

/// Order aggregator routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/add-order", post(handlers::record_order))
        .route("/orders", get(handlers::list_orders))
        .route("/aggregate", post(handlers::aggregate_week))
        .route("/aggregate/all", post(handlers::aggregate_all))
        .route("/weekly-order", get(handlers::get_weekly_aggregate))
}

/// Production planner routes
fn kitchen_routes() -> Router<AppState> {
    Router::new()
        .route("/start-production", post(handlers::start_production))
        .route("/batch", get(handlers::get_batch))
        .route("/recipes", get(handlers::list_recipes))
}

/// Inventory ledger routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/stock", get(handlers::get_stock))
        .route("/consume", post(handlers::consume))
        .route("/purchase-request", post(handlers::request_purchase))
        // Finance callbacks
        .route("/purchase-request/apply", post(handlers::apply_approved_purchase))
        .route("/purchase-request/release", post(handlers::release_rejected_purchase))
        .route("/procurement-log", get(handlers::get_procurement_log))
        .route("/procurement/reconcile", post(handlers::reconcile_forwarding))
}

/// Procurement approver routes
fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/PurchaseRequest", post(handlers::decide_request))
        .nest(
            "/finance",
            Router::new()
                .route("/submit", post(handlers::submit_request))
                .route("/evaluate", get(handlers::evaluate_request))
                .route("/reconcile", post(handlers::reconcile_decisions))
                .route("/history", get(handlers::list_history))
                .route("/request-log", get(handlers::get_request_log)),
        )
}

/// Sales scorer routes
fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/sales/score-weekly", post(handlers::score_weekly))
        .route("/sales/logs", get(handlers::get_sales_logs))
}
