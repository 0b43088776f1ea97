//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub roles: Vec<String>,
    pub storage: String,
    /// Only reported for Postgres storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Check database connectivity
    let database = match &state.db {
        Some(db) => Some(match sqlx::query("SELECT 1").execute(db).await {
            Ok(_) => "connected".to_string(),
            Err(_) => "disconnected".to_string(),
        }),
        None => None,
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        roles: state
            .config
            .service
            .hosted()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
        storage: state.config.storage.backend.as_str().to_string(),
        database,
    })
}
