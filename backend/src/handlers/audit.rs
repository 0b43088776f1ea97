//! HTTP handler for the audit trail

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{AuditEntry, AuditFilter, Component};

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub component: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

impl AuditQuery {
    fn into_filter(self) -> AppResult<AuditFilter> {
        let component = self
            .component
            .as_deref()
            .map(|c| {
                Component::parse(c).ok_or_else(|| {
                    AppError::validation("component", format!("unknown component '{}'", c))
                })
            })
            .transpose()?;
        Ok(AuditFilter {
            component,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
        })
    }
}

/// Audit entries, oldest first
pub async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let filter = query.into_filter()?;
    let entries = state.audit.list(&filter).await?;
    Ok(Json(entries))
}
