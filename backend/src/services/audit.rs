//! Audit trail service shared by every component

use std::sync::Arc;

use shared::{AuditEntry, AuditFilter};

use crate::error::{AppError, AppResult};
use crate::store::AuditStore;

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an entry. A storage failure fails the calling operation.
    pub async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        tracing::debug!(
            component = %entry.component,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            action = %entry.action,
            outcome = entry.outcome.as_str(),
            "audit"
        );
        self.store.append(&entry).await.map_err(|e| {
            tracing::error!("Audit append failed: {}", e);
            AppError::AuditUnavailable(e.to_string())
        })
    }

    /// Record a rejected or failed call and hand back the error to return.
    /// If the audit write itself fails, that failure wins.
    pub async fn fail(&self, entry: AuditEntry, err: AppError) -> AppError {
        let entry = entry.with_detail(err.to_string());
        match self.append(entry).await {
            Ok(()) => err,
            Err(audit_err) => audit_err,
        }
    }

    pub async fn list(&self, filter: &AuditFilter) -> AppResult<Vec<AuditEntry>> {
        self.store.list(filter).await
    }
}
