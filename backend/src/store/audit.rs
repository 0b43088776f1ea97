//! Append-only audit storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AuditEntry, AuditFilter, AuditOutcome, Component};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()>;

    /// Matching entries in append order
    async fn list(&self, filter: &AuditFilter) -> AppResult<Vec<AuditEntry>>;
}

#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub struct PgAuditStore {
    db: PgPool,
}

impl PgAuditStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    occurred_at: DateTime<Utc>,
    component: String,
    entity_type: String,
    entity_id: String,
    action: String,
    outcome: String,
    before_state: Option<serde_json::Value>,
    after_state: Option<serde_json::Value>,
    detail: Option<String>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let component = Component::parse(&row.component)
            .ok_or_else(|| AppError::Internal(format!("Unknown component '{}'", row.component)))?;
        let outcome = AuditOutcome::parse(&row.outcome)
            .ok_or_else(|| AppError::Internal(format!("Unknown outcome '{}'", row.outcome)))?;
        Ok(AuditEntry {
            id: row.id,
            timestamp: row.occurred_at,
            component,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            outcome,
            before: row.before_state,
            after: row.after_state,
            detail: row.detail,
        })
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, occurred_at, component, entity_type, entity_id, action, outcome,
                before_state, after_state, detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(entry.component.as_str())
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(entry.outcome.as_str())
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(&entry.detail)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter) -> AppResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, occurred_at, component, entity_type, entity_id, action, outcome,
                   before_state, after_state, detail
            FROM audit_log
            WHERE ($1::text IS NULL OR component = $1)
              AND ($2::text IS NULL OR entity_type = $2)
              AND ($3::text IS NULL OR entity_id = $3)
            ORDER BY seq
            "#,
        )
        .bind(filter.component.map(|c| c.as_str()))
        .bind(filter.entity_type.as_deref())
        .bind(filter.entity_id.as_deref())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}
