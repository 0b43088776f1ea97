//! Purchase requests held by the procurement approver

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{PurchaseOrigin, PurchaseRequest, PurchaseStatus};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait FinanceStore: Send + Sync {
    async fn get_request(&self, id: Uuid) -> AppResult<Option<PurchaseRequest>>;

    /// Returns false when a request with the same id already exists
    async fn insert_request(&self, request: &PurchaseRequest) -> AppResult<bool>;

    async fn update_request(&self, request: &PurchaseRequest) -> AppResult<()>;

    /// Requests in creation order, optionally of one status
    async fn list_requests(&self, status: Option<PurchaseStatus>)
        -> AppResult<Vec<PurchaseRequest>>;
}

#[derive(Default)]
pub struct MemoryFinanceStore {
    requests: RwLock<Vec<PurchaseRequest>>,
}

#[async_trait]
impl FinanceStore for MemoryFinanceStore {
    async fn get_request(&self, id: Uuid) -> AppResult<Option<PurchaseRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn insert_request(&self, request: &PurchaseRequest) -> AppResult<bool> {
        let mut requests = self.requests.write().await;
        if requests.iter().any(|r| r.id == request.id) {
            return Ok(false);
        }
        requests.push(request.clone());
        Ok(true)
    }

    async fn update_request(&self, request: &PurchaseRequest) -> AppResult<()> {
        let mut requests = self.requests.write().await;
        let slot = requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| AppError::NotFound(format!("Purchase request {}", request.id)))?;
        *slot = request.clone();
        Ok(())
    }

    async fn list_requests(
        &self,
        status: Option<PurchaseStatus>,
    ) -> AppResult<Vec<PurchaseRequest>> {
        let mut requests: Vec<PurchaseRequest> = self
            .requests
            .read()
            .await
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }
}

#[derive(Clone)]
pub struct PgFinanceStore {
    db: PgPool,
}

impl PgFinanceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct RequestRow {
    id: Uuid,
    ingredient: String,
    requested_quantity: Decimal,
    approved_quantity: Option<Decimal>,
    unit: String,
    origin: String,
    status: String,
    unit_cost: Decimal,
    estimated_cost: Decimal,
    current_stock: Decimal,
    triggering_week: NaiveDate,
    decision_note: Option<String>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    stock_synced: bool,
}

impl TryFrom<RequestRow> for PurchaseRequest {
    type Error = AppError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let origin = PurchaseOrigin::parse(&row.origin)
            .ok_or_else(|| AppError::Internal(format!("Unknown origin '{}'", row.origin)))?;
        let status = PurchaseStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown status '{}'", row.status)))?;
        Ok(PurchaseRequest {
            id: row.id,
            ingredient: row.ingredient,
            requested_quantity: row.requested_quantity,
            approved_quantity: row.approved_quantity,
            unit: row.unit,
            origin,
            status,
            unit_cost: row.unit_cost,
            estimated_cost: row.estimated_cost,
            current_stock: row.current_stock,
            triggering_week: row.triggering_week,
            decision_note: row.decision_note,
            created_at: row.created_at,
            decided_at: row.decided_at,
            stock_synced: row.stock_synced,
        })
    }
}

const REQUEST_COLUMNS: &str = r#"
    id, ingredient, requested_quantity, approved_quantity, unit, origin, status,
    unit_cost, estimated_cost, current_stock, triggering_week, decision_note,
    created_at, decided_at, stock_synced
"#;

#[async_trait]
impl FinanceStore for PgFinanceStore {
    async fn get_request(&self, id: Uuid) -> AppResult<Option<PurchaseRequest>> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM purchase_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(PurchaseRequest::try_from).transpose()
    }

    async fn insert_request(&self, request: &PurchaseRequest) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO purchase_requests (
                id, ingredient, requested_quantity, approved_quantity, unit, origin, status,
                unit_cost, estimated_cost, current_stock, triggering_week, decision_note,
                created_at, decided_at, stock_synced
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(request.id)
        .bind(&request.ingredient)
        .bind(request.requested_quantity)
        .bind(request.approved_quantity)
        .bind(&request.unit)
        .bind(request.origin.as_str())
        .bind(request.status.as_str())
        .bind(request.unit_cost)
        .bind(request.estimated_cost)
        .bind(request.current_stock)
        .bind(request.triggering_week)
        .bind(&request.decision_note)
        .bind(request.created_at)
        .bind(request.decided_at)
        .bind(request.stock_synced)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_request(&self, request: &PurchaseRequest) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_requests
            SET approved_quantity = $2, status = $3, decision_note = $4,
                decided_at = $5, stock_synced = $6
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(request.approved_quantity)
        .bind(request.status.as_str())
        .bind(&request.decision_note)
        .bind(request.decided_at)
        .bind(request.stock_synced)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Purchase request {}", request.id)));
        }
        Ok(())
    }

    async fn list_requests(
        &self,
        status: Option<PurchaseStatus>,
    ) -> AppResult<Vec<PurchaseRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM purchase_requests WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at, id",
            REQUEST_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PurchaseRequest::try_from).collect()
    }
}
