//! Stock levels, the consumption log and the procurement log

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    checked_sum, BatchIngredient, ForwardStatus, ProcurementLogEntry, PurchaseRequest, StockItem,
};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A consumed batch, keyed by production date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionRecord {
    pub production_date: NaiveDate,
    pub week_start: NaiveDate,
    pub consumed: BTreeMap<String, BatchIngredient>,
    /// Levels of the consumed ingredients right after the decrement
    pub stock_after: Vec<StockItem>,
    /// Requests raised because of this consumption
    pub triggered_requests: Vec<Uuid>,
    pub consumed_at: DateTime<Utc>,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// All stock rows by ingredient
    async fn list_stock(&self) -> AppResult<Vec<StockItem>>;

    /// Insert rows for ingredients not yet present; returns how many were added
    async fn seed_stock(&self, items: &[StockItem]) -> AppResult<usize>;

    async fn get_stock_item(&self, ingredient: &str) -> AppResult<Option<StockItem>>;

    async fn find_consumption(&self, production_date: NaiveDate)
        -> AppResult<Option<ConsumptionRecord>>;

    /// Apply the record's decrements, store the record and the requests it
    /// triggered, all or nothing. Fails with `InsufficientStock` if any level
    /// would go negative.
    async fn commit_consumption(
        &self,
        record: &ConsumptionRecord,
        triggered: &[ProcurementLogEntry],
    ) -> AppResult<Vec<StockItem>>;

    async fn get_procurement(&self, id: Uuid) -> AppResult<Option<ProcurementLogEntry>>;

    /// The pending entry for the ingredient, if any
    async fn open_procurement_for(&self, ingredient: &str)
        -> AppResult<Option<ProcurementLogEntry>>;

    /// Fails with `Conflict` when the ingredient already has a pending entry
    async fn insert_procurement(&self, entry: &ProcurementLogEntry) -> AppResult<()>;

    async fn update_procurement(&self, entry: &ProcurementLogEntry) -> AppResult<()>;

    /// Store the settled entry and add `increment` to its ingredient's stock
    /// in one step
    async fn commit_settlement(
        &self,
        entry: &ProcurementLogEntry,
        increment: Option<Decimal>,
    ) -> AppResult<Option<StockItem>>;

    /// Entries in creation order
    async fn list_procurement(&self) -> AppResult<Vec<ProcurementLogEntry>>;
}

fn open_request_conflict(ingredient: &str, open_id: Option<Uuid>) -> AppError {
    AppError::Conflict {
        resource: ingredient.to_string(),
        message: match open_id {
            Some(id) => format!("Purchase request {} for '{}' is still pending", id, ingredient),
            None => format!("A purchase request for '{}' is still pending", ingredient),
        },
    }
}

#[derive(Default)]
struct LedgerState {
    stock: BTreeMap<String, StockItem>,
    consumptions: BTreeMap<NaiveDate, ConsumptionRecord>,
    procurement: Vec<ProcurementLogEntry>,
}

impl LedgerState {
    fn open_for(&self, ingredient: &str) -> Option<&ProcurementLogEntry> {
        self.procurement
            .iter()
            .find(|e| e.request.ingredient == ingredient && e.is_open())
    }
}

#[derive(Default)]
pub struct MemoryInventoryStore {
    state: RwLock<LedgerState>,
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn list_stock(&self) -> AppResult<Vec<StockItem>> {
        Ok(self.state.read().await.stock.values().cloned().collect())
    }

    async fn seed_stock(&self, items: &[StockItem]) -> AppResult<usize> {
        let mut state = self.state.write().await;
        let mut added = 0;
        for item in items {
            if !state.stock.contains_key(&item.ingredient) {
                state.stock.insert(item.ingredient.clone(), item.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn get_stock_item(&self, ingredient: &str) -> AppResult<Option<StockItem>> {
        Ok(self.state.read().await.stock.get(ingredient).cloned())
    }

    async fn find_consumption(
        &self,
        production_date: NaiveDate,
    ) -> AppResult<Option<ConsumptionRecord>> {
        Ok(self
            .state
            .read()
            .await
            .consumptions
            .get(&production_date)
            .cloned())
    }

    async fn commit_consumption(
        &self,
        record: &ConsumptionRecord,
        triggered: &[ProcurementLogEntry],
    ) -> AppResult<Vec<StockItem>> {
        let mut state = self.state.write().await;

        if state.consumptions.contains_key(&record.production_date) {
            return Err(AppError::Conflict {
                resource: record.production_date.to_string(),
                message: format!("Batch for {} was already consumed", record.production_date),
            });
        }

        // Check everything before touching anything
        for (ingredient, req) in &record.consumed {
            let available = state
                .stock
                .get(ingredient)
                .map(|s| s.quantity)
                .unwrap_or(Decimal::ZERO);
            if req.quantity > available {
                return Err(AppError::InsufficientStock {
                    ingredient: ingredient.clone(),
                    required: req.quantity,
                    available,
                });
            }
        }
        for entry in triggered {
            if let Some(open) = state.open_for(&entry.request.ingredient) {
                return Err(open_request_conflict(&entry.request.ingredient, Some(open.request.id)));
            }
        }

        let mut updated = Vec::with_capacity(record.consumed.len());
        for (ingredient, req) in &record.consumed {
            if let Some(item) = state.stock.get_mut(ingredient) {
                item.quantity -= req.quantity;
                item.updated_at = record.consumed_at;
                updated.push(item.clone());
            }
        }
        state
            .consumptions
            .insert(record.production_date, record.clone());
        state.procurement.extend(triggered.iter().cloned());

        Ok(updated)
    }

    async fn get_procurement(&self, id: Uuid) -> AppResult<Option<ProcurementLogEntry>> {
        Ok(self
            .state
            .read()
            .await
            .procurement
            .iter()
            .find(|e| e.request.id == id)
            .cloned())
    }

    async fn open_procurement_for(
        &self,
        ingredient: &str,
    ) -> AppResult<Option<ProcurementLogEntry>> {
        Ok(self.state.read().await.open_for(ingredient).cloned())
    }

    async fn insert_procurement(&self, entry: &ProcurementLogEntry) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(open) = state.open_for(&entry.request.ingredient) {
            return Err(open_request_conflict(&entry.request.ingredient, Some(open.request.id)));
        }
        state.procurement.push(entry.clone());
        Ok(())
    }

    async fn update_procurement(&self, entry: &ProcurementLogEntry) -> AppResult<()> {
        let mut state = self.state.write().await;
        let slot = state
            .procurement
            .iter_mut()
            .find(|e| e.request.id == entry.request.id)
            .ok_or_else(|| AppError::NotFound(format!("Procurement entry {}", entry.request.id)))?;
        *slot = entry.clone();
        Ok(())
    }

    async fn commit_settlement(
        &self,
        entry: &ProcurementLogEntry,
        increment: Option<Decimal>,
    ) -> AppResult<Option<StockItem>> {
        let mut state = self.state.write().await;

        if !state.procurement.iter().any(|e| e.request.id == entry.request.id) {
            return Err(AppError::NotFound(format!(
                "Procurement entry {}",
                entry.request.id
            )));
        }

        let updated = match increment {
            Some(qty) => {
                let item = state
                    .stock
                    .get_mut(&entry.request.ingredient)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Stock item '{}'", entry.request.ingredient))
                    })?;
                item.quantity = checked_sum("quantity", item.quantity, qty)?;
                item.updated_at = entry.updated_at;
                Some(item.clone())
            }
            None => None,
        };

        if let Some(slot) = state
            .procurement
            .iter_mut()
            .find(|e| e.request.id == entry.request.id)
        {
            *slot = entry.clone();
        }
        Ok(updated)
    }

    async fn list_procurement(&self) -> AppResult<Vec<ProcurementLogEntry>> {
        Ok(self.state.read().await.procurement.clone())
    }
}

#[derive(Clone)]
pub struct PgInventoryStore {
    db: PgPool,
}

impl PgInventoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct StockRow {
    ingredient: String,
    quantity: Decimal,
    reorder_threshold: Decimal,
    par_level: Decimal,
    unit: String,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockItem {
    fn from(row: StockRow) -> Self {
        StockItem {
            ingredient: row.ingredient,
            quantity: row.quantity,
            reorder_threshold: row.reorder_threshold,
            par_level: row.par_level,
            unit: row.unit,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ConsumptionRow {
    record: Json<ConsumptionRecord>,
}

#[derive(Debug, FromRow)]
struct ProcurementRow {
    request: Json<PurchaseRequest>,
    forward_status: String,
    last_error: Option<String>,
    settled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProcurementRow> for ProcurementLogEntry {
    type Error = AppError;

    fn try_from(row: ProcurementRow) -> Result<Self, Self::Error> {
        let forward_status = ForwardStatus::parse(&row.forward_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown forward status '{}'", row.forward_status))
        })?;
        Ok(ProcurementLogEntry {
            request: row.request.0,
            forward_status,
            last_error: row.last_error,
            settled_at: row.settled_at,
            updated_at: row.updated_at,
        })
    }
}

const PROCUREMENT_COLUMNS: &str = "request, forward_status, last_error, settled_at, updated_at";

/// Unique violation on the one-pending-request-per-ingredient index
fn is_open_request_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some("procurement_log_one_pending_per_ingredient")
    )
}

impl PgInventoryStore {
    async fn insert_procurement_tx(
        tx: &mut Transaction<'_, Postgres>,
        entry: &ProcurementLogEntry,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO procurement_log (
                id, ingredient, status, request, forward_status, last_error,
                settled_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.request.id)
        .bind(&entry.request.ingredient)
        .bind(entry.request.status.as_str())
        .bind(Json(&entry.request))
        .bind(entry.forward_status.as_str())
        .bind(&entry.last_error)
        .bind(entry.settled_at)
        .bind(entry.request.created_at)
        .bind(entry.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_open_request_violation(&e) {
                open_request_conflict(&entry.request.ingredient, None)
            } else {
                AppError::DatabaseError(e)
            }
        })?;
        Ok(())
    }

    async fn update_procurement_tx(
        tx: &mut Transaction<'_, Postgres>,
        entry: &ProcurementLogEntry,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE procurement_log
            SET status = $2, request = $3, forward_status = $4, last_error = $5,
                settled_at = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(entry.request.id)
        .bind(entry.request.status.as_str())
        .bind(Json(&entry.request))
        .bind(entry.forward_status.as_str())
        .bind(&entry.last_error)
        .bind(entry.settled_at)
        .bind(entry.updated_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Procurement entry {}",
                entry.request.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn list_stock(&self) -> AppResult<Vec<StockItem>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT ingredient, quantity, reorder_threshold, par_level, unit, updated_at
            FROM stock_items
            ORDER BY ingredient
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockItem::from).collect())
    }

    async fn seed_stock(&self, items: &[StockItem]) -> AppResult<usize> {
        let mut added = 0;
        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO stock_items (ingredient, quantity, reorder_threshold, par_level, unit, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (ingredient) DO NOTHING
                "#,
            )
            .bind(&item.ingredient)
            .bind(item.quantity)
            .bind(item.reorder_threshold)
            .bind(item.par_level)
            .bind(&item.unit)
            .bind(item.updated_at)
            .execute(&self.db)
            .await?;
            added += result.rows_affected() as usize;
        }
        Ok(added)
    }

    async fn get_stock_item(&self, ingredient: &str) -> AppResult<Option<StockItem>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT ingredient, quantity, reorder_threshold, par_level, unit, updated_at
            FROM stock_items
            WHERE ingredient = $1
            "#,
        )
        .bind(ingredient)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(StockItem::from))
    }

    async fn find_consumption(
        &self,
        production_date: NaiveDate,
    ) -> AppResult<Option<ConsumptionRecord>> {
        let row = sqlx::query_as::<_, ConsumptionRow>(
            "SELECT record FROM consumption_log WHERE production_date = $1",
        )
        .bind(production_date)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| r.record.0))
    }

    async fn commit_consumption(
        &self,
        record: &ConsumptionRecord,
        triggered: &[ProcurementLogEntry],
    ) -> AppResult<Vec<StockItem>> {
        let mut tx = self.db.begin().await?;
        let mut updated = Vec::with_capacity(record.consumed.len());

        // BTreeMap order keeps row locks in ingredient order
        for (ingredient, req) in &record.consumed {
            let available = sqlx::query_scalar::<_, Decimal>(
                "SELECT quantity FROM stock_items WHERE ingredient = $1 FOR UPDATE",
            )
            .bind(ingredient)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(Decimal::ZERO);

            if req.quantity > available {
                return Err(AppError::InsufficientStock {
                    ingredient: ingredient.clone(),
                    required: req.quantity,
                    available,
                });
            }

            let row = sqlx::query_as::<_, StockRow>(
                r#"
                UPDATE stock_items
                SET quantity = quantity - $2, updated_at = $3
                WHERE ingredient = $1
                RETURNING ingredient, quantity, reorder_threshold, par_level, unit, updated_at
                "#,
            )
            .bind(ingredient)
            .bind(req.quantity)
            .bind(record.consumed_at)
            .fetch_optional(&mut *tx)
            .await?;
            updated.extend(row.map(StockItem::from));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO consumption_log (production_date, record, consumed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (production_date) DO NOTHING
            "#,
        )
        .bind(record.production_date)
        .bind(Json(record))
        .bind(record.consumed_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict {
                resource: record.production_date.to_string(),
                message: format!("Batch for {} was already consumed", record.production_date),
            });
        }

        for entry in triggered {
            Self::insert_procurement_tx(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn get_procurement(&self, id: Uuid) -> AppResult<Option<ProcurementLogEntry>> {
        let row = sqlx::query_as::<_, ProcurementRow>(&format!(
            "SELECT {} FROM procurement_log WHERE id = $1",
            PROCUREMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(ProcurementLogEntry::try_from).transpose()
    }

    async fn open_procurement_for(
        &self,
        ingredient: &str,
    ) -> AppResult<Option<ProcurementLogEntry>> {
        let row = sqlx::query_as::<_, ProcurementRow>(&format!(
            "SELECT {} FROM procurement_log WHERE ingredient = $1 AND status = 'pending'",
            PROCUREMENT_COLUMNS
        ))
        .bind(ingredient)
        .fetch_optional(&self.db)
        .await?;

        row.map(ProcurementLogEntry::try_from).transpose()
    }

    async fn insert_procurement(&self, entry: &ProcurementLogEntry) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        Self::insert_procurement_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_procurement(&self, entry: &ProcurementLogEntry) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        Self::update_procurement_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_settlement(
        &self,
        entry: &ProcurementLogEntry,
        increment: Option<Decimal>,
    ) -> AppResult<Option<StockItem>> {
        let mut tx = self.db.begin().await?;

        let updated = match increment {
            Some(qty) => {
                let row = sqlx::query_as::<_, StockRow>(
                    r#"
                    UPDATE stock_items
                    SET quantity = quantity + $2, updated_at = $3
                    WHERE ingredient = $1
                    RETURNING ingredient, quantity, reorder_threshold, par_level, unit, updated_at
                    "#,
                )
                .bind(&entry.request.ingredient)
                .bind(qty)
                .bind(entry.updated_at)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Stock item '{}'", entry.request.ingredient))
                })?;
                Some(StockItem::from(row))
            }
            None => None,
        };

        Self::update_procurement_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn list_procurement(&self) -> AppResult<Vec<ProcurementLogEntry>> {
        let rows = sqlx::query_as::<_, ProcurementRow>(&format!(
            "SELECT {} FROM procurement_log ORDER BY created_at, id",
            PROCUREMENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProcurementLogEntry::try_from).collect()
    }
}
