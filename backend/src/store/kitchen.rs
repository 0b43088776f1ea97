//! Planned production batches, one per date

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{BatchIngredient, ItemTotals, ProductionBatch};
use sqlx::{types::Json, FromRow, PgPool};
use tokio::sync::RwLock;

use crate::error::AppResult;

#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Insert or replace the plan for the batch's date
    async fn upsert_batch(&self, batch: &ProductionBatch) -> AppResult<()>;

    async fn get_batch(&self, production_date: NaiveDate) -> AppResult<Option<ProductionBatch>>;
}

#[derive(Default)]
pub struct MemoryBatchStore {
    batches: RwLock<BTreeMap<NaiveDate, ProductionBatch>>,
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn upsert_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        self.batches
            .write()
            .await
            .insert(batch.production_date, batch.clone());
        Ok(())
    }

    async fn get_batch(&self, production_date: NaiveDate) -> AppResult<Option<ProductionBatch>> {
        Ok(self.batches.read().await.get(&production_date).cloned())
    }
}

#[derive(Clone)]
pub struct PgBatchStore {
    db: PgPool,
}

impl PgBatchStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    production_date: NaiveDate,
    week_start: NaiveDate,
    items: Json<ItemTotals>,
    ingredients: Json<BTreeMap<String, BatchIngredient>>,
    planned_at: DateTime<Utc>,
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn upsert_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO production_batches (production_date, week_start, items, ingredients, planned_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (production_date) DO UPDATE
            SET week_start = EXCLUDED.week_start,
                items = EXCLUDED.items,
                ingredients = EXCLUDED.ingredients,
                planned_at = EXCLUDED.planned_at
            "#,
        )
        .bind(batch.production_date)
        .bind(batch.week_start)
        .bind(Json(&batch.items))
        .bind(Json(&batch.ingredients))
        .bind(batch.planned_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn get_batch(&self, production_date: NaiveDate) -> AppResult<Option<ProductionBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT production_date, week_start, items, ingredients, planned_at
            FROM production_batches
            WHERE production_date = $1
            "#,
        )
        .bind(production_date)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| ProductionBatch {
            production_date: r.production_date,
            week_start: r.week_start,
            items: r.items.0,
            ingredients: r.ingredients.0,
            planned_at: r.planned_at,
        }))
    }
}
