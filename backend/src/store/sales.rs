//! Weekly sales scores

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{PerformanceBand, SalesScore};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait SalesStore: Send + Sync {
    /// Insert or replace the score for its week
    async fn upsert_score(&self, score: &SalesScore) -> AppResult<()>;

    /// All scores by week
    async fn list_scores(&self) -> AppResult<Vec<SalesScore>>;
}

#[derive(Default)]
pub struct MemorySalesStore {
    scores: RwLock<BTreeMap<NaiveDate, SalesScore>>,
}

#[async_trait]
impl SalesStore for MemorySalesStore {
    async fn upsert_score(&self, score: &SalesScore) -> AppResult<()> {
        self.scores
            .write()
            .await
            .insert(score.week_start, score.clone());
        Ok(())
    }

    async fn list_scores(&self) -> AppResult<Vec<SalesScore>> {
        Ok(self.scores.read().await.values().cloned().collect())
    }
}

#[derive(Clone)]
pub struct PgSalesStore {
    db: PgPool,
}

impl PgSalesStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct ScoreRow {
    week_start: NaiveDate,
    total_revenue: Decimal,
    total_procurement_cost: Decimal,
    profit: Decimal,
    margin_percent: Decimal,
    performance: String,
    approved_request_count: i64,
    computed_at: DateTime<Utc>,
}

#[async_trait]
impl SalesStore for PgSalesStore {
    async fn upsert_score(&self, score: &SalesScore) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_scores (
                week_start, total_revenue, total_procurement_cost, profit,
                margin_percent, performance, approved_request_count, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (week_start) DO UPDATE
            SET total_revenue = EXCLUDED.total_revenue,
                total_procurement_cost = EXCLUDED.total_procurement_cost,
                profit = EXCLUDED.profit,
                margin_percent = EXCLUDED.margin_percent,
                performance = EXCLUDED.performance,
                approved_request_count = EXCLUDED.approved_request_count,
                computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(score.week_start)
        .bind(score.total_revenue)
        .bind(score.total_procurement_cost)
        .bind(score.profit)
        .bind(score.margin_percent)
        .bind(score.performance.as_str())
        .bind(score.approved_request_count)
        .bind(score.computed_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_scores(&self) -> AppResult<Vec<SalesScore>> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT week_start, total_revenue, total_procurement_cost, profit,
                   margin_percent, performance, approved_request_count, computed_at
            FROM sales_scores
            ORDER BY week_start
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let performance = PerformanceBand::parse(&row.performance).ok_or_else(|| {
                    AppError::Internal(format!("Unknown performance band '{}'", row.performance))
                })?;
                Ok(SalesScore {
                    week_start: row.week_start,
                    total_revenue: row.total_revenue,
                    total_procurement_cost: row.total_procurement_cost,
                    profit: row.profit,
                    margin_percent: row.margin_percent,
                    performance,
                    approved_request_count: row.approved_request_count,
                    computed_at: row.computed_at,
                })
            })
            .collect()
    }
}
