//! Orders and weekly aggregates

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{DateRange, ItemTotals, Order, OrderLine, WeeklyAggregate};
use sqlx::{types::Json, FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> AppResult<()>;

    /// Orders dated inside `range`, by order date then creation time
    async fn list_orders(&self, range: DateRange) -> AppResult<Vec<Order>>;

    /// Insert or replace the aggregate for its week
    async fn upsert_aggregate(&self, aggregate: &WeeklyAggregate) -> AppResult<()>;

    async fn get_aggregate(&self, week_start: NaiveDate) -> AppResult<Option<WeeklyAggregate>>;
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    aggregates: RwLock<BTreeMap<NaiveDate, WeeklyAggregate>>,
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn list_orders(&self, range: DateRange) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| range.contains(o.order_date))
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.order_date, a.created_at).cmp(&(b.order_date, b.created_at)));
        Ok(orders)
    }

    async fn upsert_aggregate(&self, aggregate: &WeeklyAggregate) -> AppResult<()> {
        self.aggregates
            .write()
            .await
            .insert(aggregate.week_start, aggregate.clone());
        Ok(())
    }

    async fn get_aggregate(&self, week_start: NaiveDate) -> AppResult<Option<WeeklyAggregate>> {
        Ok(self.aggregates.read().await.get(&week_start).cloned())
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    customer: String,
    lines: Json<Vec<OrderLine>>,
    order_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            customer: row.customer,
            lines: row.lines.0,
            order_date: row.order_date,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AggregateRow {
    week_start: NaiveDate,
    totals: Json<ItemTotals>,
    revenue: Json<BTreeMap<String, Decimal>>,
    daily: Json<BTreeMap<NaiveDate, ItemTotals>>,
    order_count: i64,
    computed_at: DateTime<Utc>,
}

impl From<AggregateRow> for WeeklyAggregate {
    fn from(row: AggregateRow) -> Self {
        WeeklyAggregate {
            week_start: row.week_start,
            totals: row.totals.0,
            revenue: row.revenue.0,
            daily: row.daily.0,
            order_count: row.order_count,
            computed_at: row.computed_at,
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer, lines, order_date, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id)
        .bind(&order.customer)
        .bind(Json(&order.lines))
        .bind(order.order_date)
        .bind(order.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_orders(&self, range: DateRange) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer, lines, order_date, created_at
            FROM orders
            WHERE ($1::date IS NULL OR order_date >= $1)
              AND ($2::date IS NULL OR order_date < $2)
            ORDER BY order_date, created_at
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn upsert_aggregate(&self, aggregate: &WeeklyAggregate) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO weekly_aggregates (week_start, totals, revenue, daily, order_count, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (week_start) DO UPDATE
            SET totals = EXCLUDED.totals,
                revenue = EXCLUDED.revenue,
                daily = EXCLUDED.daily,
                order_count = EXCLUDED.order_count,
                computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(aggregate.week_start)
        .bind(Json(&aggregate.totals))
        .bind(Json(&aggregate.revenue))
        .bind(Json(&aggregate.daily))
        .bind(aggregate.order_count)
        .bind(aggregate.computed_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn get_aggregate(&self, week_start: NaiveDate) -> AppResult<Option<WeeklyAggregate>> {
        let row = sqlx::query_as::<_, AggregateRow>(
            r#"
            SELECT week_start, totals, revenue, daily, order_count, computed_at
            FROM weekly_aggregates
            WHERE week_start = $1
            "#,
        )
        .bind(week_start)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(WeeklyAggregate::from))
    }
}
