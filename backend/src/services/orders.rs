//! Order Aggregator: records orders and builds weekly aggregates

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{
    aggregate_orders, validate_order_lines, validate_week_start, week_start_of, AuditEntry,
    Component, DateRange, NewOrder, Order, WeeklyAggregate,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::AuditLog;
use crate::store::OrderStore;

const ORDER: &str = "order";
const WEEKLY_AGGREGATE: &str = "weekly_aggregate";

/// Order listing filter, `to` exclusive
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl From<OrderFilter> for DateRange {
    fn from(filter: OrderFilter) -> Self {
        DateRange {
            start: filter.from,
            end: filter.to,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    audit: AuditLog,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// Validate and store a new order
    pub async fn record_order(&self, input: NewOrder) -> AppResult<Order> {
        let checked = input
            .validate()
            .map_err(AppError::from)
            .and_then(|_| validate_order_lines(&input.lines).map_err(AppError::from));

        if let Err(err) = checked {
            let entry = AuditEntry::failure(Component::Orders, ORDER, Uuid::nil(), "record_order")
                .with_after(&input);
            return Err(self.audit.fail(entry, err).await);
        }

        let order = input.into_order(Utc::now());
        if let Err(err) = self.store.insert_order(&order).await {
            let entry = AuditEntry::failure(Component::Orders, ORDER, order.id, "record_order")
                .with_after(&order);
            return Err(self.audit.fail(entry, err).await);
        }

        self.audit
            .append(
                AuditEntry::success(Component::Orders, ORDER, order.id, "record_order")
                    .with_after(&order),
            )
            .await?;

        tracing::info!(
            order_id = %order.id,
            customer = %order.customer,
            date = %order.order_date,
            "Order recorded"
        );
        Ok(order)
    }

    pub async fn list_orders(&self, filter: OrderFilter) -> AppResult<Vec<Order>> {
        self.store.list_orders(filter.into()).await
    }

    /// Recompute the aggregate for the week, replacing any earlier one
    pub async fn aggregate_week(&self, week_start: NaiveDate) -> AppResult<WeeklyAggregate> {
        let failure = || {
            AuditEntry::failure(
                Component::Orders,
                WEEKLY_AGGREGATE,
                week_start,
                "aggregate_week",
            )
        };
        if let Err(err) = validate_week_start(week_start) {
            return Err(self.audit.fail(failure(), err.into()).await);
        }

        let stored = async {
            let orders = self.store.list_orders(DateRange::week(week_start)).await?;
            let aggregate = aggregate_orders(week_start, &orders, Utc::now())?;
            let previous = self.store.get_aggregate(week_start).await?;
            self.store.upsert_aggregate(&aggregate).await?;
            Ok::<_, AppError>((aggregate, previous))
        }
        .await;
        let (aggregate, previous) = match stored {
            Ok(stored) => stored,
            Err(err) => return Err(self.audit.fail(failure(), err).await),
        };

        let mut entry = AuditEntry::success(
            Component::Orders,
            WEEKLY_AGGREGATE,
            week_start,
            "aggregate_week",
        )
        .with_after(&aggregate.totals);
        if let Some(previous) = &previous {
            entry = entry.with_before(&previous.totals);
        }
        self.audit.append(entry).await?;

        tracing::info!(
            week_start = %week_start,
            orders = aggregate.order_count,
            items = aggregate.totals.len(),
            "Week aggregated"
        );
        Ok(aggregate)
    }

    pub async fn get_weekly_aggregate(&self, week_start: NaiveDate) -> AppResult<WeeklyAggregate> {
        self.store
            .get_aggregate(week_start)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Weekly aggregate for {}", week_start)))
    }

    /// Re-aggregate every week that has at least one order
    pub async fn aggregate_all(&self) -> AppResult<Vec<WeeklyAggregate>> {
        let weeks: BTreeSet<NaiveDate> = self
            .store
            .list_orders(DateRange::default())
            .await?
            .iter()
            .map(|o| week_start_of(o.order_date))
            .collect();

        let mut aggregates = Vec::with_capacity(weeks.len());
        for week in weeks {
            aggregates.push(self.aggregate_week(week).await?);
        }
        Ok(aggregates)
    }
}
