//! Production Planner: turns a day's orders into ingredient requirements

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use shared::{
    find_shortfalls, plan_production, week_start_of, AuditEntry, Component, ProductionBatch,
    RecipeBook, Shortfall,
};

use crate::error::{AppError, AppResult};
use crate::external::{with_retry, InventoryClient, OrdersClient, RetryConfig};
use crate::services::AuditLog;
use crate::store::BatchStore;

const BATCH: &str = "production_batch";

/// A planned batch and the stock it cannot cover
#[derive(Debug, Clone, Serialize)]
pub struct ProductionSummary {
    pub batch: ProductionBatch,
    /// None when the stock check could not be made
    pub shortfalls: Option<Vec<Shortfall>>,
}

#[derive(Clone)]
pub struct ProductionService {
    store: Arc<dyn BatchStore>,
    orders: Arc<dyn OrdersClient>,
    inventory: Arc<dyn InventoryClient>,
    recipes: Arc<RecipeBook>,
    retry: RetryConfig,
    audit: AuditLog,
}

impl ProductionService {
    pub fn new(
        store: Arc<dyn BatchStore>,
        orders: Arc<dyn OrdersClient>,
        inventory: Arc<dyn InventoryClient>,
        recipes: RecipeBook,
        retry: RetryConfig,
        audit: AuditLog,
    ) -> Self {
        Self {
            store,
            orders,
            inventory,
            recipes: Arc::new(recipes),
            retry,
            audit,
        }
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    /// Plan the batch for `date` from its week's aggregate and store it,
    /// replacing any earlier plan for the date
    pub async fn start_production(&self, date: NaiveDate) -> AppResult<ProductionSummary> {
        let failure = || AuditEntry::failure(Component::Kitchen, BATCH, date, "start_production");

        let week_start = week_start_of(date);
        let aggregate = match with_retry(&self.retry, "fetch weekly aggregate", || {
            self.orders.weekly_aggregate(week_start)
        })
        .await
        {
            Ok(aggregate) => aggregate,
            Err(err) => return Err(self.audit.fail(failure(), err).await),
        };

        let batch = match plan_production(date, &aggregate.day(date), &self.recipes, Utc::now()) {
            Ok(batch) => batch,
            Err(err) => return Err(self.audit.fail(failure(), AppError::from(err)).await),
        };

        let stored = async {
            let previous = self.store.get_batch(date).await?;
            self.store.upsert_batch(&batch).await?;
            Ok::<_, AppError>(previous)
        }
        .await;
        let previous = match stored {
            Ok(previous) => previous,
            Err(err) => return Err(self.audit.fail(failure().with_after(&batch), err).await),
        };

        let mut entry = AuditEntry::success(Component::Kitchen, BATCH, date, "start_production")
            .with_after(&batch.ingredients);
        if let Some(previous) = &previous {
            entry = entry.with_before(&previous.ingredients);
        }
        self.audit.append(entry).await?;

        let shortfalls = match self.inventory.stock().await {
            Ok(stock) => Some(find_shortfalls(&stock, &batch)),
            Err(err) => {
                tracing::warn!("Skipping stock check for {}: {}", date, err);
                None
            }
        };
        if let Some(short) = shortfalls.as_ref().filter(|s| !s.is_empty()) {
            tracing::warn!(
                date = %date,
                ingredients = ?short.iter().map(|s| s.ingredient.as_str()).collect::<Vec<_>>(),
                "Planned batch exceeds current stock"
            );
        }

        tracing::info!(
            date = %date,
            items = batch.items.len(),
            ingredients = batch.ingredients.len(),
            "Production planned"
        );
        Ok(ProductionSummary { batch, shortfalls })
    }

    pub async fn get_batch(&self, date: NaiveDate) -> AppResult<ProductionBatch> {
        self.store
            .get_batch(date)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Production batch for {}", date)))
    }
}
