//! Inventory Ledger: stock levels, batch consumption and procurement triggers
//!
//! `StockLedger` owns the stock and the procurement log and is what finance
//! calls back into. `InventoryService` adds the cross-service steps on top:
//! pulling batches from the kitchen and forwarding requests to finance.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    plan_consumption, validate_name, validate_positive_quantity, week_start_of, AuditEntry,
    Component, ForwardStatus, ProcurementLogEntry, ProductionBatch, PurchaseOrigin,
    PurchaseRequest, PurchaseStatus, StockItem, StockSeed,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{with_retry, FinanceClient, KitchenClient, RetryConfig};
use crate::services::{AuditLog, KeyedLocks};
use crate::store::{ConsumptionRecord, InventoryStore};

const STOCK_ITEM: &str = "stock_item";
const CONSUMPTION: &str = "consumption";
const PURCHASE_REQUEST: &str = "purchase_request";

/// Manual purchase request input
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurchaseRequestInput {
    pub ingredient: String,
    pub quantity: Decimal,
}

/// Result of consuming one production batch
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeOutcome {
    pub production_date: NaiveDate,
    pub consumed: Vec<ConsumedIngredient>,
    /// Levels right after the decrement
    pub stock: Vec<StockItem>,
    /// Requests raised because stock fell to its threshold
    pub purchase_requests: Vec<ProcurementLogEntry>,
    /// The batch had already been consumed; nothing was decremented
    pub replayed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumedIngredient {
    pub ingredient: String,
    pub quantity: Decimal,
    pub unit: String,
}

/// Ledger of stock and of the requests it raised
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn InventoryStore>,
    locks: KeyedLocks,
    audit: AuditLog,
}

impl StockLedger {
    pub fn new(store: Arc<dyn InventoryStore>, audit: AuditLog) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            audit,
        }
    }

    /// Load seed rows for ingredients the ledger does not know yet
    pub async fn seed(&self, seeds: &[StockSeed]) -> AppResult<usize> {
        let now = Utc::now();
        let items = seeds
            .iter()
            .cloned()
            .map(|s| s.into_item(now))
            .collect::<Result<Vec<_>, _>>()?;
        let added = self.store.seed_stock(&items).await?;
        if added > 0 {
            tracing::info!("Seeded {} stock items", added);
        }
        Ok(added)
    }

    pub async fn stock(&self) -> AppResult<Vec<StockItem>> {
        self.store.list_stock().await
    }

    /// Consume a batch all-or-nothing and raise requests for ingredients at
    /// or below threshold. The returned requests still need forwarding.
    pub async fn consume(&self, batch: &ProductionBatch) -> AppResult<ConsumeOutcome> {
        let _guard = self.locks.lock_many(batch.ingredients.keys()).await;

        if let Some(record) = self.store.find_consumption(batch.production_date).await? {
            tracing::info!(date = %batch.production_date, "Batch already consumed, replaying outcome");
            return self.outcome(record, true).await;
        }

        let now = Utc::now();
        let stock = self.store.list_stock().await?;
        let updated = match plan_consumption(&stock, batch, now) {
            Ok(updated) => updated,
            Err(err) => {
                let entry = AuditEntry::failure(
                    Component::Inventory,
                    CONSUMPTION,
                    batch.production_date,
                    "consume",
                )
                .with_after(&batch.ingredients);
                return Err(self.audit.fail(entry, err.into()).await);
            }
        };

        let mut triggered = Vec::new();
        for item in updated.iter().filter(|i| i.needs_reorder()) {
            if self.store.open_procurement_for(&item.ingredient).await?.is_some() {
                tracing::debug!(ingredient = %item.ingredient, "Reorder already pending");
                continue;
            }
            let request = PurchaseRequest::new(
                &item.ingredient,
                item.replenishment_quantity(),
                &item.unit,
                PurchaseOrigin::Automatic,
                item.quantity,
                batch.week_start,
                now,
            );
            triggered.push(ProcurementLogEntry::new(request, now));
        }

        let record = ConsumptionRecord {
            production_date: batch.production_date,
            week_start: batch.week_start,
            consumed: batch
                .ingredients
                .iter()
                .filter(|(_, req)| req.quantity > Decimal::ZERO)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            stock_after: updated,
            triggered_requests: triggered.iter().map(|e| e.request.id).collect(),
            consumed_at: now,
        };

        if let Err(err) = self.store.commit_consumption(&record, &triggered).await {
            let entry = AuditEntry::failure(
                Component::Inventory,
                CONSUMPTION,
                batch.production_date,
                "consume",
            );
            return Err(self.audit.fail(entry, err).await);
        }

        self.audit
            .append(
                AuditEntry::success(
                    Component::Inventory,
                    CONSUMPTION,
                    batch.production_date,
                    "consume",
                )
                .with_before(&stock)
                .with_after(&record.stock_after),
            )
            .await?;
        for entry in &triggered {
            self.audit
                .append(
                    AuditEntry::success(
                        Component::Inventory,
                        PURCHASE_REQUEST,
                        entry.request.id,
                        "auto_trigger",
                    )
                    .with_after(&entry.request),
                )
                .await?;
            tracing::info!(
                ingredient = %entry.request.ingredient,
                quantity = %entry.request.requested_quantity,
                remaining = %entry.request.current_stock,
                "Low stock, purchase request raised"
            );
        }

        Ok(ConsumeOutcome {
            production_date: record.production_date,
            consumed: consumed_lines(&record),
            stock: record.stock_after,
            purchase_requests: triggered,
            replayed: false,
        })
    }

    async fn outcome(&self, record: ConsumptionRecord, replayed: bool) -> AppResult<ConsumeOutcome> {
        let mut purchase_requests = Vec::with_capacity(record.triggered_requests.len());
        for id in &record.triggered_requests {
            if let Some(entry) = self.store.get_procurement(*id).await? {
                purchase_requests.push(entry);
            }
        }
        Ok(ConsumeOutcome {
            production_date: record.production_date,
            consumed: consumed_lines(&record),
            stock: record.stock_after,
            purchase_requests,
            replayed,
        })
    }

    /// Raise a manual request. The ingredient must be stocked and must not
    /// already have a pending request.
    pub async fn open_manual_request(
        &self,
        input: &PurchaseRequestInput,
    ) -> AppResult<ProcurementLogEntry> {
        let ingredient = input.ingredient.trim();
        let failure = || {
            AuditEntry::failure(
                Component::Inventory,
                PURCHASE_REQUEST,
                ingredient,
                "request_purchase",
            )
            .with_after(input)
        };

        if let Err(err) = validate_name("ingredient", ingredient)
            .and_then(|_| validate_positive_quantity("quantity", input.quantity))
        {
            return Err(self.audit.fail(failure(), err.into()).await);
        }

        let _guard = self.locks.lock(ingredient).await;

        let item = match self.store.get_stock_item(ingredient).await? {
            Some(item) => item,
            None => {
                let err = AppError::NotFound(format!("Stock item '{}'", ingredient));
                return Err(self.audit.fail(failure(), err).await);
            }
        };

        if let Some(open) = self.store.open_procurement_for(ingredient).await? {
            let err = AppError::Conflict {
                resource: ingredient.to_string(),
                message: format!(
                    "Purchase request {} for '{}' is still pending",
                    open.request.id, ingredient
                ),
            };
            return Err(self.audit.fail(failure(), err).await);
        }

        let now = Utc::now();
        let request = PurchaseRequest::new(
            &item.ingredient,
            input.quantity,
            &item.unit,
            PurchaseOrigin::Manual,
            item.quantity,
            week_start_of(now.date_naive()),
            now,
        );
        let entry = ProcurementLogEntry::new(request, now);
        if let Err(err) = self.store.insert_procurement(&entry).await {
            return Err(self.audit.fail(failure(), err).await);
        }

        self.audit
            .append(
                AuditEntry::success(
                    Component::Inventory,
                    PURCHASE_REQUEST,
                    entry.request.id,
                    "request_purchase",
                )
                .with_after(&entry.request),
            )
            .await?;
        Ok(entry)
    }

    /// Record the outcome of handing a request to finance
    pub async fn mark_forwarded(
        &self,
        request_id: Uuid,
        ingredient: &str,
        result: Result<(), String>,
    ) -> AppResult<ProcurementLogEntry> {
        let _guard = self.locks.lock(ingredient).await;

        let mut entry = self
            .store
            .get_procurement(request_id)
            .await?
            .ok_or_else(|| AppError::UnknownRequest(request_id.to_string()))?;

        let before = entry.forward_status;
        match result {
            Ok(()) => {
                entry.forward_status = ForwardStatus::Forwarded;
                entry.last_error = None;
            }
            // A settled entry was evidently received by finance
            Err(_) if entry.settled_at.is_some() => {
                entry.forward_status = ForwardStatus::Forwarded;
            }
            Err(message) => {
                entry.forward_status = ForwardStatus::ForwardFailed;
                entry.last_error = Some(message);
            }
        }
        entry.updated_at = Utc::now();
        self.store.update_procurement(&entry).await?;

        if before != entry.forward_status {
            let audit = if entry.forward_status == ForwardStatus::ForwardFailed {
                AuditEntry::failure(Component::Inventory, PURCHASE_REQUEST, request_id, "forward")
                    .with_detail(entry.last_error.clone().unwrap_or_default())
            } else {
                AuditEntry::success(Component::Inventory, PURCHASE_REQUEST, request_id, "forward")
            };
            self.audit
                .append(
                    audit
                        .with_before(&before.as_str())
                        .with_after(&entry.forward_status.as_str()),
                )
                .await?;
        }
        Ok(entry)
    }

    /// Increment stock for an approved request, once per request id
    pub async fn apply_approved_purchase(&self, request: &PurchaseRequest) -> AppResult<StockItem> {
        self.settle(request, PurchaseStatus::Approved, "apply_approved_purchase")
            .await
            .and_then(|(_, item)| {
                item.ok_or_else(|| {
                    AppError::Internal(format!("No stock row returned for '{}'", request.ingredient))
                })
            })
    }

    /// Close the pending slot for a rejected request, once per request id
    pub async fn release_rejected_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> AppResult<ProcurementLogEntry> {
        self.settle(request, PurchaseStatus::Rejected, "release_rejected_purchase")
            .await
            .map(|(entry, _)| entry)
    }

    async fn settle(
        &self,
        request: &PurchaseRequest,
        expected: PurchaseStatus,
        action: &str,
    ) -> AppResult<(ProcurementLogEntry, Option<StockItem>)> {
        let failure =
            || AuditEntry::failure(Component::Inventory, PURCHASE_REQUEST, request.id, action);

        if request.status != expected {
            let err = AppError::UnknownRequest(format!(
                "Purchase request {} is {}, expected {}",
                request.id, request.status, expected
            ));
            return Err(self.audit.fail(failure(), err).await);
        }
        if let Err(err) = request.validate() {
            return Err(self.audit.fail(failure(), err.into()).await);
        }

        let _guard = self.locks.lock(&request.ingredient).await;

        let mut entry = match self.store.get_procurement(request.id).await? {
            Some(entry) if entry.request.ingredient == request.ingredient => entry,
            _ => {
                let err = AppError::UnknownRequest(format!(
                    "Purchase request {} was not raised by this ledger",
                    request.id
                ));
                return Err(self.audit.fail(failure(), err).await);
            }
        };

        if entry.settled_at.is_some() {
            if entry.request.status != expected {
                let err = AppError::UnknownRequest(format!(
                    "Purchase request {} was already settled as {}",
                    request.id, entry.request.status
                ));
                return Err(self.audit.fail(failure(), err).await);
            }
            tracing::debug!(request_id = %request.id, "Settlement replay ignored");
            let item = self.store.get_stock_item(&request.ingredient).await?;
            return Ok((entry, item));
        }

        let before = entry.request.clone();
        let now = Utc::now();
        let increment = match expected {
            PurchaseStatus::Approved => Some(
                request
                    .approved_quantity
                    .unwrap_or(request.requested_quantity),
            ),
            _ => None,
        };

        entry.request = request.clone();
        entry.forward_status = ForwardStatus::Forwarded;
        entry.last_error = None;
        entry.settled_at = Some(now);
        entry.updated_at = now;

        let item = match self.store.commit_settlement(&entry, increment).await {
            Ok(item) => item,
            Err(err) => return Err(self.audit.fail(failure(), err).await),
        };

        self.audit
            .append(
                AuditEntry::success(Component::Inventory, PURCHASE_REQUEST, request.id, action)
                    .with_before(&before)
                    .with_after(&entry.request),
            )
            .await?;
        if let Some(item) = &item {
            self.audit
                .append(
                    AuditEntry::success(Component::Inventory, STOCK_ITEM, &item.ingredient, action)
                        .with_after(item),
                )
                .await?;
            tracing::info!(
                ingredient = %item.ingredient,
                added = %increment.unwrap_or_default(),
                quantity = %item.quantity,
                "Approved purchase applied to stock"
            );
        }

        Ok((entry, item))
    }

    pub async fn procurement_log(&self) -> AppResult<Vec<ProcurementLogEntry>> {
        self.store.list_procurement().await
    }

    /// Pending entries finance has not acknowledged
    pub async fn unforwarded(&self) -> AppResult<Vec<ProcurementLogEntry>> {
        Ok(self
            .store
            .list_procurement()
            .await?
            .into_iter()
            .filter(ProcurementLogEntry::needs_forwarding)
            .collect())
    }
}

fn consumed_lines(record: &ConsumptionRecord) -> Vec<ConsumedIngredient> {
    record
        .consumed
        .iter()
        .map(|(ingredient, req)| ConsumedIngredient {
            ingredient: ingredient.clone(),
            quantity: req.quantity,
            unit: req.unit.clone(),
        })
        .collect()
}

/// Inventory component: the ledger plus its hand-offs to kitchen and finance
#[derive(Clone)]
pub struct InventoryService {
    ledger: StockLedger,
    kitchen: Arc<dyn KitchenClient>,
    finance: Arc<dyn FinanceClient>,
    retry: RetryConfig,
}

impl InventoryService {
    pub fn new(
        ledger: StockLedger,
        kitchen: Arc<dyn KitchenClient>,
        finance: Arc<dyn FinanceClient>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            kitchen,
            finance,
            retry,
        }
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub async fn get_stock(&self) -> AppResult<Vec<StockItem>> {
        self.ledger.stock().await
    }

    /// Consume a batch and forward any requests it triggered. A failed
    /// forward is recorded on the entry and does not fail the consumption.
    pub async fn consume(&self, batch: &ProductionBatch) -> AppResult<ConsumeOutcome> {
        let mut outcome = self.ledger.consume(batch).await?;
        if outcome.replayed {
            return Ok(outcome);
        }

        let mut forwarded = Vec::with_capacity(outcome.purchase_requests.len());
        for entry in &outcome.purchase_requests {
            forwarded.push(self.forward(&entry.request).await?);
        }
        outcome.purchase_requests = forwarded;
        Ok(outcome)
    }

    /// Pull the kitchen's batch for `date` and consume it
    pub async fn consume_for_date(&self, date: NaiveDate) -> AppResult<ConsumeOutcome> {
        let batch = with_retry(&self.retry, "fetch production batch", || {
            self.kitchen.batch(date)
        })
        .await?;
        self.consume(&batch).await
    }

    /// Raise and forward a manual request. If finance cannot be reached the
    /// request stays pending locally and the error is returned.
    pub async fn request_purchase(&self, input: PurchaseRequestInput) -> AppResult<PurchaseRequest> {
        let entry = self.ledger.open_manual_request(&input).await?;
        let entry = self.forward(&entry.request).await?;
        match entry.forward_status {
            ForwardStatus::Forwarded => Ok(entry.request),
            _ => Err(AppError::Unavailable(format!(
                "Purchase request {} recorded but not delivered to finance: {}",
                entry.request.id,
                entry.last_error.unwrap_or_default()
            ))),
        }
    }

    pub async fn apply_approved_purchase(&self, request: &PurchaseRequest) -> AppResult<StockItem> {
        self.ledger.apply_approved_purchase(request).await
    }

    pub async fn release_rejected_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> AppResult<ProcurementLogEntry> {
        self.ledger.release_rejected_purchase(request).await
    }

    pub async fn procurement_log(&self) -> AppResult<Vec<ProcurementLogEntry>> {
        self.ledger.procurement_log().await
    }

    /// Forward every pending request finance has not acknowledged; returns
    /// the ones delivered this time
    pub async fn reconcile_forwarding(&self) -> AppResult<Vec<PurchaseRequest>> {
        let mut delivered = Vec::new();
        for entry in self.ledger.unforwarded().await? {
            let entry = self.forward(&entry.request).await?;
            if entry.forward_status == ForwardStatus::Forwarded {
                delivered.push(entry.request);
            }
        }
        if !delivered.is_empty() {
            tracing::info!("Re-forwarded {} purchase requests", delivered.len());
        }
        Ok(delivered)
    }

    async fn forward(&self, request: &PurchaseRequest) -> AppResult<ProcurementLogEntry> {
        let result = with_retry(&self.retry, "submit purchase request", || {
            self.finance.submit(request)
        })
        .await;

        let result = match result {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(request_id = %request.id, "Forward to finance failed: {}", err);
                Err(err.to_string())
            }
        };
        self.ledger
            .mark_forwarded(request.id, &request.ingredient, result)
            .await
    }
}
