//! Shared fixtures: an in-memory pipeline wired with in-process clients
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use indago_backend::error::{AppError, AppResult};
use indago_backend::external::{
    FinanceClient, InventoryClient, LocalFinanceClient, LocalInventoryClient, LocalKitchenClient,
    LocalOrdersClient, RetryConfig,
};
use indago_backend::services::{
    AuditLog, FinancePolicy, InventoryService, OrderService, ProcurementService,
    ProductionService, SalesService, StockLedger,
};
use indago_backend::store::{
    AuditStore, BatchStore, FinanceStore, MemoryAuditStore, MemoryBatchStore, MemoryFinanceStore,
    MemoryOrderStore, MemorySalesStore, OrderStore, SalesStore, Stores,
};
use rust_decimal::Decimal;
use shared::{
    week_start_of, AuditEntry, AuditFilter, DateRange, NewOrder, Order, OrderLine,
    ProcurementLogEntry, ProductionBatch, PurchaseRequest, PurchaseStatus, Recipe, RecipeBook,
    SalesScore, StockItem, StockSeed, WeeklyAggregate,
};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Monday of the current week; finance decisions made now fall inside it
pub fn this_week() -> NaiveDate {
    week_start_of(today())
}

/// Latte takes 2 ml of milk, espresso 9 g of beans
pub fn test_recipes() -> RecipeBook {
    RecipeBook::new([
        Recipe::new("Latte").with("milk", dec("2"), "ml"),
        Recipe::new("Espresso").with("beans", dec("9"), "g"),
    ])
}

/// 25 ml of milk reordering at 10, plenty of beans
pub fn test_seed() -> Vec<StockSeed> {
    vec![
        StockSeed::new("milk", 25, "ml").with_threshold(dec("10")),
        StockSeed::new("beans", 1_000, "g").with_threshold(dec("100")),
    ]
}

pub fn order(item: &str, quantity: i32, unit_price: &str, date: NaiveDate) -> NewOrder {
    NewOrder {
        customer: "Walk-in".to_string(),
        lines: vec![OrderLine {
            item: item.to_string(),
            quantity,
            unit_price: dec(unit_price),
        }],
        order_date: date,
    }
}

/// Switch that makes a wrapped client fail with `Unavailable`
#[derive(Default)]
pub struct Outage {
    down: AtomicBool,
    calls: AtomicUsize,
}

impl Outage {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, service: &str) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(AppError::Unavailable(format!("{} unreachable", service)))
        } else {
            Ok(())
        }
    }
}

pub struct FlakyFinanceClient {
    inner: Arc<dyn FinanceClient>,
    outage: Arc<Outage>,
}

#[async_trait]
impl FinanceClient for FlakyFinanceClient {
    async fn submit(&self, request: &PurchaseRequest) -> AppResult<PurchaseRequest> {
        self.outage.check("finance")?;
        self.inner.submit(request).await
    }

    async fn history(&self, status: Option<PurchaseStatus>) -> AppResult<Vec<PurchaseRequest>> {
        self.outage.check("finance")?;
        self.inner.history(status).await
    }
}

pub struct FlakyInventoryClient {
    inner: Arc<dyn InventoryClient>,
    outage: Arc<Outage>,
}

#[async_trait]
impl InventoryClient for FlakyInventoryClient {
    async fn stock(&self) -> AppResult<Vec<StockItem>> {
        self.outage.check("inventory")?;
        self.inner.stock().await
    }

    async fn apply_approved_purchase(&self, request: &PurchaseRequest) -> AppResult<StockItem> {
        self.outage.check("inventory")?;
        self.inner.apply_approved_purchase(request).await
    }

    async fn release_rejected_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> AppResult<ProcurementLogEntry> {
        self.outage.check("inventory")?;
        self.inner.release_rejected_purchase(request).await
    }
}

/// Audit store that can be made to reject writes
#[derive(Default)]
pub struct FailingAuditStore {
    inner: MemoryAuditStore,
    failing: AtomicBool,
}

impl FailingAuditStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit disk full".to_string()));
        }
        self.inner.append(entry).await
    }

    async fn list(&self, filter: &AuditFilter) -> AppResult<Vec<AuditEntry>> {
        self.inner.list(filter).await
    }
}

/// Order, batch, finance and sales stores whose writes can be made to fail
#[derive(Default)]
pub struct FailingWrites {
    orders: MemoryOrderStore,
    batches: MemoryBatchStore,
    finance: MemoryFinanceStore,
    sales: MemorySalesStore,
    failing: AtomicBool,
}

impl FailingWrites {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::Internal("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderStore for FailingWrites {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        self.check()?;
        self.orders.insert_order(order).await
    }

    async fn list_orders(&self, range: DateRange) -> AppResult<Vec<Order>> {
        self.orders.list_orders(range).await
    }

    async fn upsert_aggregate(&self, aggregate: &WeeklyAggregate) -> AppResult<()> {
        self.check()?;
        self.orders.upsert_aggregate(aggregate).await
    }

    async fn get_aggregate(&self, week_start: NaiveDate) -> AppResult<Option<WeeklyAggregate>> {
        self.orders.get_aggregate(week_start).await
    }
}

#[async_trait]
impl BatchStore for FailingWrites {
    async fn upsert_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        self.check()?;
        self.batches.upsert_batch(batch).await
    }

    async fn get_batch(&self, production_date: NaiveDate) -> AppResult<Option<ProductionBatch>> {
        self.batches.get_batch(production_date).await
    }
}

#[async_trait]
impl FinanceStore for FailingWrites {
    async fn get_request(&self, id: Uuid) -> AppResult<Option<PurchaseRequest>> {
        self.finance.get_request(id).await
    }

    async fn insert_request(&self, request: &PurchaseRequest) -> AppResult<bool> {
        self.check()?;
        self.finance.insert_request(request).await
    }

    async fn update_request(&self, request: &PurchaseRequest) -> AppResult<()> {
        self.check()?;
        self.finance.update_request(request).await
    }

    async fn list_requests(
        &self,
        status: Option<PurchaseStatus>,
    ) -> AppResult<Vec<PurchaseRequest>> {
        self.finance.list_requests(status).await
    }
}

#[async_trait]
impl SalesStore for FailingWrites {
    async fn upsert_score(&self, score: &SalesScore) -> AppResult<()> {
        self.check()?;
        self.sales.upsert_score(score).await
    }

    async fn list_scores(&self) -> AppResult<Vec<SalesScore>> {
        self.sales.list_scores().await
    }
}

pub struct PipelineOptions {
    pub recipes: RecipeBook,
    pub seed: Vec<StockSeed>,
    pub policy: FinancePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            recipes: test_recipes(),
            seed: test_seed(),
            policy: FinancePolicy::default(),
        }
    }
}

/// Every component in one process on memory stores
pub struct Pipeline {
    pub audit_store: Arc<FailingAuditStore>,
    pub store_writes: Arc<FailingWrites>,
    pub audit: AuditLog,
    pub orders: OrderService,
    pub kitchen: ProductionService,
    pub ledger: StockLedger,
    pub inventory: InventoryService,
    pub finance: ProcurementService,
    pub sales: SalesService,
    /// Inventory's view of finance
    pub finance_outage: Arc<Outage>,
    /// Finance's view of inventory
    pub inventory_outage: Arc<Outage>,
}

impl Pipeline {
    pub async fn new() -> Self {
        Self::with_options(PipelineOptions::default()).await
    }

    pub async fn with_options(options: PipelineOptions) -> Self {
        let retry = RetryConfig::immediate(3);
        let audit_store = Arc::new(FailingAuditStore::default());
        let store_writes = Arc::new(FailingWrites::default());
        let mut stores = Stores::memory();
        stores.audit = audit_store.clone();
        stores.orders = store_writes.clone();
        stores.batches = store_writes.clone();
        stores.finance = store_writes.clone();
        stores.sales = store_writes.clone();
        let audit = AuditLog::new(stores.audit.clone());

        let orders = OrderService::new(stores.orders.clone(), audit.clone());
        let orders_client = Arc::new(LocalOrdersClient::new(orders.clone()));

        let ledger = StockLedger::new(stores.inventory.clone(), audit.clone());
        ledger.seed(&options.seed).await.unwrap();

        let inventory_outage = Arc::new(Outage::default());
        let inventory_client = Arc::new(FlakyInventoryClient {
            inner: Arc::new(LocalInventoryClient::new(ledger.clone())),
            outage: inventory_outage.clone(),
        });

        let finance = ProcurementService::new(
            stores.finance.clone(),
            inventory_client.clone(),
            options.policy,
            retry.clone(),
            audit.clone(),
        );
        let finance_outage = Arc::new(Outage::default());
        let finance_client = Arc::new(FlakyFinanceClient {
            inner: Arc::new(LocalFinanceClient::new(finance.clone())),
            outage: finance_outage.clone(),
        });

        let kitchen = ProductionService::new(
            stores.batches.clone(),
            orders_client.clone(),
            inventory_client,
            options.recipes,
            retry.clone(),
            audit.clone(),
        );
        let kitchen_client = Arc::new(LocalKitchenClient::new(kitchen.clone()));

        let inventory = InventoryService::new(
            ledger.clone(),
            kitchen_client,
            finance_client.clone(),
            retry.clone(),
        );
        let sales = SalesService::new(
            stores.sales.clone(),
            orders_client,
            finance_client,
            retry,
            audit.clone(),
        );

        Self {
            audit_store,
            store_writes,
            audit,
            orders,
            kitchen,
            ledger,
            inventory,
            finance,
            sales,
            finance_outage,
            inventory_outage,
        }
    }

    /// Aggregate the week of `date`, plan the day and consume it
    pub async fn run_day(&self, date: NaiveDate) -> AppResult<indago_backend::services::ConsumeOutcome> {
        self.orders.aggregate_week(week_start_of(date)).await?;
        self.kitchen.start_production(date).await?;
        self.inventory.consume_for_date(date).await
    }

    pub async fn stock_of(&self, ingredient: &str) -> Decimal {
        self.ledger
            .stock()
            .await
            .unwrap()
            .into_iter()
            .find(|i| i.ingredient == ingredient)
            .map(|i| i.quantity)
            .unwrap()
    }

    pub async fn audit_entries(&self, filter: AuditFilter) -> Vec<AuditEntry> {
        self.audit.list(&filter).await.unwrap()
    }
}
