//! Indago coffee pipeline - backend services
//!
//! One binary hosts any subset of the pipeline components (orders, kitchen,
//! inventory, finance, sales). Components hosted together talk in-process;
//! the rest are reached over HTTP.

use std::sync::Arc;

use axum::{routing::get, Router};
use shared::Component;
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use error::{AppError, AppResult};
use external::{
    FinanceClient, HttpFinanceClient, HttpInventoryClient, HttpKitchenClient, HttpOrdersClient,
    InventoryClient, KitchenClient, LocalFinanceClient, LocalInventoryClient, LocalKitchenClient,
    LocalOrdersClient, OrdersClient,
};
use services::{
    AuditLog, FinancePolicy, InventoryService, OrderService, ProcurementService,
    ProductionService, SalesService, StockLedger,
};
use store::Stores;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Set when running on Postgres
    pub db: Option<PgPool>,
    pub audit: AuditLog,
    pub orders: Option<OrderService>,
    pub kitchen: Option<ProductionService>,
    pub inventory: Option<InventoryService>,
    pub finance: Option<ProcurementService>,
    pub sales: Option<SalesService>,
}

fn not_hosted(component: Component) -> AppError {
    AppError::Configuration(format!("the {} role is not hosted by this process", component))
}

impl AppState {
    pub fn orders(&self) -> AppResult<&OrderService> {
        self.orders.as_ref().ok_or_else(|| not_hosted(Component::Orders))
    }

    pub fn kitchen(&self) -> AppResult<&ProductionService> {
        self.kitchen.as_ref().ok_or_else(|| not_hosted(Component::Kitchen))
    }

    pub fn inventory(&self) -> AppResult<&InventoryService> {
        self.inventory
            .as_ref()
            .ok_or_else(|| not_hosted(Component::Inventory))
    }

    pub fn finance(&self) -> AppResult<&ProcurementService> {
        self.finance.as_ref().ok_or_else(|| not_hosted(Component::Finance))
    }

    pub fn sales(&self) -> AppResult<&SalesService> {
        self.sales.as_ref().ok_or_else(|| not_hosted(Component::Sales))
    }
}

/// Wire the hosted components. Downstream components hosted here get
/// in-process clients, the others HTTP clients.
pub async fn build_state(config: Config, stores: Stores, db: Option<PgPool>) -> AppResult<AppState> {
    let retry = config.retry_config();
    let timeout = config.downstream.timeout();
    let downstream = &config.downstream;
    let hosts = |c: Component| config.service.hosts(c);
    let audit = AuditLog::new(stores.audit.clone());

    let orders = hosts(Component::Orders)
        .then(|| OrderService::new(stores.orders.clone(), audit.clone()));
    let orders_client: Arc<dyn OrdersClient> = match &orders {
        Some(service) => Arc::new(LocalOrdersClient::new(service.clone())),
        None => Arc::new(HttpOrdersClient::new(&downstream.orders_url, timeout)?),
    };

    let ledger = if hosts(Component::Inventory) {
        let ledger = StockLedger::new(stores.inventory.clone(), audit.clone());
        ledger.seed(&config.inventory.seed).await?;
        Some(ledger)
    } else {
        None
    };
    let inventory_client: Arc<dyn InventoryClient> = match &ledger {
        Some(ledger) => Arc::new(LocalInventoryClient::new(ledger.clone())),
        None => Arc::new(HttpInventoryClient::new(&downstream.inventory_url, timeout)?),
    };

    let finance = hosts(Component::Finance).then(|| {
        ProcurementService::new(
            stores.finance.clone(),
            inventory_client.clone(),
            FinancePolicy {
                costs: config.finance.cost_table(),
                budget: config.finance.budget_policy(),
                auto_decide: config.finance.auto_decide,
            },
            retry.clone(),
            audit.clone(),
        )
    });
    let finance_client: Arc<dyn FinanceClient> = match &finance {
        Some(service) => Arc::new(LocalFinanceClient::new(service.clone())),
        None => Arc::new(HttpFinanceClient::new(&downstream.finance_url, timeout)?),
    };

    let kitchen = hosts(Component::Kitchen).then(|| {
        ProductionService::new(
            stores.batches.clone(),
            orders_client.clone(),
            inventory_client.clone(),
            config.kitchen.recipe_book(),
            retry.clone(),
            audit.clone(),
        )
    });
    let kitchen_client: Arc<dyn KitchenClient> = match &kitchen {
        Some(service) => Arc::new(LocalKitchenClient::new(service.clone())),
        None => Arc::new(HttpKitchenClient::new(&downstream.kitchen_url, timeout)?),
    };

    let inventory = ledger.map(|ledger| {
        InventoryService::new(ledger, kitchen_client, finance_client.clone(), retry.clone())
    });

    let sales = hosts(Component::Sales).then(|| {
        SalesService::new(
            stores.sales.clone(),
            orders_client,
            finance_client,
            retry.clone(),
            audit.clone(),
        )
    });

    tracing::info!(
        "Hosting roles: {}",
        config
            .service
            .hosted()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(AppState {
        config: Arc::new(config),
        db,
        audit,
        orders,
        kitchen,
        inventory,
        finance,
        sales,
    })
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .merge(routes::api_routes(&state.config.service))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Indago Coffee Pipeline API v1.0"
}
