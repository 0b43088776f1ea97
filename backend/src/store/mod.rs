//! Persistence for each component
//!
//! Every component owns its own store. The Postgres implementations back
//! deployed services; the in-memory ones serve local runs and tests.

use std::sync::Arc;

use sqlx::PgPool;

pub mod audit;
pub mod finance;
pub mod inventory;
pub mod kitchen;
pub mod orders;
pub mod sales;

pub use audit::{AuditStore, MemoryAuditStore, PgAuditStore};
pub use finance::{FinanceStore, MemoryFinanceStore, PgFinanceStore};
pub use inventory::{ConsumptionRecord, InventoryStore, MemoryInventoryStore, PgInventoryStore};
pub use kitchen::{BatchStore, MemoryBatchStore, PgBatchStore};
pub use orders::{MemoryOrderStore, OrderStore, PgOrderStore};
pub use sales::{MemorySalesStore, PgSalesStore, SalesStore};

/// One store per component
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub batches: Arc<dyn BatchStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub finance: Arc<dyn FinanceStore>,
    pub sales: Arc<dyn SalesStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn memory() -> Self {
        Self {
            orders: Arc::new(MemoryOrderStore::default()),
            batches: Arc::new(MemoryBatchStore::default()),
            inventory: Arc::new(MemoryInventoryStore::default()),
            finance: Arc::new(MemoryFinanceStore::default()),
            sales: Arc::new(MemorySalesStore::default()),
            audit: Arc::new(MemoryAuditStore::default()),
        }
    }

    pub fn postgres(db: PgPool) -> Self {
        Self {
            orders: Arc::new(PgOrderStore::new(db.clone())),
            batches: Arc::new(PgBatchStore::new(db.clone())),
            inventory: Arc::new(PgInventoryStore::new(db.clone())),
            finance: Arc::new(PgFinanceStore::new(db.clone())),
            sales: Arc::new(PgSalesStore::new(db.clone())),
            audit: Arc::new(PgAuditStore::new(db)),
        }
    }
}
