//! Business logic services, one per pipeline component

pub mod audit;
pub mod finance;
pub mod inventory;
pub mod kitchen;
pub mod locks;
pub mod orders;
pub mod sales;

pub use audit::AuditLog;
pub use finance::{DecisionInput, FinancePolicy, ProcurementService};
pub use inventory::{
    ConsumeOutcome, ConsumedIngredient, InventoryService, PurchaseRequestInput, StockLedger,
};
pub use kitchen::{ProductionService, ProductionSummary};
pub use locks::KeyedLocks;
pub use orders::{OrderFilter, OrderService};
pub use sales::SalesService;
