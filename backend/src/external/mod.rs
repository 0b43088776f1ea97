//! Clients for the other pipeline components
//!
//! Each downstream component has a client trait with an HTTP implementation
//! and an in-process one for when it is hosted in the same binary.

pub mod finance;
pub mod http;
pub mod inventory;
pub mod kitchen;
pub mod orders;
pub mod retry;

pub use finance::{FinanceClient, HttpFinanceClient, LocalFinanceClient};
pub use http::{ServiceEndpoint, IDEMPOTENCY_KEY_HEADER};
pub use inventory::{HttpInventoryClient, InventoryClient, LocalInventoryClient};
pub use kitchen::{HttpKitchenClient, KitchenClient, LocalKitchenClient};
pub use orders::{HttpOrdersClient, LocalOrdersClient, OrdersClient};
pub use retry::{with_retry, RetryConfig};
