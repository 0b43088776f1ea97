//! Domain models for the Indago coffee pipeline

mod aggregate;
mod audit;
mod order;
mod procurement;
mod recipe;
mod sales;
mod stock;

pub use aggregate::*;
pub use audit::*;
pub use order::*;
pub use procurement::*;
pub use recipe::*;
pub use sales::*;
pub use stock::*;
