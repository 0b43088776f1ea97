//! HTTP handlers, one module per pipeline component

pub mod audit;
pub mod finance;
pub mod health;
pub mod inventory;
pub mod kitchen;
pub mod orders;
pub mod sales;

use chrono::NaiveDate;
use serde::Deserialize;

pub use audit::*;
pub use finance::*;
pub use health::*;
pub use inventory::*;
pub use kitchen::*;
pub use orders::*;
pub use sales::*;

/// `?week_start=` query or `{"week_start": ...}` body
#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week_start: NaiveDate,
}

/// `?date=` query or `{"date": ...}` body
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}
