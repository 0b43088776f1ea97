//! Customer order models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainResult;
use crate::validation::{checked_product, checked_total};

/// A single ordered menu item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub item: String,
    pub quantity: i32,
    /// Price of one unit, in the shop's currency
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn line_total(&self) -> DomainResult<Decimal> {
        checked_product("unit_price", Decimal::from(self.quantity), self.unit_price)
    }
}

/// A placed order. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub customer: String,
    pub lines: Vec<OrderLine>,
    pub order_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn total_price(&self) -> DomainResult<Decimal> {
        let totals = self
            .lines
            .iter()
            .map(OrderLine::line_total)
            .collect::<DomainResult<Vec<_>>>()?;
        checked_total("total_price", totals)
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| i64::from(l.quantity)).sum()
    }
}

/// Input for recording a new order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(length(min = 1, max = 120))]
    pub customer: String,
    #[validate(length(min = 1))]
    pub lines: Vec<OrderLine>,
    pub order_date: NaiveDate,
}

impl NewOrder {
    pub fn into_order(self, created_at: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer: self.customer.trim().to_string(),
            lines: self
                .lines
                .into_iter()
                .map(|l| OrderLine {
                    item: l.item.trim().to_string(),
                    ..l
                })
                .collect(),
            order_date: self.order_date,
            created_at,
        }
    }
}
