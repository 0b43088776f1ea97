//! Weekly order aggregation

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Order;
use crate::error::DomainResult;
use crate::types::in_week;
use crate::validation::{checked_sum, checked_total};

/// Item → quantity
pub type ItemTotals = BTreeMap<String, i64>;

/// Per-item totals for one ISO week
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub totals: ItemTotals,
    /// Item → summed line value
    pub revenue: BTreeMap<String, Decimal>,
    /// Per-day breakdown, only days with orders are present
    pub daily: BTreeMap<NaiveDate, ItemTotals>,
    pub order_count: i64,
    pub computed_at: DateTime<Utc>,
}

impl WeeklyAggregate {
    pub fn total_revenue(&self) -> DomainResult<Decimal> {
        checked_total("revenue", self.revenue.values().copied())
    }

    /// Quantities ordered on a given day; empty when nothing was ordered
    pub fn day(&self, date: NaiveDate) -> ItemTotals {
        self.daily.get(&date).cloned().unwrap_or_default()
    }

    /// Equality on the computed content, ignoring when it was computed
    pub fn same_content(&self, other: &WeeklyAggregate) -> bool {
        self.week_start == other.week_start
            && self.totals == other.totals
            && self.revenue == other.revenue
            && self.daily == other.daily
            && self.order_count == other.order_count
    }
}

/// Sum every order dated inside the week. Orders outside the week are ignored,
/// so the result depends only on the orders of that week. Revenue that does not
/// fit a decimal is refused instead of wrapping.
pub fn aggregate_orders(
    week_start: NaiveDate,
    orders: &[Order],
    computed_at: DateTime<Utc>,
) -> DomainResult<WeeklyAggregate> {
    let mut totals = ItemTotals::new();
    let mut revenue: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, ItemTotals> = BTreeMap::new();
    let mut order_count = 0;

    for order in orders.iter().filter(|o| in_week(week_start, o.order_date)) {
        order_count += 1;
        let day = daily.entry(order.order_date).or_default();
        for line in &order.lines {
            let qty = i64::from(line.quantity);
            *totals.entry(line.item.clone()).or_default() += qty;
            *day.entry(line.item.clone()).or_default() += qty;
            let item_revenue = revenue.entry(line.item.clone()).or_default();
            *item_revenue = checked_sum("revenue", *item_revenue, line.line_total()?)?;
        }
    }

    Ok(WeeklyAggregate {
        week_start,
        totals,
        revenue,
        daily,
        order_count,
        computed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderLine;
    use uuid::Uuid;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn order(date: &str, lines: &[(&str, i32, i64)]) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer: "walk-in".to_string(),
            lines: lines
                .iter()
                .map(|(item, qty, price)| OrderLine {
                    item: item.to_string(),
                    quantity: *qty,
                    unit_price: Decimal::from(*price),
                })
                .collect(),
            order_date: d(date),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_sums_per_item() {
        let orders = vec![
            order("2024-01-02", &[("Latte", 10, 30)]),
            order("2024-01-03", &[("Latte", 5, 30), ("capucino", 2, 25)]),
        ];
        let agg = aggregate_orders(d("2024-01-01"), &orders, Utc::now()).unwrap();

        assert_eq!(agg.totals.get("Latte"), Some(&15));
        assert_eq!(agg.totals.get("capucino"), Some(&2));
        assert_eq!(agg.revenue.get("Latte"), Some(&Decimal::from(450)));
        assert_eq!(agg.total_revenue().unwrap(), Decimal::from(500));
        assert_eq!(agg.order_count, 2);
        assert_eq!(agg.day(d("2024-01-02")).get("Latte"), Some(&10));
        assert!(agg.day(d("2024-01-04")).is_empty());
    }

    #[test]
    fn test_aggregate_ignores_other_weeks() {
        let orders = vec![
            order("2023-12-31", &[("Latte", 7, 30)]),
            order("2024-01-07", &[("Latte", 1, 30)]),
            order("2024-01-08", &[("Latte", 9, 30)]),
        ];
        let agg = aggregate_orders(d("2024-01-01"), &orders, Utc::now()).unwrap();
        assert_eq!(agg.totals.get("Latte"), Some(&1));
        assert_eq!(agg.order_count, 1);
    }

    #[test]
    fn test_aggregate_twice_same_content() {
        let orders = vec![order("2024-01-02", &[("Latte", 10, 30)])];
        let first = aggregate_orders(d("2024-01-01"), &orders, Utc::now()).unwrap();
        let second = aggregate_orders(d("2024-01-01"), &orders, Utc::now()).unwrap();
        assert!(first.same_content(&second));
    }

    #[test]
    fn test_empty_week() {
        let agg = aggregate_orders(d("2024-01-01"), &[], Utc::now()).unwrap();
        assert!(agg.totals.is_empty());
        assert_eq!(agg.total_revenue().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_oversized_revenue_is_refused() {
        let mut huge = order("2024-01-02", &[("Latte", 2, 0)]);
        huge.lines[0].unit_price = Decimal::MAX;

        let err = aggregate_orders(d("2024-01-01"), &[huge], Utc::now()).unwrap_err();
        assert!(matches!(err, crate::DomainError::Validation { ref field, .. } if field == "unit_price"));
    }

    #[test]
    fn test_revenue_sum_overflow_is_refused() {
        let mut first = order("2024-01-02", &[("Latte", 1, 0)]);
        first.lines[0].unit_price = Decimal::MAX;
        let second = order("2024-01-03", &[("Latte", 1, 1)]);

        let err = aggregate_orders(d("2024-01-01"), &[first, second], Utc::now()).unwrap_err();
        assert!(matches!(err, crate::DomainError::Validation { ref field, .. } if field == "revenue"));
    }
}
