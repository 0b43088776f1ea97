//! Weekly sales scoring

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{PurchaseRequest, PurchaseStatus, WeeklyAggregate};
use crate::error::{DomainError, DomainResult};
use crate::types::timestamp_in_week;
use crate::validation::checked_total;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    Strong,
    Healthy,
    Marginal,
    Loss,
}

impl PerformanceBand {
    pub fn from_margin(margin_percent: Decimal) -> Self {
        if margin_percent >= Decimal::from(40) {
            PerformanceBand::Strong
        } else if margin_percent >= Decimal::from(15) {
            PerformanceBand::Healthy
        } else if margin_percent >= Decimal::ZERO {
            PerformanceBand::Marginal
        } else {
            PerformanceBand::Loss
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceBand::Strong => "strong",
            PerformanceBand::Healthy => "healthy",
            PerformanceBand::Marginal => "marginal",
            PerformanceBand::Loss => "loss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strong" => Some(PerformanceBand::Strong),
            "healthy" => Some(PerformanceBand::Healthy),
            "marginal" => Some(PerformanceBand::Marginal),
            "loss" => Some(PerformanceBand::Loss),
            _ => None,
        }
    }
}

/// Revenue against procurement cost for one week
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesScore {
    pub week_start: NaiveDate,
    pub total_revenue: Decimal,
    pub total_procurement_cost: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
    pub performance: PerformanceBand,
    pub approved_request_count: i64,
    pub computed_at: DateTime<Utc>,
}

impl SalesScore {
    pub fn same_content(&self, other: &SalesScore) -> bool {
        self.week_start == other.week_start
            && self.total_revenue == other.total_revenue
            && self.total_procurement_cost == other.total_procurement_cost
            && self.profit == other.profit
            && self.margin_percent == other.margin_percent
            && self.performance == other.performance
            && self.approved_request_count == other.approved_request_count
    }
}

/// Score the aggregate's week. Only requests approved inside that week count
/// toward its procurement cost.
pub fn compute_score(
    aggregate: &WeeklyAggregate,
    requests: &[PurchaseRequest],
    computed_at: DateTime<Utc>,
) -> DomainResult<SalesScore> {
    let week_start = aggregate.week_start;
    let approved: Vec<&PurchaseRequest> = requests
        .iter()
        .filter(|r| r.status == PurchaseStatus::Approved)
        .filter(|r| {
            r.decided_at
                .map_or(false, |at| timestamp_in_week(week_start, at))
        })
        .collect();

    let total_revenue = aggregate.total_revenue()?;
    let costs = approved
        .iter()
        .map(|r| r.procurement_cost())
        .collect::<DomainResult<Vec<_>>>()?;
    let total_procurement_cost = checked_total("total_procurement_cost", costs)?;
    let profit = total_revenue
        .checked_sub(total_procurement_cost)
        .ok_or_else(|| DomainError::validation("profit", "value is too large"))?;
    let margin_percent = if total_revenue.is_zero() {
        Decimal::ZERO
    } else {
        profit
            .checked_div(total_revenue)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| DomainError::validation("margin_percent", "value is too large"))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    Ok(SalesScore {
        week_start,
        total_revenue,
        total_procurement_cost,
        profit,
        margin_percent,
        performance: PerformanceBand::from_margin(margin_percent),
        approved_request_count: approved.len() as i64,
        computed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decision, PurchaseOrigin};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn aggregate(revenue: i64) -> WeeklyAggregate {
        WeeklyAggregate {
            week_start: week(),
            totals: BTreeMap::from([("Latte".to_string(), 10)]),
            revenue: BTreeMap::from([("Latte".to_string(), Decimal::from(revenue))]),
            daily: BTreeMap::new(),
            order_count: 1,
            computed_at: Utc::now(),
        }
    }

    fn decided(qty: i64, unit_cost: i64, decision: Decision, day: u32) -> PurchaseRequest {
        let mut req = PurchaseRequest::new(
            "milk",
            Decimal::from(qty),
            "ml",
            PurchaseOrigin::Automatic,
            Decimal::ZERO,
            week(),
            Utc::now(),
        );
        req.price(Decimal::from(unit_cost)).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        req.apply_decision(&decision, at).unwrap();
        req
    }

    #[test]
    fn test_score_counts_only_approved_in_week() {
        let requests = vec![
            decided(10, 5, Decision::approve(), 3),
            decided(10, 5, Decision::reject(), 3),
            // following week
            decided(10, 5, Decision::approve(), 9),
        ];
        let score = compute_score(&aggregate(200), &requests, Utc::now()).unwrap();

        assert_eq!(score.total_procurement_cost, Decimal::from(50));
        assert_eq!(score.profit, Decimal::from(150));
        assert_eq!(score.margin_percent, Decimal::from(75));
        assert_eq!(score.performance, PerformanceBand::Strong);
        assert_eq!(score.approved_request_count, 1);
    }

    #[test]
    fn test_score_uses_approved_quantity() {
        let requests = vec![decided(95, 1, Decision::approve_quantity(Decimal::from(50)), 2)];
        let score = compute_score(&aggregate(100), &requests, Utc::now()).unwrap();
        assert_eq!(score.total_procurement_cost, Decimal::from(50));
        assert_eq!(score.performance, PerformanceBand::Strong);
    }

    #[test]
    fn test_zero_revenue_has_zero_margin() {
        let requests = vec![decided(10, 1, Decision::approve(), 2)];
        let score = compute_score(&aggregate(0), &requests, Utc::now()).unwrap();
        assert_eq!(score.margin_percent, Decimal::ZERO);
        assert_eq!(score.profit, Decimal::from(-10));
    }

    #[test]
    fn test_margin_rounds_to_two_places() {
        // 200/300 = 66.666..%
        let requests = vec![decided(100, 1, Decision::approve(), 2)];
        let score = compute_score(&aggregate(300), &requests, Utc::now()).unwrap();
        assert_eq!(score.margin_percent, Decimal::new(6667, 2));
    }

    #[test]
    fn test_bands() {
        assert_eq!(PerformanceBand::from_margin(Decimal::from(40)), PerformanceBand::Strong);
        assert_eq!(PerformanceBand::from_margin(Decimal::from(15)), PerformanceBand::Healthy);
        assert_eq!(PerformanceBand::from_margin(Decimal::ZERO), PerformanceBand::Marginal);
        assert_eq!(PerformanceBand::from_margin(Decimal::from(-1)), PerformanceBand::Loss);
    }

    #[test]
    fn test_oversized_revenue_fails_scoring() {
        let mut agg = aggregate(0);
        agg.revenue.insert("capucino".to_string(), Decimal::MAX);
        agg.revenue.insert("Latte".to_string(), Decimal::ONE);
        let err = compute_score(&agg, &[], Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "revenue"));
    }
}
