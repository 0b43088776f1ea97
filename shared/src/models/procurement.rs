//! Purchase request models and the approval state machine

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::{
    checked_product, validate_name, validate_positive_quantity, validate_unit_price,
};

/// How a purchase request came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrigin {
    Manual,
    Automatic,
}

impl PurchaseOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrigin::Manual => "manual",
            PurchaseOrigin::Automatic => "automatic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(PurchaseOrigin::Manual),
            "automatic" => Some(PurchaseOrigin::Automatic),
            _ => None,
        }
    }
}

/// Purchase request status. Approved and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Approved => "approved",
            PurchaseStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PurchaseStatus::Pending),
            "approved" => Some(PurchaseStatus::Approved),
            "rejected" => Some(PurchaseStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseStatus::Pending)
    }

    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseStatus::Pending, PurchaseStatus::Approved)
                | (PurchaseStatus::Pending, PurchaseStatus::Rejected)
        )
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to replenish one ingredient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRequest {
    pub id: Uuid,
    pub ingredient: String,
    pub requested_quantity: Decimal,
    pub approved_quantity: Option<Decimal>,
    pub unit: String,
    pub origin: PurchaseOrigin,
    pub status: PurchaseStatus,
    pub unit_cost: Decimal,
    pub estimated_cost: Decimal,
    /// Stock level when the request was raised
    pub current_stock: Decimal,
    pub triggering_week: NaiveDate,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    /// The inventory ledger acknowledged the decision
    #[serde(default)]
    pub stock_synced: bool,
}

impl PurchaseRequest {
    pub fn new(
        ingredient: &str,
        quantity: Decimal,
        unit: &str,
        origin: PurchaseOrigin,
        current_stock: Decimal,
        triggering_week: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ingredient: ingredient.to_string(),
            requested_quantity: quantity,
            approved_quantity: None,
            unit: unit.to_string(),
            origin,
            status: PurchaseStatus::Pending,
            unit_cost: Decimal::ZERO,
            estimated_cost: Decimal::ZERO,
            current_stock,
            triggering_week,
            decision_note: None,
            created_at,
            decided_at: None,
            stock_synced: false,
        }
    }

    /// Boundary checks for a request handed over by another service
    pub fn validate(&self) -> DomainResult<()> {
        validate_name("ingredient", &self.ingredient)?;
        validate_positive_quantity("requested_quantity", self.requested_quantity)?;
        if let Some(q) = self.approved_quantity {
            validate_positive_quantity("approved_quantity", q)?;
        }
        Ok(())
    }

    /// Attach the unit cost and the resulting estimate. Leaves the request
    /// untouched when the cost is out of range.
    pub fn price(&mut self, unit_cost: Decimal) -> DomainResult<()> {
        validate_unit_price("unit_cost", unit_cost)?;
        let estimated_cost =
            checked_product("estimated_cost", self.requested_quantity, unit_cost)?;
        self.unit_cost = unit_cost;
        self.estimated_cost = estimated_cost;
        Ok(())
    }

    /// Quantity that the decision grants, zero unless approved
    pub fn granted_quantity(&self) -> Decimal {
        match self.status {
            PurchaseStatus::Approved => self.approved_quantity.unwrap_or(self.requested_quantity),
            _ => Decimal::ZERO,
        }
    }

    /// Cost that counts against sales: granted quantity at unit cost
    pub fn procurement_cost(&self) -> DomainResult<Decimal> {
        checked_product("procurement_cost", self.granted_quantity(), self.unit_cost)
    }

    /// Move Pending to Approved or Rejected. Any other move is refused.
    pub fn apply_decision(
        &mut self,
        decision: &Decision,
        decided_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let next = decision.target_status();
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        if let Decision::Approve {
            quantity: Some(q), ..
        } = decision
        {
            validate_positive_quantity("quantity", *q)?;
        }

        match decision {
            Decision::Approve { quantity, note } => {
                self.approved_quantity = Some(quantity.unwrap_or(self.requested_quantity));
                self.decision_note = note.clone();
            }
            Decision::Reject { note } => {
                self.decision_note = note.clone();
            }
        }
        self.status = next;
        self.decided_at = Some(decided_at);
        self.stock_synced = false;
        Ok(())
    }
}

/// Hand-off state of a request between the inventory ledger and finance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardStatus {
    Pending,
    Forwarded,
    ForwardFailed,
}

impl ForwardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardStatus::Pending => "pending",
            ForwardStatus::Forwarded => "forwarded",
            ForwardStatus::ForwardFailed => "forward_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ForwardStatus::Pending),
            "forwarded" => Some(ForwardStatus::Forwarded),
            "forward_failed" => Some(ForwardStatus::ForwardFailed),
            _ => None,
        }
    }
}

/// The inventory ledger's record of a request it raised
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcurementLogEntry {
    pub request: PurchaseRequest,
    pub forward_status: ForwardStatus,
    pub last_error: Option<String>,
    /// Set once the decision has been applied to stock
    pub settled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ProcurementLogEntry {
    pub fn new(request: PurchaseRequest, now: DateTime<Utc>) -> Self {
        Self {
            request,
            forward_status: ForwardStatus::Pending,
            last_error: None,
            settled_at: None,
            updated_at: now,
        }
    }

    /// Still holding the ingredient's single pending slot
    pub fn is_open(&self) -> bool {
        self.request.status == PurchaseStatus::Pending
    }

    /// Not yet acknowledged by finance
    pub fn needs_forwarding(&self) -> bool {
        self.is_open() && self.forward_status != ForwardStatus::Forwarded
    }
}

/// An approve/reject decision on a pending request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    #[serde(alias = "approved")]
    Approve {
        /// Overrides the requested quantity when present
        #[serde(default)]
        quantity: Option<Decimal>,
        #[serde(default)]
        note: Option<String>,
    },
    #[serde(alias = "rejected")]
    Reject {
        #[serde(default)]
        note: Option<String>,
    },
}

impl Decision {
    pub fn approve() -> Self {
        Decision::Approve {
            quantity: None,
            note: None,
        }
    }

    pub fn approve_quantity(quantity: Decimal) -> Self {
        Decision::Approve {
            quantity: Some(quantity),
            note: None,
        }
    }

    pub fn reject() -> Self {
        Decision::Reject { note: None }
    }

    pub fn target_status(&self) -> PurchaseStatus {
        match self {
            Decision::Approve { .. } => PurchaseStatus::Approved,
            Decision::Reject { .. } => PurchaseStatus::Rejected,
        }
    }
}

/// Ingredient unit costs used to price requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostTable {
    #[serde(default)]
    pub costs: BTreeMap<String, Decimal>,
    #[serde(default = "CostTable::default_unit_cost")]
    pub default_unit_cost: Decimal,
}

impl CostTable {
    fn default_unit_cost() -> Decimal {
        Decimal::ONE
    }

    pub fn unit_cost(&self, ingredient: &str) -> Decimal {
        self.costs
            .get(ingredient)
            .copied()
            .unwrap_or(self.default_unit_cost)
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            costs: BTreeMap::from([
                // per gram
                ("beans".to_string(), Decimal::new(25, 2)),
                // per millilitre
                ("milk".to_string(), Decimal::new(2, 2)),
            ]),
            default_unit_cost: Self::default_unit_cost(),
        }
    }
}

/// Budget rule: approve when the estimate fits the limit, reject otherwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetPolicy {
    pub budget_limit: Decimal,
}

impl BudgetPolicy {
    pub fn new(budget_limit: Decimal) -> Self {
        Self { budget_limit }
    }

    pub fn evaluate(&self, request: &PurchaseRequest) -> Decision {
        if request.estimated_cost <= self.budget_limit {
            Decision::Approve {
                quantity: None,
                note: Some("Auto-approved: within budget limit.".to_string()),
            }
        } else {
            Decision::Reject {
                note: Some(format!(
                    "Auto-rejected: exceeds budget limit ({}).",
                    self.budget_limit
                )),
            }
        }
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self::new(Decimal::from(500_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(qty: i64) -> PurchaseRequest {
        PurchaseRequest::new(
            "milk",
            Decimal::from(qty),
            "ml",
            PurchaseOrigin::Automatic,
            Decimal::from(5),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_valid_transitions() {
        assert!(PurchaseStatus::Pending.can_transition_to(PurchaseStatus::Approved));
        assert!(PurchaseStatus::Pending.can_transition_to(PurchaseStatus::Rejected));
    }

    #[test]
    fn test_terminal_states_never_move() {
        for from in [PurchaseStatus::Approved, PurchaseStatus::Rejected] {
            assert!(from.is_terminal());
            for to in [
                PurchaseStatus::Pending,
                PurchaseStatus::Approved,
                PurchaseStatus::Rejected,
            ] {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_approve_with_quantity_override() {
        let mut req = pending(95);
        req.price(Decimal::new(2, 2)).unwrap();
        req.apply_decision(&Decision::approve_quantity(Decimal::from(50)), Utc::now())
            .unwrap();

        assert_eq!(req.status, PurchaseStatus::Approved);
        assert_eq!(req.granted_quantity(), Decimal::from(50));
        assert_eq!(req.procurement_cost().unwrap(), Decimal::ONE);
        assert!(req.decided_at.is_some());
    }

    #[test]
    fn test_reapprove_is_invalid_transition() {
        let mut req = pending(10);
        req.apply_decision(&Decision::approve(), Utc::now()).unwrap();
        let err = req.apply_decision(&Decision::approve(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: "approved".to_string(),
                to: "approved".to_string()
            }
        );
    }

    #[test]
    fn test_rejected_costs_nothing() {
        let mut req = pending(10);
        req.price(Decimal::TEN).unwrap();
        req.apply_decision(&Decision::reject(), Utc::now()).unwrap();
        assert_eq!(req.procurement_cost().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_override_is_rejected_and_state_unchanged() {
        let mut req = pending(10);
        assert!(req
            .apply_decision(&Decision::approve_quantity(Decimal::ZERO), Utc::now())
            .is_err());
        assert_eq!(req.status, PurchaseStatus::Pending);
    }

    #[test]
    fn test_oversized_quantities_are_refused() {
        let mut req = pending(10);
        req.requested_quantity = Decimal::MAX;
        assert!(matches!(
            req.validate().unwrap_err(),
            DomainError::Validation { ref field, .. } if field == "requested_quantity"
        ));

        let err = req.price(Decimal::TWO).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "estimated_cost"));
        assert_eq!(req.estimated_cost, Decimal::ZERO);

        let mut req = pending(10);
        assert!(req.price(Decimal::MAX).is_err());
        let err = req
            .apply_decision(&Decision::approve_quantity(Decimal::MAX), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "quantity"));
        assert_eq!(req.status, PurchaseStatus::Pending);
    }

    #[test]
    fn test_budget_policy() {
        let policy = BudgetPolicy::default();
        let mut cheap = pending(10);
        cheap.price(Decimal::ONE).unwrap();
        assert_eq!(policy.evaluate(&cheap).target_status(), PurchaseStatus::Approved);

        let mut expensive = pending(1_000_000);
        expensive.price(Decimal::ONE).unwrap();
        assert_eq!(policy.evaluate(&expensive).target_status(), PurchaseStatus::Rejected);
    }

    #[test]
    fn test_decision_accepts_past_tense_tags() {
        let d: Decision =
            serde_json::from_str(r#"{"decision":"approved","quantity":"50"}"#).unwrap();
        assert_eq!(d, Decision::approve_quantity(Decimal::from(50)));
        let d: Decision = serde_json::from_str(r#"{"decision":"reject"}"#).unwrap();
        assert_eq!(d, Decision::reject());
    }
}
