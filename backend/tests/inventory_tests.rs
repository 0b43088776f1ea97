//! Inventory ledger tests
//!
//! Tests for stock consumption and procurement hand-off including:
//! - all-or-nothing consumption and replay by production date
//! - one pending request per ingredient
//! - forwarding failures and reconciliation
//! - idempotent settlement of finance decisions

mod common;

use chrono::{NaiveDate, Utc};
use common::*;
use indago_backend::error::AppError;
use indago_backend::services::PurchaseRequestInput;
use shared::{
    AuditFilter, AuditOutcome, Component, Decision, ForwardStatus, PurchaseRequest,
    PurchaseStatus, StockSeed,
};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
}

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
}

fn manual(ingredient: &str, quantity: &str) -> PurchaseRequestInput {
    PurchaseRequestInput {
        ingredient: ingredient.to_string(),
        quantity: dec(quantity),
    }
}

/// Open a manual request on the ledger only and decide it locally
async fn decided_request(pipeline: &Pipeline, decision: Decision) -> PurchaseRequest {
    let entry = pipeline
        .ledger
        .open_manual_request(&manual("beans", "400"))
        .await
        .unwrap();
    let mut request = entry.request;
    request.apply_decision(&decision, Utc::now()).unwrap();
    request
}

// ============================================================================
// Consumption
// ============================================================================

mod consumption {
    use super::*;

    #[tokio::test]
    async fn test_existing_pending_request_is_not_duplicated() {
        let pipeline = Pipeline::new().await;
        pipeline
            .orders
            .record_order(order("Latte", 8, "3.00", monday()))
            .await
            .unwrap();
        pipeline
            .orders
            .record_order(order("Latte", 2, "3.00", tuesday()))
            .await
            .unwrap();

        let first = pipeline.run_day(monday()).await.unwrap();
        assert_eq!(pipeline.stock_of("milk").await, dec("9"));
        assert_eq!(first.purchase_requests.len(), 1);

        let second = pipeline.run_day(tuesday()).await.unwrap();
        assert_eq!(pipeline.stock_of("milk").await, dec("5"));
        assert!(second.purchase_requests.is_empty());
        assert_eq!(pipeline.ledger.procurement_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_day_without_orders_consumes_nothing() {
        let pipeline = Pipeline::new().await;
        pipeline
            .orders
            .record_order(order("Latte", 3, "3.00", monday()))
            .await
            .unwrap();

        let outcome = pipeline.run_day(tuesday()).await.unwrap();
        assert!(outcome.consumed.is_empty());
        assert_eq!(pipeline.stock_of("milk").await, dec("25"));
    }

    #[tokio::test]
    async fn test_consume_without_planned_batch_is_not_found() {
        let pipeline = Pipeline::new().await;
        let result = pipeline.inventory.consume_for_date(monday()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reseeding_keeps_current_levels() {
        let pipeline = Pipeline::new().await;
        pipeline
            .orders
            .record_order(order("Espresso", 10, "2.00", monday()))
            .await
            .unwrap();
        pipeline.run_day(monday()).await.unwrap();

        let added = pipeline.ledger.seed(&test_seed()).await.unwrap();
        assert_eq!(added, 0);
        assert_eq!(pipeline.stock_of("beans").await, dec("910"));
    }
}

// ============================================================================
// Manual requests and forwarding
// ============================================================================

mod forwarding {
    use super::*;

    #[tokio::test]
    async fn test_manual_request_validation() {
        let pipeline = Pipeline::new().await;

        let unknown = pipeline.inventory.request_purchase(manual("sugar", "5")).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let zero = pipeline.inventory.request_purchase(manual("milk", "0")).await;
        assert!(matches!(zero, Err(AppError::Validation { field, .. }) if field == "quantity"));

        let huge = pipeline
            .inventory
            .request_purchase(manual("milk", "79228162514264337593543950335"))
            .await;
        assert!(matches!(huge, Err(AppError::Validation { field, .. }) if field == "quantity"));

        assert!(pipeline.ledger.procurement_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_forward_is_recorded_and_reconciled() {
        let pipeline = Pipeline::new().await;
        pipeline
            .orders
            .record_order(order("Latte", 10, "3.00", monday()))
            .await
            .unwrap();
        pipeline.finance_outage.set_down(true);

        let outcome = pipeline.run_day(monday()).await.unwrap();
        assert_eq!(pipeline.stock_of("milk").await, dec("5"));
        let entry = &outcome.purchase_requests[0];
        assert_eq!(entry.forward_status, ForwardStatus::ForwardFailed);
        assert!(entry.last_error.is_some());
        // Three attempts, all refused
        assert_eq!(pipeline.finance_outage.calls(), 3);

        let failures: Vec<_> = pipeline
            .audit_entries(AuditFilter {
                component: Some(Component::Inventory),
                entity_id: Some(entry.request.id.to_string()),
                ..Default::default()
            })
            .await
            .into_iter()
            .filter(|e| e.outcome == AuditOutcome::Failure)
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].action, "forward");

        // Still down: nothing delivered
        assert!(pipeline.inventory.reconcile_forwarding().await.unwrap().is_empty());

        pipeline.finance_outage.set_down(false);
        let delivered = pipeline.inventory.reconcile_forwarding().await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, entry.request.id);
        assert!(pipeline.finance.get_request(entry.request.id).await.is_ok());

        let log = pipeline.ledger.procurement_log().await.unwrap();
        assert_eq!(log[0].forward_status, ForwardStatus::Forwarded);
        assert!(pipeline.inventory.reconcile_forwarding().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_request_unavailable_finance_keeps_slot() {
        let pipeline = Pipeline::new().await;
        pipeline.finance_outage.set_down(true);

        let result = pipeline.inventory.request_purchase(manual("milk", "30")).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));

        // The request exists locally, so a second one conflicts
        let again = pipeline.inventory.request_purchase(manual("milk", "30")).await;
        assert!(matches!(again, Err(AppError::Conflict { .. })));

        pipeline.finance_outage.set_down(false);
        assert_eq!(pipeline.inventory.reconcile_forwarding().await.unwrap().len(), 1);
        assert_eq!(pipeline.finance.list_history(None).await.unwrap().len(), 1);
    }
}

// ============================================================================
// Settlement
// ============================================================================

mod settlement {
    use super::*;

    #[tokio::test]
    async fn test_apply_is_idempotent_on_request_id() {
        let pipeline = Pipeline::new().await;
        let request = decided_request(&pipeline, Decision::approve_quantity(dec("250"))).await;

        let item = pipeline.ledger.apply_approved_purchase(&request).await.unwrap();
        assert_eq!(item.quantity, dec("1250"));

        let replay = pipeline.ledger.apply_approved_purchase(&request).await.unwrap();
        assert_eq!(replay.quantity, dec("1250"));
        assert_eq!(pipeline.stock_of("beans").await, dec("1250"));
    }

    #[tokio::test]
    async fn test_apply_refuses_oversized_quantity() {
        let pipeline = Pipeline::new().await;
        let mut request = decided_request(&pipeline, Decision::approve()).await;
        request.approved_quantity = Some(dec("79228162514264337593543950335"));

        let result = pipeline.ledger.apply_approved_purchase(&request).await;
        assert!(matches!(
            result,
            Err(AppError::Validation { ref field, .. }) if field == "approved_quantity"
        ));
        assert_eq!(pipeline.stock_of("beans").await, dec("1000"));

        let entries = pipeline
            .audit_entries(AuditFilter::component(Component::Inventory))
            .await;
        assert!(entries
            .iter()
            .any(|e| e.action == "apply_approved_purchase" && e.outcome == AuditOutcome::Failure));
    }

    #[tokio::test]
    async fn test_apply_rejects_unknown_or_undecided_requests() {
        let pipeline = Pipeline::new().await;

        let mut stranger = PurchaseRequest::new(
            "milk",
            dec("10"),
            "ml",
            shared::PurchaseOrigin::Manual,
            dec("25"),
            monday(),
            Utc::now(),
        );
        stranger
            .apply_decision(&Decision::approve(), Utc::now())
            .unwrap();
        let result = pipeline.ledger.apply_approved_purchase(&stranger).await;
        assert!(matches!(result, Err(AppError::UnknownRequest(_))));

        let entry = pipeline
            .ledger
            .open_manual_request(&manual("milk", "10"))
            .await
            .unwrap();
        let pending = pipeline.ledger.apply_approved_purchase(&entry.request).await;
        assert!(matches!(pending, Err(AppError::UnknownRequest(_))));
        assert_eq!(pipeline.stock_of("milk").await, dec("25"));
    }

    #[tokio::test]
    async fn test_released_request_cannot_be_applied() {
        let pipeline = Pipeline::new().await;
        let rejected = decided_request(&pipeline, Decision::reject()).await;
        assert_eq!(rejected.status, PurchaseStatus::Rejected);

        pipeline
            .ledger
            .release_rejected_purchase(&rejected)
            .await
            .unwrap();
        // Replay is harmless
        let entry = pipeline
            .ledger
            .release_rejected_purchase(&rejected)
            .await
            .unwrap();
        assert!(!entry.is_open());

        let mut flipped = rejected.clone();
        flipped.status = PurchaseStatus::Approved;
        flipped.approved_quantity = Some(dec("400"));
        let result = pipeline.ledger.apply_approved_purchase(&flipped).await;
        assert!(matches!(result, Err(AppError::UnknownRequest(_))));
        assert_eq!(pipeline.stock_of("beans").await, dec("1000"));
    }

    #[tokio::test]
    async fn test_seeded_threshold_defaults_to_tenth_of_par() {
        let pipeline = Pipeline::with_options(PipelineOptions {
            seed: vec![StockSeed::new("milk", 500, "ml")],
            ..Default::default()
        })
        .await;
        let stock = pipeline.ledger.stock().await.unwrap();
        assert_eq!(stock[0].reorder_threshold, dec("50"));
        assert_eq!(stock[0].par_level, dec("500"));
    }
}
