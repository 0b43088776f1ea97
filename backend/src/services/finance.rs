//! Procurement Approver: prices, decides and settles purchase requests

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    AuditEntry, AuditFilter, BudgetPolicy, Component, CostTable, Decision, PurchaseRequest,
    PurchaseStatus,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{with_retry, InventoryClient, RetryConfig};
use crate::services::{AuditLog, KeyedLocks};
use crate::store::FinanceStore;

const PURCHASE_REQUEST: &str = "purchase_request";

/// Approve/reject call body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionInput {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone)]
pub struct FinancePolicy {
    pub costs: CostTable,
    pub budget: BudgetPolicy,
    pub auto_decide: bool,
}

impl Default for FinancePolicy {
    fn default() -> Self {
        Self {
            costs: CostTable::default(),
            budget: BudgetPolicy::default(),
            auto_decide: false,
        }
    }
}

#[derive(Clone)]
pub struct ProcurementService {
    store: Arc<dyn FinanceStore>,
    inventory: Arc<dyn InventoryClient>,
    policy: Arc<FinancePolicy>,
    retry: RetryConfig,
    locks: KeyedLocks,
    audit: AuditLog,
}

impl ProcurementService {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        inventory: Arc<dyn InventoryClient>,
        policy: FinancePolicy,
        retry: RetryConfig,
        audit: AuditLog,
    ) -> Self {
        Self {
            store,
            inventory,
            policy: Arc::new(policy),
            retry,
            locks: KeyedLocks::new(),
            audit,
        }
    }

    /// Accept a pending request from the inventory ledger. Replays of the
    /// same id return the stored request unchanged.
    pub async fn submit(&self, request: PurchaseRequest) -> AppResult<PurchaseRequest> {
        let key = request.id.to_string();
        let failure = || AuditEntry::failure(Component::Finance, PURCHASE_REQUEST, &key, "submit");

        let stored = {
            let _guard = self.locks.lock(&key).await;

            if let Some(existing) = self.store.get_request(request.id).await? {
                tracing::debug!(request_id = %request.id, "Duplicate submit, returning stored request");
                return Ok(existing);
            }

            let checked = request.validate().map_err(AppError::from).and_then(|_| {
                if request.status == PurchaseStatus::Pending {
                    Ok(())
                } else {
                    Err(AppError::validation("status", "only pending requests can be submitted"))
                }
            });
            if let Err(err) = checked {
                return Err(self.audit.fail(failure().with_after(&request), err).await);
            }

            let mut request = request;
            request.approved_quantity = None;
            request.decided_at = None;
            request.decision_note = None;
            request.stock_synced = false;
            if let Err(err) = request.price(self.policy.costs.unit_cost(&request.ingredient)) {
                return Err(self.audit.fail(failure().with_after(&request), err.into()).await);
            }

            let inserted = match self.store.insert_request(&request).await {
                Ok(inserted) => inserted,
                Err(err) => return Err(self.audit.fail(failure().with_after(&request), err).await),
            };
            if !inserted {
                return match self.store.get_request(request.id).await? {
                    Some(existing) => Ok(existing),
                    None => Err(AppError::Internal(format!(
                        "Purchase request {} vanished during submit",
                        request.id
                    ))),
                };
            }

            self.audit
                .append(
                    AuditEntry::success(Component::Finance, PURCHASE_REQUEST, &key, "submit")
                        .with_after(&request),
                )
                .await?;
            tracing::info!(
                request_id = %request.id,
                ingredient = %request.ingredient,
                origin = request.origin.as_str(),
                estimated_cost = %request.estimated_cost,
                "Purchase request received"
            );
            request
        };

        if !self.policy.auto_decide {
            return Ok(stored);
        }

        let decision = self.policy.budget.evaluate(&stored);
        match self.decide(stored.id, decision).await {
            Ok(decided) => Ok(decided),
            // The decision is recorded; reconcile delivers the callback later
            Err(AppError::Unavailable(msg)) => {
                tracing::warn!(request_id = %stored.id, "Auto-decision not synced: {}", msg);
                self.get_request(stored.id).await
            }
            Err(err) => Err(err),
        }
    }

    /// Budget policy suggestion for a stored request
    pub async fn evaluate(&self, request_id: Uuid) -> AppResult<Decision> {
        let request = self.get_request(request_id).await?;
        Ok(self.policy.budget.evaluate(&request))
    }

    pub async fn get_request(&self, request_id: Uuid) -> AppResult<PurchaseRequest> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase request {}", request_id)))
    }

    /// Approve or reject a pending request, then push the outcome to the
    /// inventory ledger. The decision stays recorded even if that push fails.
    pub async fn decide(&self, request_id: Uuid, decision: Decision) -> AppResult<PurchaseRequest> {
        let key = request_id.to_string();
        let action = match decision {
            Decision::Approve { .. } => "approve",
            Decision::Reject { .. } => "reject",
        };
        let failure = || AuditEntry::failure(Component::Finance, PURCHASE_REQUEST, &key, action);

        let decided = {
            let _guard = self.locks.lock(&key).await;

            let mut request = match self.store.get_request(request_id).await? {
                Some(request) => request,
                None => {
                    let err = AppError::NotFound(format!("Purchase request {}", request_id));
                    return Err(self.audit.fail(failure(), err).await);
                }
            };

            let before = request.clone();
            if let Err(err) = request.apply_decision(&decision, Utc::now()) {
                return Err(self.audit.fail(failure().with_before(&before), err.into()).await);
            }
            if let Err(err) = self.store.update_request(&request).await {
                let entry = failure().with_before(&before).with_after(&request);
                return Err(self.audit.fail(entry, err).await);
            }

            self.audit
                .append(
                    AuditEntry::success(Component::Finance, PURCHASE_REQUEST, &key, action)
                        .with_before(&before)
                        .with_after(&request),
                )
                .await?;
            tracing::info!(
                request_id = %request_id,
                status = %request.status,
                quantity = ?request.approved_quantity,
                "Purchase request decided"
            );
            request
        };

        self.sync_inventory(decided).await
    }

    /// Deliver the decision to the inventory ledger and mark it synced
    async fn sync_inventory(&self, request: PurchaseRequest) -> AppResult<PurchaseRequest> {
        let key = request.id.to_string();

        let result = match request.status {
            PurchaseStatus::Approved => with_retry(&self.retry, "apply approved purchase", || {
                self.inventory.apply_approved_purchase(&request)
            })
            .await
            .map(|_| ()),
            PurchaseStatus::Rejected => with_retry(&self.retry, "release rejected purchase", || {
                self.inventory.release_rejected_purchase(&request)
            })
            .await
            .map(|_| ()),
            PurchaseStatus::Pending => return Ok(request),
        };

        if let Err(err) = result {
            let entry = AuditEntry::failure(
                Component::Finance,
                PURCHASE_REQUEST,
                &key,
                "inventory_callback",
            );
            let err = match err {
                AppError::Unavailable(msg) => AppError::Unavailable(format!(
                    "Decision on {} recorded but inventory not updated: {}",
                    request.id, msg
                )),
                other => other,
            };
            return Err(self.audit.fail(entry, err).await);
        }

        let _guard = self.locks.lock(&key).await;
        let mut synced = self.get_request(request.id).await?;
        if !synced.stock_synced {
            synced.stock_synced = true;
            if let Err(err) = self.store.update_request(&synced).await {
                let entry = AuditEntry::failure(
                    Component::Finance,
                    PURCHASE_REQUEST,
                    &key,
                    "inventory_callback",
                );
                return Err(self.audit.fail(entry, err).await);
            }
            self.audit
                .append(AuditEntry::success(
                    Component::Finance,
                    PURCHASE_REQUEST,
                    &key,
                    "inventory_callback",
                ))
                .await?;
        }
        Ok(synced)
    }

    /// Re-send inventory callbacks for decided requests not yet synced;
    /// returns the requests synced this time
    pub async fn reconcile(&self) -> AppResult<Vec<PurchaseRequest>> {
        let pending: Vec<PurchaseRequest> = self
            .store
            .list_requests(None)
            .await?
            .into_iter()
            .filter(|r| r.status.is_terminal() && !r.stock_synced)
            .collect();

        let mut synced = Vec::new();
        for request in pending {
            let id = request.id;
            match self.sync_inventory(request).await {
                Ok(request) => synced.push(request),
                Err(AppError::AuditUnavailable(msg)) => {
                    return Err(AppError::AuditUnavailable(msg))
                }
                Err(err) => tracing::warn!(request_id = %id, "Reconcile failed: {}", err),
            }
        }
        Ok(synced)
    }

    pub async fn list_history(
        &self,
        status: Option<PurchaseStatus>,
    ) -> AppResult<Vec<PurchaseRequest>> {
        self.store.list_requests(status).await
    }

    /// Finance's own audit entries, oldest first
    pub async fn list_request_log(&self) -> AppResult<Vec<AuditEntry>> {
        self.audit
            .list(&AuditFilter::component(Component::Finance))
            .await
    }
}
