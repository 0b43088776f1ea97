//! Client for the Inventory Ledger

use std::time::Duration;

use async_trait::async_trait;
use shared::{ProcurementLogEntry, PurchaseRequest, StockItem};

use super::ServiceEndpoint;
use crate::error::AppResult;
use crate::services::StockLedger;

#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn stock(&self) -> AppResult<Vec<StockItem>>;

    /// Add an approved request's quantity to stock. Safe to repeat.
    async fn apply_approved_purchase(&self, request: &PurchaseRequest) -> AppResult<StockItem>;

    /// Close the ledger's pending slot for a rejected request. Safe to repeat.
    async fn release_rejected_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> AppResult<ProcurementLogEntry>;
}

#[derive(Clone)]
pub struct HttpInventoryClient {
    endpoint: ServiceEndpoint,
}

impl HttpInventoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("inventory", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn stock(&self) -> AppResult<Vec<StockItem>> {
        let no_query: &[(&str, &str)] = &[];
        self.endpoint.get_json("/stock", no_query).await
    }

    async fn apply_approved_purchase(&self, request: &PurchaseRequest) -> AppResult<StockItem> {
        self.endpoint
            .post_json("/purchase-request/apply", request, &request.id.to_string())
            .await
    }

    async fn release_rejected_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> AppResult<ProcurementLogEntry> {
        self.endpoint
            .post_json("/purchase-request/release", request, &request.id.to_string())
            .await
    }
}

/// In-process client over the ledger itself, so finance never depends on the
/// inventory service that forwards to it
#[derive(Clone)]
pub struct LocalInventoryClient {
    ledger: StockLedger,
}

impl LocalInventoryClient {
    pub fn new(ledger: StockLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl InventoryClient for LocalInventoryClient {
    async fn stock(&self) -> AppResult<Vec<StockItem>> {
        self.ledger.stock().await
    }

    async fn apply_approved_purchase(&self, request: &PurchaseRequest) -> AppResult<StockItem> {
        self.ledger.apply_approved_purchase(request).await
    }

    async fn release_rejected_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> AppResult<ProcurementLogEntry> {
        self.ledger.release_rejected_purchase(request).await
    }
}
