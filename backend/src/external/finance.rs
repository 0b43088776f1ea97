//! Client for the Procurement Approver

use std::time::Duration;

use async_trait::async_trait;
use shared::{PurchaseRequest, PurchaseStatus};

use super::ServiceEndpoint;
use crate::error::AppResult;
use crate::services::ProcurementService;

#[async_trait]
pub trait FinanceClient: Send + Sync {
    /// Hand a pending request to finance. Replays return the stored request.
    async fn submit(&self, request: &PurchaseRequest) -> AppResult<PurchaseRequest>;

    async fn history(&self, status: Option<PurchaseStatus>) -> AppResult<Vec<PurchaseRequest>>;
}

#[derive(Clone)]
pub struct HttpFinanceClient {
    endpoint: ServiceEndpoint,
}

impl HttpFinanceClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("finance", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl FinanceClient for HttpFinanceClient {
    async fn submit(&self, request: &PurchaseRequest) -> AppResult<PurchaseRequest> {
        self.endpoint
            .post_json("/finance/submit", request, &request.id.to_string())
            .await
    }

    async fn history(&self, status: Option<PurchaseStatus>) -> AppResult<Vec<PurchaseRequest>> {
        let query: Vec<(&str, &str)> = status.iter().map(|s| ("status", s.as_str())).collect();
        self.endpoint.get_json("/finance/history", &query).await
    }
}

#[derive(Clone)]
pub struct LocalFinanceClient {
    service: ProcurementService,
}

impl LocalFinanceClient {
    pub fn new(service: ProcurementService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl FinanceClient for LocalFinanceClient {
    async fn submit(&self, request: &PurchaseRequest) -> AppResult<PurchaseRequest> {
        self.service.submit(request.clone()).await
    }

    async fn history(&self, status: Option<PurchaseStatus>) -> AppResult<Vec<PurchaseRequest>> {
        self.service.list_history(status).await
    }
}
