//! Client for the Production Planner

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::ProductionBatch;

use super::ServiceEndpoint;
use crate::error::AppResult;
use crate::services::ProductionService;

#[async_trait]
pub trait KitchenClient: Send + Sync {
    /// The planned batch for a production date
    async fn batch(&self, production_date: NaiveDate) -> AppResult<ProductionBatch>;
}

#[derive(Clone)]
pub struct HttpKitchenClient {
    endpoint: ServiceEndpoint,
}

impl HttpKitchenClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("kitchen", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl KitchenClient for HttpKitchenClient {
    async fn batch(&self, production_date: NaiveDate) -> AppResult<ProductionBatch> {
        self.endpoint
            .get_json("/batch", &[("date", production_date.to_string())])
            .await
    }
}

#[derive(Clone)]
pub struct LocalKitchenClient {
    service: ProductionService,
}

impl LocalKitchenClient {
    pub fn new(service: ProductionService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl KitchenClient for LocalKitchenClient {
    async fn batch(&self, production_date: NaiveDate) -> AppResult<ProductionBatch> {
        self.service.get_batch(production_date).await
    }
}
