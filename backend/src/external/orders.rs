//! Client for the Order Aggregator

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::WeeklyAggregate;

use super::ServiceEndpoint;
use crate::error::AppResult;
use crate::services::OrderService;

#[async_trait]
pub trait OrdersClient: Send + Sync {
    async fn weekly_aggregate(&self, week_start: NaiveDate) -> AppResult<WeeklyAggregate>;
}

#[derive(Clone)]
pub struct HttpOrdersClient {
    endpoint: ServiceEndpoint,
}

impl HttpOrdersClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("orders", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl OrdersClient for HttpOrdersClient {
    async fn weekly_aggregate(&self, week_start: NaiveDate) -> AppResult<WeeklyAggregate> {
        self.endpoint
            .get_json("/weekly-order", &[("week_start", week_start.to_string())])
            .await
    }
}

/// In-process client for when the Order Aggregator runs in this binary
#[derive(Clone)]
pub struct LocalOrdersClient {
    service: OrderService,
}

impl LocalOrdersClient {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl OrdersClient for LocalOrdersClient {
    async fn weekly_aggregate(&self, week_start: NaiveDate) -> AppResult<WeeklyAggregate> {
        self.service.get_weekly_aggregate(week_start).await
    }
}
