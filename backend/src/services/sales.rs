//! Sales Scorer: weekly revenue against approved procurement cost

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use shared::{compute_score, validate_week_start, AuditEntry, Component, SalesScore};

use crate::error::{AppError, AppResult};
use crate::external::{with_retry, FinanceClient, OrdersClient, RetryConfig};
use crate::services::AuditLog;
use crate::store::SalesStore;

const SALES_SCORE: &str = "sales_score";

#[derive(Clone)]
pub struct SalesService {
    store: Arc<dyn SalesStore>,
    orders: Arc<dyn OrdersClient>,
    finance: Arc<dyn FinanceClient>,
    retry: RetryConfig,
    audit: AuditLog,
}

impl SalesService {
    pub fn new(
        store: Arc<dyn SalesStore>,
        orders: Arc<dyn OrdersClient>,
        finance: Arc<dyn FinanceClient>,
        retry: RetryConfig,
        audit: AuditLog,
    ) -> Self {
        Self {
            store,
            orders,
            finance,
            retry,
            audit,
        }
    }

    /// Score the week and store the result, replacing any earlier score
    pub async fn score_week(&self, week_start: NaiveDate) -> AppResult<SalesScore> {
        let failure =
            || AuditEntry::failure(Component::Sales, SALES_SCORE, week_start, "score_week");

        if let Err(err) = validate_week_start(week_start) {
            return Err(self.audit.fail(failure(), err.into()).await);
        }

        let aggregate = match with_retry(&self.retry, "fetch weekly aggregate", || {
            self.orders.weekly_aggregate(week_start)
        })
        .await
        {
            Ok(aggregate) => aggregate,
            Err(err) => return Err(self.audit.fail(failure(), err).await),
        };

        let requests = match with_retry(&self.retry, "fetch procurement history", || {
            self.finance.history(None)
        })
        .await
        {
            Ok(requests) => requests,
            Err(err) => return Err(self.audit.fail(failure(), err).await),
        };

        let score = match compute_score(&aggregate, &requests, Utc::now()) {
            Ok(score) => score,
            Err(err) => return Err(self.audit.fail(failure(), err.into()).await),
        };
        if let Err(err) = self.store.upsert_score(&score).await {
            return Err(self.audit.fail(failure().with_after(&score), err).await);
        }

        self.audit
            .append(
                AuditEntry::success(Component::Sales, SALES_SCORE, week_start, "score_week")
                    .with_after(&score),
            )
            .await?;

        tracing::info!(
            week_start = %week_start,
            revenue = %score.total_revenue,
            cost = %score.total_procurement_cost,
            margin = %score.margin_percent,
            performance = score.performance.as_str(),
            "Week scored"
        );
        Ok(score)
    }

    /// All scores, oldest week first
    pub async fn get_logs(&self) -> AppResult<Vec<SalesScore>> {
        self.store.list_scores().await
    }

    /// Export rows as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
