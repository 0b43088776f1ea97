//! JSON-over-HTTP plumbing shared by the service clients

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult, ErrorResponse};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Base URL and HTTP client for one remote component
#[derive(Clone)]
pub struct ServiceEndpoint {
    client: Client,
    service: &'static str,
    base_url: String,
}

impl ServiceEndpoint {
    pub fn new(service: &'static str, base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client for {}: {}", service, e)))?;
        Ok(Self {
            client,
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<T, Q>(&self, path: &str, query: &Q) -> AppResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.client.get(self.url(path)).query(query);
        self.send(request).await
    }

    /// POST a JSON body. The idempotency key lets the receiver drop replays.
    pub async fn post_json<T, B>(&self, path: &str, body: &B, idempotency_key: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .client
            .post(self.url(path))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            return response.json::<T>().await.map_err(|e| {
                AppError::Internal(format!("Failed to parse {} response: {}", self.service, e))
            });
        }

        Err(self.error_from_response(response).await)
    }

    fn transport_error(&self, err: reqwest::Error) -> AppError {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            AppError::Unavailable(format!("{} unreachable: {}", self.service, err))
        } else {
            AppError::Internal(format!("{} request failed: {}", self.service, err))
        }
    }

    async fn error_from_response(&self, response: Response) -> AppError {
        let status = response.status();
        let body = response.json::<ErrorResponse>().await;

        // Every 5xx is treated as transient, whatever the body says
        if status.is_server_error() {
            let reason = match body {
                Ok(body) => format!("{} {}: {}", status, body.error.code, body.error.message),
                Err(_) => status.to_string(),
            };
            return AppError::Unavailable(format!("{} returned {}", self.service, reason));
        }

        match body {
            Ok(body) => AppError::from_downstream(self.service, status.as_u16(), body.error),
            Err(e) => AppError::Internal(format!(
                "{} returned {} with an unreadable body: {}",
                self.service, status, e
            )),
        }
    }
}
