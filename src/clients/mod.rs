// ============================================================================
// Outbound collaborators
// ============================================================================
//
// Each collaborator is a trait so workflows can be driven by fakes in tests.
// The HTTP implementations share `ServiceClient`: one reqwest client, one
// circuit breaker and latency/failure metrics per service.
//
// ============================================================================

mod notification;
mod reference_data;
mod stock_management;
mod transfer;

pub use notification::HttpNotificationSender;
pub use reference_data::HttpRightsAuthority;
pub use stock_management::HttpStockEventSubmitter;
pub use transfer::{DisabledOrderTransfer, HttpOrderTransfer};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::order::Order;
use crate::domain::proof_of_delivery::{ProofOfDelivery, StockEvent};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{service} request failed: {source}")]
    Http {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} responded with {status}")]
    Status { service: String, status: u16 },

    #[error("{0} is unavailable (circuit open)")]
    CircuitOpen(String),
}

impl ClientError {
    pub fn service(&self) -> &str {
        match self {
            ClientError::Http { service, .. }
            | ClientError::Status { service, .. }
            | ClientError::CircuitOpen(service) => service,
        }
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

#[async_trait]
pub trait StockEventSubmitter: Send + Sync {
    async fn submit(&self, event: &StockEvent) -> Result<(), ClientError>;
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn pod_confirmed(&self, pod: &ProofOfDelivery) -> Result<(), ClientError>;
}

/// Hands an order to the supplying facility's system. `Ok(false)` means the
/// transfer was not attempted; transport failures come back as `Err`.
#[async_trait]
pub trait OrderTransfer: Send + Sync {
    async fn transfer(&self, order: &Order) -> Result<bool, ClientError>;
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

#[derive(Clone)]
pub struct ServiceClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl ServiceClient {
    pub fn new(
        name: &str,
        base_url: &str,
        timeout: Duration,
        breaker_config: CircuitBreakerConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Http { service: name.to_string(), source })?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            breaker: CircuitBreaker::new(name, breaker_config).with_metrics(metrics.clone()),
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let request = self.http.get(self.url(path)).query(query);
        self.execute(request).await?
            .json::<T>()
            .await
            .map_err(|source| self.http_error(source))
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ClientError> {
        let request = self.http.post(self.url(path)).json(body);
        self.execute(request).await.map(|_| ())
    }

    /// Only transport errors and 5xx responses count against the breaker.
    /// A 4xx is the caller's problem and leaves the service's health alone.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let started = Instant::now();

        let result = self
            .breaker
            .call(async {
                let response = request.send().await.map_err(|source| self.http_error(source))?;
                if response.status().is_server_error() {
                    return Err(self.status_error(&response));
                }
                Ok::<_, ClientError>(response)
            })
            .await;

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(response) if response.status().is_success() => {
                self.metrics.record_external_call(&self.name, elapsed, true);
                Ok(response)
            }
            Ok(response) => {
                self.metrics.record_external_call(&self.name, elapsed, false);
                let error = self.status_error(&response);
                tracing::debug!(service = %self.name, error = %error, "Outbound call rejected");
                Err(error)
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                self.metrics.record_external_call(&self.name, elapsed, false);
                Err(ClientError::CircuitOpen(self.name.clone()))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                self.metrics.record_external_call(&self.name, elapsed, false);
                tracing::warn!(service = %self.name, error = %e, "Outbound call failed");
                Err(e)
            }
        }
    }

    fn status_error(&self, response: &reqwest::Response) -> ClientError {
        ClientError::Status { service: self.name.clone(), status: response.status().as_u16() }
    }

    fn http_error(&self, source: reqwest::Error) -> ClientError {
        ClientError::Http { service: self.name.clone(), source }
    }
}
