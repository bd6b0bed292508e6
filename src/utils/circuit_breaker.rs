use std::sync::Arc;
use tokio::sync::Mutex;
use std::time::{Duration, Instant};

use crate::metrics::Metrics;

// ============================================================================
// Circuit Breaker for outbound service calls
// ============================================================================
//
// One breaker per collaborator (reference data, stock management, ...).
// After `failure_threshold` consecutive failures the breaker opens and calls
// fail immediately until `timeout` has passed. Then it goes HalfOpen and lets
// one trial call through at a time, rejecting the rest. `success_threshold`
// trial successes close it again; a trial failure reopens it. A trial that
// never reports back (its future was dropped) stops counting as in flight
// after `timeout`.
//
// States:
// - Closed: requests pass through
// - Open: requests blocked
// - HalfOpen: testing for recovery
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0=Closed, 1=Open, 2=HalfOpen.
    pub fn gauge_value(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening
    pub failure_threshold: u32,
    /// Time to stay open before testing again
    pub timeout: Duration,
    /// Trial successes needed to close from half-open
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

impl BreakerState {
    fn trial_in_flight(&self, timeout: Duration) -> bool {
        self.trial_started.map_or(false, |at| at.elapsed() < timeout)
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    service: String,
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
    metrics: Option<Arc<Metrics>>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                trial_started: None,
            })),
            config,
            metrics: None,
        }
    }

    /// Report state changes to the `circuit_breaker_state` gauge.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.set_circuit_breaker_state(&self.service, CircuitState::Closed);
        self.metrics = Some(metrics);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Run `operation` unless the breaker is open.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let trial = {
            let mut state = self.state.lock().await;

            if state.state == CircuitState::Open {
                let elapsed = state.opened_at.map_or(true, |at| at.elapsed() >= self.config.timeout);
                if !elapsed {
                    return Err(CircuitBreakerError::CircuitOpen);
                }
                self.transition(&mut state, CircuitState::HalfOpen);
                state.success_count = 0;
            }

            if state.state == CircuitState::HalfOpen {
                if state.trial_in_flight(self.config.timeout) {
                    return Err(CircuitBreakerError::CircuitOpen);
                }
                state.trial_started = Some(Instant::now());
                true
            } else {
                false
            }
        };

        match operation.await {
            Ok(result) => {
                self.record_success(trial).await;
                Ok(result)
            }
            Err(err) => {
                self.record_failure(trial).await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn record_success(&self, trial: bool) {
        let mut state = self.state.lock().await;
        if trial {
            state.trial_started = None;
        }

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    self.transition(&mut state, CircuitState::Closed);
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {
                tracing::warn!(service = %self.service, "Success recorded while circuit is open");
            }
        }
    }

    async fn record_failure(&self, trial: bool) {
        let mut state = self.state.lock().await;
        if trial {
            state.trial_started = None;
        }

        state.failure_count += 1;

        match state.state {
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                state.opened_at = Some(Instant::now());
                self.transition(&mut state, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                state.opened_at = Some(Instant::now());
                state.success_count = 0;
                self.transition(&mut state, CircuitState::Open);
            }
            _ => {}
        }
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                service = %self.service,
                failures = state.failure_count,
                "🔌 Circuit breaker opening"
            ),
            _ => tracing::info!(
                service = %self.service,
                from = state.state.as_str(),
                to = to.as_str(),
                "Circuit breaker state change"
            ),
        }

        state.state = to;
        if let Some(metrics) = &self.metrics {
            metrics.set_circuit_breaker_state(&self.service, to);
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    pub async fn get_failure_count(&self) -> u32 {
        self.state.lock().await.failure_count
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Operation failed: {0}")]
    OperationFailed(E),
}
