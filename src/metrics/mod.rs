mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGaugeVec, Opts, Registry,
};

use crate::utils::CircuitState;

pub use server::{health_handler, metrics_handler};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Order creation, status transitions and transfer retries
// - Proof of delivery updates and confirmations
// - Permission denials per right
// - Outbound call latency and failures per collaborator
// - Circuit breaker state per collaborator
//
// Scraped from GET /metrics on the API server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Orders
    pub orders_created: IntCounter,
    pub order_status_transitions: IntCounterVec,
    pub order_retries: IntCounterVec,

    // Proofs of delivery
    pub pod_updates: IntCounterVec,

    // Authorization
    pub permission_denials: IntCounterVec,

    // Outbound collaborators
    pub external_call_duration: HistogramVec,
    pub external_call_failures: IntCounterVec,
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status changes"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_status_transitions.clone()))?;

        let order_retries = IntCounterVec::new(
            Opts::new("order_retries_total", "Order transfer retries by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(order_retries.clone()))?;

        let pod_updates = IntCounterVec::new(
            Opts::new("pod_updates_total", "Proof of delivery updates by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(pod_updates.clone()))?;

        let permission_denials = IntCounterVec::new(
            Opts::new("permission_denials_total", "Requests denied for a missing right"),
            &["right"],
        )?;
        registry.register(Box::new(permission_denials.clone()))?;

        let external_call_duration = HistogramVec::new(
            HistogramOpts::new("external_call_duration_seconds", "Outbound call duration")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["service"],
        )?;
        registry.register(Box::new(external_call_duration.clone()))?;

        let external_call_failures = IntCounterVec::new(
            Opts::new("external_call_failures_total", "Failed outbound calls"),
            &["service"],
        )?;
        registry.register(Box::new(external_call_failures.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)"),
            &["service"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_status_transitions,
            order_retries,
            pod_updates,
            permission_denials,
            external_call_duration,
            external_call_failures,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_status_transition(&self, from: &str, to: &str) {
        self.order_status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_retry(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.order_retries.with_label_values(&[outcome]).inc();
    }

    /// `kind` is "update" or "confirm".
    pub fn record_pod_update(&self, kind: &str) {
        self.pod_updates.with_label_values(&[kind]).inc();
    }

    pub fn record_permission_denial(&self, right: &str) {
        self.permission_denials.with_label_values(&[right]).inc();
    }

    pub fn record_external_call(&self, service: &str, duration_secs: f64, success: bool) {
        self.external_call_duration.with_label_values(&[service]).observe(duration_secs);
        if !success {
            self.external_call_failures.with_label_values(&[service]).inc();
        }
    }

    pub fn set_circuit_breaker_state(&self, service: &str, state: CircuitState) {
        self.circuit_breaker_state.with_label_values(&[service]).set(state.gauge_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_status_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_status_transition("TRANSFER_FAILED", "IN_ROUTE");
        metrics.record_status_transition("SHIPPED", "RECEIVED");
        metrics.record_status_transition("SHIPPED", "RECEIVED");

        let gathered = metrics.registry.gather();
        let transitions = gathered.iter().find(|m| m.name() == "order_status_transitions_total").unwrap();
        assert_eq!(transitions.metric.len(), 2);
    }

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry(false);

        let gathered = metrics.registry.gather();
        let retries = gathered.iter().find(|m| m.name() == "order_retries_total").unwrap();
        assert_eq!(retries.metric[0].counter.value, Some(1.0));
    }

    #[test]
    fn test_failed_external_call_is_counted() {
        let metrics = Metrics::new().unwrap();
        metrics.record_external_call("notification", 0.2, true);
        metrics.record_external_call("notification", 0.4, false);

        let gathered = metrics.registry.gather();
        let failures = gathered.iter().find(|m| m.name() == "external_call_failures_total").unwrap();
        assert_eq!(failures.metric[0].counter.value, Some(1.0));
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.set_circuit_breaker_state("reference-data", CircuitState::Closed);
        metrics.set_circuit_breaker_state("reference-data", CircuitState::HalfOpen);

        let gathered = metrics.registry.gather();
        let state = gathered.iter().find(|m| m.name() == "circuit_breaker_state").unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(2.0));
    }
}
