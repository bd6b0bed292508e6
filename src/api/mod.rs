// ============================================================================
// HTTP API (actix-web)
// ============================================================================
//
// All business routes live under /api. Handlers authenticate the caller,
// parse input and delegate to the workflows; every failure is rendered by
// `FulfillmentError`'s `ResponseError` impl.
//
// ============================================================================

mod auth;
mod orders;
mod params;
mod proofs_of_delivery;

pub use auth::{AuthenticatedUser, USER_ID_HEADER};

use std::sync::Arc;

use actix_web::web;

use crate::error::FulfillmentError;
use crate::workflow::{OrderWorkflow, ProofOfDeliveryWorkflow};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderWorkflow>,
    pub pods: Arc<ProofOfDeliveryWorkflow>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                tracing::debug!(error = %err, "Rejected request body");
                FulfillmentError::Validation { key: "invalidValue", field: "body".to_string() }.into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                tracing::debug!(error = %err, "Rejected path parameter");
                FulfillmentError::Validation { key: "invalidValue", field: "id".to_string() }.into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                tracing::debug!(error = %err, "Rejected query string");
                FulfillmentError::Validation { key: "invalidValue", field: "query".to_string() }.into()
            }))
            .configure(orders::routes)
            .configure(proofs_of_delivery::routes),
    );
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};

    use super::*;
    use crate::metrics;
    use crate::test_support::Harness;

    #[actix_web::test]
    async fn test_health_and_metrics_endpoints() {
        let harness = Harness::new();
        harness.metrics.record_order_created();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(harness.metrics.clone()))
                .route("/health", web::get().to(metrics::health_handler))
                .route("/metrics", web::get().to(metrics::metrics_handler))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(resp.status().is_success());

        let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("orders_created_total 1"));
    }
}
