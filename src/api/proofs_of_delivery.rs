use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::params::{self, QueryPairs};
use super::{AppState, AuthenticatedUser};
use crate::domain::audit::AuditLogFilter;
use crate::domain::proof_of_delivery::UpdateProofOfDelivery;
use crate::error::FulfillmentError;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/proofsOfDelivery", web::get().to(search_pods))
        .route("/proofsOfDelivery/{id}", web::get().to(get_pod))
        .route("/proofsOfDelivery/{id}", web::put().to(update_pod))
        .route("/proofsOfDelivery/{id}/auditLog", web::get().to(pod_audit_log));
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditLogQuery {
    author: Option<Uuid>,
    changed_property_name: Option<String>,
}

async fn search_pods(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<QueryPairs>,
) -> Result<HttpResponse, FulfillmentError> {
    let shipment_id = params::optional_uuid(&query, "shipmentId")?;
    let order_id = params::optional_uuid(&query, "orderId")?;
    let pageable = params::pageable(&query)?;

    let page = state.pods.search(user.id, shipment_id, order_id, pageable).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn get_pod(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, FulfillmentError> {
    let pod = state.pods.get(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(pod))
}

async fn update_pod(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateProofOfDelivery>,
) -> Result<HttpResponse, FulfillmentError> {
    let pod = state.pods.update(user.id, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(pod))
}

async fn pod_audit_log(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<AuditLogQuery>,
) -> Result<HttpResponse, FulfillmentError> {
    let query = query.into_inner();
    let filter = AuditLogFilter {
        author_id: query.author,
        changed_property: query.changed_property_name,
    };

    let entries = state.pods.audit_log(user.id, path.into_inner(), &filter).await?;
    Ok(HttpResponse::Ok().json(entries))
}
