use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use super::params::{self, QueryPairs};
use super::{AppState, AuthenticatedUser};
use crate::domain::order::CreateOrder;
use crate::error::FulfillmentError;

// Literal paths are registered before /orders/{id}.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/orders", web::get().to(list_orders))
        .route("/orders", web::post().to(create_order))
        .route("/orders/batch", web::post().to(create_orders))
        .route("/orders/search", web::get().to(search_orders))
        .route("/orders/requestingFacilities", web::get().to(requesting_facilities))
        .route("/orders/{id}", web::get().to(get_order))
        .route("/orders/{id}/retry", web::get().to(retry_order))
        .route("/orders/{id}/proofOfDeliveries", web::get().to(order_proof_of_delivery));
}

async fn list_orders(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse, FulfillmentError> {
    let orders = state.orders.list(user.id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn create_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<CreateOrder>,
) -> Result<HttpResponse, FulfillmentError> {
    let order = state.orders.create(user.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

async fn create_orders(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<Vec<CreateOrder>>,
) -> Result<HttpResponse, FulfillmentError> {
    let orders = state.orders.create_batch(user.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(orders))
}

async fn search_orders(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<QueryPairs>,
) -> Result<HttpResponse, FulfillmentError> {
    let (search, pageable) = params::order_search(&query)?;
    let page = state.orders.search(user.id, &search, pageable).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn requesting_facilities(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
    query: web::Query<QueryPairs>,
) -> Result<HttpResponse, FulfillmentError> {
    let supplying_facility_id = match params::optional_uuid(&query, "supplyingFacility")? {
        Some(id) => Some(id),
        None => params::optional_uuid(&query, "supplyingFacilityId")?,
    };
    let facilities = state.orders.requesting_facilities(supplying_facility_id).await?;
    Ok(HttpResponse::Ok().json(facilities))
}

async fn get_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, FulfillmentError> {
    let order = state.orders.get(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn retry_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, FulfillmentError> {
    let result = state.orders.retry(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "result": result })))
}

async fn order_proof_of_delivery(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, FulfillmentError> {
    let pod = state.pods.find_for_order(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(pod))
}
