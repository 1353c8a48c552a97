use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Principal;
use crate::domain::order::OrderStatus;
use crate::error::AppResult;
use crate::service::{OrderItemRequest, PlaceOrder};
use crate::state::AppState;
use crate::store::PageRequest;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/orders", web::post().to(create))
        .route("/orders", web::get().to(list))
        .route("/orders/{id}", web::get().to(get))
        .route("/orders/{id}/items", web::post().to(add_item))
        .route("/orders/{id}/confirm", web::post().to(confirm))
        .route("/orders/{id}/status", web::patch().to(change_status))
        .route("/orders/{id}/cancel", web::post().to(cancel));
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    status: Option<OrderStatus>,
    page: Option<u32>,
    size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChangeStatus {
    status: OrderStatus,
}

#[derive(Debug, Default, Deserialize, Validate)]
struct CancelOrder {
    #[validate(length(max = 500, message = "reason is limited to 500 characters"))]
    reason: Option<String>,
}

async fn create(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<PlaceOrder>,
) -> AppResult<HttpResponse> {
    let order = state.orders.create(&principal, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

async fn list(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<OrderQuery>,
) -> AppResult<HttpResponse> {
    let page = PageRequest::new(query.page, query.size);
    let orders = state.orders.list(&principal, query.status, page).await?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn get(state: web::Data<AppState>, principal: Principal, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let order = state.orders.get(&principal, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn add_item(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<OrderItemRequest>,
) -> AppResult<HttpResponse> {
    let order = state
        .orders
        .add_item(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn confirm(state: web::Data<AppState>, principal: Principal, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let order = state.orders.confirm(&principal, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn change_status(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<ChangeStatus>,
) -> AppResult<HttpResponse> {
    let order = state
        .orders
        .change_status(&principal, path.into_inner(), body.status)
        .await?;
    Ok(HttpResponse::Ok().json(order))
}

/// The body is optional; `{"reason": "..."}` records why
async fn cancel(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: Option<web::Json<CancelOrder>>,
) -> AppResult<HttpResponse> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    request.validate()?;

    let order = state
        .orders
        .cancel(&principal, path.into_inner(), request.reason)
        .await?;
    Ok(HttpResponse::Ok().json(order))
}
