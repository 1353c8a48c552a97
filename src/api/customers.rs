use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::PageQuery;
use crate::auth::Principal;
use crate::error::AppResult;
use crate::service::UpdateCustomer;
use crate::state::AppState;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/customers", web::get().to(list))
        .route("/customers/{id}", web::get().to(get))
        .route("/customers/{id}", web::put().to(update))
        .route("/customers/{id}", web::delete().to(deactivate));
}

async fn list(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = state.customers.list(&principal, (&*query).into()).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn get(state: web::Data<AppState>, principal: Principal, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let customer = state.customers.get(&principal, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(customer))
}

async fn update(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCustomer>,
) -> AppResult<HttpResponse> {
    let customer = state
        .customers
        .update(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(customer))
}

async fn deactivate(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state.customers.deactivate(&principal, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
