use actix_web::{web, HttpResponse};

use crate::auth::Principal;
use crate::error::AppResult;
use crate::service::ReportQuery;
use crate::state::AppState;

/// `?restaurantId=&from=&to=` on every report, `&limit=` on top products.
/// `from`/`to` are RFC 3339 timestamps.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/reports/sales", web::get().to(sales))
        .route("/reports/orders-by-status", web::get().to(orders_by_status))
        .route("/reports/top-products", web::get().to(top_products));
}

async fn sales(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    let summary = state.reports.sales(&principal, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

async fn orders_by_status(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    let counts = state.reports.orders_by_status(&principal, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(counts))
}

async fn top_products(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    let products = state.reports.top_products(&principal, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(products))
}
