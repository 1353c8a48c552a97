// ============================================================================
// HTTP API - actix-web routes under /api, plus /health and /metrics
// ============================================================================
//
// Handlers are thin: extract, call one service method, wrap the result.
// Failures are `AppError`s; the instrumentation middleware turns them into the
// JSON error payload with the request path filled in.
//
// ============================================================================

mod auth;
mod catalog;
mod customers;
mod orders;
mod reports;
mod system;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::error::AppError;
use crate::metrics::metrics_handler;
use crate::store::PageRequest;

/// `?page=&size=` for paginated listings
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl From<&PageQuery> for PageRequest {
    fn from(query: &PageQuery) -> Self {
        PageRequest::new(query.page, query.size)
    }
}

async fn unknown_route(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::not_found("Route", req.path()))
}

/// Malformed bodies, queries and path segments become validation errors
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(256 * 1024)
            .error_handler(|err, _| AppError::validation(format!("Invalid request body: {err}")).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::validation(format!("Invalid query string: {err}")).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| AppError::validation(format!("Invalid path parameter: {err}")).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_configs(cfg);

    cfg.service(
        web::scope("/api")
            .configure(auth::routes)
            .configure(customers::routes)
            .configure(catalog::routes)
            .configure(orders::routes)
            .configure(reports::routes),
    )
    .route("/health", web::get().to(system::health))
    .route("/metrics", web::get().to(metrics_handler))
    .default_service(web::to(unknown_route));
}
