use actix_web::{web, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::health::{GetSystemHealth, HealthReport};
use crate::state::AppState;

/// GET /health - latest monitor snapshot; 503 while any component is DOWN
pub async fn health(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let health = state
        .monitor
        .send(GetSystemHealth)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Health monitor unavailable: {e}")))?;

    let report = HealthReport::from(&health);
    let response = if health.overall_status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    };
    Ok(response)
}
