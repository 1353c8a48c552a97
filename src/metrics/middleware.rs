use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::Instant;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpResponse};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use super::Metrics;
use crate::error::{AppError, ErrorPayload};

// ============================================================================
// Request Instrumentation Middleware
// ============================================================================
//
// Wraps every request to:
// - assign a request id (incoming X-Request-ID or a fresh UUID) that is
//   visible to handlers through `current_request_id()`
// - record request count/latency metrics per route template
// - log one structured line per completed request
// - render `AppError` responses as the uniform error payload, including the
//   request path
//
// ============================================================================

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Request id of the request currently being handled, if any
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

pub struct RequestInstrumentation {
    metrics: Arc<Metrics>,
}

impl RequestInstrumentation {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestInstrumentation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestInstrumentationService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestInstrumentationService {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestInstrumentationService<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> Service<ServiceRequest> for RequestInstrumentationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let method = req.method().to_string();
        let metrics = self.metrics.clone();

        let fut = self.service.call(req);

        Box::pin(REQUEST_ID.scope(request_id.clone(), async move {
            let res = fut.await?;

            let status = res.status();
            let path = res.request().path().to_string();
            let route = res
                .request()
                .match_pattern()
                .unwrap_or_else(|| "unmatched".to_string());
            let elapsed = started.elapsed();

            metrics.record_http_request(&method, &route, status.as_u16(), elapsed.as_secs_f64());

            tracing::info!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = elapsed.as_millis() as u64,
                request_id = %request_id,
                "request completed"
            );

            let payload = res
                .response()
                .error()
                .and_then(|e| e.as_error::<AppError>())
                .map(|e| ErrorPayload::from_error(e, &path));

            let mut res = match payload {
                Some(payload) => {
                    let rebuilt = HttpResponse::build(status).json(payload);
                    res.into_response(rebuilt).map_into_right_body()
                }
                None => res.map_into_left_body(),
            };

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            Ok(res)
        }))
    }
}
