use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::domain::catalog::SelectionError;
use crate::domain::order::OrderError;
use crate::store::StoreError;

// ============================================================================
// Application Errors - translated once, at the HTTP boundary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    /// Same failure for unknown email, wrong password or disabled account
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Validation failure pinned to one request field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: format!("{field}: {message}"),
            details: vec![FieldError {
                field: field.to_string(),
                message,
            }],
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        AppError::AccessDenied(message.into())
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> String {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR".to_string(),
            AppError::InvalidCredentials => "AUTH_INVALID_CREDENTIALS".to_string(),
            AppError::Unauthenticated(_) => "AUTH_INVALID_TOKEN".to_string(),
            AppError::AccessDenied(_) => "ACCESS_DENIED".to_string(),
            AppError::NotFound { entity, .. } => {
                format!("{}_NOT_FOUND", entity.to_uppercase().replace(' ', "_"))
            }
            AppError::Conflict { code, .. } => (*code).to_string(),
            AppError::Internal(_) => "INTERNAL_ERROR".to_string(),
        }
    }

    /// Message safe to show to clients; internal causes are never exposed
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Error Payload
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ErrorPayload {
    pub fn from_error(error: &AppError, path: &str) -> Self {
        let status = error.status_code();
        let details = match error {
            AppError::Validation { details, .. } if !details.is_empty() => Some(details.clone()),
            _ => None,
        };

        Self {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: error.public_message(),
            path: path.to_string(),
            error_code: error.error_code(),
            details,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // `path` is filled in by the instrumentation middleware, which sees the request
    fn error_response(&self) -> HttpResponse {
        if let AppError::Internal(cause) = self {
            tracing::error!(error = ?cause, "Unhandled internal error");
        }
        HttpResponse::build(self.status_code()).json(ErrorPayload::from_error(self, ""))
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidQuantity(_) => AppError::Validation {
                message: err.to_string(),
                details: vec![FieldError {
                    field: "quantity".to_string(),
                    message: err.to_string(),
                }],
            },
            OrderError::AmountOutOfRange => AppError::invalid_field("items", err.to_string()),
            other => AppError::conflict(other.code(), other.to_string()),
        }
    }
}

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Pricing(err) => err.into(),
            other => AppError::validation(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => {
                AppError::conflict("DUPLICATE_RESOURCE", format!("{what} already exists"))
            }
            StoreError::VersionConflict { entity, id } => AppError::conflict(
                match entity {
                    "Order" => "ORDER_CONCURRENT_MODIFICATION",
                    _ => "CONCURRENT_MODIFICATION",
                },
                format!("{entity} {id} was modified concurrently, reload and retry"),
            ),
            StoreError::Database(e) => AppError::Internal(e.into()),
            StoreError::Corrupt(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        flatten_validation_errors(&errors, "", &mut details);
        details.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::Validation {
            message: "Request validation failed".to_string(),
            details,
        }
    }
}

fn flatten_validation_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", error.code));
                    out.push(FieldError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_validation_errors(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_validation_errors(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "must be a valid email"))]
        email: String,
        #[validate(length(min = 8, message = "must have at least 8 characters"))]
        password: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::access_denied("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("Order", 1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("X", "y").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_suppressed() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.5"));
        let payload = ErrorPayload::from_error(&err, "/api/orders");
        assert_eq!(payload.message, "An unexpected error occurred");
        assert_eq!(payload.error_code, "INTERNAL_ERROR");
        assert_eq!(payload.error, "Internal Server Error");
    }

    #[test]
    fn test_payload_shape() {
        let err = AppError::not_found("Order", "abc");
        let json = serde_json::to_value(ErrorPayload::from_error(&err, "/api/orders/abc")).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["error"], "Not Found");
        assert_eq!(json["message"], "Order not found: abc");
        assert_eq!(json["path"], "/api/orders/abc");
        assert_eq!(json["errorCode"], "ORDER_NOT_FOUND");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_validation_errors_carry_field_details() {
        let errors = Signup {
            email: "nope".to_string(),
            password: "short".to_string(),
        }
        .validate()
        .unwrap_err();

        let err = AppError::from(errors);
        let payload = ErrorPayload::from_error(&err, "/api/auth/register");
        let details = payload.details.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].field, "email");
        assert_eq!(details[0].message, "must be a valid email");
        assert_eq!(details[1].field, "password");
    }

    #[test]
    fn test_order_errors_map_to_conflict() {
        let err: AppError = OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "ORDER_INVALID_TRANSITION");
        assert_eq!(err.to_string(), "Invalid status transition from DELIVERED to CANCELLED");
    }

    #[test]
    fn test_amount_out_of_range_is_a_field_validation_error() {
        let err: AppError = SelectionError::Pricing(OrderError::AmountOutOfRange).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let payload = ErrorPayload::from_error(&err, "/api/orders");
        assert_eq!(payload.details.unwrap()[0].field, "items");
    }
}
