use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use serde::Serialize;
use uuid::Uuid;

use super::token::{Claims, TokenIssuer};
use crate::domain::user::Role;
use crate::error::{AppError, AppResult};

/// The authenticated caller, resolved from a verified bearer token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TryFrom<Claims> for Principal {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthenticated("Invalid or expired token".to_string()))?;
        Ok(Self {
            user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

fn bearer_token(req: &HttpRequest) -> AppResult<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Missing bearer token".to_string()))
}

fn principal_from_request(req: &HttpRequest) -> AppResult<Principal> {
    let tokens = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Token issuer is not registered")))?;
    let claims = tokens.verify(bearer_token(req)?)?;
    Principal::try_from(claims)
}

impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(principal_from_request(req))
    }
}
