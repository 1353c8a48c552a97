use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::user::{Role, UserAccount};
use crate::error::{AppError, AppResult};

// ============================================================================
// JWT Tokens - HS256 with issuer and fixed TTL
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl_secs,
        }
    }

    pub fn issue(&self, user: &UserAccount) -> AppResult<IssuedToken> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            role: user.role,
            iat: now,
            exp: now + self.ttl_secs,
            iss: self.issuer.clone(),
        };

        let access_token = self.sign(&claims)?;
        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.ttl_secs,
        })
    }

    fn sign(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token generation failed: {e}")))
    }

    /// Signature, expiry and issuer are all checked
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::Unauthenticated("Invalid or expired token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Email;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn user() -> UserAccount {
        UserAccount::new(
            Email::parse("courier@example.com").unwrap(),
            "hash".to_string(),
            Role::Courier,
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = TokenIssuer::new(SECRET, "food-delivery", 3600);
        let account = user();
        let token = issuer.issue(&account).unwrap();

        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);

        let claims = issuer.verify(&token.access_token).unwrap();
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.role, Role::Courier);
        assert_eq!(claims.email, "courier@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let issuer = TokenIssuer::new(SECRET, "food-delivery", 3600);
        let token = issuer.issue(&user()).unwrap().access_token;

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = TokenIssuer::new(SECRET, "food-delivery", 3600)
            .sign(&Claims {
                sub: "someone-else".to_string(),
                email: "x@example.com".to_string(),
                role: Role::Admin,
                iat: 0,
                exp: u64::MAX / 2,
                iss: "food-delivery".to_string(),
            })
            .unwrap();
        // Swap in another payload while keeping the original signature
        parts[1] = forged.split('.').nth(1).unwrap().to_string();

        assert!(matches!(
            issuer.verify(&parts.join(".")),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_wrong_secret_and_wrong_issuer_are_rejected() {
        let issuer = TokenIssuer::new(SECRET, "food-delivery", 3600);
        let token = issuer.issue(&user()).unwrap().access_token;

        let other_secret = TokenIssuer::new("another-secret-another-secret-xx", "food-delivery", 3600);
        assert!(other_secret.verify(&token).is_err());

        let other_issuer = TokenIssuer::new(SECRET, "someone-else", 3600);
        assert!(other_issuer.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = TokenIssuer::new(SECRET, "food-delivery", 3600);
        let now = Utc::now().timestamp() as u64;
        let expired = issuer
            .sign(&Claims {
                sub: uuid::Uuid::new_v4().to_string(),
                email: "late@example.com".to_string(),
                role: Role::Customer,
                iat: now - 7200,
                exp: now - 3600,
                iss: "food-delivery".to_string(),
            })
            .unwrap();

        assert!(issuer.verify(&expired).is_err());
    }
}
