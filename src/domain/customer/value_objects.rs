use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Email address, stored trimmed and lower-cased so lookups are case-insensitive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err("Email cannot be empty".to_string());
        }
        match normalized.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
                Ok(Self(normalized))
            }
            _ => Err(format!("Invalid email format: {raw}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Postal address used for customers, restaurants and order delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, max = 200, message = "street is required"))]
    pub street: String,
    #[validate(length(min = 1, max = 100, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 100, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 1, max = 20, message = "postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 60, message = "country is required"))]
    pub country: String,
}
