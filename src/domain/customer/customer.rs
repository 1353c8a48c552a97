use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{Address, Email};

// ============================================================================
// Customer Entity
// ============================================================================

/// Customer profile. Its id is the id of the CUSTOMER user account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

impl Customer {
    pub fn new(id: Uuid, name: String, email: Email, phone: Option<String>, address: Option<Address>) -> Self {
        Self {
            id,
            name,
            email,
            phone,
            address,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn apply_update(&mut self, update: CustomerUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = Some(phone);
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
    }
}
