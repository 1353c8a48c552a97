use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::customer::Address;
use super::order::{LineItem, OrderError, SelectedModifier};

// ============================================================================
// Catalog - Restaurants, Products and their optional Modifiers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub delivery_fee: Option<Decimal>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub available: bool,
}

/// Reasons a product/modifier selection cannot become a line item
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("Product {0} does not belong to restaurant {1}")]
    ForeignProduct(Uuid, Uuid),

    #[error("Product {0} is not available")]
    ProductUnavailable(Uuid),

    #[error("Modifier {0} does not belong to product {1}")]
    ForeignModifier(Uuid, Uuid),

    #[error("Modifier {0} is not available")]
    ModifierUnavailable(Uuid),

    #[error(transparent)]
    Pricing(#[from] OrderError),
}

impl Modifier {
    pub fn select(&self) -> SelectedModifier {
        SelectedModifier {
            modifier_id: self.id,
            name: self.name.clone(),
            price: self.price,
        }
    }
}

impl Product {
    /// Capture current catalog prices into a line item.
    ///
    /// `modifiers` holds one entry per selection, so picking the same
    /// modifier twice charges it twice.
    pub fn line_item(
        &self,
        restaurant_id: Uuid,
        quantity: i32,
        modifiers: &[Modifier],
    ) -> Result<LineItem, SelectionError> {
        if self.restaurant_id != restaurant_id {
            return Err(SelectionError::ForeignProduct(self.id, restaurant_id));
        }
        if !self.available {
            return Err(SelectionError::ProductUnavailable(self.id));
        }

        let mut selected = Vec::with_capacity(modifiers.len());
        for modifier in modifiers {
            if modifier.product_id != self.id {
                return Err(SelectionError::ForeignModifier(modifier.id, self.id));
            }
            if !modifier.available {
                return Err(SelectionError::ModifierUnavailable(modifier.id));
            }
            selected.push(modifier.select());
        }

        Ok(LineItem::priced(self.id, self.name.clone(), self.price, quantity, selected)?)
    }
}
