use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Largest amount the NUMERIC(12,2) money columns hold: 9999999999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// At most two decimal places and no larger in magnitude than `MAX_AMOUNT`
pub fn is_storable_amount(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2 && amount.abs() <= MAX_AMOUNT
}

/// Checked sum of money amounts; fails once the running total leaves the storable range
pub fn checked_total(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, OrderError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| {
            acc.checked_add(amount).filter(|sum| is_storable_amount(*sum))
        })
        .ok_or(OrderError::AmountOutOfRange)
}

/// Modifier chosen for a line item; the price is captured at selection time so
/// later catalog changes never touch historical orders.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectedModifier {
    pub modifier_id: Uuid,
    pub name: String,
    pub price: Decimal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    /// Product price plus every selected modifier, captured when the item was added
    pub unit_price: Decimal,
    pub modifiers: Vec<SelectedModifier>,
    pub subtotal: Decimal,
}

impl LineItem {
    /// Price a line from the captured base price and modifier selections.
    pub fn priced(
        product_id: Uuid,
        product_name: impl Into<String>,
        base_price: Decimal,
        quantity: i32,
        modifiers: Vec<SelectedModifier>,
    ) -> Result<Self, OrderError> {
        let unit_price = checked_total(
            std::iter::once(base_price).chain(modifiers.iter().map(|m| m.price)),
        )?;
        let subtotal = unit_price
            .checked_mul(Decimal::from(quantity))
            .filter(|subtotal| is_storable_amount(*subtotal))
            .ok_or(OrderError::AmountOutOfRange)?;

        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            modifiers,
            subtotal,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The complete transition table. Anything not listed here is rejected.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, Preparing) => true,
            (Preparing, OutForDelivery) => true,
            (OutForDelivery, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown order status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Cash,
    Pix,
    DigitalWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::DigitalWallet => "DIGITAL_WALLET",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PaymentMethod::CreditCard,
            PaymentMethod::DebitCard,
            PaymentMethod::Cash,
            PaymentMethod::Pix,
            PaymentMethod::DigitalWallet,
        ]
        .into_iter()
        .find(|method| method.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("Unknown payment method: {s}"))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
