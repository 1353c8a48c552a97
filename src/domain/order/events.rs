use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregate::DomainEvent;
use super::value_objects::{LineItem, OrderStatus};

// ============================================================================
// Order Events - Facts emitted by the Order aggregate
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    ItemAdded(OrderItemAdded),
    Confirmed(OrderConfirmed),
    StatusChanged(OrderStatusChanged),
    Cancelled(OrderCancelled),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::ItemAdded(_) => "OrderItemAdded",
            OrderEvent::Confirmed(_) => "OrderConfirmed",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::Cancelled(_) => "OrderCancelled",
        }
    }
}

impl OrderEvent {
    /// Status pair for events that move the lifecycle forward
    pub fn transition(&self) -> Option<(OrderStatus, OrderStatus)> {
        match self {
            OrderEvent::ItemAdded(_) => None,
            OrderEvent::Confirmed(_) => Some((OrderStatus::Pending, OrderStatus::Confirmed)),
            OrderEvent::StatusChanged(e) => Some((e.from, e.to)),
            OrderEvent::Cancelled(e) => Some((e.from, OrderStatus::Cancelled)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemAdded {
    pub item: LineItem,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmed {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelled {
    pub from: OrderStatus,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}
