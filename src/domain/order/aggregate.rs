use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregate::Aggregate;
use crate::domain::customer::Address;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{checked_total, LineItem, OrderStatus, PaymentMethod};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

/// Everything needed to open a new PENDING order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_address: Address,
    pub delivery_fee: Option<Decimal>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,

    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_address: Address,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Option<Decimal>,
    /// Set when the order is confirmed
    pub total: Option<Decimal>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub placed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OrderAggregate {
    /// Open an order in PENDING with no items. Version 0 means "never stored".
    pub fn new(order: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            version: 0,
            customer_id: order.customer_id,
            restaurant_id: order.restaurant_id,
            delivery_address: order.delivery_address,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            delivery_fee: order.delivery_fee,
            total: None,
            status: OrderStatus::Pending,
            payment_method: order.payment_method,
            notes: order.notes,
            cancel_reason: None,
            created_at: now,
            placed_at: None,
            updated_at: now,
        }
    }

    /// Σ line subtotals, exact decimal arithmetic
    pub fn items_subtotal(&self) -> Result<Decimal, OrderError> {
        checked_total(self.items.iter().map(|item| item.subtotal))
    }

    /// Unset delivery fee counts as zero
    pub fn effective_delivery_fee(&self) -> Decimal {
        self.delivery_fee.unwrap_or(Decimal::ZERO)
    }

    fn confirm_events(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Confirmed,
            });
        }
        if self.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let subtotal = self.items_subtotal()?;
        let delivery_fee = self.effective_delivery_fee();
        let total = checked_total([subtotal, delivery_fee])?;

        Ok(vec![OrderEvent::Confirmed(OrderConfirmed {
            subtotal,
            delivery_fee,
            total,
            placed_at: Utc::now(),
        })])
    }

    fn cancel_events(&self, reason: Option<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        Ok(vec![OrderEvent::Cancelled(OrderCancelled {
            from: self.status,
            reason,
            cancelled_at: Utc::now(),
        })])
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::AddItem(item) => {
                if self.status != OrderStatus::Pending {
                    return Err(OrderError::NotModifiable(self.status));
                }
                if item.quantity <= 0 {
                    return Err(OrderError::InvalidQuantity(item.quantity));
                }
                checked_total([self.items_subtotal()?, item.subtotal])?;

                Ok(vec![OrderEvent::ItemAdded(OrderItemAdded { item: item.clone() })])
            }

            OrderCommand::Confirm => self.confirm_events(),

            OrderCommand::ChangeStatus(target) => match target {
                OrderStatus::Confirmed => self.confirm_events(),
                OrderStatus::Cancelled => self.cancel_events(None),
                next => {
                    if !self.status.can_transition_to(*next) {
                        return Err(OrderError::InvalidTransition {
                            from: self.status,
                            to: *next,
                        });
                    }

                    Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
                        from: self.status,
                        to: *next,
                        changed_at: Utc::now(),
                    })])
                }
            },

            OrderCommand::Cancel { reason } => self.cancel_events(reason.clone()),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) {
        self.updated_at = Utc::now();

        match event {
            OrderEvent::ItemAdded(e) => {
                self.items.push(e.item.clone());
                // AddItem already bounded the running total
                self.subtotal = self.subtotal.saturating_add(e.item.subtotal);
            }
            OrderEvent::Confirmed(e) => {
                self.subtotal = e.subtotal;
                self.total = Some(e.total);
                self.placed_at = Some(e.placed_at);
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancel_reason = e.reason.clone();
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{SelectedModifier, MAX_AMOUNT};

    fn address() -> Address {
        Address {
            street: "Rua das Flores 42".to_string(),
            city: "Curitiba".to_string(),
            state: "PR".to_string(),
            postal_code: "80010-000".to_string(),
            country: "BR".to_string(),
        }
    }

    fn order_with_fee(delivery_fee: Option<Decimal>) -> OrderAggregate {
        OrderAggregate::new(NewOrder {
            customer_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            delivery_address: address(),
            delivery_fee,
            payment_method: PaymentMethod::CreditCard,
            notes: None,
        })
    }

    fn item(price: Decimal, quantity: i32) -> LineItem {
        LineItem::priced(Uuid::new_v4(), "Pastel", price, quantity, vec![]).unwrap()
    }

    fn confirmed_order() -> OrderAggregate {
        let mut order = order_with_fee(Some(Decimal::new(500, 2)));
        order.execute(&OrderCommand::AddItem(item(Decimal::new(1000, 2), 1))).unwrap();
        order.execute(&OrderCommand::Confirm).unwrap();
        order
    }

    #[test]
    fn test_new_order_is_pending_and_empty() {
        let order = order_with_fee(None);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.items.is_empty());
        assert_eq!(order.subtotal, Decimal::ZERO);
        assert_eq!(order.total, None);
        assert_eq!(order.version, 0);
    }

    #[test]
    fn test_subtotal_tracks_every_append() {
        let mut order = order_with_fee(None);
        let prices = [(1990, 2), (350, 1), (1, 3), (12345, 2)];

        for (cents, qty) in prices {
            order.execute(&OrderCommand::AddItem(item(Decimal::new(cents, 2), qty))).unwrap();
            let expected: Decimal = order.items.iter().map(|i| i.subtotal).sum();
            assert_eq!(order.subtotal, expected);
        }
        assert_eq!(order.items.len(), 4);
    }

    #[test]
    fn test_decimal_sum_has_no_drift() {
        let mut order = order_with_fee(None);
        for _ in 0..10 {
            order.execute(&OrderCommand::AddItem(item(Decimal::new(10, 2), 1))).unwrap();
        }
        assert_eq!(order.subtotal, Decimal::ONE);
    }

    #[test]
    fn test_reference_example_total() {
        let extra = SelectedModifier {
            modifier_id: Uuid::new_v4(),
            name: "Bacon".to_string(),
            price: Decimal::new(250, 2),
        };
        let line = LineItem::priced(
            Uuid::new_v4(),
            "Item A",
            Decimal::new(2990, 2),
            1,
            vec![extra.clone(), extra],
        )
        .unwrap();
        assert_eq!(line.subtotal, Decimal::new(3490, 2));

        let mut order = order_with_fee(Some(Decimal::new(1000, 2)));
        order.execute(&OrderCommand::AddItem(line)).unwrap();
        order.execute(&OrderCommand::Confirm).unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.subtotal, Decimal::new(3490, 2));
        assert_eq!(order.total, Some(Decimal::new(4490, 2)));
        assert!(order.placed_at.is_some());
    }

    #[test]
    fn test_confirm_without_items_fails() {
        let mut order = order_with_fee(None);
        let result = order.execute(&OrderCommand::Confirm);
        assert_eq!(result.unwrap_err(), OrderError::EmptyOrder);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.placed_at, None);
    }

    #[test]
    fn test_confirm_with_unset_fee_treats_fee_as_zero() {
        let mut order = order_with_fee(None);
        order.execute(&OrderCommand::AddItem(item(Decimal::new(1500, 2), 2))).unwrap();
        order.execute(&OrderCommand::Confirm).unwrap();
        assert_eq!(order.total, Some(Decimal::new(3000, 2)));
    }

    #[test]
    fn test_items_cannot_be_added_after_confirmation() {
        let mut order = confirmed_order();
        let before = order.subtotal;
        let result = order.execute(&OrderCommand::AddItem(item(Decimal::ONE, 1)));
        assert_eq!(result.unwrap_err(), OrderError::NotModifiable(OrderStatus::Confirmed));
        assert_eq!(order.subtotal, before);
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_invalid_quantity_rejected_without_mutation() {
        let mut order = order_with_fee(None);
        let mut bad = item(Decimal::ONE, 1);
        bad.quantity = 0;
        let result = order.execute(&OrderCommand::AddItem(bad));
        assert_eq!(result.unwrap_err(), OrderError::InvalidQuantity(0));
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_full_happy_path() {
        let mut order = confirmed_order();
        for next in [OrderStatus::Preparing, OrderStatus::OutForDelivery, OrderStatus::Delivered] {
            let events = order.execute(&OrderCommand::ChangeStatus(next)).unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(order.status, next);
        }
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_change_status_to_confirmed_runs_confirm_rules() {
        let mut order = order_with_fee(None);
        assert_eq!(
            order.execute(&OrderCommand::ChangeStatus(OrderStatus::Confirmed)).unwrap_err(),
            OrderError::EmptyOrder
        );
    }

    #[test]
    fn test_skipping_states_fails_with_named_transition() {
        let mut order = confirmed_order();
        let err = order
            .execute(&OrderCommand::ChangeStatus(OrderStatus::Delivered))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition from CONFIRMED to DELIVERED"
        );
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_only_table_transitions_succeed() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let mut order = confirmed_order();
                // drive the order into `from`
                match from {
                    OrderStatus::Pending => {
                        order = order_with_fee(None);
                        order.execute(&OrderCommand::AddItem(item(Decimal::ONE, 1))).unwrap();
                    }
                    OrderStatus::Confirmed => {}
                    OrderStatus::Preparing => {
                        order.execute(&OrderCommand::ChangeStatus(OrderStatus::Preparing)).unwrap();
                    }
                    OrderStatus::OutForDelivery => {
                        order.execute(&OrderCommand::ChangeStatus(OrderStatus::Preparing)).unwrap();
                        order.execute(&OrderCommand::ChangeStatus(OrderStatus::OutForDelivery)).unwrap();
                    }
                    OrderStatus::Delivered => {
                        order.execute(&OrderCommand::ChangeStatus(OrderStatus::Preparing)).unwrap();
                        order.execute(&OrderCommand::ChangeStatus(OrderStatus::OutForDelivery)).unwrap();
                        order.execute(&OrderCommand::ChangeStatus(OrderStatus::Delivered)).unwrap();
                    }
                    OrderStatus::Cancelled => {
                        order.execute(&OrderCommand::Cancel { reason: None }).unwrap();
                    }
                }
                assert_eq!(order.status, from);

                let result = order.execute(&OrderCommand::ChangeStatus(to));
                assert_eq!(result.is_ok(), from.can_transition_to(to), "{from} -> {to}");
                if result.is_err() {
                    assert_eq!(order.status, from);
                }
            }
        }
    }

    #[test]
    fn test_cancel_records_reason() {
        let mut order = confirmed_order();
        order
            .execute(&OrderCommand::Cancel { reason: Some("Restaurant closed".to_string()) })
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancel_reason.as_deref(), Some("Restaurant closed"));
    }

    #[test]
    fn test_terminal_states_cannot_be_cancelled() {
        let mut order = confirmed_order();
        order.execute(&OrderCommand::Cancel { reason: None }).unwrap();
        let err = order.execute(&OrderCommand::Cancel { reason: None }).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition { from: OrderStatus::Cancelled, to: OrderStatus::Cancelled }
        ));
    }

    #[test]
    fn test_events_report_transitions() {
        let mut order = order_with_fee(None);
        order.execute(&OrderCommand::AddItem(item(Decimal::ONE, 1))).unwrap();
        let events = order.execute(&OrderCommand::Confirm).unwrap();
        assert_eq!(events[0].transition(), Some((OrderStatus::Pending, OrderStatus::Confirmed)));
    }

    #[test]
    fn test_running_subtotal_cannot_leave_the_storable_range() {
        let mut order = order_with_fee(None);
        order.execute(&OrderCommand::AddItem(item(MAX_AMOUNT, 1))).unwrap();

        let err = order.execute(&OrderCommand::AddItem(item(Decimal::ONE, 1))).unwrap_err();
        assert_eq!(err, OrderError::AmountOutOfRange);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.subtotal, MAX_AMOUNT);
    }

    #[test]
    fn test_confirm_rejects_a_total_past_the_storable_range() {
        let mut order = order_with_fee(Some(Decimal::new(1000, 2)));
        order.execute(&OrderCommand::AddItem(item(MAX_AMOUNT, 1))).unwrap();

        let err = order.execute(&OrderCommand::Confirm).unwrap_err();
        assert_eq!(err, OrderError::AmountOutOfRange);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, None);
    }
}
