use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::audit::{AuditEntry, AuditLog};
use crate::auth::{policy, Principal};
use crate::domain::aggregate::Aggregate;
use crate::domain::catalog::Restaurant;
use crate::domain::customer::Address;
use crate::domain::order::{
    LineItem, NewOrder, OrderAggregate, OrderCommand, OrderEvent, OrderStatus, PaymentMethod,
};
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::store::{
    CustomerRepository, OrderRepository, Page, PageRequest, ProductRepository, RestaurantRepository,
};

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: load → authorize → Command → Aggregate → save (versioned)
//               → audit + metrics for every emitted event
//
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999, message = "quantity must be between 1 and 999"))]
    pub quantity: i32,
    /// One entry per selection; repeating an id selects that modifier again
    #[serde(default)]
    #[validate(length(max = 20, message = "too many modifiers"))]
    pub modifier_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    /// Admins order on behalf of a customer; customers always order for themselves
    pub customer_id: Option<Uuid>,
    pub restaurant_id: Uuid,
    /// Falls back to the customer's default address
    #[validate(nested)]
    pub delivery_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500, message = "notes are limited to 500 characters"))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<OrderItemRequest>,
}

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    restaurants: Arc<dyn RestaurantRepository>,
    products: Arc<dyn ProductRepository>,
    customers: Arc<dyn CustomerRepository>,
    audit: AuditLog,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        restaurants: Arc<dyn RestaurantRepository>,
        products: Arc<dyn ProductRepository>,
        customers: Arc<dyn CustomerRepository>,
        audit: AuditLog,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            orders,
            restaurants,
            products,
            customers,
            audit,
            metrics,
        }
    }

    async fn load(&self, order_id: Uuid) -> AppResult<OrderAggregate> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Order", order_id))
    }

    async fn restaurant(&self, restaurant_id: Uuid) -> AppResult<Restaurant> {
        self.restaurants
            .find_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| AppError::not_found("Restaurant", restaurant_id))
    }

    /// Capture current catalog prices for one requested line
    async fn price_line(&self, restaurant_id: Uuid, request: &OrderItemRequest) -> AppResult<LineItem> {
        let product = self
            .products
            .find_product(request.product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", request.product_id))?;

        let mut modifiers = Vec::with_capacity(request.modifier_ids.len());
        for modifier_id in &request.modifier_ids {
            let modifier = self
                .products
                .find_modifier(*modifier_id)
                .await?
                .ok_or_else(|| AppError::not_found("Modifier", modifier_id))?;
            modifiers.push(modifier);
        }

        Ok(product.line_item(restaurant_id, request.quantity, &modifiers)?)
    }

    /// Metrics and audit for events that are already persisted
    async fn observe(&self, principal: &Principal, order: &OrderAggregate, events: &[OrderEvent]) {
        for event in events {
            if let Some((from, to)) = event.transition() {
                self.metrics.record_transition(from.as_str(), to.as_str());
            }
            if let OrderEvent::Confirmed(confirmed) = event {
                self.metrics
                    .order_confirmed_value
                    .observe(confirmed.total.to_f64().unwrap_or_default());
            }
        }

        self.audit
            .record_all(
                events
                    .iter()
                    .map(|event| AuditEntry::for_event("Order", order.id, event).by(principal)),
            )
            .await;
    }

    /// Run one command against a stored order and persist the result
    async fn mutate<F>(
        &self,
        principal: &Principal,
        order_id: Uuid,
        command: OrderCommand,
        authorize: F,
    ) -> AppResult<OrderAggregate>
    where
        F: FnOnce(&OrderAggregate, &Restaurant) -> AppResult<()>,
    {
        let order = self.load(order_id).await?;
        let restaurant = self.restaurant(order.restaurant_id).await?;
        authorize(&order, &restaurant)?;

        self.commit(principal, order, command).await
    }

    /// Execute against an already authorized order; the save is checked against its loaded version
    async fn commit(
        &self,
        principal: &Principal,
        mut order: OrderAggregate,
        command: OrderCommand,
    ) -> AppResult<OrderAggregate> {
        let events = order.execute(&command)?;
        order.version = self.orders.save_order(&order).await?;

        tracing::debug!(
            order_id = %order.id,
            status = %order.status,
            version = order.version,
            events = events.len(),
            "Order updated"
        );

        self.observe(principal, &order, &events).await;
        Ok(order)
    }

    pub async fn create(&self, principal: &Principal, request: PlaceOrder) -> AppResult<OrderAggregate> {
        request.validate()?;

        let customer_id = request.customer_id.unwrap_or(principal.user_id);
        policy::ensure_can_place_order(principal, customer_id)?;

        let customer = self
            .customers
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer", customer_id))?;
        if !customer.active {
            return Err(AppError::conflict("CUSTOMER_INACTIVE", "Customer account is deactivated"));
        }

        let restaurant = self.restaurant(request.restaurant_id).await?;
        if !restaurant.active {
            return Err(AppError::conflict(
                "RESTAURANT_INACTIVE",
                format!("Restaurant {} is not accepting orders", restaurant.id),
            ));
        }

        let delivery_address = request
            .delivery_address
            .or(customer.address)
            .ok_or_else(|| AppError::invalid_field("deliveryAddress", "delivery address is required"))?;

        let mut order = OrderAggregate::new(NewOrder {
            customer_id,
            restaurant_id: restaurant.id,
            delivery_address,
            delivery_fee: restaurant.delivery_fee,
            payment_method: request.payment_method,
            notes: request.notes,
        });

        let mut events = Vec::new();
        for item in &request.items {
            let line = self.price_line(restaurant.id, item).await?;
            events.extend(order.execute(&OrderCommand::AddItem(line))?);
        }

        order.version = self.orders.save_order(&order).await?;
        self.metrics.orders_created_total.inc();

        tracing::info!(
            order_id = %order.id,
            customer_id = %customer_id,
            restaurant_id = %restaurant.id,
            items = order.items.len(),
            "Order created"
        );

        self.audit
            .record(
                AuditEntry::new("OrderCreated", "Order")
                    .entity(order.id)
                    .by(principal)
                    .details(serde_json::json!({
                        "customerId": customer_id,
                        "restaurantId": restaurant.id,
                        "paymentMethod": order.payment_method,
                    })),
            )
            .await;
        self.observe(principal, &order, &events).await;

        Ok(order)
    }

    pub async fn add_item(
        &self,
        principal: &Principal,
        order_id: Uuid,
        request: OrderItemRequest,
    ) -> AppResult<OrderAggregate> {
        request.validate()?;

        let order = self.load(order_id).await?;
        policy::ensure_can_edit_items(principal, &order)?;
        let line = self.price_line(order.restaurant_id, &request).await?;

        self.commit(principal, order, OrderCommand::AddItem(line)).await
    }

    pub async fn confirm(&self, principal: &Principal, order_id: Uuid) -> AppResult<OrderAggregate> {
        self.mutate(principal, order_id, OrderCommand::Confirm, |order, restaurant| {
            policy::ensure_can_transition(principal, order, restaurant.owner_id, OrderStatus::Confirmed)
        })
        .await
    }

    pub async fn change_status(
        &self,
        principal: &Principal,
        order_id: Uuid,
        target: OrderStatus,
    ) -> AppResult<OrderAggregate> {
        self.mutate(principal, order_id, OrderCommand::ChangeStatus(target), |order, restaurant| {
            policy::ensure_can_transition(principal, order, restaurant.owner_id, target)
        })
        .await
    }

    pub async fn cancel(
        &self,
        principal: &Principal,
        order_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<OrderAggregate> {
        self.mutate(principal, order_id, OrderCommand::Cancel { reason }, |order, restaurant| {
            policy::ensure_can_transition(principal, order, restaurant.owner_id, OrderStatus::Cancelled)
        })
        .await
    }

    pub async fn get(&self, principal: &Principal, order_id: Uuid) -> AppResult<OrderAggregate> {
        let order = self.load(order_id).await?;
        let restaurant = self.restaurant(order.restaurant_id).await?;
        policy::ensure_can_view_order(principal, &order, restaurant.owner_id)?;
        Ok(order)
    }

    /// Role-scoped listing; `status` narrows the scope, never widens it
    pub async fn list(
        &self,
        principal: &Principal,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> AppResult<Page<OrderAggregate>> {
        let mut filter = policy::order_scope(principal);

        if let Some(status) = status {
            match &filter.statuses {
                Some(allowed) if !allowed.contains(&status) => {
                    return Ok(Page::new(Vec::new(), page, 0));
                }
                _ => filter.statuses = Some(vec![status]),
            }
        }

        Ok(self.orders.list_orders(&filter, page).await?)
    }
}
