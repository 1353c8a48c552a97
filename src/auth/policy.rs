use uuid::Uuid;

use super::Principal;
use crate::domain::catalog::Restaurant;
use crate::domain::order::{OrderAggregate, OrderStatus};
use crate::domain::user::Role;
use crate::error::{AppError, AppResult};
use crate::store::OrderFilter;

// ============================================================================
// Authorization Policy
// ============================================================================
//
// Every decision matches on `Role` without a wildcard arm, so adding a role
// forces each rule to be revisited. Domain validity (e.g. the status
// transition table) is checked separately by the order aggregate.
//
// ============================================================================

/// Statuses a courier can see: everything from kitchen hand-off onwards
pub const COURIER_VISIBLE: [OrderStatus; 3] = [
    OrderStatus::Preparing,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
];

fn allow(allowed: bool, message: &str) -> AppResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::access_denied(message))
    }
}

pub fn require_admin(principal: &Principal) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::Customer | Role::RestaurantOwner | Role::Courier => false,
    };
    allow(allowed, "Administrator role required")
}

/// Profile access: the customer themself or an admin
pub fn ensure_customer_access(principal: &Principal, customer_id: Uuid) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::Customer => principal.user_id == customer_id,
        Role::RestaurantOwner | Role::Courier => false,
    };
    allow(allowed, "Access to this customer is not allowed")
}

/// Admins create restaurants for anyone, owners only for themselves
pub fn ensure_can_open_restaurant(principal: &Principal, owner_id: Uuid) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::RestaurantOwner => principal.user_id == owner_id,
        Role::Customer | Role::Courier => false,
    };
    allow(allowed, "Only restaurant owners or administrators can create restaurants")
}

/// Catalog changes: the restaurant's owner or an admin
pub fn ensure_restaurant_manager(principal: &Principal, restaurant: &Restaurant) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::RestaurantOwner => restaurant.owner_id == principal.user_id,
        Role::Customer | Role::Courier => false,
    };
    allow(allowed, "Only the restaurant owner or an administrator can change this restaurant")
}

pub fn ensure_can_place_order(principal: &Principal, customer_id: Uuid) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::Customer => principal.user_id == customer_id,
        Role::RestaurantOwner | Role::Courier => false,
    };
    allow(allowed, "Orders can only be placed by the customer or an administrator")
}

pub fn ensure_can_view_order(
    principal: &Principal,
    order: &OrderAggregate,
    restaurant_owner_id: Uuid,
) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::Customer => order.customer_id == principal.user_id,
        Role::RestaurantOwner => restaurant_owner_id == principal.user_id,
        Role::Courier => COURIER_VISIBLE.contains(&order.status),
    };
    allow(allowed, "Access to this order is not allowed")
}

/// Appending items: the ordering customer or an admin
pub fn ensure_can_edit_items(principal: &Principal, order: &OrderAggregate) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::Customer => order.customer_id == principal.user_id,
        Role::RestaurantOwner | Role::Courier => false,
    };
    allow(allowed, "Only the ordering customer or an administrator can change items")
}

/// Who may move an order to `target`
pub fn ensure_can_transition(
    principal: &Principal,
    order: &OrderAggregate,
    restaurant_owner_id: Uuid,
    target: OrderStatus,
) -> AppResult<()> {
    let owns_order = order.customer_id == principal.user_id;
    let owns_restaurant = restaurant_owner_id == principal.user_id;

    let allowed = match principal.role {
        Role::Admin => true,
        Role::Customer => {
            owns_order
                && match target {
                    OrderStatus::Confirmed => true,
                    OrderStatus::Cancelled => {
                        matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed)
                    }
                    OrderStatus::Pending
                    | OrderStatus::Preparing
                    | OrderStatus::OutForDelivery
                    | OrderStatus::Delivered => false,
                }
        }
        Role::RestaurantOwner => {
            owns_restaurant
                && match target {
                    OrderStatus::Preparing | OrderStatus::OutForDelivery | OrderStatus::Cancelled => true,
                    OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Delivered => false,
                }
        }
        Role::Courier => match target {
            OrderStatus::OutForDelivery | OrderStatus::Delivered => true,
            OrderStatus::Pending
            | OrderStatus::Confirmed
            | OrderStatus::Preparing
            | OrderStatus::Cancelled => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::access_denied(format!(
            "Role {} cannot move order from {} to {}",
            principal.role, order.status, target
        )))
    }
}

/// Base list filter for the caller's role
pub fn order_scope(principal: &Principal) -> OrderFilter {
    match principal.role {
        Role::Admin => OrderFilter::default(),
        Role::Customer => OrderFilter {
            customer_id: Some(principal.user_id),
            ..Default::default()
        },
        Role::RestaurantOwner => OrderFilter {
            restaurant_owner_id: Some(principal.user_id),
            ..Default::default()
        },
        Role::Courier => OrderFilter {
            statuses: Some(COURIER_VISIBLE.to_vec()),
            ..Default::default()
        },
    }
}

/// Reports: admins see everything, owners their own restaurants
pub fn ensure_can_read_reports(principal: &Principal) -> AppResult<()> {
    let allowed = match principal.role {
        Role::Admin | Role::RestaurantOwner => true,
        Role::Customer | Role::Courier => false,
    };
    allow(allowed, "Reports are available to restaurant owners and administrators")
}
