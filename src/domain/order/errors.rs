use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Cannot confirm an order without items")]
    EmptyOrder,

    #[error("Items can only be added while the order is PENDING (current: {0})")]
    NotModifiable(OrderStatus),

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Amount exceeds 9999999999.99 or has more than 2 decimal places")]
    AmountOutOfRange,
}

impl OrderError {
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::InvalidTransition { .. } => "ORDER_INVALID_TRANSITION",
            OrderError::EmptyOrder => "ORDER_EMPTY",
            OrderError::NotModifiable(_) => "ORDER_NOT_MODIFIABLE",
            OrderError::InvalidQuantity(_) => "ORDER_INVALID_QUANTITY",
            OrderError::AmountOutOfRange => "ORDER_AMOUNT_OUT_OF_RANGE",
        }
    }
}
