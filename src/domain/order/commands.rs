use super::value_objects::{LineItem, OrderStatus};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    AddItem(LineItem),
    Confirm,
    /// Generic status request; CONFIRMED and CANCELLED route to their own rules
    ChangeStatus(OrderStatus),
    Cancel {
        reason: Option<String>,
    },
}
