// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (LineItem, SelectedModifier, OrderStatus, PaymentMethod)
// - Events (OrderItemAdded, OrderConfirmed, ...)
// - Commands (AddItem, Confirm, ChangeStatus, Cancel)
// - Errors (OrderError enum)
// - Aggregate (OrderAggregate with pricing and lifecycle rules)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
