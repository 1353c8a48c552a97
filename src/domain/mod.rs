// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Aggregates, entities and value objects. Nothing in here touches storage,
// HTTP or the clock beyond stamping timestamps on events.
//
// ============================================================================

pub mod aggregate;
pub mod catalog;
pub mod customer;
pub mod order;
pub mod user;
