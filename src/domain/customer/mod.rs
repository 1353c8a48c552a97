// ============================================================================
// Customer Domain
// ============================================================================

pub mod value_objects;
pub mod customer;

pub use value_objects::*;
pub use customer::*;
