// ============================================================================
// Application Services
// ============================================================================
//
// One service per resource. Each one authorizes the caller, drives the domain
// and the repositories, and records audit entries for what changed. Handlers
// stay thin and only translate HTTP in and out.
//
// ============================================================================

mod catalog;
mod customers;
mod orders;
mod reports;

pub use catalog::{
    CatalogService, NewModifier, NewProduct, NewRestaurant, UpdateModifier, UpdateProduct, UpdateRestaurant,
};
pub use customers::{CustomerService, UpdateCustomer};
pub use orders::{OrderItemRequest, OrderService, PlaceOrder};
pub use reports::{ReportQuery, ReportService, SalesSummary};
