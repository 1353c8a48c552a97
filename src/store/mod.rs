// ============================================================================
// Storage Layer - repository contracts
// ============================================================================
//
// Repositories are finder-style traits with two implementations:
// - postgres/ : sqlx + PostgreSQL (production)
// - memory/   : process-local maps (development and tests)
//
// Order writes use optimistic versioning: a save carries the version that was
// loaded and fails with `VersionConflict` if someone else saved in between.
//
// ============================================================================

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::domain::catalog::{Modifier, Product, Restaurant};
use crate::domain::customer::{Customer, Email};
use crate::domain::order::{OrderAggregate, OrderStatus};
use crate::domain::user::UserAccount;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(String),

    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: &'static str, id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Pagination
// ============================================================================

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Clamp client input into a valid page window
    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(0),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = u64::from(request.size);
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

/// Slice an already-filtered, already-sorted collection into a page
pub(crate) fn paginate<T: Clone>(items: &[T], request: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let content = items
        .iter()
        .skip(request.offset() as usize)
        .take(request.size as usize)
        .cloned()
        .collect();
    Page::new(content, request, total)
}

// ============================================================================
// Query Filters & Report Rows
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    /// Only orders of restaurants owned by this user
    pub restaurant_owner_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    /// Any of these statuses
    pub statuses: Option<Vec<OrderStatus>>,
}

#[derive(Debug, Clone)]
pub struct ReportWindow {
    /// `None` means every restaurant
    pub restaurant_ids: Option<Vec<Uuid>>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportWindow {
    pub fn covers(&self, restaurant_id: Uuid, created_at: DateTime<Utc>) -> bool {
        let restaurant_ok = self
            .restaurant_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&restaurant_id));
        restaurant_ok && created_at >= self.from && created_at < self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesTotals {
    pub order_count: i64,
    pub delivered_count: i64,
    pub cancelled_count: i64,
    pub gross_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` when the email is taken
    async fn insert_user(&self, user: &UserAccount) -> StoreResult<()>;
    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<UserAccount>>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserAccount>>;
    async fn set_user_active(&self, id: Uuid, active: bool) -> StoreResult<bool>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Creates the login account and the profile together, or neither
    async fn insert_customer(&self, user: &UserAccount, customer: &Customer) -> StoreResult<()>;
    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
    async fn update_customer(&self, customer: &Customer) -> StoreResult<()>;
    async fn list_customers(&self, page: PageRequest) -> StoreResult<Page<Customer>>;
}

#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()>;
    async fn update_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()>;
    async fn find_restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>>;
    async fn list_restaurants(&self, active_only: bool, page: PageRequest) -> StoreResult<Page<Restaurant>>;
    async fn restaurant_ids_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Uuid>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    async fn update_product(&self, product: &Product) -> StoreResult<()>;
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(&self, restaurant_id: Uuid, page: PageRequest) -> StoreResult<Page<Product>>;

    async fn insert_modifier(&self, modifier: &Modifier) -> StoreResult<()>;
    async fn update_modifier(&self, modifier: &Modifier) -> StoreResult<()>;
    async fn find_modifier(&self, id: Uuid) -> StoreResult<Option<Modifier>>;
    async fn list_modifiers(&self, product_id: Uuid) -> StoreResult<Vec<Modifier>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the aggregate. Version 0 inserts; otherwise the stored version
    /// must equal `order.version`. Returns the new version.
    async fn save_order(&self, order: &OrderAggregate) -> StoreResult<i64>;
    async fn find_order(&self, id: Uuid) -> StoreResult<Option<OrderAggregate>>;
    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> StoreResult<Page<OrderAggregate>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn sales_totals(&self, window: &ReportWindow) -> StoreResult<SalesTotals>;
    async fn orders_by_status(&self, window: &ReportWindow) -> StoreResult<Vec<StatusCount>>;
    async fn top_products(&self, window: &ReportWindow, limit: u32) -> StoreResult<Vec<ProductSales>>;
}

#[async_trait]
pub trait StoreProbe: Send + Sync {
    /// Cheap round trip used by the health indicator
    async fn ping(&self) -> StoreResult<()>;
}

/// Every repository the services need, as trait objects over one backend
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub restaurants: Arc<dyn RestaurantRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub probe: Arc<dyn StoreProbe>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + CustomerRepository
            + RestaurantRepository
            + ProductRepository
            + OrderRepository
            + AuditRepository
            + ReportRepository
            + StoreProbe
            + 'static,
    {
        Self {
            users: store.clone(),
            customers: store.clone(),
            restaurants: store.clone(),
            products: store.clone(),
            orders: store.clone(),
            audit: store.clone(),
            reports: store.clone(),
            probe: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps_size() {
        assert_eq!(PageRequest::new(None, None).size, DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(None, Some(0)).size, 1);
        assert_eq!(PageRequest::new(Some(2), Some(500)).size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 30);
    }

    #[test]
    fn test_paginate_slices_and_counts() {
        let items: Vec<u32> = (0..45).collect();
        let page = paginate(&items, PageRequest::new(Some(2), Some(20)));
        assert_eq!(page.content, vec![40, 41, 42, 43, 44]);
        assert_eq!(page.total_elements, 45);
        assert_eq!(page.total_pages, 3);

        let empty = paginate(&items, PageRequest::new(Some(9), Some(20)));
        assert!(empty.content.is_empty());
    }
}
