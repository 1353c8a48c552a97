use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::*;
use crate::audit::AuditEntry;
use crate::domain::catalog::{Modifier, Product, Restaurant};
use crate::domain::customer::{Customer, Email};
use crate::domain::order::{OrderAggregate, OrderStatus};
use crate::domain::user::UserAccount;

// ============================================================================
// In-Memory Store - process-local maps behind one lock
// ============================================================================

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserAccount>,
    customers: HashMap<Uuid, Customer>,
    restaurants: HashMap<Uuid, Restaurant>,
    products: HashMap<Uuid, Product>,
    modifiers: HashMap<Uuid, Modifier>,
    orders: HashMap<Uuid, OrderAggregate>,
    audit: Vec<AuditEntry>,
}

impl State {
    fn email_taken(&self, email: &Email) -> bool {
        self.users.values().any(|u| &u.email == email)
    }

    fn orders_in<'a>(&'a self, window: &'a ReportWindow) -> impl Iterator<Item = &'a OrderAggregate> {
        self.orders
            .values()
            .filter(move |o| window.covers(o.restaurant_id, o.created_at))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &UserAccount) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email) {
            return Err(StoreError::Duplicate(format!("User with email {}", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<UserAccount>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserAccount>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(false);
        };
        user.active = active;
        if let Some(customer) = state.customers.get_mut(&id) {
            customer.active = active;
        }
        Ok(true)
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn insert_customer(&self, user: &UserAccount, customer: &Customer) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email) {
            return Err(StoreError::Duplicate(format!("User with email {}", user.email)));
        }
        state.users.insert(user.id, user.clone());
        state.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn list_customers(&self, page: PageRequest) -> StoreResult<Page<Customer>> {
        let state = self.state.read().await;
        let mut customers: Vec<Customer> = state.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(&customers, page))
    }
}

#[async_trait]
impl RestaurantRepository for MemoryStore {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(())
    }

    async fn update_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        self.insert_restaurant(restaurant).await
    }

    async fn find_restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>> {
        Ok(self.state.read().await.restaurants.get(&id).cloned())
    }

    async fn list_restaurants(&self, active_only: bool, page: PageRequest) -> StoreResult<Page<Restaurant>> {
        let state = self.state.read().await;
        let mut restaurants: Vec<Restaurant> = state
            .restaurants
            .values()
            .filter(|r| !active_only || r.active)
            .cloned()
            .collect();
        restaurants.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(&restaurants, page))
    }

    async fn restaurant_ids_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut ids: Vec<Uuid> = state
            .restaurants
            .values()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        self.insert_product(product).await
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, restaurant_id: Uuid, page: PageRequest) -> StoreResult<Page<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(&products, page))
    }

    async fn insert_modifier(&self, modifier: &Modifier) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.modifiers.insert(modifier.id, modifier.clone());
        Ok(())
    }

    async fn update_modifier(&self, modifier: &Modifier) -> StoreResult<()> {
        self.insert_modifier(modifier).await
    }

    async fn find_modifier(&self, id: Uuid) -> StoreResult<Option<Modifier>> {
        Ok(self.state.read().await.modifiers.get(&id).cloned())
    }

    async fn list_modifiers(&self, product_id: Uuid) -> StoreResult<Vec<Modifier>> {
        let state = self.state.read().await;
        let mut modifiers: Vec<Modifier> = state
            .modifiers
            .values()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect();
        modifiers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(modifiers)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn save_order(&self, order: &OrderAggregate) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        let stored_version = state.orders.get(&order.id).map(|o| o.version);

        match (order.version, stored_version) {
            (0, None) => {}
            (0, Some(_)) => return Err(StoreError::Duplicate(format!("Order {}", order.id))),
            (expected, Some(current)) if expected == current => {}
            _ => {
                return Err(StoreError::VersionConflict {
                    entity: "Order",
                    id: order.id,
                })
            }
        }

        let mut stored = order.clone();
        stored.version = order.version + 1;
        state.orders.insert(stored.id, stored);
        Ok(order.version + 1)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<OrderAggregate>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> StoreResult<Page<OrderAggregate>> {
        let state = self.state.read().await;
        let owned: Option<Vec<Uuid>> = filter.restaurant_owner_id.map(|owner| {
            state
                .restaurants
                .values()
                .filter(|r| r.owner_id == owner)
                .map(|r| r.id)
                .collect()
        });

        let mut orders: Vec<OrderAggregate> = state
            .orders
            .values()
            .filter(|o| filter.customer_id.map_or(true, |id| o.customer_id == id))
            .filter(|o| filter.restaurant_id.map_or(true, |id| o.restaurant_id == id))
            .filter(|o| owned.as_ref().map_or(true, |ids| ids.contains(&o.restaurant_id)))
            .filter(|o| filter.statuses.as_ref().map_or(true, |s| s.contains(&o.status)))
            .cloned()
            .collect();
        // Newest first
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(&orders, page))
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.state.write().await.audit.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn sales_totals(&self, window: &ReportWindow) -> StoreResult<SalesTotals> {
        let state = self.state.read().await;
        let mut totals = SalesTotals {
            order_count: 0,
            delivered_count: 0,
            cancelled_count: 0,
            gross_revenue: Decimal::ZERO,
        };

        for order in state.orders_in(window) {
            totals.order_count += 1;
            match order.status {
                OrderStatus::Delivered => {
                    totals.delivered_count += 1;
                    totals.gross_revenue += order.total.unwrap_or(Decimal::ZERO);
                }
                OrderStatus::Cancelled => totals.cancelled_count += 1,
                _ => {}
            }
        }
        Ok(totals)
    }

    async fn orders_by_status(&self, window: &ReportWindow) -> StoreResult<Vec<StatusCount>> {
        let state = self.state.read().await;
        let mut counts: HashMap<OrderStatus, i64> = HashMap::new();
        for order in state.orders_in(window) {
            *counts.entry(order.status).or_default() += 1;
        }

        Ok(OrderStatus::ALL
            .into_iter()
            .filter_map(|status| {
                counts
                    .get(&status)
                    .map(|&count| StatusCount { status, count })
            })
            .collect())
    }

    async fn top_products(&self, window: &ReportWindow, limit: u32) -> StoreResult<Vec<ProductSales>> {
        let state = self.state.read().await;
        let mut sales: HashMap<Uuid, ProductSales> = HashMap::new();

        let sold = state
            .orders_in(window)
            .filter(|o| !matches!(o.status, OrderStatus::Pending | OrderStatus::Cancelled));
        for order in sold {
            for item in &order.items {
                let entry = sales.entry(item.product_id).or_insert_with(|| ProductSales {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: 0,
                    revenue: Decimal::ZERO,
                });
                entry.quantity += i64::from(item.quantity);
                entry.revenue += item.subtotal;
            }
        }

        let mut ranked: Vec<ProductSales> = sales.into_values().collect();
        ranked.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(b.revenue.cmp(&a.revenue))
                .then(a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}

#[async_trait]
impl StoreProbe for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::Aggregate;
    use crate::domain::customer::Address;
    use crate::domain::order::{LineItem, NewOrder, OrderCommand, PaymentMethod};
    use crate::domain::user::Role;
    use chrono::{Duration, Utc};

    fn address() -> Address {
        Address {
            street: "Av. Paulista 1000".to_string(),
            city: "Sao Paulo".to_string(),
            state: "SP".to_string(),
            postal_code: "01310-100".to_string(),
            country: "BR".to_string(),
        }
    }

    fn order_for(restaurant_id: Uuid) -> OrderAggregate {
        OrderAggregate::new(NewOrder {
            customer_id: Uuid::new_v4(),
            restaurant_id,
            delivery_address: address(),
            delivery_fee: None,
            payment_method: PaymentMethod::Pix,
            notes: None,
        })
    }

    fn whole_day() -> ReportWindow {
        ReportWindow {
            restaurant_ids: None,
            from: Utc::now() - Duration::days(1),
            to: Utc::now() + Duration::days(1),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        let email = Email::parse("Joao@Example.com").unwrap();
        let user = UserAccount::new(email.clone(), "hash".to_string(), Role::Customer);
        store.insert_user(&user).await.unwrap();

        let again = UserAccount::new(Email::parse("joao@example.com").unwrap(), "h".to_string(), Role::Admin);
        let result = store.insert_user(&again).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
        assert_eq!(store.find_user_by_email(&email).await.unwrap().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_stale_order_save_is_a_version_conflict() {
        let store = MemoryStore::new();
        let mut order = order_for(Uuid::new_v4());
        order.version = store.save_order(&order).await.unwrap();
        assert_eq!(order.version, 1);

        let mut first = store.find_order(order.id).await.unwrap().unwrap();
        let mut second = first.clone();

        first
            .execute(&OrderCommand::AddItem(LineItem::priced(
                Uuid::new_v4(),
                "Coxinha",
                Decimal::new(800, 2),
                1,
                vec![],
            ).unwrap()))
            .unwrap();
        assert_eq!(store.save_order(&first).await.unwrap(), 2);

        second.execute(&OrderCommand::Cancel { reason: None }).unwrap();
        let result = store.save_order(&second).await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));

        let stored = store.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_report_counts_and_revenue() {
        let store = MemoryStore::new();
        let restaurant_id = Uuid::new_v4();

        let mut delivered = order_for(restaurant_id);
        delivered
            .execute(&OrderCommand::AddItem(LineItem::priced(
                Uuid::new_v4(),
                "Pizza",
                Decimal::new(4500, 2),
                2,
                vec![],
            ).unwrap()))
            .unwrap();
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            delivered.execute(&OrderCommand::ChangeStatus(status)).unwrap();
        }
        store.save_order(&delivered).await.unwrap();

        let mut cancelled = order_for(restaurant_id);
        cancelled.execute(&OrderCommand::Cancel { reason: None }).unwrap();
        store.save_order(&cancelled).await.unwrap();

        store.save_order(&order_for(restaurant_id)).await.unwrap();

        let totals = store.sales_totals(&whole_day()).await.unwrap();
        assert_eq!(totals.order_count, 3);
        assert_eq!(totals.delivered_count, 1);
        assert_eq!(totals.cancelled_count, 1);
        assert_eq!(totals.gross_revenue, Decimal::new(9000, 2));

        let top = store.top_products(&whole_day(), 5).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].product_name, "Pizza");
        assert_eq!(top[0].quantity, 2);

        let other = ReportWindow {
            restaurant_ids: Some(vec![Uuid::new_v4()]),
            ..whole_day()
        };
        assert_eq!(store.sales_totals(&other).await.unwrap().order_count, 0);
    }
}
