use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::*;
use crate::audit::AuditEntry;
use crate::config::StorageConfig;
use crate::domain::catalog::{Modifier, Product, Restaurant};
use crate::domain::customer::{Address, Customer, Email};
use crate::domain::order::{LineItem, OrderAggregate, OrderStatus, SelectedModifier};
use crate::domain::user::UserAccount;
use crate::utils::{retry_on_transient, RetryConfig};

// ============================================================================
// PostgreSQL Store - sqlx runtime queries over the schema in migrations/
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the pool, retrying transient failures with exponential backoff
    pub async fn connect(config: &StorageConfig) -> Result<Self, sqlx::Error> {
        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

        let pool = retry_on_transient(RetryConfig::with_retries(config.connect_retries), |attempt| {
            tracing::info!(attempt, "Connecting to PostgreSQL");
            options.clone().connect(&config.database_url)
        })
        .await
        .into_result()?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<LineItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price, modifiers, subtotal
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id")?;
            let modifiers: Json<Vec<SelectedModifier>> = row.try_get("modifiers")?;
            items.entry(order_id).or_default().push(LineItem {
                id: row.try_get("id")?,
                product_id: row.try_get("product_id")?,
                product_name: row.try_get("product_name")?,
                quantity: row.try_get("quantity")?,
                unit_price: row.try_get("unit_price")?,
                modifiers: modifiers.0,
                subtotal: row.try_get("subtotal")?,
            });
        }
        Ok(items)
    }

    async fn hydrate_orders(&self, rows: Vec<PgRow>) -> StoreResult<Vec<OrderAggregate>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                order_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

const ORDER_COLUMNS: &str = "o.id, o.customer_id, o.restaurant_id, o.delivery_address, o.subtotal, \
     o.delivery_fee, o.total, o.status, o.payment_method, o.notes, o.cancel_reason, \
     o.created_at, o.placed_at, o.updated_at, o.version";

fn parse_column<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn email_column(row: &PgRow) -> StoreResult<Email> {
    let raw: String = row.try_get("email")?;
    Email::parse(&raw).map_err(StoreError::Corrupt)
}

fn user_from_row(row: &PgRow) -> StoreResult<UserAccount> {
    Ok(UserAccount {
        id: row.try_get("id")?,
        email: email_column(row)?,
        password_hash: row.try_get("password_hash")?,
        role: parse_column(row, "role")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn customer_from_row(row: &PgRow) -> StoreResult<Customer> {
    let address: Option<Json<Address>> = row.try_get("address")?;
    Ok(Customer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: email_column(row)?,
        phone: row.try_get("phone")?,
        address: address.map(|a| a.0),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn restaurant_from_row(row: &PgRow) -> StoreResult<Restaurant> {
    let address: Json<Address> = row.try_get("address")?;
    Ok(Restaurant {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        phone: row.try_get("phone")?,
        address: address.0,
        delivery_fee: row.try_get("delivery_fee")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        price: row.try_get("price")?,
        available: row.try_get("available")?,
        created_at: row.try_get("created_at")?,
    })
}

fn modifier_from_row(row: &PgRow) -> StoreResult<Modifier> {
    Ok(Modifier {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        available: row.try_get("available")?,
    })
}

fn order_from_row(row: &PgRow, items: Vec<LineItem>) -> StoreResult<OrderAggregate> {
    let address: Json<Address> = row.try_get("delivery_address")?;
    Ok(OrderAggregate {
        id: row.try_get("id")?,
        version: row.try_get("version")?,
        customer_id: row.try_get("customer_id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        delivery_address: address.0,
        items,
        subtotal: row.try_get("subtotal")?,
        delivery_fee: row.try_get("delivery_fee")?,
        total: row.try_get("total")?,
        status: parse_column(row, "status")?,
        payment_method: parse_column(row, "payment_method")?,
        notes: row.try_get("notes")?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get("created_at")?,
        placed_at: row.try_get("placed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Unique-key violations become `Duplicate`, everything else stays a database error
fn on_unique_violation(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(what());
        }
    }
    StoreError::Database(err)
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND o.customer_id = ").push_bind(customer_id);
    }
    if let Some(restaurant_id) = filter.restaurant_id {
        qb.push(" AND o.restaurant_id = ").push_bind(restaurant_id);
    }
    if let Some(owner_id) = filter.restaurant_owner_id {
        qb.push(" AND o.restaurant_id IN (SELECT id FROM restaurants WHERE owner_id = ")
            .push_bind(owner_id)
            .push(")");
    }
    if let Some(statuses) = &filter.statuses {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND o.status = ANY(").push_bind(statuses).push(")");
    }
}

// ============================================================================
// Repository Implementations
// ============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &UserAccount) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| on_unique_violation(e, || format!("User with email {}", user.email)))?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, role, active, created_at FROM users WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, role, active, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE users SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE customers SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CustomerRepository for PgStore {
    async fn insert_customer(&self, user: &UserAccount, customer: &Customer) -> StoreResult<()> {
        let duplicate = || format!("User with email {}", user.email);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| on_unique_violation(e, duplicate))?;

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, address, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(customer.email.as_str())
        .bind(&customer.phone)
        .bind(customer.address.as_ref().map(Json))
        .bind(customer.active)
        .bind(customer.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| on_unique_violation(e, duplicate))?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, address, active, created_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query(
            "UPDATE customers SET name = $2, phone = $3, address = $4, active = $5 WHERE id = $1",
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.address.as_ref().map(Json))
        .bind(customer.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_customers(&self, page: PageRequest) -> StoreResult<Page<Customer>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, phone, address, active, created_at
            FROM customers
            ORDER BY created_at, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let content = rows.iter().map(customer_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(content, page, total as u64))
    }
}

#[async_trait]
impl RestaurantRepository for PgStore {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO restaurants
                (id, owner_id, name, description, phone, address, delivery_fee, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(restaurant.id)
        .bind(restaurant.owner_id)
        .bind(&restaurant.name)
        .bind(&restaurant.description)
        .bind(&restaurant.phone)
        .bind(Json(&restaurant.address))
        .bind(restaurant.delivery_fee)
        .bind(restaurant.active)
        .bind(restaurant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE restaurants
            SET name = $2, description = $3, phone = $4, address = $5, delivery_fee = $6, active = $7
            WHERE id = $1
            "#,
        )
        .bind(restaurant.id)
        .bind(&restaurant.name)
        .bind(&restaurant.description)
        .bind(&restaurant.phone)
        .bind(Json(&restaurant.address))
        .bind(restaurant.delivery_fee)
        .bind(restaurant.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, name, description, phone, address, delivery_fee, active, created_at
            FROM restaurants WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(restaurant_from_row).transpose()
    }

    async fn list_restaurants(&self, active_only: bool, page: PageRequest) -> StoreResult<Page<Restaurant>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM restaurants WHERE active OR NOT $1",
        )
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, description, phone, address, delivery_fee, active, created_at
            FROM restaurants
            WHERE active OR NOT $1
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(active_only)
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let content = rows.iter().map(restaurant_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(content, page, total as u64))
    }

    async fn restaurant_ids_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT id FROM restaurants WHERE owner_id = $1 ORDER BY id")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, restaurant_id, name, description, category, price, available, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id)
        .bind(product.restaurant_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.available)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, category = $4, price = $5, available = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.available)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, restaurant_id, name, description, category, price, available, created_at
            FROM products WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self, restaurant_id: Uuid, page: PageRequest) -> StoreResult<Page<Product>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE restaurant_id = $1")
            .bind(restaurant_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(
            r#"
            SELECT id, restaurant_id, name, description, category, price, available, created_at
            FROM products
            WHERE restaurant_id = $1
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(restaurant_id)
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let content = rows.iter().map(product_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(content, page, total as u64))
    }

    async fn insert_modifier(&self, modifier: &Modifier) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO modifiers (id, product_id, name, price, available) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(modifier.id)
        .bind(modifier.product_id)
        .bind(&modifier.name)
        .bind(modifier.price)
        .bind(modifier.available)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_modifier(&self, modifier: &Modifier) -> StoreResult<()> {
        sqlx::query("UPDATE modifiers SET name = $2, price = $3, available = $4 WHERE id = $1")
            .bind(modifier.id)
            .bind(&modifier.name)
            .bind(modifier.price)
            .bind(modifier.available)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_modifier(&self, id: Uuid) -> StoreResult<Option<Modifier>> {
        let row = sqlx::query("SELECT id, product_id, name, price, available FROM modifiers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(modifier_from_row).transpose()
    }

    async fn list_modifiers(&self, product_id: Uuid) -> StoreResult<Vec<Modifier>> {
        let rows = sqlx::query(
            "SELECT id, product_id, name, price, available FROM modifiers WHERE product_id = $1 ORDER BY name, id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(modifier_from_row).collect()
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn save_order(&self, order: &OrderAggregate) -> StoreResult<i64> {
        let new_version = order.version + 1;
        let mut tx = self.pool.begin().await?;

        if order.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO orders
                    (id, customer_id, restaurant_id, delivery_address, subtotal, delivery_fee, total,
                     status, payment_method, notes, cancel_reason, created_at, placed_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(order.id)
            .bind(order.customer_id)
            .bind(order.restaurant_id)
            .bind(Json(&order.delivery_address))
            .bind(order.subtotal)
            .bind(order.delivery_fee)
            .bind(order.total)
            .bind(order.status.as_str())
            .bind(order.payment_method.as_str())
            .bind(&order.notes)
            .bind(&order.cancel_reason)
            .bind(order.created_at)
            .bind(order.placed_at)
            .bind(order.updated_at)
            .bind(new_version)
            .execute(&mut *tx)
            .await
            .map_err(|e| on_unique_violation(e, || format!("Order {}", order.id)))?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET subtotal = $3, delivery_fee = $4, total = $5, status = $6, notes = $7,
                    cancel_reason = $8, placed_at = $9, updated_at = $10, version = $11
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(order.id)
            .bind(order.version)
            .bind(order.subtotal)
            .bind(order.delivery_fee)
            .bind(order.total)
            .bind(order.status.as_str())
            .bind(&order.notes)
            .bind(&order.cancel_reason)
            .bind(order.placed_at)
            .bind(order.updated_at)
            .bind(new_version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::VersionConflict {
                    entity: "Order",
                    id: order.id,
                });
            }
        }

        // Items are append-only; rows already stored are left untouched
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, position, product_id, product_name, quantity, unit_price, modifiers, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(Json(&item.modifiers))
            .bind(item.subtotal)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(new_version)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<OrderAggregate>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> StoreResult<Page<OrderAggregate>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o WHERE TRUE");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE TRUE"));
        push_order_filter(&mut select, filter);
        select
            .push(" ORDER BY o.created_at DESC, o.id LIMIT ")
            .push_bind(i64::from(page.size))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows = select.build().fetch_all(&self.pool).await?;

        let content = self.hydrate_orders(rows).await?;
        Ok(Page::new(content, page, total as u64))
    }
}

#[async_trait]
impl AuditRepository for PgStore {
    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (id, occurred_at, actor_id, actor_role, action, entity_type, entity_id, request_id, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.occurred_at)
        .bind(entry.actor_id)
        .bind(entry.actor_role.map(|r| r.as_str()))
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.request_id)
        .bind(Json(&entry.details))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ReportRepository for PgStore {
    async fn sales_totals(&self, window: &ReportWindow) -> StoreResult<SalesTotals> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS order_count,
                   COUNT(*) FILTER (WHERE status = 'DELIVERED') AS delivered_count,
                   COUNT(*) FILTER (WHERE status = 'CANCELLED') AS cancelled_count,
                   COALESCE(SUM(total) FILTER (WHERE status = 'DELIVERED'), 0) AS gross_revenue
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
              AND ($3::uuid[] IS NULL OR restaurant_id = ANY($3))
            "#,
        )
        .bind(window.from)
        .bind(window.to)
        .bind(window.restaurant_ids.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesTotals {
            order_count: row.try_get("order_count")?,
            delivered_count: row.try_get("delivered_count")?,
            cancelled_count: row.try_get("cancelled_count")?,
            gross_revenue: row.try_get("gross_revenue")?,
        })
    }

    async fn orders_by_status(&self, window: &ReportWindow) -> StoreResult<Vec<StatusCount>> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
              AND ($3::uuid[] IS NULL OR restaurant_id = ANY($3))
            GROUP BY status
            "#,
        )
        .bind(window.from)
        .bind(window.to)
        .bind(window.restaurant_ids.as_deref())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = rows
            .iter()
            .map(|row| {
                Ok(StatusCount {
                    status: parse_column::<OrderStatus>(row, "status")?,
                    count: row.try_get("count")?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        counts.sort_by_key(|c| OrderStatus::ALL.iter().position(|s| *s == c.status));
        Ok(counts)
    }

    async fn top_products(&self, window: &ReportWindow, limit: u32) -> StoreResult<Vec<ProductSales>> {
        let rows = sqlx::query(
            r#"
            SELECT i.product_id,
                   MAX(i.product_name) AS product_name,
                   SUM(i.quantity)::BIGINT AS quantity,
                   SUM(i.subtotal) AS revenue
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.status NOT IN ('PENDING', 'CANCELLED')
              AND o.created_at >= $1 AND o.created_at < $2
              AND ($3::uuid[] IS NULL OR o.restaurant_id = ANY($3))
            GROUP BY i.product_id
            ORDER BY quantity DESC, revenue DESC, i.product_id
            LIMIT $4
            "#,
        )
        .bind(window.from)
        .bind(window.to)
        .bind(window.restaurant_ids.as_deref())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ProductSales {
                    product_id: row.try_get("product_id")?,
                    product_name: row.try_get("product_name")?,
                    quantity: row.try_get("quantity")?,
                    revenue: row.try_get("revenue")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StoreProbe for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

