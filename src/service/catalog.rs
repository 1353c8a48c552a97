use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::audit::{AuditEntry, AuditLog};
use crate::auth::{policy, Principal};
use crate::domain::catalog::{Modifier, Product, Restaurant};
use crate::domain::customer::Address;
use crate::domain::order::is_storable_amount;
use crate::domain::user::Role;
use crate::error::{AppError, AppResult};
use crate::store::{Page, PageRequest, ProductRepository, RestaurantRepository, UserRepository};

// ============================================================================
// Catalog Service - restaurants, products and modifiers
// ============================================================================
//
// Reads are public. Writes belong to the restaurant's owner or an admin; a
// product or modifier is authorized through the restaurant that carries it.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRestaurant {
    /// Admins may open a restaurant for another owner
    pub owner_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120, message = "name must have between 1 and 120 characters"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 30, message = "phone is too long"))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Address,
    pub delivery_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRestaurant {
    #[validate(length(min = 1, max = 120, message = "name must have between 1 and 120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 30, message = "phone is too long"))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
    pub delivery_fee: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, max = 120, message = "name must have between 1 and 120 characters"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 60))]
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 120, message = "name must have between 1 and 120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 60))]
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewModifier {
    #[validate(length(min = 1, max = 120, message = "name must have between 1 and 120 characters"))]
    pub name: String,
    pub price: Decimal,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModifier {
    #[validate(length(min = 1, max = 120, message = "name must have between 1 and 120 characters"))]
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub available: Option<bool>,
}

fn available_by_default() -> bool {
    true
}

fn storable(field: &str, amount: Decimal) -> AppResult<()> {
    if is_storable_amount(amount) {
        Ok(())
    } else {
        Err(AppError::invalid_field(
            field,
            "must have at most 2 decimal places and not exceed 9999999999.99",
        ))
    }
}

fn non_negative_fee(fee: Option<Decimal>) -> AppResult<()> {
    match fee {
        Some(fee) if fee < Decimal::ZERO => {
            Err(AppError::invalid_field("deliveryFee", "must not be negative"))
        }
        Some(fee) => storable("deliveryFee", fee),
        None => Ok(()),
    }
}

fn positive_price(price: Decimal) -> AppResult<()> {
    if price > Decimal::ZERO {
        storable("price", price)
    } else {
        Err(AppError::invalid_field("price", "must be greater than zero"))
    }
}

fn non_negative_price(price: Decimal) -> AppResult<()> {
    if price >= Decimal::ZERO {
        storable("price", price)
    } else {
        Err(AppError::invalid_field("price", "must not be negative"))
    }
}

pub struct CatalogService {
    restaurants: Arc<dyn RestaurantRepository>,
    products: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
    audit: AuditLog,
}

impl CatalogService {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        products: Arc<dyn ProductRepository>,
        users: Arc<dyn UserRepository>,
        audit: AuditLog,
    ) -> Self {
        Self {
            restaurants,
            products,
            users,
            audit,
        }
    }

    async fn record(&self, principal: &Principal, action: &str, entity_type: &str, id: Uuid) {
        self.audit
            .record(AuditEntry::new(action, entity_type).entity(id).by(principal))
            .await;
    }

    // ========================================================================
    // Restaurants
    // ========================================================================

    pub async fn get_restaurant(&self, restaurant_id: Uuid) -> AppResult<Restaurant> {
        self.restaurants
            .find_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| AppError::not_found("Restaurant", restaurant_id))
    }

    pub async fn list_restaurants(&self, active_only: bool, page: PageRequest) -> AppResult<Page<Restaurant>> {
        Ok(self.restaurants.list_restaurants(active_only, page).await?)
    }

    pub async fn create_restaurant(&self, principal: &Principal, request: NewRestaurant) -> AppResult<Restaurant> {
        request.validate()?;
        non_negative_fee(request.delivery_fee)?;

        let owner_id = request.owner_id.unwrap_or(principal.user_id);
        policy::ensure_can_open_restaurant(principal, owner_id)?;

        if owner_id != principal.user_id {
            let owner = self
                .users
                .find_user(owner_id)
                .await?
                .ok_or_else(|| AppError::not_found("User", owner_id))?;
            match owner.role {
                Role::RestaurantOwner | Role::Admin => {}
                Role::Customer | Role::Courier => {
                    return Err(AppError::invalid_field(
                        "ownerId",
                        "owner must be a restaurant owner or administrator",
                    ))
                }
            }
        }

        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id,
            name: request.name,
            description: request.description,
            phone: request.phone,
            address: request.address,
            delivery_fee: request.delivery_fee,
            active: true,
            created_at: Utc::now(),
        };
        self.restaurants.insert_restaurant(&restaurant).await?;

        tracing::info!(restaurant_id = %restaurant.id, owner_id = %owner_id, "Restaurant created");
        self.record(principal, "RestaurantCreated", "Restaurant", restaurant.id).await;
        Ok(restaurant)
    }

    pub async fn update_restaurant(
        &self,
        principal: &Principal,
        restaurant_id: Uuid,
        request: UpdateRestaurant,
    ) -> AppResult<Restaurant> {
        let mut restaurant = self.get_restaurant(restaurant_id).await?;
        policy::ensure_restaurant_manager(principal, &restaurant)?;
        request.validate()?;
        non_negative_fee(request.delivery_fee)?;

        if let Some(name) = request.name {
            restaurant.name = name;
        }
        if let Some(description) = request.description {
            restaurant.description = Some(description);
        }
        if let Some(phone) = request.phone {
            restaurant.phone = Some(phone);
        }
        if let Some(address) = request.address {
            restaurant.address = address;
        }
        if let Some(fee) = request.delivery_fee {
            restaurant.delivery_fee = Some(fee);
        }
        if let Some(active) = request.active {
            restaurant.active = active;
        }

        self.restaurants.update_restaurant(&restaurant).await?;
        self.record(principal, "RestaurantUpdated", "Restaurant", restaurant.id).await;
        Ok(restaurant)
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        self.products
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", product_id))
    }

    pub async fn list_products(&self, restaurant_id: Uuid, page: PageRequest) -> AppResult<Page<Product>> {
        self.get_restaurant(restaurant_id).await?;
        Ok(self.products.list_products(restaurant_id, page).await?)
    }

    pub async fn create_product(
        &self,
        principal: &Principal,
        restaurant_id: Uuid,
        request: NewProduct,
    ) -> AppResult<Product> {
        let restaurant = self.get_restaurant(restaurant_id).await?;
        policy::ensure_restaurant_manager(principal, &restaurant)?;
        request.validate()?;
        positive_price(request.price)?;

        let product = Product {
            id: Uuid::new_v4(),
            restaurant_id,
            name: request.name,
            description: request.description,
            category: request.category,
            price: request.price,
            available: request.available,
            created_at: Utc::now(),
        };
        self.products.insert_product(&product).await?;

        self.record(principal, "ProductCreated", "Product", product.id).await;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        principal: &Principal,
        product_id: Uuid,
        request: UpdateProduct,
    ) -> AppResult<Product> {
        let mut product = self.get_product(product_id).await?;
        let restaurant = self.get_restaurant(product.restaurant_id).await?;
        policy::ensure_restaurant_manager(principal, &restaurant)?;
        request.validate()?;

        if let Some(price) = request.price {
            positive_price(price)?;
            product.price = price;
        }
        if let Some(name) = request.name {
            product.name = name;
        }
        if let Some(description) = request.description {
            product.description = Some(description);
        }
        if let Some(category) = request.category {
            product.category = Some(category);
        }
        if let Some(available) = request.available {
            product.available = available;
        }

        self.products.update_product(&product).await?;
        self.record(principal, "ProductUpdated", "Product", product.id).await;
        Ok(product)
    }

    // ========================================================================
    // Modifiers
    // ========================================================================

    pub async fn list_modifiers(&self, product_id: Uuid) -> AppResult<Vec<Modifier>> {
        self.get_product(product_id).await?;
        Ok(self.products.list_modifiers(product_id).await?)
    }

    pub async fn create_modifier(
        &self,
        principal: &Principal,
        product_id: Uuid,
        request: NewModifier,
    ) -> AppResult<Modifier> {
        let product = self.get_product(product_id).await?;
        let restaurant = self.get_restaurant(product.restaurant_id).await?;
        policy::ensure_restaurant_manager(principal, &restaurant)?;
        request.validate()?;
        non_negative_price(request.price)?;

        let modifier = Modifier {
            id: Uuid::new_v4(),
            product_id,
            name: request.name,
            price: request.price,
            available: request.available,
        };
        self.products.insert_modifier(&modifier).await?;

        self.record(principal, "ModifierCreated", "Modifier", modifier.id).await;
        Ok(modifier)
    }

    pub async fn update_modifier(
        &self,
        principal: &Principal,
        modifier_id: Uuid,
        request: UpdateModifier,
    ) -> AppResult<Modifier> {
        let mut modifier = self
            .products
            .find_modifier(modifier_id)
            .await?
            .ok_or_else(|| AppError::not_found("Modifier", modifier_id))?;
        let product = self.get_product(modifier.product_id).await?;
        let restaurant = self.get_restaurant(product.restaurant_id).await?;
        policy::ensure_restaurant_manager(principal, &restaurant)?;
        request.validate()?;

        if let Some(price) = request.price {
            non_negative_price(price)?;
            modifier.price = price;
        }
        if let Some(name) = request.name {
            modifier.name = name;
        }
        if let Some(available) = request.available {
            modifier.available = available;
        }

        self.products.update_modifier(&modifier).await?;
        self.record(principal, "ModifierUpdated", "Modifier", modifier.id).await;
        Ok(modifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Email;
    use crate::domain::order::MAX_AMOUNT;
    use crate::domain::user::UserAccount;
    use crate::metrics::Metrics;
    use crate::store::{MemoryStore, Repositories};

    fn service() -> (CatalogService, Repositories) {
        let repos = Repositories::from_store(Arc::new(MemoryStore::new()));
        let audit = AuditLog::new(repos.audit.clone(), Arc::new(Metrics::new().unwrap()));
        let service = CatalogService::new(
            repos.restaurants.clone(),
            repos.products.clone(),
            repos.users.clone(),
            audit,
        );
        (service, repos)
    }

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "staff@example.com".to_string(),
            role,
        }
    }

    fn new_restaurant(owner_id: Option<Uuid>) -> NewRestaurant {
        NewRestaurant {
            owner_id,
            name: "Cantina".to_string(),
            description: None,
            phone: None,
            address: Address {
                street: "Av. Paulista 1000".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                postal_code: "01310-100".to_string(),
                country: "BR".to_string(),
            },
            delivery_fee: Some(Decimal::new(500, 2)),
        }
    }

    fn new_product(price: Decimal) -> NewProduct {
        NewProduct {
            name: "Feijoada".to_string(),
            description: None,
            category: Some("Pratos".to_string()),
            price,
            available: true,
        }
    }

    #[tokio::test]
    async fn test_owner_manages_own_catalog_only() {
        let (service, _) = service();
        let owner = principal(Role::RestaurantOwner);
        let restaurant = service.create_restaurant(&owner, new_restaurant(None)).await.unwrap();
        assert_eq!(restaurant.owner_id, owner.user_id);

        let product = service
            .create_product(&owner, restaurant.id, new_product(Decimal::new(4500, 2)))
            .await
            .unwrap();

        let rival = principal(Role::RestaurantOwner);
        let err = service
            .update_product(
                &rival,
                product.id,
                UpdateProduct {
                    price: Some(Decimal::ONE),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        let customer = principal(Role::Customer);
        assert!(service.create_restaurant(&customer, new_restaurant(None)).await.is_err());
    }

    #[tokio::test]
    async fn test_owner_cannot_open_restaurant_for_someone_else() {
        let (service, _) = service();
        let owner = principal(Role::RestaurantOwner);
        let err = service
            .create_restaurant(&owner, new_restaurant(Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_admin_assigns_owner_with_matching_role() {
        let (service, repos) = service();
        let admin = principal(Role::Admin);

        let owner = UserAccount::new(Email::parse("dono@example.com").unwrap(), String::new(), Role::RestaurantOwner);
        let courier = UserAccount::new(Email::parse("moto@example.com").unwrap(), String::new(), Role::Courier);
        repos.users.insert_user(&owner).await.unwrap();
        repos.users.insert_user(&courier).await.unwrap();

        let restaurant = service
            .create_restaurant(&admin, new_restaurant(Some(owner.id)))
            .await
            .unwrap();
        assert_eq!(restaurant.owner_id, owner.id);

        let err = service
            .create_restaurant(&admin, new_restaurant(Some(courier.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let missing = service
            .create_restaurant(&admin, new_restaurant(Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert_eq!(missing.error_code(), "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_price_rules() {
        let (service, _) = service();
        let owner = principal(Role::RestaurantOwner);
        let restaurant = service.create_restaurant(&owner, new_restaurant(None)).await.unwrap();

        let zero = service
            .create_product(&owner, restaurant.id, new_product(Decimal::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(zero, AppError::Validation { .. }));

        let product = service
            .create_product(&owner, restaurant.id, new_product(Decimal::new(1990, 2)))
            .await
            .unwrap();

        // Free modifiers are allowed, negative ones are not
        let free = service
            .create_modifier(
                &owner,
                product.id,
                NewModifier {
                    name: "Farofa".to_string(),
                    price: Decimal::ZERO,
                    available: true,
                },
            )
            .await
            .unwrap();
        let negative = service
            .create_modifier(
                &owner,
                product.id,
                NewModifier {
                    name: "Desconto".to_string(),
                    price: Decimal::new(-100, 2),
                    available: true,
                },
            )
            .await;
        assert!(negative.is_err());

        let modifiers = service.list_modifiers(product.id).await.unwrap();
        assert_eq!(modifiers.len(), 1);
        assert_eq!(modifiers[0].id, free.id);

        let mut fee = new_restaurant(None);
        fee.delivery_fee = Some(Decimal::new(-1, 0));
        assert!(service.create_restaurant(&owner, fee).await.is_err());
    }

    #[tokio::test]
    async fn test_listing_products_of_unknown_restaurant_is_not_found() {
        let (service, _) = service();
        let err = service
            .list_products(Uuid::new_v4(), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RESTAURANT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_deactivated_restaurant_drops_out_of_active_listing() {
        let (service, _) = service();
        let owner = principal(Role::RestaurantOwner);
        let restaurant = service.create_restaurant(&owner, new_restaurant(None)).await.unwrap();

        service
            .update_restaurant(
                &owner,
                restaurant.id,
                UpdateRestaurant {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let active = service.list_restaurants(true, PageRequest::default()).await.unwrap();
        assert_eq!(active.total_elements, 0);
        let all = service.list_restaurants(false, PageRequest::default()).await.unwrap();
        assert_eq!(all.total_elements, 1);
    }

    #[tokio::test]
    async fn test_amounts_must_fit_the_money_columns() {
        let (service, _) = service();
        let owner = principal(Role::RestaurantOwner);
        let restaurant = service.create_restaurant(&owner, new_restaurant(None)).await.unwrap();

        for price in [Decimal::MAX, MAX_AMOUNT + Decimal::new(1, 2), Decimal::new(1005, 3)] {
            let err = service
                .create_product(&owner, restaurant.id, new_product(price))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "{price} accepted");
        }

        let product = service
            .create_product(&owner, restaurant.id, new_product(MAX_AMOUNT))
            .await
            .unwrap();
        assert_eq!(product.price, MAX_AMOUNT);

        let fee = service
            .update_restaurant(
                &owner,
                restaurant.id,
                UpdateRestaurant {
                    delivery_fee: Some(Decimal::new(12345, 3)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(fee, AppError::Validation { .. }));

        let modifier = service
            .create_modifier(
                &owner,
                product.id,
                NewModifier {
                    name: "Trufa".to_string(),
                    price: Decimal::MAX,
                    available: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(modifier, AppError::Validation { .. }));
    }
}
