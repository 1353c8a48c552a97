use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::audit::{AuditEntry, AuditLog};
use crate::auth::{policy, Principal};
use crate::domain::customer::{Address, Customer, CustomerUpdate};
use crate::error::{AppError, AppResult};
use crate::store::{CustomerRepository, Page, PageRequest, UserRepository};

// ============================================================================
// Customer Service - profiles of CUSTOMER accounts
// ============================================================================

/// Partial update; omitted fields stay as they are
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomer {
    #[validate(length(min = 1, max = 100, message = "name must have between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 30, message = "phone is too long"))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
}

pub struct CustomerService {
    customers: Arc<dyn CustomerRepository>,
    users: Arc<dyn UserRepository>,
    audit: AuditLog,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerRepository>, users: Arc<dyn UserRepository>, audit: AuditLog) -> Self {
        Self {
            customers,
            users,
            audit,
        }
    }

    async fn load(&self, customer_id: Uuid) -> AppResult<Customer> {
        self.customers
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer", customer_id))
    }

    pub async fn get(&self, principal: &Principal, customer_id: Uuid) -> AppResult<Customer> {
        policy::ensure_customer_access(principal, customer_id)?;
        self.load(customer_id).await
    }

    pub async fn list(&self, principal: &Principal, page: PageRequest) -> AppResult<Page<Customer>> {
        policy::require_admin(principal)?;
        Ok(self.customers.list_customers(page).await?)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        customer_id: Uuid,
        request: UpdateCustomer,
    ) -> AppResult<Customer> {
        policy::ensure_customer_access(principal, customer_id)?;
        request.validate()?;

        let mut customer = self.load(customer_id).await?;
        let changed: Vec<&str> = [
            request.name.as_ref().map(|_| "name"),
            request.phone.as_ref().map(|_| "phone"),
            request.address.as_ref().map(|_| "address"),
        ]
        .into_iter()
        .flatten()
        .collect();

        customer.apply_update(CustomerUpdate {
            name: request.name,
            phone: request.phone,
            address: request.address,
        });
        self.customers.update_customer(&customer).await?;

        self.audit
            .record(
                AuditEntry::new("CustomerUpdated", "Customer")
                    .entity(customer.id)
                    .by(principal)
                    .details(serde_json::json!({ "fields": changed })),
            )
            .await;

        Ok(customer)
    }

    /// Soft delete: disables the login and the profile, keeps order history
    pub async fn deactivate(&self, principal: &Principal, customer_id: Uuid) -> AppResult<()> {
        policy::require_admin(principal)?;
        self.load(customer_id).await?;

        if !self.users.set_user_active(customer_id, false).await? {
            return Err(AppError::not_found("Customer", customer_id));
        }

        tracing::info!(customer_id = %customer_id, "Customer deactivated");
        self.audit
            .record(
                AuditEntry::new("CustomerDeactivated", "Customer")
                    .entity(customer_id)
                    .by(principal),
            )
            .await;

        Ok(())
    }
}
