use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::password::Passwords;
use super::policy;
use super::principal::Principal;
use super::token::{IssuedToken, TokenIssuer};
use crate::audit::{AuditEntry, AuditLog};
use crate::domain::customer::{Address, Customer, Email};
use crate::domain::user::{Role, UserAccount};
use crate::error::{AppError, AppResult, FieldError};
use crate::metrics::Metrics;
use crate::store::{CustomerRepository, UserRepository};

// ============================================================================
// Auth Service - registration, staff accounts and login
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCustomer {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must have between 8 and 128 characters"))]
    pub password: String,
    #[validate(length(max = 30, message = "phone is too long"))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewStaffAccount {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must have between 8 and 128 characters"))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Account as shown to clients; never carries the hash
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub email: Email,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserAccount> for AccountView {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: Principal,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    customers: Arc<dyn CustomerRepository>,
    passwords: Arc<Passwords>,
    tokens: Arc<TokenIssuer>,
    audit: AuditLog,
    metrics: Arc<Metrics>,
}

fn parse_email(raw: &str) -> AppResult<Email> {
    Email::parse(raw).map_err(|message| AppError::Validation {
        message: "Request validation failed".to_string(),
        details: vec![FieldError {
            field: "email".to_string(),
            message,
        }],
    })
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        customers: Arc<dyn CustomerRepository>,
        passwords: Arc<Passwords>,
        tokens: Arc<TokenIssuer>,
        audit: AuditLog,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            users,
            customers,
            passwords,
            tokens,
            audit,
            metrics,
        }
    }

    // Argon2 runs on the blocking pool
    async fn hash(&self, password: String) -> AppResult<String> {
        let passwords = self.passwords.clone();
        let hash = tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(hash)
    }

    async fn verify(&self, password: String, hash: String) -> AppResult<bool> {
        let passwords = self.passwords.clone();
        let verified = tokio::task::spawn_blocking(move || passwords.verify(&password, &hash))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(verified)
    }

    /// Public sign-up: one CUSTOMER account plus its profile, or nothing
    pub async fn register(&self, request: RegisterCustomer) -> AppResult<Customer> {
        request.validate()?;
        let email = parse_email(&request.email)?;

        let password_hash = self.hash(request.password).await?;
        let account = UserAccount::new(email.clone(), password_hash, Role::Customer);
        let customer = Customer::new(account.id, request.name, email, request.phone, request.address);

        self.customers.insert_customer(&account, &customer).await?;

        tracing::info!(user_id = %account.id, "Customer registered");
        self.audit
            .record(
                AuditEntry::new("CustomerRegistered", "Customer")
                    .entity(customer.id)
                    .details(serde_json::json!({ "email": customer.email })),
            )
            .await;

        Ok(customer)
    }

    /// Admin-only creation of RESTAURANT_OWNER, COURIER and ADMIN accounts
    pub async fn create_staff(&self, principal: &Principal, request: NewStaffAccount) -> AppResult<AccountView> {
        policy::require_admin(principal)?;
        request.validate()?;

        match request.role {
            Role::RestaurantOwner | Role::Courier | Role::Admin => {}
            Role::Customer => {
                return Err(AppError::validation(
                    "Customer accounts are created through registration",
                ))
            }
        }

        let email = parse_email(&request.email)?;
        let password_hash = self.hash(request.password).await?;
        let account = UserAccount::new(email, password_hash, request.role);
        self.users.insert_user(&account).await?;

        self.audit
            .record(
                AuditEntry::new("StaffAccountCreated", "User")
                    .entity(account.id)
                    .by(principal)
                    .details(serde_json::json!({ "role": account.role })),
            )
            .await;

        Ok(AccountView::from(&account))
    }

    /// Startup bootstrap of the first administrator. Returns false when the
    /// email is already registered, whatever its role.
    pub async fn ensure_admin(&self, email: &str, password: String) -> AppResult<bool> {
        let email = parse_email(email)?;
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        let password_hash = self.hash(password).await?;
        let account = UserAccount::new(email, password_hash, Role::Admin);
        self.users.insert_user(&account).await?;

        tracing::info!(user_id = %account.id, "Bootstrap administrator created");
        self.audit
            .record(
                AuditEntry::new("AdminBootstrapped", "User")
                    .entity(account.id)
                    .details(serde_json::json!({ "email": account.email })),
            )
            .await;
        Ok(true)
    }

    /// Unknown email, wrong password and inactive account fail identically
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let account = match Email::parse(&request.email) {
            Ok(email) => self.users.find_user_by_email(&email).await?,
            Err(_) => None,
        };

        let hash = match &account {
            Some(user) => user.password_hash.clone(),
            None => self.passwords.dummy_hash().to_string(),
        };
        let verified = self.verify(request.password, hash).await?;

        match account {
            Some(user) if verified && user.active => {
                let token = self.tokens.issue(&user)?;
                self.metrics.record_login(true);
                self.audit
                    .record(
                        AuditEntry::new("LoginSucceeded", "User")
                            .entity(user.id)
                            .details(serde_json::json!({ "role": user.role })),
                    )
                    .await;

                Ok(LoginResponse {
                    token,
                    user: Principal {
                        user_id: user.id,
                        email: user.email.to_string(),
                        role: user.role,
                    },
                })
            }
            _ => {
                self.metrics.record_login(false);
                tracing::warn!("Login failed");
                self.audit
                    .record(
                        AuditEntry::new("LoginFailed", "User")
                            .details(serde_json::json!({ "email": request.email.trim().to_lowercase() })),
                    )
                    .await;
                Err(AppError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Repositories};

    fn service() -> (AuthService, Arc<MemoryStore>, Arc<Metrics>) {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::from_store(store.clone());
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = AuthService::new(
            repos.users.clone(),
            repos.customers.clone(),
            Arc::new(Passwords::fast()),
            Arc::new(TokenIssuer::new("0123456789abcdef0123456789abcdef", "food-delivery", 3600)),
            AuditLog::new(repos.audit.clone(), metrics.clone()),
            metrics.clone(),
        );
        (service, store, metrics)
    }

    fn registration(email: &str) -> RegisterCustomer {
        RegisterCustomer {
            name: "Maria Silva".to_string(),
            email: email.to_string(),
            password: "correct-horse".to_string(),
            phone: None,
            address: None,
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn admin() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (service, _, metrics) = service();
        let customer = service.register(registration("maria@example.com")).await.unwrap();

        let response = service.login(login("MARIA@example.com", "correct-horse")).await.unwrap();
        assert_eq!(response.user.user_id, customer.id);
        assert_eq!(response.user.role, Role::Customer);
        assert_eq!(response.token.token_type, "Bearer");
        assert_eq!(metrics.login_attempts_total.with_label_values(&["success"]).get(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_creates_nothing() {
        let (service, store, _) = service();
        service.register(registration("dup@example.com")).await.unwrap();

        let err = service.register(registration("Dup@Example.com")).await.unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_RESOURCE");

        let page = crate::store::CustomerRepository::list_customers(store.as_ref(), Default::default())
            .await
            .unwrap();
        assert_eq!(page.total_elements, 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, store, metrics) = service();
        let customer = service.register(registration("ana@example.com")).await.unwrap();

        let wrong_password = service.login(login("ana@example.com", "nope-nope")).await.unwrap_err();
        let unknown_email = service.login(login("ghost@example.com", "nope-nope")).await.unwrap_err();

        crate::store::UserRepository::set_user_active(store.as_ref(), customer.id, false)
            .await
            .unwrap();
        let inactive = service.login(login("ana@example.com", "correct-horse")).await.unwrap_err();

        for err in [&wrong_password, &unknown_email, &inactive] {
            assert!(matches!(err, AppError::InvalidCredentials));
            assert_eq!(err.to_string(), "Invalid credentials");
        }
        assert_eq!(metrics.login_failures(), 3);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_created_once() {
        let (service, _, _) = service();
        assert!(service.ensure_admin("root@example.com", "bootstrap-pass".to_string()).await.unwrap());
        assert!(!service.ensure_admin("ROOT@example.com", "other-pass-1".to_string()).await.unwrap());

        let response = service.login(login("root@example.com", "bootstrap-pass")).await.unwrap();
        assert_eq!(response.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_staff_accounts_require_admin_and_staff_role() {
        let (service, _, _) = service();
        let request = NewStaffAccount {
            email: "courier@example.com".to_string(),
            password: "fast-bike-123".to_string(),
            role: Role::Courier,
        };

        let customer = Principal { role: Role::Customer, ..admin() };
        assert!(matches!(
            service.create_staff(&customer, request.clone()).await,
            Err(AppError::AccessDenied(_))
        ));

        let created = service.create_staff(&admin(), request).await.unwrap();
        assert_eq!(created.role, Role::Courier);

        let customer_role = NewStaffAccount {
            email: "c@example.com".to_string(),
            password: "long-enough".to_string(),
            role: Role::Customer,
        };
        assert!(matches!(
            service.create_staff(&admin(), customer_role).await,
            Err(AppError::Validation { .. })
        ));
    }
}
