use std::sync::Arc;

use actix::Addr;
use actix_web::web;

use crate::audit::AuditLog;
use crate::auth::{AuthService, Passwords, TokenIssuer};
use crate::health::HealthMonitorActor;
use crate::metrics::Metrics;
use crate::service::{CatalogService, CustomerService, OrderService, ReportService};
use crate::store::Repositories;

// ============================================================================
// Application State - everything handlers reach through `web::Data`
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub customers: Arc<CustomerService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub reports: Arc<ReportService>,
    pub tokens: Arc<TokenIssuer>,
    pub metrics: Arc<Metrics>,
    pub monitor: Addr<HealthMonitorActor>,
}

impl AppState {
    /// Wire every service over one set of repositories
    pub fn new(
        repos: &Repositories,
        passwords: Arc<Passwords>,
        tokens: Arc<TokenIssuer>,
        metrics: Arc<Metrics>,
        monitor: Addr<HealthMonitorActor>,
    ) -> Self {
        let audit = AuditLog::new(repos.audit.clone(), metrics.clone());

        let auth = AuthService::new(
            repos.users.clone(),
            repos.customers.clone(),
            passwords,
            tokens.clone(),
            audit.clone(),
            metrics.clone(),
        );
        let customers = CustomerService::new(repos.customers.clone(), repos.users.clone(), audit.clone());
        let catalog = CatalogService::new(
            repos.restaurants.clone(),
            repos.products.clone(),
            repos.users.clone(),
            audit.clone(),
        );
        let orders = OrderService::new(
            repos.orders.clone(),
            repos.restaurants.clone(),
            repos.products.clone(),
            repos.customers.clone(),
            audit,
            metrics.clone(),
        );
        let reports = ReportService::new(repos.reports.clone(), repos.restaurants.clone());

        Self {
            auth: Arc::new(auth),
            customers: Arc::new(customers),
            catalog: Arc::new(catalog),
            orders: Arc::new(orders),
            reports: Arc::new(reports),
            tokens,
            metrics,
            monitor,
        }
    }

    /// Register the state plus the pieces extractors look up on their own
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.clone()))
            .app_data(web::Data::from(self.tokens.clone()))
            .app_data(web::Data::new(self.metrics.clone()));
    }
}
