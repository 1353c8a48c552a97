// ============================================================================
// Food Delivery Backend
// ============================================================================
//
// Layers, outermost first:
// - api:     actix-web handlers and route table
// - service: use cases (authorize → domain → store → audit/metrics)
// - auth:    passwords, tokens, principal extraction, role policy
// - domain:  order aggregate, catalog, customers, users
// - store:   repository traits with PostgreSQL and in-memory backends
//
// Cross-cutting: config, error, audit, metrics, health.
//
// ============================================================================

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod metrics;
pub mod service;
pub mod state;
pub mod store;
pub mod utils;
