use actix::prelude::*;
use actix_web::{App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use food_delivery::api;
use food_delivery::auth::{Passwords, TokenIssuer};
use food_delivery::config::{AppConfig, StorageBackend};
use food_delivery::health::{AlertThresholds, HealthIndicator, HealthMonitorActor, HttpDependencyHealth, StoreHealth};
use food_delivery::metrics::{Metrics, RequestInstrumentation};
use food_delivery::state::AppState;
use food_delivery::store::{MemoryStore, PgStore, Repositories};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Structured logging; RUST_LOG wins over `logging.filter`
    // Example: RUST_LOG=debug,sqlx=warn food-delivery
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    tracing::info!(
        backend = ?config.storage.backend,
        port = config.server.port,
        "Starting food delivery backend"
    );

    // === 1. Storage ===
    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let store = PgStore::connect(&config.storage).await?;
            store.migrate().await?;
            tracing::info!("Database migrations applied");
            Repositories::from_store(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Repositories::from_store(Arc::new(MemoryStore::new()))
        }
    };

    // === 2. Metrics, passwords, tokens ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let passwords = Arc::new(Passwords::default());
    // Hash the timing dummy once now instead of during the first failed login
    let warm = passwords.clone();
    tokio::task::spawn_blocking(move || {
        warm.dummy_hash();
    })
    .await?;

    let tokens = Arc::new(TokenIssuer::new(
        &config.auth.jwt_secret,
        &config.auth.issuer,
        config.auth.token_ttl_secs,
    ));

    // === 3. Health monitor on its own arbiter ===
    let mut indicators: Vec<Arc<dyn HealthIndicator>> = vec![Arc::new(StoreHealth::new(
        repos.probe.clone(),
        config.monitor.probe_timeout(),
    ))];
    if let Some(url) = &config.downstream.url {
        indicators.push(Arc::new(HttpDependencyHealth::new(
            config.downstream.name.clone(),
            url.clone(),
            std::time::Duration::from_millis(config.downstream.timeout_ms),
            config.downstream.critical,
        )?));
    }

    let thresholds = AlertThresholds {
        server_errors: config.monitor.server_error_threshold,
        login_failures: config.monitor.login_failure_threshold,
        audit_failures: config.monitor.audit_failure_threshold,
    };
    let monitor_arbiter = Arbiter::new();
    let monitor = {
        let metrics = metrics.clone();
        let interval = config.monitor.interval();
        HealthMonitorActor::start_in_arbiter(&monitor_arbiter.handle(), move |_| {
            HealthMonitorActor::new(indicators, metrics, interval, thresholds)
        })
    };

    // === 4. Services ===
    let state = AppState::new(&repos, passwords, tokens, metrics.clone(), monitor);

    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password) {
        if !state.auth.ensure_admin(email, password.clone()).await? {
            tracing::debug!(email = %email, "Bootstrap administrator already exists");
        }
    }

    // === 5. HTTP server ===
    let (host, port) = config.bind_address();
    tracing::info!(%host, port, "Listening");

    let mut server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(RequestInstrumentation::new(state.metrics.clone()))
            .configure(|cfg| state.register(cfg))
            .configure(api::configure)
    })
    .bind((host.as_str(), port))?;
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }
    server.run().await?;

    tracing::info!("Server stopped, shutting down health monitor");
    monitor_arbiter.stop();

    Ok(())
}
