// Private module declarations
mod middleware;
mod server;

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry,
};

// Re-export for public API
pub use middleware::{current_request_id, RequestInstrumentation, REQUEST_ID_HEADER};
pub use server::metrics_handler;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - HTTP traffic (throughput, latency, server errors)
// - Order lifecycle (creations, status transitions, confirmed order value)
// - Authentication outcomes
// - Audit persistence failures
// - Component health and raised alerts
//
// Counters are atomics inside prometheus, so request handlers and the health
// monitor thread share them without locks. Scraped via GET /metrics.
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // HTTP Metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
    pub http_server_errors_total: IntCounter,

    // Order Metrics
    pub orders_created_total: IntCounter,
    pub order_status_transitions: IntCounterVec,
    pub order_confirmed_value: Histogram,

    // Auth Metrics
    pub login_attempts_total: IntCounterVec,

    // Audit Metrics
    pub audit_failures_total: IntCounter,

    // Health Metrics
    pub component_health: IntGaugeVec,
    pub alerts_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // HTTP Metrics
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests handled"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method", "route"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        let http_server_errors_total = IntCounter::new(
            "http_server_errors_total",
            "Total HTTP responses with a 5xx status",
        )?;
        registry.register(Box::new(http_server_errors_total.clone()))?;

        // Order Metrics
        let orders_created_total = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created_total.clone()))?;

        let order_status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_status_transitions.clone()))?;

        let order_confirmed_value = Histogram::with_opts(
            HistogramOpts::new("order_confirmed_total_value", "Total value of confirmed orders")
                .buckets(vec![10.0, 25.0, 50.0, 100.0, 200.0, 500.0]),
        )?;
        registry.register(Box::new(order_confirmed_value.clone()))?;

        // Auth Metrics
        let login_attempts_total = IntCounterVec::new(
            Opts::new("login_attempts_total", "Login attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts_total.clone()))?;

        // Audit Metrics
        let audit_failures_total = IntCounter::new(
            "audit_failures_total",
            "Audit entries that could not be persisted",
        )?;
        registry.register(Box::new(audit_failures_total.clone()))?;

        // Health Metrics
        let component_health = IntGaugeVec::new(
            Opts::new(
                "component_health",
                "Component health status (0=Down, 1=Degraded, 2=Up)",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let alerts_total = IntCounterVec::new(
            Opts::new("alerts_total", "Alerts raised by the health monitor"),
            &["kind"],
        )?;
        registry.register(Box::new(alerts_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            http_server_errors_total,
            orders_created_total,
            order_status_transitions,
            order_confirmed_value,
            login_attempts_total,
            audit_failures_total,
            component_health,
            alerts_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a finished HTTP request
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status_label = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, route, status_label.as_str()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, route])
            .observe(duration_secs);
        if status >= 500 {
            self.http_server_errors_total.inc();
        }
    }

    /// Helper to record an order status transition
    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_status_transitions.with_label_values(&[from, to]).inc();
    }

    /// Helper to record a login outcome ("success" or "failure")
    pub fn record_login(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.login_attempts_total.with_label_values(&[outcome]).inc();
    }

    pub fn login_failures(&self) -> u64 {
        self.login_attempts_total.with_label_values(&["failure"]).get()
    }

    /// Helper to update a component health gauge
    pub fn update_component_health(&self, component: &str, level: i64) {
        self.component_health.with_label_values(&[component]).set(level);
    }

    pub fn record_alert(&self, kind: &str) {
        self.alerts_total.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created_total.inc();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_http_request() {
        let metrics = Metrics::new().unwrap();
        metrics.record_http_request("GET", "/api/orders", 200, 0.02);
        metrics.record_http_request("GET", "/api/orders", 500, 0.5);

        let gathered = metrics.registry.gather();
        let requests = gathered.iter().find(|m| m.name() == "http_requests_total").unwrap();
        assert_eq!(requests.metric.len(), 2); // Two status labels
        assert_eq!(metrics.http_server_errors_total.get(), 1);
    }

    #[test]
    fn test_record_login() {
        let metrics = Metrics::new().unwrap();
        metrics.record_login(true);
        metrics.record_login(false);
        metrics.record_login(false);
        assert_eq!(metrics.login_failures(), 2);
    }

    #[test]
    fn test_transition_and_health_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("PENDING", "CONFIRMED");
        metrics.update_component_health("database", 2);

        assert_eq!(
            metrics.order_status_transitions.with_label_values(&["PENDING", "CONFIRMED"]).get(),
            1
        );
        assert_eq!(metrics.component_health.with_label_values(&["database"]).get(), 2);
    }
}
