use actix::prelude::*;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{ComponentHealth, HealthIndicator, HealthStatus};
use crate::metrics::Metrics;

// ============================================================================
// Health Monitor Actor - polls indicators and raises alerts
// ============================================================================
//
// Responsibilities:
// - Poll every health indicator on a fixed interval
// - Track the latest health of each component
// - Raise alerts when a component goes DOWN or when error counters grow
//   faster than their thresholds between two polls
// - Aggregate system-wide health for GET /health
//
// Runs on its own Arbiter thread. It shares nothing with request handlers but
// the prometheus counters, which are atomics.
//
// ============================================================================

/// Per-interval growth that triggers an alert; 0 disables the check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub server_errors: u64,
    pub login_failures: u64,
    pub audit_failures: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            server_errors: 10,
            login_failures: 20,
            audit_failures: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CounterSnapshot {
    server_errors: u64,
    login_failures: u64,
    audit_failures: u64,
}

impl CounterSnapshot {
    fn read(metrics: &Metrics) -> Self {
        Self {
            server_errors: metrics.http_server_errors_total.get(),
            login_failures: metrics.login_failures(),
            audit_failures: metrics.audit_failures_total.get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: &'static str,
    pub message: String,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

/// Poll now instead of waiting for the next tick
#[derive(Message)]
#[rtype(result = "()")]
pub struct RunChecks;

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    indicators: Vec<Arc<dyn HealthIndicator>>,
    metrics: Arc<Metrics>,
    interval: Duration,
    thresholds: AlertThresholds,
    baseline: CounterSnapshot,
}

impl HealthMonitorActor {
    pub fn new(
        indicators: Vec<Arc<dyn HealthIndicator>>,
        metrics: Arc<Metrics>,
        interval: Duration,
        thresholds: AlertThresholds,
    ) -> Self {
        let baseline = CounterSnapshot::read(&metrics);
        Self {
            components: HashMap::new(),
            indicators,
            metrics,
            interval,
            thresholds,
            baseline,
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }

    /// Compare counters with the previous poll and move the baseline forward
    fn evaluate_counters(&mut self) -> Vec<Alert> {
        let current = CounterSnapshot::read(&self.metrics);
        let previous = std::mem::replace(&mut self.baseline, current);

        let checks = [
            (
                "server_errors",
                current.server_errors.saturating_sub(previous.server_errors),
                self.thresholds.server_errors,
            ),
            (
                "login_failures",
                current.login_failures.saturating_sub(previous.login_failures),
                self.thresholds.login_failures,
            ),
            (
                "audit_failures",
                current.audit_failures.saturating_sub(previous.audit_failures),
                self.thresholds.audit_failures,
            ),
        ];

        checks
            .into_iter()
            .filter(|(_, delta, threshold)| *threshold > 0 && delta >= threshold)
            .map(|(kind, delta, threshold)| Alert {
                kind,
                message: format!(
                    "{delta} new {kind} since last check (threshold {threshold}, interval {:?})",
                    self.interval
                ),
            })
            .collect()
    }

    fn raise(&self, alert: &Alert) {
        self.metrics.record_alert(alert.kind);
        tracing::error!(alert = alert.kind, message = %alert.message, "ALERT");
    }

    fn poll(&mut self, ctx: &mut Context<Self>) {
        for alert in self.evaluate_counters() {
            self.raise(&alert);
        }

        let indicators = self.indicators.clone();
        let addr = ctx.address();
        actix::spawn(async move {
            let results = join_all(indicators.iter().map(|indicator| indicator.check())).await;
            for health in results {
                addr.do_send(UpdateHealth {
                    component: health.name,
                    status: health.status,
                    details: health.details,
                });
            }
        });
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            indicators = self.indicators.len(),
            "HealthMonitorActor started"
        );

        self.poll(ctx);
        ctx.run_interval(self.interval, |act, ctx| act.poll(ctx));
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _: &mut Self::Context) {
        let was_down = self
            .components
            .get(&msg.component)
            .is_some_and(|previous| previous.status.is_unhealthy());

        if msg.status.is_unhealthy() && !was_down {
            self.raise(&Alert {
                kind: "component_down",
                message: format!(
                    "{} is DOWN: {}",
                    msg.component,
                    msg.status.reason().unwrap_or("unknown")
                ),
            });
        } else if was_down && !msg.status.is_unhealthy() {
            tracing::info!(component = %msg.component, status = msg.status.label(), "Component recovered");
        }

        self.metrics
            .update_component_health(&msg.component, msg.status.gauge_level());

        tracing::debug!(
            component = %msg.component,
            status = ?msg.status,
            "Updated component health"
        );

        let health = ComponentHealth {
            name: msg.component.clone(),
            status: msg.status,
            last_check: Utc::now(),
            details: msg.details,
        };
        self.components.insert(msg.component, health);
    }
}

impl Handler<RunChecks> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, _msg: RunChecks, ctx: &mut Self::Context) {
        self.poll(ctx);
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = MessageResult<GetSystemHealth>;

    fn handle(&mut self, _msg: GetSystemHealth, _: &mut Self::Context) -> Self::Result {
        let overall_status = self.compute_overall_status();

        MessageResult(SystemHealth {
            overall_status,
            components: self.components.clone(),
            check_time: Utc::now(),
        })
    }
}
