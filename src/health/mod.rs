mod indicators;
mod monitor;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use indicators::{HttpDependencyHealth, StoreHealth};
pub use monitor::{
    AlertThresholds, GetSystemHealth, HealthMonitorActor, RunChecks, SystemHealth, UpdateHealth,
};

// ============================================================================
// Health Check Abstractions
// ============================================================================
//
// Indicators probe one dependency each. The monitor actor polls them on an
// interval and keeps the latest `ComponentHealth` per component, which the
// /health endpoint reports.
//
// ============================================================================

/// Health status of a component
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }

    /// Wire label: UP, DEGRADED or DOWN
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "UP",
            HealthStatus::Degraded(_) => "DEGRADED",
            HealthStatus::Unhealthy(_) => "DOWN",
        }
    }

    /// Value for the `component_health` gauge (0=Down, 1=Degraded, 2=Up)
    pub fn gauge_level(&self) -> i64 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded(_) => 1,
            HealthStatus::Unhealthy(_) => 0,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => Some(reason),
        }
    }
}

/// Health information for a component
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// One dependency the service needs, checked periodically
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> ComponentHealth;
}

// ============================================================================
// Health Report (GET /health body)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub components: BTreeMap<String, ComponentReport>,
    pub check_time: DateTime<Utc>,
}

impl From<&SystemHealth> for HealthReport {
    fn from(health: &SystemHealth) -> Self {
        let components = health
            .components
            .iter()
            .map(|(name, component)| {
                (
                    name.clone(),
                    ComponentReport {
                        status: component.status.label(),
                        reason: component.status.reason().map(str::to_string),
                        details: component.details.clone(),
                        last_check: component.last_check,
                    },
                )
            })
            .collect();

        Self {
            status: health.overall_status.label(),
            components,
            check_time: health.check_time,
        }
    }
}
