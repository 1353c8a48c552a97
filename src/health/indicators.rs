use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{ComponentHealth, HealthIndicator, HealthStatus};
use crate::store::StoreProbe;

// ============================================================================
// Health Indicators
// ============================================================================

/// Persistent store round trip
pub struct StoreHealth {
    probe: Arc<dyn StoreProbe>,
    timeout: Duration,
}

impl StoreHealth {
    pub fn new(probe: Arc<dyn StoreProbe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }
}

#[async_trait]
impl HealthIndicator for StoreHealth {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> ComponentHealth {
        let started = Instant::now();
        let status = match tokio::time::timeout(self.timeout, self.probe.ping()).await {
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(e)) => HealthStatus::Unhealthy(e.to_string()),
            Err(_) => HealthStatus::Unhealthy(format!("no response within {:?}", self.timeout)),
        };

        ComponentHealth::new(self.name(), status)
            .with_details(format!("latency_ms={}", started.elapsed().as_millis()))
    }
}

/// Downstream HTTP dependency: any 2xx answer to GET is up.
/// A failing non-critical dependency reports DEGRADED instead of DOWN.
pub struct HttpDependencyHealth {
    name: String,
    url: String,
    critical: bool,
    client: reqwest::Client,
}

impl HttpDependencyHealth {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
        critical: bool,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            url: url.into(),
            critical,
            client,
        })
    }

    fn failed(&self, reason: String) -> HealthStatus {
        if self.critical {
            HealthStatus::Unhealthy(reason)
        } else {
            HealthStatus::Degraded(reason)
        }
    }
}

#[async_trait]
impl HealthIndicator for HttpDependencyHealth {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ComponentHealth {
        let status = match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => self.failed(format!("HTTP {}", response.status().as_u16())),
            Err(e) => self.failed(e.to_string()),
        };

        ComponentHealth::new(self.name(), status).with_details(self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreResult};

    struct BrokenProbe;

    #[async_trait]
    impl StoreProbe for BrokenProbe {
        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Corrupt("connection reset".to_string()))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl StoreProbe for HangingProbe {
        async fn ping(&self) -> StoreResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_health_reports_probe_outcome() {
        let up = StoreHealth::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        assert!(up.check().await.status.is_healthy());

        let down = StoreHealth::new(Arc::new(BrokenProbe), Duration::from_secs(1));
        let health = down.check().await;
        assert_eq!(health.name, "database");
        assert!(health.status.is_unhealthy());
    }

    #[tokio::test]
    async fn test_store_health_times_out() {
        let slow = StoreHealth::new(Arc::new(HangingProbe), Duration::from_millis(20));
        assert!(slow.check().await.status.is_unhealthy());
    }

    #[tokio::test]
    async fn test_unreachable_optional_dependency_is_degraded() {
        let indicator = HttpDependencyHealth::new(
            "payments",
            "http://127.0.0.1:9/health",
            Duration::from_millis(500),
            false,
        )
        .unwrap();

        let health = indicator.check().await;
        assert_eq!(health.name, "payments");
        assert_eq!(health.status.label(), "DEGRADED");
    }
}
