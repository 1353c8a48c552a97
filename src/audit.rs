use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregate::DomainEvent;
use crate::domain::user::Role;
use crate::metrics::{current_request_id, Metrics};
use crate::store::AuditRepository;

// ============================================================================
// Audit Log - who did what to which entity, and in which request
// ============================================================================
//
// Every entry is emitted as a structured `tracing` event (target "audit") and
// appended to the audit repository. A failed append is logged and counted but
// never fails the request that produced it.
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<Role>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub request_id: Option<String>,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            actor_id: None,
            actor_role: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            request_id: current_request_id(),
            details: serde_json::Value::Null,
        }
    }

    /// Entry for a domain event; the event payload becomes the details
    pub fn for_event<E>(entity_type: &str, entity_id: Uuid, event: &E) -> Self
    where
        E: DomainEvent + Serialize,
    {
        let details = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        Self::new(event.event_type(), entity_type)
            .entity(entity_id)
            .details(details)
    }

    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn by(mut self, principal: &Principal) -> Self {
        self.actor_id = Some(principal.user_id);
        self.actor_role = Some(principal.role);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Clone)]
pub struct AuditLog {
    repository: Arc<dyn AuditRepository>,
    metrics: Arc<Metrics>,
}

impl AuditLog {
    pub fn new(repository: Arc<dyn AuditRepository>, metrics: Arc<Metrics>) -> Self {
        Self { repository, metrics }
    }

    pub async fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = entry.entity_id.as_deref().unwrap_or("-"),
            actor_id = ?entry.actor_id,
            actor_role = ?entry.actor_role,
            request_id = entry.request_id.as_deref().unwrap_or("-"),
            "audit"
        );

        if let Err(e) = self.repository.append_audit(&entry).await {
            self.metrics.audit_failures_total.inc();
            tracing::warn!(
                action = %entry.action,
                error = %e,
                "Failed to persist audit entry"
            );
        }
    }

    pub async fn record_all(&self, entries: impl IntoIterator<Item = AuditEntry>) {
        for entry in entries {
            self.record(entry).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRepo {
        entries: Mutex<Vec<AuditEntry>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditRepository for RecordingRepo {
        async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
            if self.fail {
                return Err(StoreError::Corrupt("disk full".to_string()));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn principal() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn test_record_persists_entry() {
        let repo = Arc::new(RecordingRepo::default());
        let log = AuditLog::new(repo.clone(), Arc::new(Metrics::new().unwrap()));
        let actor = principal();

        log.record(AuditEntry::new("RestaurantCreated", "Restaurant").entity("r-1").by(&actor))
            .await;

        let entries = repo.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "RestaurantCreated");
        assert_eq!(entries[0].actor_id, Some(actor.user_id));
        assert_eq!(entries[0].entity_id.as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn test_failed_append_is_counted_not_raised() {
        let repo = Arc::new(RecordingRepo { fail: true, ..Default::default() });
        let metrics = Arc::new(Metrics::new().unwrap());
        let log = AuditLog::new(repo, metrics.clone());

        log.record(AuditEntry::new("LoginFailed", "User")).await;
        log.record(AuditEntry::new("LoginFailed", "User")).await;

        assert_eq!(metrics.audit_failures_total.get(), 2);
    }
}
