//! Append-only audit trail, written as a side effect of every mutation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{ActorContext, AppError, AuditLogEntry, DatabaseClient};

/// Audit action names, one per mutation kind.
pub mod actions {
    pub const SERVICE_REGISTERED: &str = "service_registered";
    pub const ENTITY_SCREENED: &str = "entity_screened";
    pub const TRANSFER_CREATED: &str = "ach_transfer_created";
    pub const TRANSFER_APPROVED: &str = "ach_transfer_approved";
    pub const TRANSFER_REJECTED: &str = "ach_transfer_rejected";
    pub const TRANSFER_EXECUTED: &str = "ach_transfer_executed";
}

/// Entity type names recorded on audit entries.
pub mod entities {
    pub const SERVICE_REGISTRATION: &str = "service_registration";
    pub const TRANSFER_REQUEST: &str = "transfer_request";
    pub const COMPLIANCE_SCREENING: &str = "compliance_screening";
}

/// Thin wrapper over the audit sink. Entries are never updated or deleted.
pub struct AuditTrail {
    db: Arc<dyn DatabaseClient>,
}

impl AuditTrail {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    /// Append one entry. Failures propagate and are never retried here,
    /// keeping the one-entry-per-transition count exact.
    #[instrument(skip(self, actor, metadata), fields(tenant_id = %tenant_id, action = %action))]
    pub async fn record(
        &self,
        tenant_id: &str,
        actor: &ActorContext,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: serde_json::Value,
    ) -> Result<AuditLogEntry, AppError> {
        let entry = AuditLogEntry {
            id: Uuid::now_v7().to_string(),
            tenant_id: tenant_id.to_string(),
            actor_id: actor.actor_id.clone(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            metadata,
            source_ip: actor.source_ip.clone(),
            recorded_at: Utc::now(),
        };

        self.db.append_audit_entry(&entry).await?;
        debug!(entity_id = %entry.entity_id, "Audit entry appended");
        Ok(entry)
    }

    /// Entries for one entity, oldest first.
    pub async fn entries_for(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        self.db
            .list_audit_entries(tenant_id, entity_type, entity_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActorRole;
    use crate::test_utils::mocks::MockDatabaseClient;

    #[tokio::test]
    async fn test_record_appends_entry_with_actor_fields() {
        let db = Arc::new(MockDatabaseClient::new());
        let trail = AuditTrail::new(db.clone());
        let actor = ActorContext::new("admin-1", ActorRole::Admin).with_source_ip("10.0.0.7");

        let entry = trail
            .record(
                "tenant-1",
                &actor,
                actions::TRANSFER_CREATED,
                entities::TRANSFER_REQUEST,
                "tr_1",
                serde_json::json!({"amount": "100.00"}),
            )
            .await
            .unwrap();

        assert_eq!(entry.actor_id, "admin-1");
        assert_eq!(entry.source_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(entry.action, "ach_transfer_created");
        assert_eq!(db.audit_entry_count(), 1);
    }

    #[tokio::test]
    async fn test_record_propagates_sink_failure() {
        let db = Arc::new(MockDatabaseClient::failing("audit sink down"));
        let trail = AuditTrail::new(db.clone());
        let actor = ActorContext::new("admin-1", ActorRole::Admin);

        let result = trail
            .record(
                "tenant-1",
                &actor,
                actions::TRANSFER_CREATED,
                entities::TRANSFER_REQUEST,
                "tr_1",
                serde_json::json!({}),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(db.audit_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_entries_for_returns_in_insertion_order() {
        let db = Arc::new(MockDatabaseClient::new());
        let trail = AuditTrail::new(db);
        let actor = ActorContext::new("manager-1", ActorRole::Manager);

        for action in [actions::TRANSFER_CREATED, actions::TRANSFER_APPROVED] {
            trail
                .record(
                    "tenant-1",
                    &actor,
                    action,
                    entities::TRANSFER_REQUEST,
                    "tr_1",
                    serde_json::json!({}),
                )
                .await
                .unwrap();
        }

        let entries = trail
            .entries_for("tenant-1", entities::TRANSFER_REQUEST, "tr_1")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "ach_transfer_created");
        assert_eq!(entries[1].action, "ach_transfer_approved");
    }
}
