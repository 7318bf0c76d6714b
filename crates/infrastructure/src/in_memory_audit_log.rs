use async_trait::async_trait;
use tokio::sync::RwLock;

use teamgrid_application::{AuditEvent, AuditRepository};
use teamgrid_core::AppResult;

/// In-memory append-only audit log for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Returns a copy of every recorded event in append order.
    pub async fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditLog {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use teamgrid_application::{AuditEvent, AuditRepository};
    use teamgrid_core::TeamId;
    use teamgrid_domain::AuditAction;

    use super::InMemoryAuditLog;

    #[tokio::test]
    async fn events_are_kept_in_append_order() {
        let log = InMemoryAuditLog::new();
        let team_id = TeamId::new();
        for action in [AuditAction::PermissionGranted, AuditAction::PermissionRevoked] {
            let appended = log
                .append_event(AuditEvent {
                    team_id,
                    subject: "admin".to_owned(),
                    action,
                    resource_type: "task".to_owned(),
                    resource_id: "grant-1".to_owned(),
                    detail: None,
                })
                .await;
            assert!(appended.is_ok());
        }

        let events = log.snapshot().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::PermissionGranted);
        assert_eq!(events[1].action, AuditAction::PermissionRevoked);
    }
}
