use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use teamgrid_core::{AppResult, TeamId, UserId};
use tokio::sync::Mutex;

use teamgrid_domain::{
    Action, AuditAction, DEFAULT_ROLE_GRANTS, GrantConditions, GrantId, PermissionGrant,
    ResourceType, Subject,
};

use crate::{AuditEvent, AuditRepository, GrantStore};

/// Input payload for creating one grant.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantInput {
    /// Who the grant applies to.
    pub subject: Subject,
    /// Resource category the grant covers.
    pub resource_type: ResourceType,
    /// Optional resource instance; empty strings are treated as type-wide.
    pub resource_id: Option<String>,
    /// Action the grant decides.
    pub action: Action,
    /// `true` allows; `false` records an explicit denial entry.
    pub granted: bool,
    /// Optional conditions payload; must be a JSON object.
    pub conditions: Option<Value>,
    /// Optional expiry timestamp.
    pub expires_at: Option<DateTime<Utc>>,
}

impl GrantInput {
    /// Creates an unconditional type-wide allow input.
    #[must_use]
    pub fn allow(subject: Subject, resource_type: ResourceType, action: Action) -> Self {
        Self {
            subject,
            resource_type,
            resource_id: None,
            action,
            granted: true,
            conditions: None,
            expires_at: None,
        }
    }

    /// Creates an explicit type-wide denial input.
    #[must_use]
    pub fn deny(subject: Subject, resource_type: ResourceType, action: Action) -> Self {
        Self {
            granted: false,
            ..Self::allow(subject, resource_type, action)
        }
    }
}

/// Administers the grant table: creates, revokes, and bootstraps grants.
///
/// Writes to one team are serialized through a per-team async lock so a
/// bootstrap batch can never interleave with an individual grant or revoke on
/// the same team; operations on different teams never contend. Audit events
/// are fire-and-forget: a failing sink is logged and never fails the
/// administrative operation, while grant-store failures propagate untouched.
pub struct PermissionAdministrator {
    grants: Arc<dyn GrantStore>,
    audit: Arc<dyn AuditRepository>,
    team_write_locks: Mutex<HashMap<TeamId, Arc<Mutex<()>>>>,
}

impl PermissionAdministrator {
    /// Creates an administrator over a grant store and an audit sink.
    #[must_use]
    pub fn new(grants: Arc<dyn GrantStore>, audit: Arc<dyn AuditRepository>) -> Self {
        Self {
            grants,
            audit,
            team_write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a grant after validating the input, and returns the persisted
    /// entity.
    ///
    /// Validation failures surface before any write; the grant row itself is
    /// attributed to `granted_by` for the audit trail.
    pub async fn grant(
        &self,
        team_id: TeamId,
        granted_by: UserId,
        input: GrantInput,
    ) -> AppResult<PermissionGrant> {
        input.subject.validate()?;
        let conditions = input
            .conditions
            .as_ref()
            .map(GrantConditions::from_json)
            .transpose()?;

        let grant = PermissionGrant {
            id: GrantId::new(),
            team_id,
            subject: input.subject,
            resource_type: input.resource_type,
            resource_id: input
                .resource_id
                .filter(|value| !value.trim().is_empty()),
            action: input.action,
            granted: input.granted,
            conditions,
            expires_at: input.expires_at,
            granted_by,
            created_at: Utc::now(),
        };

        let lock = self.team_write_lock(team_id).await;
        let _write_guard = lock.lock().await;
        self.grants.insert(grant.clone()).await?;

        self.append_audit(AuditEvent {
            team_id,
            subject: granted_by.to_string(),
            action: AuditAction::PermissionGranted,
            resource_type: grant.resource_type.as_str().to_owned(),
            resource_id: grant.id.to_string(),
            detail: Some(format!(
                "granted '{}' on '{}' to '{}' (granted={})",
                grant.action, grant.resource_type, grant.subject, grant.granted
            )),
        })
        .await;

        Ok(grant)
    }

    /// Deactivates every grant matching the subject, resource type and
    /// action, returning how many were deactivated. Matching zero grants is
    /// not an error; rows are never deleted.
    pub async fn revoke(
        &self,
        team_id: TeamId,
        revoked_by: UserId,
        subject: &Subject,
        resource_type: ResourceType,
        action: Action,
    ) -> AppResult<u64> {
        subject.validate()?;

        let lock = self.team_write_lock(team_id).await;
        let _write_guard = lock.lock().await;
        let revoked = self
            .grants
            .revoke(team_id, subject, resource_type, action)
            .await?;

        self.append_audit(AuditEvent {
            team_id,
            subject: revoked_by.to_string(),
            action: AuditAction::PermissionRevoked,
            resource_type: resource_type.as_str().to_owned(),
            resource_id: subject.to_string(),
            detail: Some(format!(
                "revoked '{action}' on '{resource_type}' from '{subject}' ({revoked} grants)"
            )),
        })
        .await;

        Ok(revoked)
    }

    /// Returns whether the team still needs its default grants.
    ///
    /// Bootstrap idempotency lives at the call site: team-management flows
    /// check this before the first membership triggers
    /// [`PermissionAdministrator::bootstrap_defaults`].
    pub async fn needs_bootstrap(&self, team_id: TeamId) -> AppResult<bool> {
        Ok(!self.grants.has_grants(team_id).await?)
    }

    /// Atomically inserts the default role grant table for a new team and
    /// returns the created grants. A failed batch persists nothing.
    pub async fn bootstrap_defaults(
        &self,
        team_id: TeamId,
        granted_by: UserId,
    ) -> AppResult<Vec<PermissionGrant>> {
        let created_at = Utc::now();
        let grants: Vec<PermissionGrant> = DEFAULT_ROLE_GRANTS
            .iter()
            .map(|(role, resource_type, action)| PermissionGrant {
                id: GrantId::new(),
                team_id,
                subject: Subject::Role((*role).to_owned()),
                resource_type: *resource_type,
                resource_id: None,
                action: *action,
                granted: true,
                conditions: None,
                expires_at: None,
                granted_by,
                created_at,
            })
            .collect();

        let lock = self.team_write_lock(team_id).await;
        let _write_guard = lock.lock().await;
        self.grants.insert_batch(grants.clone()).await?;

        self.append_audit(AuditEvent {
            team_id,
            subject: granted_by.to_string(),
            action: AuditAction::PermissionDefaultsBootstrapped,
            resource_type: ResourceType::Permissions.as_str().to_owned(),
            resource_id: team_id.to_string(),
            detail: Some(format!("bootstrapped {} default role grants", grants.len())),
        })
        .await;

        Ok(grants)
    }

    /// Moves one grant's expiry; `None` makes the grant non-expiring.
    pub async fn extend_expiry(
        &self,
        team_id: TeamId,
        extended_by: UserId,
        grant_id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let lock = self.team_write_lock(team_id).await;
        let _write_guard = lock.lock().await;
        self.grants
            .extend_expiry(team_id, grant_id, expires_at)
            .await?;

        self.append_audit(AuditEvent {
            team_id,
            subject: extended_by.to_string(),
            action: AuditAction::PermissionExpiryExtended,
            resource_type: ResourceType::Permissions.as_str().to_owned(),
            resource_id: grant_id.to_string(),
            detail: expires_at
                .map(|expires_at| format!("expiry moved to '{expires_at}'"))
                .or(Some("expiry removed".to_owned())),
        })
        .await;

        Ok(())
    }

    async fn team_write_lock(&self, team_id: TeamId) -> Arc<Mutex<()>> {
        let mut locks = self.team_write_locks.lock().await;
        locks.entry(team_id).or_default().clone()
    }

    async fn append_audit(&self, event: AuditEvent) {
        if let Err(error) = self.audit.append_event(event).await {
            tracing::warn!(%error, "failed to append permission audit event");
        }
    }
}
