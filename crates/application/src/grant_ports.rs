use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teamgrid_core::{AppResult, TeamId, UserId};
use teamgrid_domain::{Action, AuditAction, GrantId, PermissionGrant, ResourceType, Subject};

/// Repository port for the persisted grant table.
///
/// The `find_*` queries return non-expired grants regardless of the
/// `granted` flag: explicit denial entries must be visible to the resolver
/// so a user-specific deny can override a role-based allow. Expiry filtering
/// happens here so adapters can push it into their query language.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Lists non-expired grants whose subject is exactly `user_id`, covering
    /// the (resource type, resource instance, action) question.
    ///
    /// A type-wide grant (no resource id) always covers the question; an
    /// instance-scoped grant covers it only when `resource_id` matches.
    async fn find_user_grants(
        &self,
        team_id: TeamId,
        user_id: UserId,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Lists non-expired grants whose subject is the role `role`, with the
    /// same resource matching rule as [`GrantStore::find_user_grants`].
    async fn find_role_grants(
        &self,
        team_id: TeamId,
        role: &str,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Persists one grant.
    async fn insert(&self, grant: PermissionGrant) -> AppResult<()>;

    /// Persists a batch of grants atomically; a failed batch must leave no
    /// grant of the batch observable.
    async fn insert_batch(&self, grants: Vec<PermissionGrant>) -> AppResult<()>;

    /// Sets `granted = false` on every grant matching the subject, resource
    /// type and action, returning how many grants were deactivated. Rows are
    /// never deleted.
    async fn revoke(
        &self,
        team_id: TeamId,
        subject: &Subject,
        resource_type: ResourceType,
        action: Action,
    ) -> AppResult<u64>;

    /// Updates the expiry of one grant; `None` removes the expiry.
    async fn extend_expiry(
        &self,
        team_id: TeamId,
        grant_id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Lists grants that are active (`granted` and non-expired) at `at`,
    /// optionally narrowed to one subject.
    async fn list_active_grants(
        &self,
        team_id: TeamId,
        subject: Option<&Subject>,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Returns whether any grant rows exist for the team, active or not.
    async fn has_grants(&self, team_id: TeamId) -> AppResult<bool>;
}

/// Port backing role lookups against the external membership collaborator.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Returns the role of the user's active membership in the team, or
    /// `None` when no active membership exists.
    async fn active_role(&self, team_id: TeamId, user_id: UserId) -> AppResult<Option<String>>;
}

/// Immutable audit event payload emitted by the permission services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Team scope for the event.
    pub team_id: TeamId,
    /// Subject that performed the action.
    pub subject: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
