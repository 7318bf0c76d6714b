use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamgrid_core::{TeamId, UserId};
use uuid::Uuid;

use crate::conditions::GrantConditions;
use crate::permission::{Action, ResourceType, Subject};

/// Unique identifier for a permission grant row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GrantId(Uuid);

impl GrantId {
    /// Creates a new random grant identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a grant identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GrantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A persisted rule stating whether a subject may perform an action on a
/// resource type, optionally narrowed to one resource instance.
///
/// Grants are append-mostly: revocation flips [`PermissionGrant::granted`] to
/// false and rows are never deleted, preserving the audit history. The
/// resolution path never mutates a grant.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionGrant {
    /// Stable grant identifier.
    pub id: GrantId,
    /// Owning team.
    pub team_id: TeamId,
    /// Who the grant applies to.
    pub subject: Subject,
    /// Resource category the grant covers.
    pub resource_type: ResourceType,
    /// Specific resource instance; `None` applies type-wide.
    pub resource_id: Option<String>,
    /// Action the grant decides.
    pub action: Action,
    /// `true` allows, `false` records an explicit denial entry. An explicit
    /// deny is distinct from the absence of any grant, which also denies.
    pub granted: bool,
    /// Optional predicate evaluated against the call context at check time.
    pub conditions: Option<GrantConditions>,
    /// Expiry timestamp; a past value makes the grant inert.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator who created the grant, for the audit trail only.
    pub granted_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl PermissionGrant {
    /// Returns whether the grant's expiry has passed at `at`.
    #[must_use]
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= at)
    }

    /// Returns whether the grant contributes allow decisions at `at`.
    #[must_use]
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.granted && !self.is_expired_at(at)
    }

    /// Returns whether the grant's subject is exactly `subject`.
    #[must_use]
    pub fn has_subject(&self, subject: &Subject) -> bool {
        &self.subject == subject
    }

    /// Returns whether the grant covers a (resource type, resource instance)
    /// question.
    ///
    /// A type-wide grant covers every instance of its type; an
    /// instance-scoped grant covers only that instance and never a type-wide
    /// question.
    #[must_use]
    pub fn applies_to(&self, resource_type: ResourceType, resource_id: Option<&str>) -> bool {
        if self.resource_type != resource_type {
            return false;
        }

        match self.resource_id.as_deref() {
            None => true,
            Some(grant_resource_id) => resource_id == Some(grant_resource_id),
        }
    }

    /// Returns whether the grant decides `action`.
    #[must_use]
    pub fn decides(&self, action: Action) -> bool {
        self.action == action
    }
}

/// Default role-based grants bootstrapped once per team, as
/// (role, resource type, action) triples.
pub const DEFAULT_ROLE_GRANTS: &[(&str, ResourceType, Action)] = &[
    ("admin", ResourceType::TeamSettings, Action::Manage),
    ("admin", ResourceType::MemberManagement, Action::Manage),
    ("admin", ResourceType::Permissions, Action::Manage),
    ("admin", ResourceType::Analytics, Action::Read),
    ("admin", ResourceType::Reports, Action::Create),
    ("manager", ResourceType::Task, Action::Manage),
    ("manager", ResourceType::Channel, Action::Manage),
    ("manager", ResourceType::Meeting, Action::Manage),
    ("manager", ResourceType::Analytics, Action::Read),
    ("member", ResourceType::Task, Action::Create),
    ("member", ResourceType::Task, Action::Read),
    ("member", ResourceType::Task, Action::Update),
    ("member", ResourceType::Channel, Action::Read),
    ("member", ResourceType::Channel, Action::Create),
    ("member", ResourceType::Meeting, Action::Read),
    ("member", ResourceType::File, Action::Create),
    ("member", ResourceType::File, Action::Read),
    ("guest", ResourceType::Task, Action::Read),
    ("guest", ResourceType::Channel, Action::Read),
    ("guest", ResourceType::Meeting, Action::Read),
];

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use teamgrid_core::{TeamId, UserId};

    use super::{DEFAULT_ROLE_GRANTS, GrantId, PermissionGrant};
    use crate::permission::{Action, ResourceType, Subject};

    fn grant(resource_id: Option<&str>) -> PermissionGrant {
        PermissionGrant {
            id: GrantId::new(),
            team_id: TeamId::new(),
            subject: Subject::Role("member".to_owned()),
            resource_type: ResourceType::Task,
            resource_id: resource_id.map(str::to_owned),
            action: Action::Read,
            granted: true,
            conditions: None,
            expires_at: None,
            granted_by: UserId::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn type_wide_grant_covers_specific_instances() {
        let grant = grant(None);
        assert!(grant.applies_to(ResourceType::Task, None));
        assert!(grant.applies_to(ResourceType::Task, Some("task-7")));
        assert!(!grant.applies_to(ResourceType::Channel, None));
    }

    #[test]
    fn instance_grant_covers_only_that_instance() {
        let grant = grant(Some("task-7"));
        assert!(grant.applies_to(ResourceType::Task, Some("task-7")));
        assert!(!grant.applies_to(ResourceType::Task, Some("task-8")));
        assert!(!grant.applies_to(ResourceType::Task, None));
    }

    #[test]
    fn expiry_is_inclusive_of_the_boundary() {
        let now = Utc::now();
        let mut grant = grant(None);
        grant.expires_at = Some(now);
        assert!(grant.is_expired_at(now));
        assert!(!grant.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn default_grant_table_matches_bootstrap_contract() {
        assert_eq!(DEFAULT_ROLE_GRANTS.len(), 20);
        assert_eq!(
            DEFAULT_ROLE_GRANTS
                .iter()
                .filter(|(role, _, _)| *role == "admin")
                .count(),
            5
        );
        assert!(DEFAULT_ROLE_GRANTS.contains(&(
            "guest",
            ResourceType::Meeting,
            Action::Read
        )));
        assert!(!DEFAULT_ROLE_GRANTS.contains(&("guest", ResourceType::Task, Action::Create)));
    }
}
