use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use teamgrid_core::{AppError, AppResult, UserId};

/// Resource categories that grants can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Team tasks.
    Task,
    /// Team chat channels.
    Channel,
    /// Team meetings.
    Meeting,
    /// File attachments.
    File,
    /// Team configuration surface.
    TeamSettings,
    /// Membership administration surface.
    MemberManagement,
    /// Analytics dashboards.
    Analytics,
    /// Generated reports.
    Reports,
    /// The permission administration surface itself.
    Permissions,
}

impl ResourceType {
    /// Returns a stable storage value for this resource type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Channel => "channel",
            Self::Meeting => "meeting",
            Self::File => "file",
            Self::TeamSettings => "team_settings",
            Self::MemberManagement => "member_management",
            Self::Analytics => "analytics",
            Self::Reports => "reports",
            Self::Permissions => "permissions",
        }
    }

    /// Returns all known resource types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceType] = &[
            ResourceType::Task,
            ResourceType::Channel,
            ResourceType::Meeting,
            ResourceType::File,
            ResourceType::TeamSettings,
            ResourceType::MemberManagement,
            ResourceType::Analytics,
            ResourceType::Reports,
            ResourceType::Permissions,
        ];

        ALL
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "task" => Ok(Self::Task),
            "channel" => Ok(Self::Channel),
            "meeting" => Ok(Self::Meeting),
            "file" => Ok(Self::File),
            "team_settings" => Ok(Self::TeamSettings),
            "member_management" => Ok(Self::MemberManagement),
            "analytics" => Ok(Self::Analytics),
            "reports" => Ok(Self::Reports),
            "permissions" => Ok(Self::Permissions),
            _ => Err(AppError::Validation(format!(
                "unknown resource type '{value}'"
            ))),
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Actions that grants can permit or deny on a resource.
///
/// `Manage` is a distinct action, not a superset: no implication between
/// actions is ever computed, so managing a resource type does not carry
/// create/read/update/delete with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create a resource.
    Create,
    /// Read a resource.
    Read,
    /// Update a resource.
    Update,
    /// Delete a resource.
    Delete,
    /// Administer a resource type.
    Manage,
}

impl Action {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Manage => "manage",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::Manage,
        ];

        ALL
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "manage" => Ok(Self::Manage),
            _ => Err(AppError::Validation(format!("unknown action '{value}'"))),
        }
    }
}

impl Display for Action {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Who a grant applies to: one concrete user, or every member holding a role.
///
/// Exactly one of the two by construction; role names are opaque strings
/// supplied by the membership collaborator and are not validated against a
/// role vocabulary here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// A user-specific grant subject.
    User(UserId),
    /// A role-based grant subject.
    Role(String),
}

impl Subject {
    /// Creates a user-specific subject.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self::User(user_id)
    }

    /// Creates a role-based subject with a validated non-empty role name.
    pub fn role(name: impl Into<String>) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "role subject name must not be empty".to_owned(),
            ));
        }

        Ok(Self::Role(name))
    }

    /// Returns the user identifier for user-specific subjects.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(user_id) => Some(*user_id),
            Self::Role(_) => None,
        }
    }

    /// Returns the role name for role-based subjects.
    #[must_use]
    pub fn role_name(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Role(name) => Some(name.as_str()),
        }
    }

    /// Rejects subjects that violate the exactly-one-of invariant in ways the
    /// type system cannot rule out (a whitespace-only role name).
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::User(_) => Ok(()),
            Self::Role(name) if !name.trim().is_empty() => Ok(()),
            Self::Role(_) => Err(AppError::Validation(
                "role subject name must not be empty".to_owned(),
            )),
        }
    }
}

impl Display for Subject {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(user_id) => write!(formatter, "user:{user_id}"),
            Self::Role(name) => write!(formatter, "role:{name}"),
        }
    }
}
