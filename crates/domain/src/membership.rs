use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamgrid_core::{AppError, TeamId, UserId};

/// Lifecycle state of a team membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Member currently belongs to the team.
    Active,
    /// Member has left or been removed; row kept for history.
    Inactive,
}

impl MembershipStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(AppError::Validation(format!(
                "unknown membership status '{value}'"
            ))),
        }
    }
}

/// A user's membership in one team.
///
/// At most one active membership exists per (team, user); the membership
/// adapters maintain that invariant. The role is an opaque string supplied by
/// the membership collaborator and is not validated against a vocabulary
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMembership {
    /// Owning team.
    pub team_id: TeamId,
    /// Member user.
    pub user_id: UserId,
    /// Role held within the team.
    pub role: String,
    /// Current lifecycle state.
    pub status: MembershipStatus,
    /// When the member joined.
    pub joined_at: DateTime<Utc>,
    /// When the member left, for inactive rows.
    pub left_at: Option<DateTime<Utc>>,
}

impl TeamMembership {
    /// Creates an active membership joined at `joined_at`.
    #[must_use]
    pub fn new(
        team_id: TeamId,
        user_id: UserId,
        role: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team_id,
            user_id,
            role: role.into(),
            status: MembershipStatus::Active,
            joined_at,
            left_at: None,
        }
    }

    /// Returns whether the membership is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Marks the membership inactive and records the departure time.
    pub fn deactivate(&mut self, left_at: DateTime<Utc>) {
        self.status = MembershipStatus::Inactive;
        self.left_at = Some(left_at);
    }

    /// Reactivates an inactive membership, resetting the join time.
    pub fn activate(&mut self, joined_at: DateTime<Utc>) {
        self.status = MembershipStatus::Active;
        self.joined_at = joined_at;
        self.left_at = None;
    }
}
