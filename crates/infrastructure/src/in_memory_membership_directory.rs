use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use teamgrid_application::MembershipDirectory;
use teamgrid_core::{AppResult, TeamId, UserId};
use teamgrid_domain::TeamMembership;

/// In-memory membership directory for tests and embedded use.
///
/// Keys memberships by (team, user), which keeps the one-active-membership
/// invariant by construction.
#[derive(Debug, Default)]
pub struct InMemoryMembershipDirectory {
    memberships: RwLock<HashMap<(TeamId, UserId), TeamMembership>>,
}

impl InMemoryMembershipDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a member with the given role, reactivating a previous membership
    /// when one exists.
    pub async fn add_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        role: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) {
        let role = role.into();
        let mut memberships = self.memberships.write().await;
        memberships
            .entry((team_id, user_id))
            .and_modify(|membership| {
                membership.role = role.clone();
                membership.activate(joined_at);
            })
            .or_insert_with(|| TeamMembership::new(team_id, user_id, role, joined_at));
    }

    /// Deactivates a member's membership; unknown members are ignored.
    pub async fn deactivate_member(&self, team_id: TeamId, user_id: UserId, left_at: DateTime<Utc>) {
        let mut memberships = self.memberships.write().await;
        if let Some(membership) = memberships.get_mut(&(team_id, user_id)) {
            membership.deactivate(left_at);
        }
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryMembershipDirectory {
    async fn active_role(&self, team_id: TeamId, user_id: UserId) -> AppResult<Option<String>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(team_id, user_id))
            .filter(|membership| membership.is_active())
            .map(|membership| membership.role.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use teamgrid_application::MembershipDirectory;
    use teamgrid_core::{TeamId, UserId};

    use super::InMemoryMembershipDirectory;

    #[tokio::test]
    async fn active_member_resolves_to_role() {
        let directory = InMemoryMembershipDirectory::new();
        let team_id = TeamId::new();
        let user_id = UserId::new();
        directory.add_member(team_id, user_id, "leader", Utc::now()).await;

        let role = directory.active_role(team_id, user_id).await;
        assert_eq!(role.ok(), Some(Some("leader".to_owned())));
    }

    #[tokio::test]
    async fn deactivated_member_has_no_role() {
        let directory = InMemoryMembershipDirectory::new();
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let joined_at = Utc::now();
        directory.add_member(team_id, user_id, "member", joined_at).await;
        directory
            .deactivate_member(team_id, user_id, joined_at + Duration::days(1))
            .await;

        let role = directory.active_role(team_id, user_id).await;
        assert_eq!(role.ok(), Some(None));
    }

    #[tokio::test]
    async fn rejoining_updates_the_role() {
        let directory = InMemoryMembershipDirectory::new();
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let joined_at = Utc::now();
        directory.add_member(team_id, user_id, "member", joined_at).await;
        directory
            .deactivate_member(team_id, user_id, joined_at + Duration::days(1))
            .await;
        directory
            .add_member(team_id, user_id, "leader", joined_at + Duration::days(2))
            .await;

        let role = directory.active_role(team_id, user_id).await;
        assert_eq!(role.ok(), Some(Some("leader".to_owned())));
    }
}
