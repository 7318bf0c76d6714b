use std::sync::Arc;

use teamgrid_core::{AppResult, TeamId, UserId};

use crate::MembershipDirectory;

/// Resolves a user's current role within a team.
///
/// Absence of an active membership is represented as `Ok(None)`, never as an
/// error, so callers can treat "no role" as "no role-based grants apply"
/// without leaking existence information through error types.
#[derive(Clone)]
pub struct RoleResolver {
    directory: Arc<dyn MembershipDirectory>,
}

impl RoleResolver {
    /// Creates a resolver over a membership directory implementation.
    #[must_use]
    pub fn new(directory: Arc<dyn MembershipDirectory>) -> Self {
        Self { directory }
    }

    /// Returns the user's active role in the team, if any.
    pub async fn role_for(&self, team_id: TeamId, user_id: UserId) -> AppResult<Option<String>> {
        self.directory.active_role(team_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use teamgrid_core::{AppResult, TeamId, UserId};

    use super::RoleResolver;
    use crate::MembershipDirectory;

    struct FakeMembershipDirectory {
        roles: HashMap<(TeamId, UserId), String>,
    }

    #[async_trait]
    impl MembershipDirectory for FakeMembershipDirectory {
        async fn active_role(
            &self,
            team_id: TeamId,
            user_id: UserId,
        ) -> AppResult<Option<String>> {
            Ok(self.roles.get(&(team_id, user_id)).cloned())
        }
    }

    #[tokio::test]
    async fn returns_role_for_active_member() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = RoleResolver::new(Arc::new(FakeMembershipDirectory {
            roles: HashMap::from([((team_id, user_id), "manager".to_owned())]),
        }));

        let role = resolver.role_for(team_id, user_id).await;
        assert_eq!(role.ok(), Some(Some("manager".to_owned())));
    }

    #[tokio::test]
    async fn absence_is_none_not_an_error() {
        let resolver = RoleResolver::new(Arc::new(FakeMembershipDirectory {
            roles: HashMap::new(),
        }));

        let role = resolver.role_for(TeamId::new(), UserId::new()).await;
        assert_eq!(role.ok(), Some(None));
    }
}
