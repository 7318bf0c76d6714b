use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use teamgrid_core::{AppResult, TeamId, UserId};
use teamgrid_domain::{Action, ConditionContext, PermissionGrant, ResourceType, Subject};

use crate::{GrantStore, RoleResolver};

/// Active grants grouped by resource type.
pub type PermissionSummary = BTreeMap<ResourceType, BTreeSet<Action>>;

/// Decides whether a user may perform an action on a team resource.
///
/// The decision path is read-only and default-deny: the absence of a grant,
/// an expired grant, a failed condition, or a failed storage lookup all
/// resolve to deny. User-specific grants fully override role-based grants,
/// including explicit denial entries.
#[derive(Clone)]
pub struct PermissionResolver {
    grants: Arc<dyn GrantStore>,
    roles: RoleResolver,
}

impl PermissionResolver {
    /// Creates a resolver over a grant store and a role resolver.
    #[must_use]
    pub fn new(grants: Arc<dyn GrantStore>, roles: RoleResolver) -> Self {
        Self { grants, roles }
    }

    /// Returns whether `user_id` may perform `action` on the resource now.
    ///
    /// Never fails: storage errors are logged and resolve to deny.
    pub async fn authorize(
        &self,
        team_id: TeamId,
        user_id: UserId,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        context: &ConditionContext,
    ) -> bool {
        self.authorize_at(
            team_id,
            user_id,
            resource_type,
            resource_id,
            action,
            context,
            Utc::now(),
        )
        .await
    }

    /// Same as [`PermissionResolver::authorize`] with an explicit check time,
    /// used to make expiry decisions deterministic.
    #[allow(clippy::too_many_arguments)]
    pub async fn authorize_at(
        &self,
        team_id: TeamId,
        user_id: UserId,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        context: &ConditionContext,
        at: DateTime<Utc>,
    ) -> bool {
        match self
            .resolve(team_id, user_id, resource_type, resource_id, action, context, at)
            .await
        {
            Ok(decision) => decision,
            Err(error) => {
                tracing::error!(
                    %team_id,
                    %user_id,
                    resource_type = resource_type.as_str(),
                    action = action.as_str(),
                    %error,
                    "authorization lookup failed, denying"
                );
                false
            }
        }
    }

    /// Returns the active grants of a team grouped by resource type,
    /// optionally narrowed to one subject.
    pub async fn list_permissions(
        &self,
        team_id: TeamId,
        subject: Option<&Subject>,
    ) -> AppResult<PermissionSummary> {
        let grants = self
            .grants
            .list_active_grants(team_id, subject, Utc::now())
            .await?;

        let mut summary = PermissionSummary::new();
        for grant in grants {
            summary
                .entry(grant.resource_type)
                .or_default()
                .insert(grant.action);
        }

        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve(
        &self,
        team_id: TeamId,
        user_id: UserId,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        context: &ConditionContext,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let resource_id = normalize_resource_id(resource_id);

        // User-specific grants short-circuit: even an explicit deny here
        // overrides an otherwise-permitting role grant.
        let user_grants = self
            .grants
            .find_user_grants(team_id, user_id, resource_type, resource_id, action, at)
            .await?;
        if let Some(grant) = governing_grant(user_grants) {
            return Ok(decide(&grant, context));
        }

        let Some(role) = self.roles.role_for(team_id, user_id).await? else {
            return Ok(false);
        };

        let role_grants = self
            .grants
            .find_role_grants(team_id, role.as_str(), resource_type, resource_id, action, at)
            .await?;

        Ok(governing_grant(role_grants)
            .map(|grant| decide(&grant, context))
            .unwrap_or(false))
    }
}

fn normalize_resource_id(resource_id: Option<&str>) -> Option<&str> {
    resource_id.filter(|value| !value.trim().is_empty())
}

/// Picks the single grant that governs the decision: an instance-scoped match
/// beats a type-wide one, and among equals the most recently created grant
/// wins, with the grant id as the final tie-break. Duplicate overlapping
/// grants are a data anomaly, not an error; the choice must stay
/// deterministic.
fn governing_grant(mut grants: Vec<PermissionGrant>) -> Option<PermissionGrant> {
    grants.sort_by(|left, right| {
        right
            .resource_id
            .is_some()
            .cmp(&left.resource_id.is_some())
            .then_with(|| right.created_at.cmp(&left.created_at))
            .then_with(|| right.id.cmp(&left.id))
    });

    grants.into_iter().next()
}

fn decide(grant: &PermissionGrant, context: &ConditionContext) -> bool {
    match &grant.conditions {
        Some(conditions) if !conditions.evaluate(context) => false,
        _ => grant.granted,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use teamgrid_core::{AppError, AppResult, TeamId, UserId};
    use teamgrid_domain::{
        Action, ConditionContext, GrantConditions, GrantId, PermissionGrant, ResourceType, Subject,
    };

    use super::PermissionResolver;
    use crate::{GrantStore, MembershipDirectory, RoleResolver};

    struct FakeGrantStore {
        grants: Vec<PermissionGrant>,
    }

    #[async_trait]
    impl GrantStore for FakeGrantStore {
        async fn find_user_grants(
            &self,
            team_id: TeamId,
            user_id: UserId,
            resource_type: ResourceType,
            resource_id: Option<&str>,
            action: Action,
            at: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionGrant>> {
            let subject = Subject::user(user_id);
            Ok(self
                .grants
                .iter()
                .filter(|grant| {
                    grant.team_id == team_id
                        && grant.has_subject(&subject)
                        && grant.applies_to(resource_type, resource_id)
                        && grant.decides(action)
                        && !grant.is_expired_at(at)
                })
                .cloned()
                .collect())
        }

        async fn find_role_grants(
            &self,
            team_id: TeamId,
            role: &str,
            resource_type: ResourceType,
            resource_id: Option<&str>,
            action: Action,
            at: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionGrant>> {
            Ok(self
                .grants
                .iter()
                .filter(|grant| {
                    grant.team_id == team_id
                        && grant.subject.role_name() == Some(role)
                        && grant.applies_to(resource_type, resource_id)
                        && grant.decides(action)
                        && !grant.is_expired_at(at)
                })
                .cloned()
                .collect())
        }

        async fn insert(&self, _grant: PermissionGrant) -> AppResult<()> {
            Ok(())
        }

        async fn insert_batch(&self, _grants: Vec<PermissionGrant>) -> AppResult<()> {
            Ok(())
        }

        async fn revoke(
            &self,
            _team_id: TeamId,
            _subject: &Subject,
            _resource_type: ResourceType,
            _action: Action,
        ) -> AppResult<u64> {
            Ok(0)
        }

        async fn extend_expiry(
            &self,
            _team_id: TeamId,
            _grant_id: GrantId,
            _expires_at: Option<DateTime<Utc>>,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn list_active_grants(
            &self,
            team_id: TeamId,
            subject: Option<&Subject>,
            at: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionGrant>> {
            Ok(self
                .grants
                .iter()
                .filter(|grant| {
                    grant.team_id == team_id
                        && grant.is_active_at(at)
                        && subject.is_none_or(|subject| grant.has_subject(subject))
                })
                .cloned()
                .collect())
        }

        async fn has_grants(&self, team_id: TeamId) -> AppResult<bool> {
            Ok(self.grants.iter().any(|grant| grant.team_id == team_id))
        }
    }

    struct FailingGrantStore;

    #[async_trait]
    impl GrantStore for FailingGrantStore {
        async fn find_user_grants(
            &self,
            _team_id: TeamId,
            _user_id: UserId,
            _resource_type: ResourceType,
            _resource_id: Option<&str>,
            _action: Action,
            _at: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionGrant>> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn find_role_grants(
            &self,
            _team_id: TeamId,
            _role: &str,
            _resource_type: ResourceType,
            _resource_id: Option<&str>,
            _action: Action,
            _at: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionGrant>> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn insert(&self, _grant: PermissionGrant) -> AppResult<()> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn insert_batch(&self, _grants: Vec<PermissionGrant>) -> AppResult<()> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn revoke(
            &self,
            _team_id: TeamId,
            _subject: &Subject,
            _resource_type: ResourceType,
            _action: Action,
        ) -> AppResult<u64> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn extend_expiry(
            &self,
            _team_id: TeamId,
            _grant_id: GrantId,
            _expires_at: Option<DateTime<Utc>>,
        ) -> AppResult<()> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn list_active_grants(
            &self,
            _team_id: TeamId,
            _subject: Option<&Subject>,
            _at: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionGrant>> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }

        async fn has_grants(&self, _team_id: TeamId) -> AppResult<bool> {
            Err(AppError::Internal("grant table unavailable".to_owned()))
        }
    }

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

    fn grant(
        team_id: TeamId,
        subject: Subject,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        granted: bool,
    ) -> PermissionGrant {
        PermissionGrant {
            id: GrantId::new(),
            team_id,
            subject,
            resource_type,
            resource_id: resource_id.map(str::to_owned),
            action,
            granted,
            conditions: None,
            expires_at: None,
            granted_by: UserId::new(),
            created_at: Utc::now(),
        }
    }

    fn resolver(
        grants: Vec<PermissionGrant>,
        roles: HashMap<(TeamId, UserId), String>,
    ) -> PermissionResolver {
        PermissionResolver::new(
            Arc::new(FakeGrantStore { grants }),
            RoleResolver::new(Arc::new(FakeMembershipDirectory { roles })),
        )
    }

    fn member_role(team_id: TeamId, user_id: UserId) -> HashMap<(TeamId, UserId), String> {
        HashMap::from([((team_id, user_id), "member".to_owned())])
    }

    #[tokio::test]
    async fn team_without_grants_denies_everything() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(Vec::new(), member_role(team_id, user_id));

        for resource_type in ResourceType::all() {
            for action in Action::all() {
                let allowed = resolver
                    .authorize(
                        team_id,
                        user_id,
                        *resource_type,
                        None,
                        *action,
                        &ConditionContext::new(),
                    )
                    .await;
                assert!(!allowed, "{resource_type}:{action} should be denied");
            }
        }
    }

    #[tokio::test]
    async fn user_specific_allow_authorizes() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(
            vec![grant(
                team_id,
                Subject::user(user_id),
                ResourceType::Task,
                None,
                Action::Read,
                true,
            )],
            HashMap::new(),
        );

        assert!(
            resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Task,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn user_specific_deny_overrides_role_allow() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(
            vec![
                grant(
                    team_id,
                    Subject::Role("member".to_owned()),
                    ResourceType::Task,
                    None,
                    Action::Read,
                    true,
                ),
                grant(
                    team_id,
                    Subject::user(user_id),
                    ResourceType::Task,
                    None,
                    Action::Read,
                    false,
                ),
            ],
            member_role(team_id, user_id),
        );

        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Task,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn expired_grant_behaves_like_no_grant() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let mut expired = grant(
            team_id,
            Subject::user(user_id),
            ResourceType::Task,
            None,
            Action::Read,
            true,
        );
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        let resolver = resolver(vec![expired], HashMap::new());

        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Task,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn role_allow_authorizes_active_member() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(
            vec![grant(
                team_id,
                Subject::Role("member".to_owned()),
                ResourceType::Channel,
                None,
                Action::Read,
                true,
            )],
            member_role(team_id, user_id),
        );

        assert!(
            resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Channel,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn user_without_active_membership_is_denied() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(
            vec![grant(
                team_id,
                Subject::Role("member".to_owned()),
                ResourceType::Channel,
                None,
                Action::Read,
                true,
            )],
            HashMap::new(),
        );

        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Channel,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn manage_does_not_imply_create() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(
            vec![grant(
                team_id,
                Subject::Role("member".to_owned()),
                ResourceType::Task,
                None,
                Action::Manage,
                true,
            )],
            member_role(team_id, user_id),
        );

        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Task,
                    None,
                    Action::Create,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn resource_specific_allow_beats_type_wide_deny() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let resolver = resolver(
            vec![
                grant(
                    team_id,
                    Subject::user(user_id),
                    ResourceType::Channel,
                    None,
                    Action::Update,
                    false,
                ),
                grant(
                    team_id,
                    Subject::user(user_id),
                    ResourceType::Channel,
                    Some("general"),
                    Action::Update,
                    true,
                ),
            ],
            member_role(team_id, user_id),
        );

        assert!(
            resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Channel,
                    Some("general"),
                    Action::Update,
                    &ConditionContext::new(),
                )
                .await
        );
        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Channel,
                    Some("random"),
                    Action::Update,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn conditions_fail_closed_when_context_is_missing_a_key() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let mut conditional = grant(
            team_id,
            Subject::Role("member".to_owned()),
            ResourceType::Reports,
            None,
            Action::Create,
            true,
        );
        conditional.conditions = GrantConditions::from_json(&json!({"department": "sales"})).ok();
        let resolver = resolver(vec![conditional], member_role(team_id, user_id));

        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Reports,
                    None,
                    Action::Create,
                    &ConditionContext::new(),
                )
                .await
        );

        let context =
            ConditionContext::from([("department".to_owned(), json!("sales"))]);
        assert!(
            resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Reports,
                    None,
                    Action::Create,
                    &context,
                )
                .await
        );
    }

    #[tokio::test]
    async fn newest_grant_wins_among_duplicates() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let mut older_allow = grant(
            team_id,
            Subject::user(user_id),
            ResourceType::Task,
            None,
            Action::Read,
            true,
        );
        older_allow.created_at = Utc::now() - Duration::days(2);
        let newer_deny = grant(
            team_id,
            Subject::user(user_id),
            ResourceType::Task,
            None,
            Action::Read,
            false,
        );
        let resolver = resolver(vec![older_allow, newer_deny], member_role(team_id, user_id));

        assert!(
            !resolver
                .authorize(
                    team_id,
                    user_id,
                    ResourceType::Task,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn storage_failure_resolves_to_deny() {
        let resolver = PermissionResolver::new(
            Arc::new(FailingGrantStore),
            RoleResolver::new(Arc::new(FakeMembershipDirectory {
                roles: HashMap::new(),
            })),
        );

        assert!(
            !resolver
                .authorize(
                    TeamId::new(),
                    UserId::new(),
                    ResourceType::Task,
                    None,
                    Action::Read,
                    &ConditionContext::new(),
                )
                .await
        );
    }

    #[tokio::test]
    async fn list_permissions_groups_active_grants_by_resource_type() {
        let team_id = TeamId::new();
        let role = Subject::Role("member".to_owned());
        let revoked = grant(
            team_id,
            role.clone(),
            ResourceType::File,
            None,
            Action::Create,
            false,
        );
        let resolver = resolver(
            vec![
                grant(team_id, role.clone(), ResourceType::Task, None, Action::Read, true),
                grant(team_id, role.clone(), ResourceType::Task, None, Action::Create, true),
                grant(team_id, role.clone(), ResourceType::Channel, None, Action::Read, true),
                revoked,
            ],
            HashMap::new(),
        );

        let summary = resolver.list_permissions(team_id, Some(&role)).await;
        let Ok(summary) = summary else {
            panic!("summary lookup failed");
        };
        assert_eq!(
            summary
                .get(&ResourceType::Task)
                .map(|actions| actions.len()),
            Some(2)
        );
        assert!(summary.contains_key(&ResourceType::Channel));
        assert!(!summary.contains_key(&ResourceType::File));
    }
}
