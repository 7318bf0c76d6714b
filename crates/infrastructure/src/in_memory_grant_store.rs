use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use teamgrid_application::GrantStore;
use teamgrid_core::{AppError, AppResult, TeamId, UserId};
use teamgrid_domain::{Action, GrantId, PermissionGrant, ResourceType, Subject};

/// In-memory grant store implementation for tests and embedded use.
///
/// Batch inserts validate the whole batch before touching the table, so a
/// rejected batch leaves no partial state behind.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    grants: RwLock<Vec<PermissionGrant>>,
}

impl InMemoryGrantStore {
    /// Creates an empty in-memory grant store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(Vec::new()),
        }
    }

    /// Returns a copy of every stored grant, active or not.
    pub async fn snapshot(&self) -> Vec<PermissionGrant> {
        self.grants.read().await.clone()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
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
            .read()
            .await
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
            .read()
            .await
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

    async fn insert(&self, grant: PermissionGrant) -> AppResult<()> {
        let mut grants = self.grants.write().await;

        if grants.iter().any(|stored| stored.id == grant.id) {
            return Err(AppError::Conflict(format!(
                "grant '{}' already exists",
                grant.id
            )));
        }

        grants.push(grant);
        Ok(())
    }

    async fn insert_batch(&self, batch: Vec<PermissionGrant>) -> AppResult<()> {
        let mut grants = self.grants.write().await;

        let mut batch_ids = HashSet::new();
        for grant in &batch {
            if !batch_ids.insert(grant.id) {
                return Err(AppError::Conflict(format!(
                    "grant '{}' appears twice in the batch",
                    grant.id
                )));
            }
            if grants.iter().any(|stored| stored.id == grant.id) {
                return Err(AppError::Conflict(format!(
                    "grant '{}' already exists",
                    grant.id
                )));
            }
        }
        if let Some(first) = batch.first()
            && batch.iter().any(|grant| grant.team_id != first.team_id)
        {
            return Err(AppError::Validation(
                "grant batch must target a single team".to_owned(),
            ));
        }

        grants.extend(batch);
        Ok(())
    }

    async fn revoke(
        &self,
        team_id: TeamId,
        subject: &Subject,
        resource_type: ResourceType,
        action: Action,
    ) -> AppResult<u64> {
        let mut grants = self.grants.write().await;
        let mut revoked = 0;

        for grant in grants.iter_mut() {
            if grant.team_id == team_id
                && grant.has_subject(subject)
                && grant.resource_type == resource_type
                && grant.action == action
                && grant.granted
            {
                grant.granted = false;
                revoked += 1;
            }
        }

        Ok(revoked)
    }

    async fn extend_expiry(
        &self,
        team_id: TeamId,
        grant_id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut grants = self.grants.write().await;

        for grant in grants.iter_mut() {
            if grant.team_id == team_id && grant.id == grant_id {
                grant.expires_at = expires_at;
                return Ok(());
            }
        }

        Err(AppError::NotFound(format!(
            "grant '{grant_id}' in team '{team_id}'"
        )))
    }

    async fn list_active_grants(
        &self,
        team_id: TeamId,
        subject: Option<&Subject>,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(self
            .grants
            .read()
            .await
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
        Ok(self
            .grants
            .read()
            .await
            .iter()
            .any(|grant| grant.team_id == team_id))
    }
}
