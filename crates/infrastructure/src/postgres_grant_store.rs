use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use teamgrid_application::GrantStore;
use teamgrid_core::{AppError, AppResult, TeamId, UserId};
use teamgrid_domain::{
    Action, GrantConditions, GrantId, PermissionGrant, ResourceType, Subject,
};

/// PostgreSQL-backed grant store over the `team_permissions` table.
#[derive(Clone)]
pub struct PostgresGrantStore {
    pool: PgPool,
}

impl PostgresGrantStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const GRANT_COLUMNS: &str = "id, team_id, user_id, role, resource_type, resource_id, \
     action, granted, conditions, expires_at, granted_by, created_at";

#[derive(Debug, FromRow)]
struct GrantRow {
    id: Uuid,
    team_id: Uuid,
    user_id: Option<Uuid>,
    role: Option<String>,
    resource_type: String,
    resource_id: Option<String>,
    action: String,
    granted: bool,
    conditions: Option<serde_json::Value>,
    expires_at: Option<DateTime<Utc>>,
    granted_by: Uuid,
    created_at: DateTime<Utc>,
}

impl GrantRow {
    fn into_domain(self) -> AppResult<PermissionGrant> {
        let subject = match (self.user_id, self.role) {
            (Some(user_id), None) => Subject::user(UserId::from_uuid(user_id)),
            (None, Some(role)) => Subject::Role(role),
            _ => {
                return Err(AppError::Internal(format!(
                    "grant '{}' must have exactly one of user_id and role",
                    self.id
                )));
            }
        };

        let conditions = self.conditions.as_ref().map(|value| {
            let conditions = GrantConditions::from_stored(value);
            if conditions.is_unsatisfiable() {
                tracing::warn!(
                    grant_id = %self.id,
                    "malformed grant conditions payload, treating as unsatisfiable"
                );
            }
            conditions
        });

        Ok(PermissionGrant {
            id: GrantId::from_uuid(self.id),
            team_id: TeamId::from_uuid(self.team_id),
            subject,
            resource_type: ResourceType::from_str(self.resource_type.as_str()).map_err(
                |error| {
                    AppError::Internal(format!(
                        "failed to decode resource type for grant '{}': {error}",
                        self.id
                    ))
                },
            )?,
            resource_id: self.resource_id,
            action: Action::from_str(self.action.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode action for grant '{}': {error}",
                    self.id
                ))
            })?,
            granted: self.granted,
            conditions,
            expires_at: self.expires_at,
            granted_by: UserId::from_uuid(self.granted_by),
            created_at: self.created_at,
        })
    }
}

async fn insert_grant(connection: &mut PgConnection, grant: &PermissionGrant) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO team_permissions (
            id, team_id, user_id, role, resource_type, resource_id,
            action, granted, conditions, expires_at, granted_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(grant.id.as_uuid())
    .bind(grant.team_id.as_uuid())
    .bind(grant.subject.user_id().map(|user_id| user_id.as_uuid()))
    .bind(grant.subject.role_name())
    .bind(grant.resource_type.as_str())
    .bind(grant.resource_id.as_deref())
    .bind(grant.action.as_str())
    .bind(grant.granted)
    .bind(
        grant
            .conditions
            .as_ref()
            .map(GrantConditions::storage_value),
    )
    .bind(grant.expires_at)
    .bind(grant.granted_by.as_uuid())
    .bind(grant.created_at)
    .execute(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to insert grant: {error}")))?;

    Ok(())
}

#[async_trait]
impl GrantStore for PostgresGrantStore {
    async fn find_user_grants(
        &self,
        team_id: TeamId,
        user_id: UserId,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        action: Action,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM team_permissions
            WHERE team_id = $1
                AND user_id = $2
                AND resource_type = $3
                AND action = $4
                AND (resource_id IS NULL
                    OR ($5::text IS NOT NULL AND resource_id = $5))
                AND (expires_at IS NULL OR expires_at > $6)
            "#
        ))
        .bind(team_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(resource_type.as_str())
        .bind(action.as_str())
        .bind(resource_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user grants: {error}")))?;

        rows.into_iter().map(GrantRow::into_domain).collect()
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
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM team_permissions
            WHERE team_id = $1
                AND role = $2
                AND resource_type = $3
                AND action = $4
                AND (resource_id IS NULL
                    OR ($5::text IS NOT NULL AND resource_id = $5))
                AND (expires_at IS NULL OR expires_at > $6)
            "#
        ))
        .bind(team_id.as_uuid())
        .bind(role)
        .bind(resource_type.as_str())
        .bind(action.as_str())
        .bind(resource_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grants: {error}")))?;

        rows.into_iter().map(GrantRow::into_domain).collect()
    }

    async fn insert(&self, grant: PermissionGrant) -> AppResult<()> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire connection: {error}"))
        })?;

        insert_grant(&mut connection, &grant).await
    }

    async fn insert_batch(&self, grants: Vec<PermissionGrant>) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        for grant in &grants {
            insert_grant(&mut transaction, grant).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit grant batch: {error}"))
        })?;

        Ok(())
    }

    async fn revoke(
        &self,
        team_id: TeamId,
        subject: &Subject,
        resource_type: ResourceType,
        action: Action,
    ) -> AppResult<u64> {
        let query = match subject {
            Subject::User(user_id) => sqlx::query(
                r#"
                UPDATE team_permissions
                SET granted = FALSE
                WHERE team_id = $1
                    AND user_id = $2
                    AND resource_type = $3
                    AND action = $4
                    AND granted = TRUE
                "#,
            )
            .bind(team_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(resource_type.as_str())
            .bind(action.as_str()),
            Subject::Role(role) => sqlx::query(
                r#"
                UPDATE team_permissions
                SET granted = FALSE
                WHERE team_id = $1
                    AND role = $2
                    AND resource_type = $3
                    AND action = $4
                    AND granted = TRUE
                "#,
            )
            .bind(team_id.as_uuid())
            .bind(role.as_str())
            .bind(resource_type.as_str())
            .bind(action.as_str()),
        };

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to revoke grants: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn extend_expiry(
        &self,
        team_id: TeamId,
        grant_id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE team_permissions
            SET expires_at = $3
            WHERE team_id = $1 AND id = $2
            "#,
        )
        .bind(team_id.as_uuid())
        .bind(grant_id.as_uuid())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update grant expiry: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "grant '{grant_id}' in team '{team_id}'"
            )));
        }

        Ok(())
    }

    async fn list_active_grants(
        &self,
        team_id: TeamId,
        subject: Option<&Subject>,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let user_id = subject.and_then(Subject::user_id);
        let role = subject.and_then(Subject::role_name);
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM team_permissions
            WHERE team_id = $1
                AND granted = TRUE
                AND (expires_at IS NULL OR expires_at > $2)
                AND ($3::uuid IS NULL OR user_id = $3)
                AND ($4::text IS NULL OR role = $4)
            "#
        ))
        .bind(team_id.as_uuid())
        .bind(at)
        .bind(user_id.map(|user_id| user_id.as_uuid()))
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list grants: {error}")))?;

        rows.into_iter().map(GrantRow::into_domain).collect()
    }

    async fn has_grants(&self, team_id: TeamId) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM team_permissions WHERE team_id = $1)
            "#,
        )
        .bind(team_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to probe grants: {error}")))?;

        Ok(exists.0)
    }
}
