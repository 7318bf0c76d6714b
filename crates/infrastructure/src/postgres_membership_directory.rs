use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use teamgrid_application::MembershipDirectory;
use teamgrid_core::{AppError, AppResult, TeamId, UserId};

/// PostgreSQL-backed membership directory over the `team_memberships` table.
#[derive(Clone)]
pub struct PostgresMembershipDirectory {
    pool: PgPool,
}

impl PostgresMembershipDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role: String,
}

#[async_trait]
impl MembershipDirectory for PostgresMembershipDirectory {
    async fn active_role(&self, team_id: TeamId, user_id: UserId) -> AppResult<Option<String>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT role
            FROM team_memberships
            WHERE team_id = $1
                AND user_id = $2
                AND status = 'active'
            "#,
        )
        .bind(team_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load membership: {error}")))?;

        Ok(row.map(|row| row.role))
    }
}
