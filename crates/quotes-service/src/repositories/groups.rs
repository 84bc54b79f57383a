//! Groups repository.

use super::StoreError;
use crate::models::{Group, NewGroup};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

/// Store accessors for the `groups` table.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert a group. A duplicate invite code fails with `StoreError::Conflict`.
    async fn insert(&self, group: &NewGroup) -> Result<Group, StoreError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Group>, StoreError>;

    async fn find_by_code(&self, invite_code: &str) -> Result<Option<Group>, StoreError>;

    /// Replace display name and invite code. `None` when the group does not exist.
    async fn update(
        &self,
        id: i32,
        display_name: &str,
        invite_code: &str,
    ) -> Result<Option<Group>, StoreError>;

    /// Delete a group and, by cascade, its memberships. Returns whether a
    /// row was removed.
    async fn delete(&self, id: i32) -> Result<bool, StoreError>;
}

/// PostgreSQL implementation of [`GroupRepository`].
#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    #[instrument(skip_all, fields(creator_id = ?group.creator_id))]
    async fn insert(&self, group: &NewGroup) -> Result<Group, StoreError> {
        let row = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (invite_code, display_name, creator_id)
            VALUES ($1, $2, $3)
            RETURNING id, invite_code, display_name, creator_id, created_at
            "#,
        )
        .bind(&group.invite_code)
        .bind(&group.display_name)
        .bind(group.creator_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(group_id = id))]
    async fn find_by_id(&self, id: i32) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, invite_code, display_name, creator_id, created_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all)]
    async fn find_by_code(&self, invite_code: &str) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, invite_code, display_name, creator_id, created_at
            FROM groups
            WHERE invite_code = $1
            "#,
        )
        .bind(invite_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(group_id = id))]
    async fn update(
        &self,
        id: i32,
        display_name: &str,
        invite_code: &str,
    ) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups
            SET display_name = $2, invite_code = $3
            WHERE id = $1
            RETURNING id, invite_code, display_name, creator_id, created_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(invite_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(group_id = id))]
    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
