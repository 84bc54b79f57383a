//! Group memberships repository.
//!
//! The `(group_id, user_id)` primary key makes a second insert of the same
//! pair fail with `StoreError::Conflict`; unknown groups or users fail the
//! foreign keys with `StoreError::Rejected`.

use super::StoreError;
use crate::models::{Group, Membership};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

/// Store accessors for the `group_members` table.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn insert(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Membership, StoreError>;

    async fn find(&self, group_id: i32, user_id: i32) -> Result<Option<Membership>, StoreError>;

    /// All memberships of a group, ordered by user id.
    async fn find_by_group(&self, group_id: i32) -> Result<Vec<Membership>, StoreError>;

    /// All groups a user belongs to, ordered by group id.
    async fn find_groups_of_user(&self, user_id: i32) -> Result<Vec<Group>, StoreError>;

    /// Set or clear the membership display name. `None` when no row matched.
    async fn update_display_name(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Option<Membership>, StoreError>;

    /// Delete a membership, returning the number of rows affected.
    async fn delete(&self, group_id: i32, user_id: i32) -> Result<u64, StoreError>;

    async fn exists(&self, group_id: i32, user_id: i32) -> Result<bool, StoreError>;
}

/// PostgreSQL implementation of [`MembershipRepository`].
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    async fn insert(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Membership, StoreError> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO group_members (group_id, user_id, display_name)
            VALUES ($1, $2, $3)
            RETURNING group_id, user_id, display_name
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    async fn find(&self, group_id: i32, user_id: i32) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            SELECT group_id, user_id, display_name
            FROM group_members
            WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(group_id = group_id))]
    async fn find_by_group(&self, group_id: i32) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query_as::<_, Membership>(
            r#"
            SELECT group_id, user_id, display_name
            FROM group_members
            WHERE group_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip_all, fields(user_id = user_id))]
    async fn find_groups_of_user(&self, user_id: i32) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.invite_code, g.display_name, g.creator_id, g.created_at
            FROM groups g
            JOIN group_members gm ON gm.group_id = g.id
            WHERE gm.user_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    async fn update_display_name(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE group_members
            SET display_name = $3
            WHERE group_id = $1 AND user_id = $2
            RETURNING group_id, user_id, display_name
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    async fn delete(&self, group_id: i32, user_id: i32) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    async fn exists(&self, group_id: i32, user_id: i32) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
