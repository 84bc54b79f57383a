//! Users repository.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - External subject ids are never logged

use super::StoreError;
use crate::models::Principal;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

/// Store accessors for the `users` table.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by the authority's subject id.
    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<Principal>, StoreError>;

    /// Look up a user by local id.
    async fn find_by_id(&self, id: i32) -> Result<Option<Principal>, StoreError>;

    /// Insert a user. A second insert for the same subject fails with
    /// `StoreError::Conflict`.
    async fn insert(&self, external_id: &str, display_name: &str)
        -> Result<Principal, StoreError>;

    /// Change a user's display name. `None` when the user does not exist.
    async fn update_display_name(
        &self,
        id: i32,
        display_name: &str,
    ) -> Result<Option<Principal>, StoreError>;

    async fn exists(&self, id: i32) -> Result<bool, StoreError>;

    /// Connectivity check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// PostgreSQL implementation of [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip_all)]
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let user = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, external_id, display_name, created_at
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = id))]
    async fn find_by_id(&self, id: i32) -> Result<Option<Principal>, StoreError> {
        let user = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, external_id, display_name, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip_all)]
    async fn insert(&self, external_id: &str, display_name: &str) -> Result<Principal, StoreError> {
        let user = sqlx::query_as::<_, Principal>(
            r#"
            INSERT INTO users (external_id, display_name)
            VALUES ($1, $2)
            RETURNING id, external_id, display_name, created_at
            "#,
        )
        .bind(external_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = id))]
    async fn update_display_name(
        &self,
        id: i32,
        display_name: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let user = sqlx::query_as::<_, Principal>(
            r#"
            UPDATE users
            SET display_name = $2
            WHERE id = $1
            RETURNING id, external_id, display_name, created_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = id))]
    async fn exists(&self, id: i32) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
