//! User profile lookups and display-name updates.

use super::validate_display_name;
use crate::errors::QsError;
use crate::models::UserResponse;
use crate::repositories::{StoreError, UserRepository};
use std::sync::Arc;
use tracing::instrument;

pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// # Errors
    ///
    /// `UserNotFound` for an unknown id.
    #[instrument(skip_all, fields(user_id = id))]
    pub async fn find(&self, id: i32) -> Result<UserResponse, QsError> {
        self.users
            .find_by_id(id)
            .await
            .map_err(|e| store_unavailable(&e))?
            .as_ref()
            .map(UserResponse::from)
            .ok_or_else(|| QsError::UserNotFound("User not found".to_string()))
    }

    /// # Errors
    ///
    /// - `BadRequest` for an invalid display name
    /// - `UserNotFound` for an unknown id
    #[instrument(skip_all, fields(user_id = id))]
    pub async fn update_display_name(
        &self,
        id: i32,
        display_name: &str,
    ) -> Result<UserResponse, QsError> {
        validate_display_name(display_name)?;

        let user = self
            .users
            .update_display_name(id, display_name)
            .await
            .map_err(|e| store_unavailable(&e))?
            .ok_or_else(|| QsError::UserNotFound("User not found".to_string()))?;

        tracing::info!(target: "qs.services.user", user_id = id, "Display name updated");
        Ok(UserResponse::from(&user))
    }
}

fn store_unavailable(err: &StoreError) -> QsError {
    tracing::warn!(target: "qs.services.user", error = %err, "User store call failed");
    QsError::ServiceUnavailable("user store unavailable".to_string())
}
