//! Handlers for the caller's own user profile.

use crate::errors::QsError;
use crate::models::{Principal, UpdateUserRequest, UserResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use std::sync::Arc;

/// GET /users/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>, QsError> {
    let user = state.user_service.find(principal.local_id).await?;
    Ok(Json(user))
}

/// PATCH /users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, QsError> {
    let user = state
        .user_service
        .update_display_name(principal.local_id, &request.display_name)
        .await?;
    Ok(Json(user))
}
