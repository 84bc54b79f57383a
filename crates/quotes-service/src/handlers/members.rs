//! Group member handlers. Every route requires membership of the group.

use super::require_group_member;
use crate::errors::QsError;
use crate::models::{AddMemberRequest, MemberResponse, Principal, UpdateMemberRequest};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

/// GET /groups/:id/users
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<MemberResponse>>, QsError> {
    require_group_member(&state, &principal, id).await?;
    let members = state.member_service.find_all(id).await?;
    Ok(Json(members))
}

/// GET /groups/:id/users/:user_id
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((id, user_id)): Path<(i32, i32)>,
) -> Result<Json<MemberResponse>, QsError> {
    require_group_member(&state, &principal, id).await?;
    let member = state.member_service.find(id, user_id).await?;
    Ok(Json(member))
}

/// POST /groups/:id/users
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(request): Json<AddMemberRequest>,
) -> Result<Json<MemberResponse>, QsError> {
    require_group_member(&state, &principal, id).await?;
    let member = state.member_service.add(id, request).await?;
    Ok(Json(member))
}

/// PATCH /groups/:id/users/me
///
/// A `null` or absent `display_name` clears the group-specific name.
pub async fn update_my_membership(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, QsError> {
    require_group_member(&state, &principal, id).await?;
    let member = state
        .member_service
        .update_display_name(id, &principal, request.display_name)
        .await?;
    Ok(Json(member))
}

/// DELETE /groups/:id/users/me
pub async fn leave_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<StatusCode, QsError> {
    require_group_member(&state, &principal, id).await?;
    state.member_service.leave(id, principal.local_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
