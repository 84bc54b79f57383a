//! Group handlers.
//!
//! `GET /groups/:id` and `PATCH /groups/:id` are restricted to members of
//! the group; creating, joining and listing one's own groups are open to any
//! authenticated caller.

use super::require_group_member;
use crate::errors::QsError;
use crate::models::{
    CreateGroupRequest, GroupResponse, JoinGroupRequest, Principal, UpdateGroupRequest,
};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use std::sync::Arc;

/// POST /groups
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Json<GroupResponse>, QsError> {
    let group = state.group_service.create(request, &principal).await?;
    Ok(Json(group))
}

/// GET /groups/me
pub async fn get_my_groups(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<GroupResponse>>, QsError> {
    let groups = state
        .group_service
        .find_all_by_user(principal.local_id)
        .await?;
    Ok(Json(groups))
}

/// POST /groups/invite
pub async fn join_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<JoinGroupRequest>,
) -> Result<Json<GroupResponse>, QsError> {
    let group = state
        .group_service
        .join(&request.invite_code, &principal)
        .await?;
    Ok(Json(group))
}

/// GET /groups/:id
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<GroupResponse>, QsError> {
    require_group_member(&state, &principal, id).await?;
    let group = state.group_service.find(id).await?;
    Ok(Json(group))
}

/// PATCH /groups/:id
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, QsError> {
    require_group_member(&state, &principal, id).await?;
    let group = state.group_service.update(id, request).await?;
    Ok(Json(group))
}
