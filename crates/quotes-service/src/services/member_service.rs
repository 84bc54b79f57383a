//! Group membership management.
//!
//! Responses carry the effective display name: the membership override when
//! set, otherwise the user's own name.

use super::validate_display_name;
use crate::cache::MembershipCache;
use crate::errors::QsError;
use crate::models::{AddMemberRequest, MemberResponse, Membership, Principal};
use crate::repositories::{StoreError, UserRepository};
use std::sync::Arc;
use tracing::instrument;

pub struct MemberService {
    memberships: Arc<MembershipCache>,
    users: Arc<dyn UserRepository>,
}

impl MemberService {
    pub fn new(memberships: Arc<MembershipCache>, users: Arc<dyn UserRepository>) -> Self {
        Self { memberships, users }
    }

    /// Add a user to a group.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an invalid display name
    /// - `UserNotFound` for an unknown user
    /// - `ResourceAlreadyExists` when the user is already a member
    #[instrument(skip_all, fields(group_id = group_id, user_id = request.user_id))]
    pub async fn add(
        &self,
        group_id: i32,
        request: AddMemberRequest,
    ) -> Result<MemberResponse, QsError> {
        if let Some(display_name) = &request.display_name {
            validate_display_name(display_name)?;
        }

        let user_exists = self
            .users
            .exists(request.user_id)
            .await
            .map_err(|e| store_unavailable(&e))?;
        if !user_exists {
            return Err(QsError::UserNotFound("User not found".to_string()));
        }

        if self.memberships.is_member(group_id, request.user_id).await? {
            return Err(QsError::ResourceAlreadyExists(
                "Group member already exists".to_string(),
            ));
        }

        let membership = self
            .memberships
            .create(group_id, request.user_id, request.display_name.as_deref())
            .await?;

        tracing::info!(target: "qs.services.member", group_id, user_id = request.user_id, "Member added");
        self.response(&membership).await
    }

    /// # Errors
    ///
    /// `UserNotFound` when the user is not a member of the group.
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn find(&self, group_id: i32, user_id: i32) -> Result<MemberResponse, QsError> {
        let membership = self.memberships.find_by_pair(group_id, user_id).await?;
        self.response(&membership).await
    }

    /// # Errors
    ///
    /// `UserNotFound` when the group has no members.
    #[instrument(skip_all, fields(group_id = group_id))]
    pub async fn find_all(&self, group_id: i32) -> Result<Vec<MemberResponse>, QsError> {
        let members = self.memberships.find_members(group_id).await?;

        let mut responses = Vec::with_capacity(members.len());
        for membership in &members {
            responses.push(self.response(membership).await?);
        }
        Ok(responses)
    }

    /// Set (`Some`) or clear (`None`) the caller's name within a group.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an invalid display name
    /// - `GroupNotFound` when the user is not a member
    #[instrument(skip_all, fields(group_id = group_id, user_id = user.local_id))]
    pub async fn update_display_name(
        &self,
        group_id: i32,
        user: &Principal,
        display_name: Option<String>,
    ) -> Result<MemberResponse, QsError> {
        if let Some(name) = &display_name {
            validate_display_name(name)?;
        }

        let membership = self
            .memberships
            .update(group_id, user.local_id, display_name.as_deref())
            .await?;

        Ok(MemberResponse::new(user, &membership))
    }

    /// Leave a group.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when the user is not a member.
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn leave(&self, group_id: i32, user_id: i32) -> Result<(), QsError> {
        if !self.memberships.is_member(group_id, user_id).await? {
            return Err(QsError::UserNotFound(
                "User is not a group member".to_string(),
            ));
        }

        self.memberships.delete(group_id, user_id).await?;
        tracing::info!(target: "qs.services.member", group_id, user_id, "Member left group");
        Ok(())
    }

    async fn response(&self, membership: &Membership) -> Result<MemberResponse, QsError> {
        let user = self
            .users
            .find_by_id(membership.user_id)
            .await
            .map_err(|e| store_unavailable(&e))?
            .ok_or_else(|| QsError::UserNotFound("User not found".to_string()))?;

        Ok(MemberResponse::new(&user, membership))
    }
}

fn store_unavailable(err: &StoreError) -> QsError {
    tracing::warn!(target: "qs.services.member", error = %err, "User store call failed");
    QsError::ServiceUnavailable("user store unavailable".to_string())
}
