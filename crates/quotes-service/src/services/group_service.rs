//! Group lifecycle: create, look up, join by invite code, update.

use super::{validate_display_name, validate_invite_code};
use crate::cache::{GroupCache, MembershipCache};
use crate::errors::QsError;
use crate::models::{
    CreateGroupRequest, Group, GroupResponse, NewGroup, Principal, UpdateGroupRequest,
    UserResponse,
};
use crate::repositories::UserRepository;
use std::sync::Arc;
use tracing::instrument;

pub struct GroupService {
    groups: Arc<GroupCache>,
    memberships: Arc<MembershipCache>,
    users: Arc<dyn UserRepository>,
}

impl GroupService {
    pub fn new(
        groups: Arc<GroupCache>,
        memberships: Arc<MembershipCache>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            groups,
            memberships,
            users,
        }
    }

    /// Create a group; the creator becomes its first member. When the
    /// membership cannot be written the group is deleted again, so no group
    /// is left without members.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an invalid invite code or display name
    /// - `ResourceAlreadyExists` when the invite code is taken
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(creator_id = creator.local_id))]
    pub async fn create(
        &self,
        request: CreateGroupRequest,
        creator: &Principal,
    ) -> Result<GroupResponse, QsError> {
        validate_invite_code(&request.invite_code)?;
        validate_display_name(&request.display_name)?;

        let group = self
            .groups
            .create(&NewGroup {
                invite_code: request.invite_code,
                display_name: request.display_name,
                creator_id: Some(creator.local_id),
            })
            .await?;

        if let Err(e) = self
            .memberships
            .create(group.id, creator.local_id, None)
            .await
        {
            if let Err(cleanup) = self.groups.delete(group.id).await {
                tracing::error!(
                    target: "qs.services.group",
                    group_id = group.id,
                    error = %cleanup,
                    "Failed to delete group after creator membership failed"
                );
            }
            return Err(e);
        }

        tracing::info!(target: "qs.services.group", group_id = group.id, "Group created");
        Ok(GroupResponse::new(group, Some(UserResponse::from(creator))))
    }

    /// # Errors
    ///
    /// `GroupNotFound` for an unknown id.
    #[instrument(skip_all, fields(group_id = id))]
    pub async fn find(&self, id: i32) -> Result<GroupResponse, QsError> {
        let group = self.groups.find_by_id(id).await?;
        self.response(group).await
    }

    /// Groups the user belongs to.
    ///
    /// # Errors
    ///
    /// `GroupNotFound` when the user belongs to no group.
    #[instrument(skip_all, fields(user_id = user_id))]
    pub async fn find_all_by_user(&self, user_id: i32) -> Result<Vec<GroupResponse>, QsError> {
        let groups = self.memberships.find_groups_of_user(user_id).await?;

        let mut responses = Vec::with_capacity(groups.len());
        for group in groups {
            responses.push(self.response(group).await?);
        }
        Ok(responses)
    }

    /// Join the group identified by `invite_code`.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` for an unknown invite code
    /// - `ResourceAlreadyExists` when the user is already a member
    #[instrument(skip_all, fields(user_id = user.local_id))]
    pub async fn join(&self, invite_code: &str, user: &Principal) -> Result<GroupResponse, QsError> {
        let group = self.groups.find_by_code(invite_code).await?;

        if self.memberships.is_member(group.id, user.local_id).await? {
            return Err(QsError::ResourceAlreadyExists(
                "User is already a group member".to_string(),
            ));
        }

        self.memberships.create(group.id, user.local_id, None).await?;

        tracing::info!(target: "qs.services.group", group_id = group.id, "User joined group");
        self.response(group).await
    }

    /// Update the provided fields of a group.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an invalid invite code or display name
    /// - `ResourceAlreadyExists` when another group uses the invite code
    /// - `GroupNotFound` for an unknown id
    #[instrument(skip_all, fields(group_id = id))]
    pub async fn update(
        &self,
        id: i32,
        request: UpdateGroupRequest,
    ) -> Result<GroupResponse, QsError> {
        if let Some(invite_code) = &request.invite_code {
            validate_invite_code(invite_code)?;
            match self.groups.find_by_code(invite_code).await {
                Ok(other) if other.id != id => {
                    return Err(QsError::ResourceAlreadyExists(
                        "Invite code already in use".to_string(),
                    ));
                }
                Ok(_) | Err(QsError::GroupNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if let Some(display_name) = &request.display_name {
            validate_display_name(display_name)?;
        }

        let current = self.groups.find_by_id(id).await?;
        let display_name = request.display_name.unwrap_or(current.display_name);
        let invite_code = request.invite_code.unwrap_or(current.invite_code);

        let updated = self.groups.update(id, &display_name, &invite_code).await?;
        self.memberships.invalidate_groups_of_all_users();

        tracing::info!(target: "qs.services.group", group_id = id, "Group updated");
        self.response(updated).await
    }

    async fn response(&self, group: Group) -> Result<GroupResponse, QsError> {
        let creator = match group.creator_id {
            Some(creator_id) => self
                .users
                .find_by_id(creator_id)
                .await
                .map_err(|e| {
                    tracing::warn!(target: "qs.services.group", error = %e, "Creator lookup failed");
                    QsError::ServiceUnavailable("user store unavailable".to_string())
                })?
                .as_ref()
                .map(UserResponse::from),
            None => None,
        };
        Ok(GroupResponse::new(group, creator))
    }
}
