//! Membership cache.
//!
//! Four derived views of `group_members`, each a [`CacheRegion`]:
//!
//! | Region | Key | Value |
//! |---|---|---|
//! | `membership_by_pair` | `(group_id, user_id)` | the membership row |
//! | `membership_by_group` | `group_id` | all memberships of the group |
//! | `membership_by_user` | `user_id` | all groups of the user |
//! | `membership_exists` | `(group_id, user_id)` | whether the row exists |
//!
//! Reads fill only their own region. Writes invalidate every region that
//! may now hold a superseded value, strictly after the store call returns.

use super::region::{CacheRegion, RegionStats};
use crate::errors::QsError;
use crate::models::{Group, Membership};
use crate::repositories::{MembershipRepository, StoreError};
use std::sync::Arc;
use tracing::instrument;

pub const REGION_BY_PAIR: &str = "membership_by_pair";
pub const REGION_BY_GROUP: &str = "membership_by_group";
pub const REGION_BY_USER: &str = "membership_by_user";
pub const REGION_EXISTS: &str = "membership_exists";

/// Consistency layer over the membership relation.
pub struct MembershipCache {
    store: Arc<dyn MembershipRepository>,
    by_pair: CacheRegion<(i32, i32), Membership>,
    by_group: CacheRegion<i32, Vec<Membership>>,
    by_user: CacheRegion<i32, Vec<Group>>,
    exists: CacheRegion<(i32, i32), bool>,
}

impl MembershipCache {
    /// Each region holds at most `max_entries` entries.
    pub fn new(store: Arc<dyn MembershipRepository>, max_entries: u64) -> Self {
        Self {
            store,
            by_pair: CacheRegion::new(REGION_BY_PAIR, max_entries),
            by_group: CacheRegion::new(REGION_BY_GROUP, max_entries),
            by_user: CacheRegion::new(REGION_BY_USER, max_entries),
            exists: CacheRegion::new(REGION_EXISTS, max_entries),
        }
    }

    /// Insert a membership.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` when the store rejects the row (duplicate pair,
    ///   unknown group or user)
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn create(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Membership, QsError> {
        let ticket = self.by_pair.begin_fill();

        let membership = self
            .store
            .insert(group_id, user_id, display_name)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) | StoreError::Rejected(_) => {
                    tracing::debug!(target: "qs.cache.membership", error = %e, "Membership insert rejected");
                    QsError::UserNotFound("User not found".to_string())
                }
                StoreError::Unavailable(_) => unavailable(&e),
            })?;

        self.by_pair.put((group_id, user_id), membership.clone(), ticket);
        self.by_group.invalidate(&group_id);
        self.by_user.invalidate(&user_id);
        self.exists.invalidate(&(group_id, user_id));

        tracing::debug!(target: "qs.cache.membership", group_id, user_id, "Membership created");
        Ok(membership)
    }

    /// Look up one membership, reading through on a miss.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` when the user is not a member of the group
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn find_by_pair(&self, group_id: i32, user_id: i32) -> Result<Membership, QsError> {
        let key = (group_id, user_id);
        if let Some(membership) = self.by_pair.get(&key) {
            return Ok(membership);
        }

        let ticket = self.by_pair.begin_fill();
        let membership = self
            .store
            .find(group_id, user_id)
            .await
            .map_err(|e| unavailable(&e))?
            .ok_or_else(|| QsError::UserNotFound("Group member not found".to_string()))?;

        self.by_pair.fill(key, membership.clone(), ticket);
        Ok(membership)
    }

    /// All memberships of a group, reading through on a miss.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` when the group has no members
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(group_id = group_id))]
    pub async fn find_members(&self, group_id: i32) -> Result<Vec<Membership>, QsError> {
        if let Some(members) = self.by_group.get(&group_id) {
            return Ok(members);
        }

        let ticket = self.by_group.begin_fill();
        let members = self
            .store
            .find_by_group(group_id)
            .await
            .map_err(|e| unavailable(&e))?;

        if members.is_empty() {
            return Err(QsError::UserNotFound("No group members found".to_string()));
        }

        self.by_group.fill(group_id, members.clone(), ticket);
        Ok(members)
    }

    /// All groups a user belongs to, reading through on a miss.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` when the user belongs to no group
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(user_id = user_id))]
    pub async fn find_groups_of_user(&self, user_id: i32) -> Result<Vec<Group>, QsError> {
        if let Some(groups) = self.by_user.get(&user_id) {
            return Ok(groups);
        }

        let ticket = self.by_user.begin_fill();
        let groups = self
            .store
            .find_groups_of_user(user_id)
            .await
            .map_err(|e| unavailable(&e))?;

        if groups.is_empty() {
            return Err(QsError::GroupNotFound("No groups found".to_string()));
        }

        self.by_user.fill(user_id, groups.clone(), ticket);
        Ok(groups)
    }

    /// Set or clear a member's group-scoped display name.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` when no membership row matched
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn update(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Membership, QsError> {
        let key = (group_id, user_id);
        let ticket = self.by_pair.begin_fill();

        let updated = self
            .store
            .update_display_name(group_id, user_id, display_name)
            .await
            .map_err(|e| unavailable(&e))?;

        // by-group values carry the display name too.
        self.by_group.invalidate(&group_id);

        match updated {
            Some(membership) => {
                self.by_pair.put(key, membership.clone(), ticket);
                Ok(membership)
            }
            None => {
                self.by_pair.invalidate(&key);
                Err(QsError::GroupNotFound("Group member not found".to_string()))
            }
        }
    }

    /// Remove a membership.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` when no membership row was deleted
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn delete(&self, group_id: i32, user_id: i32) -> Result<(), QsError> {
        let rows = self
            .store
            .delete(group_id, user_id)
            .await
            .map_err(|e| unavailable(&e))?;

        let key = (group_id, user_id);
        self.by_pair.invalidate(&key);
        self.by_group.invalidate(&group_id);
        self.by_user.invalidate(&user_id);
        self.exists.invalidate(&key);

        if rows == 0 {
            return Err(QsError::GroupNotFound("Group member not found".to_string()));
        }

        tracing::debug!(target: "qs.cache.membership", group_id, user_id, "Membership deleted");
        Ok(())
    }

    /// Whether `user_id` is a member of `group_id`. Both answers are cached.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` when the store cannot be reached.
    #[instrument(skip_all, fields(group_id = group_id, user_id = user_id))]
    pub async fn is_member(&self, group_id: i32, user_id: i32) -> Result<bool, QsError> {
        let key = (group_id, user_id);
        if let Some(exists) = self.exists.get(&key) {
            return Ok(exists);
        }

        let ticket = self.exists.begin_fill();
        let exists = self
            .store
            .exists(group_id, user_id)
            .await
            .map_err(|e| unavailable(&e))?;

        self.exists.fill(key, exists, ticket);
        Ok(exists)
    }

    /// Drop every cached group list. Group rows are embedded in by-user
    /// values, so any group change makes them stale.
    pub fn invalidate_groups_of_all_users(&self) {
        self.by_user.invalidate_all();
        tracing::debug!(target: "qs.cache.membership", "Cleared groups of all users");
    }

    pub fn stats(&self) -> Vec<RegionStats> {
        vec![
            self.by_pair.stats(),
            self.by_group.stats(),
            self.by_user.stats(),
            self.exists.stats(),
        ]
    }
}

fn unavailable(err: &StoreError) -> QsError {
    tracing::warn!(target: "qs.cache.membership", error = %err, "Membership store call failed");
    QsError::ServiceUnavailable("membership store unavailable".to_string())
}
