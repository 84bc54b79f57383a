//! Group cache.
//!
//! Regions `groups_by_id` and `groups_by_code`. An update may change the
//! invite code, so it clears the whole by-code region: the old code must
//! stop resolving immediately.

use super::region::{CacheRegion, RegionStats};
use crate::errors::QsError;
use crate::models::{Group, NewGroup};
use crate::repositories::{GroupRepository, StoreError};
use std::sync::Arc;
use tracing::instrument;

pub const REGION_BY_ID: &str = "groups_by_id";
pub const REGION_BY_CODE: &str = "groups_by_code";

pub struct GroupCache {
    store: Arc<dyn GroupRepository>,
    by_id: CacheRegion<i32, Group>,
    by_code: CacheRegion<String, Group>,
}

impl GroupCache {
    pub fn new(store: Arc<dyn GroupRepository>, max_entries: u64) -> Self {
        Self {
            store,
            by_id: CacheRegion::new(REGION_BY_ID, max_entries),
            by_code: CacheRegion::new(REGION_BY_CODE, max_entries),
        }
    }

    /// Insert a group and cache it by id.
    ///
    /// # Errors
    ///
    /// - `ResourceAlreadyExists` when the invite code is taken
    /// - `UserNotFound` when the creator does not exist
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all)]
    pub async fn create(&self, group: &NewGroup) -> Result<Group, QsError> {
        let ticket = self.by_id.begin_fill();
        let created = self.store.insert(group).await.map_err(map_write_error)?;

        self.by_id.put(created.id, created.clone(), ticket);
        tracing::debug!(target: "qs.cache.groups", group_id = created.id, "Group created");
        Ok(created)
    }

    /// # Errors
    ///
    /// `GroupNotFound` for an unknown id, `ServiceUnavailable` on store failure.
    #[instrument(skip_all, fields(group_id = id))]
    pub async fn find_by_id(&self, id: i32) -> Result<Group, QsError> {
        if let Some(group) = self.by_id.get(&id) {
            return Ok(group);
        }

        let ticket = self.by_id.begin_fill();
        let group = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| unavailable(&e))?
            .ok_or_else(|| QsError::GroupNotFound("Group not found".to_string()))?;

        self.by_id.fill(id, group.clone(), ticket);
        Ok(group)
    }

    /// # Errors
    ///
    /// `GroupNotFound` for an unknown code, `ServiceUnavailable` on store failure.
    #[instrument(skip_all)]
    pub async fn find_by_code(&self, invite_code: &str) -> Result<Group, QsError> {
        let key = invite_code.to_string();
        if let Some(group) = self.by_code.get(&key) {
            return Ok(group);
        }

        let ticket = self.by_code.begin_fill();
        let group = self
            .store
            .find_by_code(invite_code)
            .await
            .map_err(|e| unavailable(&e))?
            .ok_or_else(|| QsError::GroupNotFound("Group not found".to_string()))?;

        self.by_code.fill(key, group.clone(), ticket);
        Ok(group)
    }

    /// Replace a group's display name and invite code.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` for an unknown id
    /// - `ResourceAlreadyExists` when another group uses the invite code
    /// - `ServiceUnavailable` when the store cannot be reached
    #[instrument(skip_all, fields(group_id = id))]
    pub async fn update(
        &self,
        id: i32,
        display_name: &str,
        invite_code: &str,
    ) -> Result<Group, QsError> {
        let ticket = self.by_id.begin_fill();
        let updated = self
            .store
            .update(id, display_name, invite_code)
            .await
            .map_err(map_write_error)?;

        self.by_code.invalidate_all();

        match updated {
            Some(group) => {
                self.by_id.put(id, group.clone(), ticket);
                tracing::debug!(target: "qs.cache.groups", group_id = id, "Group updated");
                Ok(group)
            }
            None => {
                self.by_id.invalidate(&id);
                Err(QsError::GroupNotFound("Group not found".to_string()))
            }
        }
    }

    /// Delete a group. Both regions drop it; the by-code key is unknown
    /// here, so that region is cleared.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` when the store cannot be reached.
    #[instrument(skip_all, fields(group_id = id))]
    pub async fn delete(&self, id: i32) -> Result<bool, QsError> {
        let deleted = self.store.delete(id).await.map_err(|e| unavailable(&e))?;

        self.by_id.invalidate(&id);
        self.by_code.invalidate_all();
        tracing::debug!(target: "qs.cache.groups", group_id = id, deleted, "Group deleted");
        Ok(deleted)
    }

    pub fn stats(&self) -> Vec<RegionStats> {
        vec![self.by_id.stats(), self.by_code.stats()]
    }
}

fn map_write_error(err: StoreError) -> QsError {
    match err {
        StoreError::Conflict(_) => {
            QsError::ResourceAlreadyExists("Invite code already in use".to_string())
        }
        StoreError::Rejected(_) => QsError::UserNotFound("User not found".to_string()),
        StoreError::Unavailable(_) => unavailable(&err),
    }
}

fn unavailable(err: &StoreError) -> QsError {
    tracing::warn!(target: "qs.cache.groups", error = %err, "Group store call failed");
    QsError::ServiceUnavailable("group store unavailable".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_REGION_CAPACITY;
    use crate::repositories::InMemoryStore;

    fn new_group(code: &str, creator_id: Option<i32>) -> NewGroup {
        NewGroup {
            invite_code: code.to_string(),
            display_name: "Office".to_string(),
            creator_id,
        }
    }

    #[tokio::test]
    async fn test_create_populates_by_id() {
        let store = Arc::new(InMemoryStore::new());
        let creator = store.seed_user("ext-1", "Creator");
        let cache = GroupCache::new(store.clone(), DEFAULT_REGION_CAPACITY);

        let group = cache
            .create(&new_group("QUOTES", Some(creator.local_id)))
            .await
            .unwrap();
        assert_eq!(cache.find_by_id(group.id).await.unwrap(), group);
        assert_eq!(store.calls("groups.find_by_id"), 0);
    }

    #[tokio::test]
    async fn test_create_with_taken_code_conflicts() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_group("QUOTES", "Existing", None);
        let cache = GroupCache::new(store, DEFAULT_REGION_CAPACITY);

        assert!(matches!(
            cache.create(&new_group("QUOTES", None)).await,
            Err(QsError::ResourceAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_create_with_unknown_creator_is_user_not_found() {
        let cache = GroupCache::new(Arc::new(InMemoryStore::new()), DEFAULT_REGION_CAPACITY);

        assert!(matches!(
            cache.create(&new_group("QUOTES", Some(77))).await,
            Err(QsError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_retires_old_invite_code() {
        let store = Arc::new(InMemoryStore::new());
        let group = store.seed_group("OLD", "Office", None);
        let cache = GroupCache::new(store, DEFAULT_REGION_CAPACITY);

        assert_eq!(cache.find_by_code("OLD").await.unwrap().id, group.id);

        let updated = cache.update(group.id, "Renamed", "NEW").await.unwrap();
        assert_eq!(updated.invite_code, "NEW");

        assert!(matches!(
            cache.find_by_code("OLD").await,
            Err(QsError::GroupNotFound(_))
        ));
        assert_eq!(cache.find_by_code("NEW").await.unwrap().display_name, "Renamed");
        assert_eq!(cache.find_by_id(group.id).await.unwrap().display_name, "Renamed");
    }

    #[tokio::test]
    async fn test_update_unknown_group() {
        let cache = GroupCache::new(Arc::new(InMemoryStore::new()), DEFAULT_REGION_CAPACITY);

        assert!(matches!(
            cache.update(5, "Name", "CODE").await,
            Err(QsError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_unknown_group() {
        let cache = GroupCache::new(Arc::new(InMemoryStore::new()), DEFAULT_REGION_CAPACITY);

        assert!(matches!(cache.find_by_id(1).await, Err(QsError::GroupNotFound(_))));
        assert!(matches!(
            cache.find_by_code("NOPE").await,
            Err(QsError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_drops_cached_group() {
        let cache = GroupCache::new(Arc::new(InMemoryStore::new()), DEFAULT_REGION_CAPACITY);
        let group = cache.create(&new_group("QUOTES", None)).await.unwrap();
        cache.find_by_code("QUOTES").await.unwrap();

        assert!(cache.delete(group.id).await.unwrap());

        assert!(matches!(
            cache.find_by_id(group.id).await,
            Err(QsError::GroupNotFound(_))
        ));
        assert!(matches!(
            cache.find_by_code("QUOTES").await,
            Err(QsError::GroupNotFound(_))
        ));
        assert!(!cache.delete(group.id).await.unwrap());
    }
}
