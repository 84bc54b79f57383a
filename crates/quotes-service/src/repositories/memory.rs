//! In-memory store implementing every repository trait.
//!
//! Mirrors the PostgreSQL schema constraints:
//! - `users.external_id` and `groups.invite_code` are unique (`Conflict`)
//! - `(group_id, user_id)` is unique (`Conflict`)
//! - memberships and group creators must reference existing rows (`Rejected`)
//!
//! Used by unit tests, integration tests and the in-process app harness.
//! Failure injection (`set_unavailable`, `fail_operation`) and per-operation
//! call counters let tests observe read-through behaviour of the caches above
//! it.

use super::{GroupRepository, MembershipRepository, StoreError, UserRepository};
use crate::models::{Group, Membership, NewGroup, Principal};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct StoreState {
    users: BTreeMap<i32, Principal>,
    groups: BTreeMap<i32, Group>,
    members: BTreeMap<(i32, i32), Option<String>>,
    next_user_id: i32,
    next_group_id: i32,
    calls: HashMap<&'static str, usize>,
    failing: HashSet<&'static str>,
}

impl StoreState {
    fn next_user_id(&mut self) -> i32 {
        self.next_user_id += 1;
        self.next_user_id
    }

    fn next_group_id(&mut self) -> i32 {
        self.next_group_id += 1;
        self.next_group_id
    }
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only the named operation fail with `StoreError::Unavailable`.
    pub fn fail_operation(&self, operation: &'static str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(operation);
        } else {
            state.failing.remove(operation);
        }
    }

    /// Number of calls made to the named operation (e.g. `"memberships.find"`).
    pub fn calls(&self, operation: &str) -> usize {
        self.state.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Number of stored groups.
    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Insert a user directly, bypassing every cache.
    pub fn seed_user(&self, external_id: &str, display_name: &str) -> Principal {
        let mut state = self.state.lock();
        let id = state.next_user_id();
        let user = Principal {
            local_id: id,
            external_subject_id: external_id.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        user
    }

    /// Insert a group directly, bypassing every cache.
    pub fn seed_group(&self, invite_code: &str, display_name: &str, creator_id: Option<i32>) -> Group {
        let mut state = self.state.lock();
        let id = state.next_group_id();
        let group = Group {
            id,
            invite_code: invite_code.to_string(),
            display_name: display_name.to_string(),
            creator_id,
            created_at: Utc::now(),
        };
        state.groups.insert(id, group.clone());
        group
    }

    /// Insert a membership directly, bypassing every cache.
    pub fn seed_membership(&self, group_id: i32, user_id: i32, display_name: Option<&str>) {
        self.state
            .lock()
            .members
            .insert((group_id, user_id), display_name.map(ToString::to_string));
    }

    /// Delete a membership directly, bypassing every cache.
    pub fn remove_membership(&self, group_id: i32, user_id: i32) {
        self.state.lock().members.remove(&(group_id, user_id));
    }

    fn enter(&self, operation: &'static str) -> Result<parking_lot::MutexGuard<'_, StoreState>, StoreError> {
        let mut state = self.state.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        if self.unavailable.load(Ordering::SeqCst) || state.failing.contains(operation) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Principal>, StoreError> {
        let state = self.enter("users.find_by_external_id")?;
        Ok(state
            .users
            .values()
            .find(|u| u.external_subject_id == external_id)
            .cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Principal>, StoreError> {
        let state = self.enter("users.find_by_id")?;
        Ok(state.users.get(&id).cloned())
    }

    async fn insert(&self, external_id: &str, display_name: &str) -> Result<Principal, StoreError> {
        let mut state = self.enter("users.insert")?;
        if state
            .users
            .values()
            .any(|u| u.external_subject_id == external_id)
        {
            return Err(StoreError::Conflict("users_external_id_unique".to_string()));
        }

        let id = state.next_user_id();
        let user = Principal {
            local_id: id,
            external_subject_id: external_id.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_display_name(
        &self,
        id: i32,
        display_name: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let mut state = self.enter("users.update_display_name")?;
        Ok(state.users.get_mut(&id).map(|user| {
            user.display_name = display_name.to_string();
            user.clone()
        }))
    }

    async fn exists(&self, id: i32) -> Result<bool, StoreError> {
        let state = self.enter("users.exists")?;
        Ok(state.users.contains_key(&id))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter("users.ping").map(|_| ())
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn insert(&self, group: &NewGroup) -> Result<Group, StoreError> {
        let mut state = self.enter("groups.insert")?;
        if state
            .groups
            .values()
            .any(|g| g.invite_code == group.invite_code)
        {
            return Err(StoreError::Conflict("groups_invite_code_unique".to_string()));
        }
        if let Some(creator_id) = group.creator_id {
            if !state.users.contains_key(&creator_id) {
                return Err(StoreError::Rejected("groups_creator_id_fkey".to_string()));
            }
        }

        let id = state.next_group_id();
        let row = Group {
            id,
            invite_code: group.invite_code.clone(),
            display_name: group.display_name.clone(),
            creator_id: group.creator_id,
            created_at: Utc::now(),
        };
        state.groups.insert(id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Group>, StoreError> {
        let state = self.enter("groups.find_by_id")?;
        Ok(state.groups.get(&id).cloned())
    }

    async fn find_by_code(&self, invite_code: &str) -> Result<Option<Group>, StoreError> {
        let state = self.enter("groups.find_by_code")?;
        Ok(state
            .groups
            .values()
            .find(|g| g.invite_code == invite_code)
            .cloned())
    }

    async fn update(
        &self,
        id: i32,
        display_name: &str,
        invite_code: &str,
    ) -> Result<Option<Group>, StoreError> {
        let mut state = self.enter("groups.update")?;
        if state
            .groups
            .values()
            .any(|g| g.id != id && g.invite_code == invite_code)
        {
            return Err(StoreError::Conflict("groups_invite_code_unique".to_string()));
        }

        Ok(state.groups.get_mut(&id).map(|group| {
            group.display_name = display_name.to_string();
            group.invite_code = invite_code.to_string();
            group.clone()
        }))
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let mut state = self.enter("groups.delete")?;
        state.members.retain(|(group_id, _), _| *group_id != id);
        Ok(state.groups.remove(&id).is_some())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn insert(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Membership, StoreError> {
        let mut state = self.enter("memberships.insert")?;
        if !state.groups.contains_key(&group_id) || !state.users.contains_key(&user_id) {
            return Err(StoreError::Rejected("group_members_fkey".to_string()));
        }
        if state.members.contains_key(&(group_id, user_id)) {
            return Err(StoreError::Conflict("group_members_pkey".to_string()));
        }

        let display_name = display_name.map(ToString::to_string);
        state
            .members
            .insert((group_id, user_id), display_name.clone());
        Ok(Membership {
            group_id,
            user_id,
            display_name,
        })
    }

    async fn find(&self, group_id: i32, user_id: i32) -> Result<Option<Membership>, StoreError> {
        let state = self.enter("memberships.find")?;
        Ok(state
            .members
            .get(&(group_id, user_id))
            .map(|display_name| Membership {
                group_id,
                user_id,
                display_name: display_name.clone(),
            }))
    }

    async fn find_by_group(&self, group_id: i32) -> Result<Vec<Membership>, StoreError> {
        let state = self.enter("memberships.find_by_group")?;
        Ok(state
            .members
            .iter()
            .filter(|((g, _), _)| *g == group_id)
            .map(|((g, u), display_name)| Membership {
                group_id: *g,
                user_id: *u,
                display_name: display_name.clone(),
            })
            .collect())
    }

    async fn find_groups_of_user(&self, user_id: i32) -> Result<Vec<Group>, StoreError> {
        let state = self.enter("memberships.find_groups_of_user")?;
        Ok(state
            .members
            .keys()
            .filter(|(_, u)| *u == user_id)
            .filter_map(|(g, _)| state.groups.get(g).cloned())
            .collect())
    }

    async fn update_display_name(
        &self,
        group_id: i32,
        user_id: i32,
        display_name: Option<&str>,
    ) -> Result<Option<Membership>, StoreError> {
        let mut state = self.enter("memberships.update_display_name")?;
        Ok(state
            .members
            .get_mut(&(group_id, user_id))
            .map(|current| {
                *current = display_name.map(ToString::to_string);
                Membership {
                    group_id,
                    user_id,
                    display_name: current.clone(),
                }
            }))
    }

    async fn delete(&self, group_id: i32, user_id: i32) -> Result<u64, StoreError> {
        let mut state = self.enter("memberships.delete")?;
        Ok(u64::from(state.members.remove(&(group_id, user_id)).is_some()))
    }

    async fn exists(&self, group_id: i32, user_id: i32) -> Result<bool, StoreError> {
        let state = self.enter("memberships.exists")?;
        Ok(state.members.contains_key(&(group_id, user_id)))
    }
}
