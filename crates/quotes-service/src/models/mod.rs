//! Data models for the quotes service.
//!
//! Store records (`Principal`, `Group`, `Membership`) plus the request and
//! response bodies exchanged over HTTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Store records
// ============================================================================

/// A local identity provisioned for one external subject (`users` table).
///
/// `external_subject_id` is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Principal {
    /// Store-assigned id.
    #[sqlx(rename = "id")]
    pub local_id: i32,

    /// Subject claim issued by the authority. Unique.
    #[sqlx(rename = "external_id")]
    pub external_subject_id: String,

    /// Display name, at most 32 characters.
    pub display_name: String,

    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("local_id", &self.local_id)
            .field("external_subject_id", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A quote group (`groups` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Group {
    pub id: i32,
    /// Unique join code, at most 8 characters.
    pub invite_code: String,
    /// At most 32 characters.
    pub display_name: String,
    /// Null once the creating user is gone.
    pub creator_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a group (`group_members` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Membership {
    pub group_id: i32,
    pub user_id: i32,
    /// Group-scoped override of the user's display name.
    pub display_name: Option<String>,
}

/// Fields for inserting a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub invite_code: String,
    pub display_name: String,
    pub creator_id: Option<i32>,
}

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /groups`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupRequest {
    pub invite_code: String,
    pub display_name: String,
}

/// Body of `POST /groups/invite`.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}

/// Body of `PATCH /groups/:id`. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub invite_code: Option<String>,
}

/// Body of `POST /groups/:id/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i32,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Body of `PATCH /groups/:id/users/me`. `null` clears the override.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMemberRequest {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Body of `PATCH /users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: String,
}

// ============================================================================
// Responses
// ============================================================================

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for UserResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.local_id,
            display_name: principal.display_name.clone(),
            created_at: principal.created_at,
        }
    }
}

/// Public view of a group, with its creator when still known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: i32,
    pub invite_code: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserResponse>,
}

impl GroupResponse {
    pub fn new(group: Group, creator: Option<UserResponse>) -> Self {
        Self {
            id: group.id,
            invite_code: group.invite_code,
            display_name: group.display_name,
            created_at: group.created_at,
            creator,
        }
    }
}

/// A group member with the display name that applies inside the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user: UserResponse,
    /// Membership override when set, otherwise the user's own display name.
    pub display_name: String,
}

impl MemberResponse {
    pub fn new(user: &Principal, membership: &Membership) -> Self {
        Self {
            user: UserResponse::from(user),
            display_name: membership
                .display_name
                .clone()
                .unwrap_or_else(|| user.display_name.clone()),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy".
    pub status: String,
    /// Store connectivity.
    pub database: String,
}
