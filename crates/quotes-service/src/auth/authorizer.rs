//! Group membership authorization.

use crate::cache::MembershipCache;
use crate::models::Principal;
use std::sync::Arc;

/// Answers "is this principal a member of group G".
///
/// Holds no cache of its own. Lookup failures deny access.
pub struct Authorizer {
    memberships: Arc<MembershipCache>,
}

impl Authorizer {
    pub fn new(memberships: Arc<MembershipCache>) -> Self {
        Self { memberships }
    }

    pub async fn is_group_member(&self, principal: &Principal, group_id: i32) -> bool {
        match self
            .memberships
            .is_member(group_id, principal.local_id)
            .await
        {
            Ok(is_member) => is_member,
            Err(e) => {
                tracing::warn!(
                    target: "qs.auth.authorizer",
                    group_id,
                    user_id = principal.local_id,
                    error = %e,
                    "Membership check failed, denying access"
                );
                false
            }
        }
    }
}
