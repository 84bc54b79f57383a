//! HTTP request handlers for the quotes service.

pub mod groups;
pub mod health;
pub mod members;
pub mod metrics;
pub mod users;

pub use groups::{create_group, get_group, get_my_groups, join_group, update_group};
pub use health::health_check;
pub use members::{add_member, get_member, leave_group, list_members, update_my_membership};
pub use metrics::metrics_handler;
pub use users::{get_me, update_me};

use crate::errors::QsError;
use crate::models::Principal;
use crate::routes::AppState;

/// Reject callers that are not members of `group_id`.
async fn require_group_member(
    state: &AppState,
    principal: &Principal,
    group_id: i32,
) -> Result<(), QsError> {
    if state.authorizer.is_group_member(principal, group_id).await {
        Ok(())
    } else {
        tracing::debug!(target: "qs.handlers", group_id, "Caller is not a group member");
        Err(QsError::Forbidden)
    }
}
