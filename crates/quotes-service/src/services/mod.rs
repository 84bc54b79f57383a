//! Service layer for the quotes service.
//!
//! Services validate requests, combine caches and repositories, and produce
//! response models.
//!
//! # Components
//!
//! - `authority_client` - HTTP client for identity authority lookups
//! - `group_service` - group lifecycle and invite-code joins
//! - `member_service` - group membership management
//! - `user_service` - the caller's own profile

pub mod authority_client;
pub mod group_service;
pub mod member_service;
pub mod user_service;

pub use authority_client::{AuthorityClient, AuthorityError, HttpAuthorityClient};
pub use group_service::GroupService;
pub use member_service::MemberService;
pub use user_service::UserService;

use crate::errors::QsError;
use common::text::{is_bounded_non_blank, MAX_DISPLAY_NAME_CHARS, MAX_INVITE_CODE_CHARS};

/// # Errors
///
/// `BadRequest` unless the code is non-blank and at most 8 characters.
pub(crate) fn validate_invite_code(invite_code: &str) -> Result<(), QsError> {
    if is_bounded_non_blank(invite_code, MAX_INVITE_CODE_CHARS) {
        Ok(())
    } else {
        Err(QsError::BadRequest(format!(
            "invite_code must be 1 to {MAX_INVITE_CODE_CHARS} characters"
        )))
    }
}

/// # Errors
///
/// `BadRequest` unless the name is non-blank and at most 32 characters.
pub(crate) fn validate_display_name(display_name: &str) -> Result<(), QsError> {
    if is_bounded_non_blank(display_name, MAX_DISPLAY_NAME_CHARS) {
        Ok(())
    } else {
        Err(QsError::BadRequest(format!(
            "display_name must be 1 to {MAX_DISPLAY_NAME_CHARS} characters"
        )))
    }
}
