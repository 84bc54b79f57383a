//! Repository layer for the quotes service.
//!
//! Store access follows the Handler -> Service -> Cache -> Repository layering.
//! Each table has an async trait with a PostgreSQL implementation (`Pg*`) and
//! a shared in-memory implementation ([`InMemoryStore`]) with the same
//! uniqueness and foreign key semantics.
//!
//! `StoreError` never leaves the component that called the repository; it is
//! mapped into [`crate::errors::QsError`] at that boundary.

pub mod groups;
pub mod memberships;
pub mod memory;
pub mod users;

pub use groups::{GroupRepository, PgGroupRepository};
pub use memberships::{MembershipRepository, PgMembershipRepository};
pub use memory::InMemoryStore;
pub use users::{PgUserRepository, UserRepository};

use thiserror::Error;

/// Store failure classes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// The write was refused: foreign key, check constraint, or no row returned.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Connectivity or any other store failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err)
                if db_err.is_foreign_key_violation() || db_err.is_check_violation() =>
            {
                StoreError::Rejected(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::Rejected("no row returned".to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}
