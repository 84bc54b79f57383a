//! Authentication and authorization.
//!
//! ```text
//! bearer token -> TokenVerifier (KeySetCache) -> subject
//!              -> IdentityResolver (users + authority) -> Principal
//!              -> Authorizer (MembershipCache) -> group access
//! ```

pub mod authorizer;
pub mod claims;
pub mod identity;
pub mod key_set;
pub mod verifier;

pub use authorizer::Authorizer;
pub use identity::IdentityResolver;
pub use key_set::{KeySetCache, KeySetConfig, KeySetError, SigningKey};
pub use verifier::TokenVerifier;
