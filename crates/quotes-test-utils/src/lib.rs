//! # Quotes Test Utilities
//!
//! Shared test utilities for the quotes service:
//!
//! - Deterministic Ed25519 keypairs that sign test tokens and publish JWKs
//! - A claims builder for valid and deliberately broken tokens
//! - A wiremock-backed identity authority (JWKS and user lookups)
//! - An in-process application over the in-memory store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quotes_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let app = TestApp::spawn().await;
//!     app.authority.mount_user("ext-1", "Alice").await;
//!
//!     let token = app.token_for("ext-1");
//!     let (status, body) = app.get("/users/me", Some(&token)).await;
//!     assert_eq!(status, 200);
//!     assert_eq!(body["display_name"], "Alice");
//! }
//! ```

pub mod app_harness;
pub mod crypto_fixtures;
pub mod mock_authority;
pub mod token_builders;

pub use app_harness::*;
pub use crypto_fixtures::*;
pub use mock_authority::*;
pub use token_builders::*;
