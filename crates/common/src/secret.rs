//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] so every crate in the workspace names the same
//! types. `SecretString` redacts itself in `Debug`, so structs holding the
//! authority password or a bearer token can keep deriving `Debug`.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct AuthorityCredentials {
//!     user: String,
//!     password: SecretString,
//! }
//!
//! let creds = AuthorityCredentials {
//!     user: "quotes-api".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("hunter2"));
//! assert_eq!(creds.password.expose_secret(), "hunter2");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
