//! HTTP middleware for the quotes service.
//!
//! - `auth` - bearer authentication and principal resolution
//! - `http_metrics` - per-request metrics

pub mod auth;
pub mod http_metrics;

pub use auth::require_auth;
pub use http_metrics::http_metrics_middleware;
