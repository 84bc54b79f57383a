//! Quotes Service Library
//!
//! Identity and group-membership core of the quotes API:
//!
//! - Bearer token verification against the authority's rotating key set
//! - Auto-provisioning of local users on first sight of an external subject
//! - Group-membership authorization over coherent, multi-region caches
//! - Group lifecycle, invite-code joins and member management
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> services/*.rs
//!     -> cache/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - token verification, identity resolution, authorization
//! - `cache` - generation-guarded cache regions over the store
//! - `config` - service configuration from environment
//! - `errors` - error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - authentication and HTTP metrics
//! - `models` - data models, requests and responses
//! - `observability` - Prometheus metrics
//! - `repositories` - store traits with PostgreSQL and in-memory backends
//! - `routes` - Axum router and application state
//! - `services` - business logic and the authority client
//! - `tasks` - background key-set refresh and cache telemetry

pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
