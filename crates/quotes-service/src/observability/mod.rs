//! Observability module for the quotes service.
//!
//! Provides metrics definitions used by middleware, auth and cache layers.

pub mod metrics;
