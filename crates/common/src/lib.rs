//! Common utilities shared across the quotes workspace crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (header inspection, iat checks, constants)
pub mod jwt;

/// Module for bounded text helpers (display-name truncation)
pub mod text;
