//! Background tasks for the quotes service.
//!
//! # Tasks
//!
//! - `key_set_refresher` - refreshes the authority's signing keys ahead of
//!   rotation
//! - `cache_stats_logger` - logs and exports cache region statistics

pub mod cache_stats_logger;
pub mod key_set_refresher;

pub use cache_stats_logger::start_cache_stats_logger;
pub use key_set_refresher::start_key_set_refresher;
