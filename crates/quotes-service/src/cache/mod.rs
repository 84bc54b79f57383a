//! Store-coherent caches.
//!
//! - `region` - generation-guarded map shared by every cache
//! - `membership` - four views of the membership relation
//! - `groups` - groups by id and by invite code

pub mod groups;
pub mod membership;
pub mod region;

pub use groups::GroupCache;
pub use membership::MembershipCache;
pub use region::{CacheRegion, FillTicket, RegionStats, DEFAULT_REGION_CAPACITY};
