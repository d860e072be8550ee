//! Freshness-checked synchronization between the FRED API and the local cache.
//!
//! - Series are fresh while the cached `last_updated` date is not behind the
//!   remote one and at least one observation is cached
//! - A stale series is replaced wholesale, observations included
//! - Category subtrees are discovered breadth-first, from the cache when the
//!   root is cached and from the remote source otherwise, with paced requests

mod orchestrator;
mod pacing;

pub use orchestrator::{CategoryUpdate, SyncOrchestrator};
pub use pacing::{DiscoveryPacing, DEFAULT_DELAY_MS, DEFAULT_SUPER_ROOT_DELAY_MS};
