//! In-process layer cache with idle-time eviction.

mod eviction;
mod layer_cache;

pub use eviction::{
    eviction_task, spawn_eviction_task, CacheConfig, DEFAULT_BUSY_INTERVAL_SECS,
    DEFAULT_IDLE_INTERVAL_SECS, DEFAULT_IDLE_TTL_SECS,
};
pub use layer_cache::{CacheEntry, CacheStats, LayerCache};
