//! GeoLayer Storage - Store, Layer Cache and Customer Registry
//!
//! The LMDB store owns all durable state. The layer cache sits in front of
//! its `layers` namespace; the customer registry reads and writes the
//! `apikeys` namespace directly.

pub mod cache;
pub mod registry;
pub mod store;

pub use cache::{spawn_eviction_task, CacheConfig, CacheStats, LayerCache};
pub use registry::CustomerRegistry;
pub use store::{Namespace, Store, StoreError};
