//! Idle-layer eviction background task.
//!
//! Runs until the shutdown signal fires. While the cache holds entries it
//! sweeps every `busy_interval`, evicting layers idle for more than
//! `idle_ttl`; while empty it only wakes every `idle_interval`. Eviction
//! touches memory only.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::LayerCache;

pub const DEFAULT_IDLE_TTL_SECS: u64 = 90;
pub const DEFAULT_BUSY_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_IDLE_INTERVAL_SECS: u64 = 60;

/// Configuration for the eviction task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries idle for longer than this are evicted (default: 90 seconds)
    pub idle_ttl: Duration,

    /// Sleep between sweeps while the cache is non-empty (default: 15 seconds)
    pub busy_interval: Duration,

    /// Sleep while the cache is empty (default: 60 seconds)
    pub idle_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(DEFAULT_IDLE_TTL_SECS),
            busy_interval: Duration::from_secs(DEFAULT_BUSY_INTERVAL_SECS),
            idle_interval: Duration::from_secs(DEFAULT_IDLE_INTERVAL_SECS),
        }
    }
}

/// Run the eviction loop until `shutdown_rx` carries `true`.
pub async fn eviction_task(
    cache: Arc<LayerCache>,
    config: CacheConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(
        idle_ttl_secs = config.idle_ttl.as_secs(),
        busy_interval_secs = config.busy_interval.as_secs(),
        idle_interval_secs = config.idle_interval.as_secs(),
        "Layer eviction task started"
    );

    loop {
        let pause = if cache.is_empty() {
            config.idle_interval
        } else {
            let evicted = cache.evict_expired(config.idle_ttl);
            if evicted > 0 {
                tracing::info!(evicted, remaining = cache.len(), "Evicted idle layers");
            } else {
                tracing::trace!(remaining = cache.len(), "Eviction sweep found nothing idle");
            }
            config.busy_interval
        };

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }

    tracing::info!("Layer eviction task stopped");
}

/// Spawn [`eviction_task`] on the current runtime.
pub fn spawn_eviction_task(
    cache: Arc<LayerCache>,
    config: CacheConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(eviction_task(cache, config, shutdown_rx))
}
