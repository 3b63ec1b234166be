//! Write-through layer cache.
//!
//! Sits in front of the store's `layers` namespace. Reads refresh an entry's
//! `last_access`; writes persist first and then upsert the entry, so the
//! cache never holds content the store does not.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use geolayer_core::{DatasourceId, GeoError, GeoResult, Layer};
use serde::Serialize;

use crate::store::{Namespace, Store};

/// A cached layer snapshot.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub layer: Layer,
    pub last_access: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Layer cache shared by every front end.
pub struct LayerCache {
    store: Arc<Store>,
    entries: DashMap<DatasourceId, CacheEntry>,
    /// Serializes store writes with cache upserts and miss loads.
    write_gate: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LayerCache {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            write_gate: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn gate(&self) -> GeoResult<MutexGuard<'_, ()>> {
        self.write_gate
            .lock()
            .map_err(|_| GeoError::Internal("layer cache write gate poisoned".to_string()))
    }

    /// Snapshot of a layer. Missing layers are `NotFound`.
    pub fn get_layer(&self, datasource: &str) -> GeoResult<Layer> {
        if let Some(mut entry) = self.entries.get_mut(datasource) {
            entry.last_access = Instant::now();
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.layer.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let _gate = self.gate()?;
        self.load_locked(datasource)
    }

    /// Load a layer into the cache. Caller holds the write gate.
    fn load_locked(&self, datasource: &str) -> GeoResult<Layer> {
        if let Some(mut entry) = self.entries.get_mut(datasource) {
            entry.last_access = Instant::now();
            return Ok(entry.layer.clone());
        }

        let layer: Layer = self
            .store
            .get_json(Namespace::Layers, datasource)?
            .ok_or_else(|| GeoError::datasource_not_found(datasource))?;

        tracing::debug!(datasource = %datasource, features = layer.len(), "Layer loaded into cache");
        self.entries.insert(
            datasource.to_string(),
            CacheEntry {
                layer: layer.clone(),
                last_access: Instant::now(),
            },
        );
        Ok(layer)
    }

    /// Persist a layer, then upsert its cache entry.
    pub fn put_layer(&self, datasource: &str, layer: Layer) -> GeoResult<()> {
        let _gate = self.gate()?;
        self.store.put_json(Namespace::Layers, datasource, &layer)?;
        self.entries.insert(
            datasource.to_string(),
            CacheEntry {
                layer,
                last_access: Instant::now(),
            },
        );
        Ok(())
    }

    /// Remove a layer from the store and drop its entry. Returns whether the
    /// store held it.
    pub fn delete_layer(&self, datasource: &str) -> GeoResult<bool> {
        let _gate = self.gate()?;
        let existed = self.store.delete(Namespace::Layers, datasource)?;
        self.entries.remove(datasource);
        Ok(existed)
    }

    /// Read-modify-write a layer under the write gate.
    ///
    /// `apply` runs on a copy; nothing is persisted if it fails.
    pub fn update_layer<T, F>(&self, datasource: &str, apply: F) -> GeoResult<T>
    where
        F: FnOnce(&mut Layer) -> GeoResult<T>,
    {
        let _gate = self.gate()?;
        let mut layer = self.load_locked(datasource)?;
        let out = apply(&mut layer)?;

        self.store.put_json(Namespace::Layers, datasource, &layer)?;
        self.entries.insert(
            datasource.to_string(),
            CacheEntry {
                layer,
                last_access: Instant::now(),
            },
        );
        Ok(out)
    }

    /// Whether the store holds a layer, without touching the cache.
    pub fn exists(&self, datasource: &str) -> GeoResult<bool> {
        if self.entries.contains_key(datasource) {
            return Ok(true);
        }
        Ok(self.store.get(Namespace::Layers, datasource)?.is_some())
    }

    /// Every stored layer keyed by id, read straight from the store.
    pub fn scan_layers(&self) -> GeoResult<Vec<(DatasourceId, Layer)>> {
        Ok(self.store.scan_json(Namespace::Layers)?)
    }

    /// Drop a cached entry without touching the store.
    pub fn unload(&self, datasource: &str) -> bool {
        self.entries.remove(datasource).is_some()
    }

    pub fn is_loaded(&self, datasource: &str) -> bool {
        self.entries.contains_key(datasource)
    }

    /// Ids currently held in memory, sorted.
    pub fn loaded(&self) -> Vec<DatasourceId> {
        let mut ids: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict every entry idle for longer than `idle_ttl` as of `now`.
    /// Returns the number evicted.
    pub fn evict_expired_at(&self, now: Instant, idle_ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|datasource, entry| {
            let keep = now.saturating_duration_since(entry.last_access) <= idle_ttl;
            if !keep {
                tracing::debug!(datasource = %datasource, "Evicting idle layer");
            }
            keep
        });
        let evicted = before.saturating_sub(self.entries.len());
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    pub fn evict_expired(&self, idle_ttl: Duration) -> usize {
        self.evict_expired_at(Instant::now(), idle_ttl)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}
