//! GeoLayer Test Utilities
//!
//! Shared test infrastructure for the GeoLayer workspace:
//! - Temporary LMDB stores with their backing directory
//! - Fixtures for features, layers and customers
//! - Proptest generators for features and layers

use std::sync::Arc;

pub use geolayer_core::{Customer, DatasourceId, Feature, GeoError, GeoResult, Layer};
pub use geolayer_storage::{CustomerRegistry, LayerCache, Namespace, Store};

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// STORES
// ============================================================================

/// Store opened in a temporary directory. The directory lives as long as
/// this value.
pub struct TestStore {
    pub store: Arc<Store>,
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_max_size_mb(16)
    }

    /// A store whose memory map holds at most `max_size_mb` megabytes.
    pub fn with_max_size_mb(max_size_mb: usize) -> Self {
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let store = Store::open(dir.path().join("store"), max_size_mb)
            .expect("store creation should succeed");
        Self {
            store: Arc::new(store),
            dir,
        }
    }

    pub fn cache(&self) -> Arc<LayerCache> {
        Arc::new(LayerCache::new(Arc::clone(&self.store)))
    }

    pub fn registry(&self) -> Arc<CustomerRegistry> {
        Arc::new(CustomerRegistry::new(Arc::clone(&self.store)))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Point feature with a `name` property.
pub fn sample_point(x: f64, y: f64, name: &str) -> Feature {
    Feature::new(
        json!({"type": "Point", "coordinates": [x, y]}),
        json!({"name": name}),
    )
}

/// Layer of `n` distinct points.
pub fn sample_layer(n: usize) -> Layer {
    let mut layer = Layer::new();
    for i in 0..n {
        layer.add_feature(sample_point(i as f64, -(i as f64), &format!("point {}", i)));
    }
    layer
}

/// Create a customer owning one fresh layer of `features` points.
pub fn seed_customer_with_layer(
    registry: &CustomerRegistry,
    cache: &LayerCache,
    features: usize,
) -> (Customer, DatasourceId) {
    let customer = registry.create_customer().expect("customer creation should succeed");
    let datasource = geolayer_core::new_datasource_id();
    cache
        .put_layer(&datasource, sample_layer(features))
        .expect("layer creation should succeed");
    let customer = registry
        .assign_datasource(&customer.apikey, &datasource)
        .expect("assignment should succeed");
    (customer, datasource)
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Arbitrary valid feature: a point or a null geometry, with a small
/// properties object.
pub fn arb_feature() -> impl Strategy<Value = Feature> {
    let geometry = prop_oneof![
        (-180.0f64..180.0, -90.0f64..90.0)
            .prop_map(|(x, y)| json!({"type": "Point", "coordinates": [x, y]})),
        Just(serde_json::Value::Null),
    ];
    (geometry, "[a-z]{0,12}", any::<i32>()).prop_map(|(geometry, name, rank)| {
        Feature::new(geometry, json!({"name": name, "rank": rank}))
    })
}

pub fn arb_layer(max_features: usize) -> impl Strategy<Value = Layer> {
    proptest::collection::vec(arb_feature(), 0..=max_features).prop_map(|features| {
        let mut layer = Layer::new();
        for feature in features {
            layer.add_feature(feature);
        }
        layer
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_customer_owns_layer() {
        let ctx = TestStore::new();
        let registry = ctx.registry();
        let cache = ctx.cache();
        let (customer, datasource) = seed_customer_with_layer(&registry, &cache, 3);
        assert!(customer.owns(&datasource));
        assert_eq!(cache.get_layer(&datasource).expect("get should succeed").len(), 3);
    }

    proptest! {
        #[test]
        fn prop_generated_features_validate(feature in arb_feature()) {
            prop_assert!(feature.validate().is_ok());
        }
    }
}
