//! GeoLayer Core - Entity Types
//!
//! Shared data structures for the layer service: customers, layers,
//! features, identifiers and the master error type. Every other crate in the
//! workspace depends on this one.

pub mod entities;
pub mod error;
pub mod identity;

pub use entities::{Customer, Feature, Layer};
pub use error::{EntityKind, GeoError, GeoResult};
pub use identity::{
    constant_time_eq, new_api_key, new_datasource_id, ApiKey, DatasourceId, API_KEY_LENGTH,
};

/// Crate version reported by `ping` on every front end.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
