//! Identity types for GeoLayer records

use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Datasource identifier: 32 lowercase hex characters (UUIDv4 without hyphens).
pub type DatasourceId = String;

/// Opaque customer capability token.
pub type ApiKey = String;

/// Length of minted API keys.
pub const API_KEY_LENGTH: usize = 12;

/// Generate a new datasource identifier from 128 random bits.
pub fn new_datasource_id() -> DatasourceId {
    Uuid::new_v4().simple().to_string()
}

/// Generate an API key of `len` characters drawn uniformly from `[A-Za-z0-9]`.
///
/// Uses the thread-local CSPRNG since the key is an access credential.
pub fn new_api_key(len: usize) -> ApiKey {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
