//! Error types for GeoLayer operations

use thiserror::Error;

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Customer,
    Datasource,
    Feature,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Customer => f.write_str("apikey"),
            EntityKind::Datasource => f.write_str("datasource"),
            EntityKind::Feature => f.write_str("feature"),
        }
    }
}

/// Master error type shared by every GeoLayer front end.
///
/// The HTTP layer maps each variant to a status code; the admin session
/// protocol maps each variant to a one-line error frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unparsable protocol frame. Closes an admin session.
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GeoError {
    pub fn customer_not_found(apikey: impl Into<String>) -> Self {
        GeoError::NotFound {
            kind: EntityKind::Customer,
            id: apikey.into(),
        }
    }

    pub fn datasource_not_found(datasource: impl Into<String>) -> Self {
        GeoError::NotFound {
            kind: EntityKind::Datasource,
            id: datasource.into(),
        }
    }

    pub fn feature_not_found(index: usize) -> Self {
        GeoError::NotFound {
            kind: EntityKind::Feature,
            id: index.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GeoError::NotFound { .. })
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::Internal(format!("serialization failed: {}", err))
    }
}

/// Result type for GeoLayer operations.
pub type GeoResult<T> = Result<T, GeoError>;
