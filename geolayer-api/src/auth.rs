//! Superuser credential handling.

use geolayer_core::constant_time_eq;
use secrecy::{ExposeSecret, SecretString};

use crate::constants::INSECURE_DEFAULT_SUPERUSER_KEY;
use crate::error::{ApiError, ApiResult};

/// The superuser secret gating administrative operations.
#[derive(Clone)]
pub struct SuperuserKey(SecretString);

impl SuperuserKey {
    pub fn new(key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self(SecretString::new(key.into()))
    }

    /// Compare a presented key in constant time.
    pub fn verify(&self, presented: &str) -> bool {
        constant_time_eq(self.0.expose_secret().as_bytes(), presented.as_bytes())
    }

    /// Reject a request unless it carries the superuser key.
    pub fn require(&self, presented: Option<&str>) -> ApiResult<()> {
        match presented {
            Some(key) if self.verify(key) => Ok(()),
            Some(_) => Err(ApiError::unauthorized("incorrect authkey")),
            None => Err(ApiError::unauthorized("authkey required")),
        }
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.verify(INSECURE_DEFAULT_SUPERUSER_KEY)
    }
}

impl Default for SuperuserKey {
    fn default() -> Self {
        Self::new(INSECURE_DEFAULT_SUPERUSER_KEY)
    }
}

impl std::fmt::Debug for SuperuserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SuperuserKey([REDACTED, {} chars])", self.len())
    }
}
