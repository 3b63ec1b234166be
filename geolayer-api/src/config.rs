//! Server Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local development. Unparsable values fall back to their defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use geolayer_storage::CacheConfig;

use crate::auth::SuperuserKey;
use crate::constants::{
    DEFAULT_ADMIN_BIND, DEFAULT_ADMIN_IDLE_TIMEOUT_SECS, DEFAULT_ADMIN_MAX_SESSION_SECS,
    DEFAULT_BIND, DEFAULT_OGR2OGR, DEFAULT_PORT, DEFAULT_STORE_MAX_SIZE_MB, DEFAULT_STORE_PATH,
};

// ============================================================================
// ADMIN CONFIGURATION
// ============================================================================

/// Settings for the loopback admin protocol listener.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Listener address (default: 127.0.0.1:3333)
    pub bind: SocketAddr,

    /// A session with no complete line for this long is closed (default: 5 minutes)
    pub idle_timeout: Duration,

    /// Hard cap on a session's lifetime (default: 1 hour)
    pub max_session: Duration,

    /// Shapefile → GeoJSON converter executable (default: `ogr2ogr`)
    pub ogr2ogr: PathBuf,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_ADMIN_BIND,
            idle_timeout: Duration::from_secs(DEFAULT_ADMIN_IDLE_TIMEOUT_SECS),
            max_session: Duration::from_secs(DEFAULT_ADMIN_MAX_SESSION_SECS),
            ogr2ogr: PathBuf::from(DEFAULT_OGR2OGR),
        }
    }
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// Process-wide configuration, built once in `main`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub store_path: PathBuf,
    pub backup_path: PathBuf,
    pub store_max_size_mb: usize,
    pub superuser_key: SuperuserKey,
    pub debug: bool,
    pub log_json: bool,
    pub admin: AdminConfig,
    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let store_path = PathBuf::from(DEFAULT_STORE_PATH);
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            backup_path: default_backup_path(&store_path),
            store_path,
            store_max_size_mb: DEFAULT_STORE_MAX_SIZE_MB,
            superuser_key: SuperuserKey::default(),
            debug: false,
            log_json: false,
            admin: AdminConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_backup_path(store_path: &std::path::Path) -> PathBuf {
    let mut path = store_path.as_os_str().to_owned();
    path.push(".backup");
    PathBuf::from(path)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl ServerConfig {
    /// Create ServerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `GEOLAYER_BIND`: HTTP bind address (default: 0.0.0.0)
    /// - `GEOLAYER_PORT` / `PORT`: HTTP port (default: 8080)
    /// - `GEOLAYER_STORE_PATH`: LMDB directory (default: ./geolayer.db)
    /// - `GEOLAYER_BACKUP_PATH`: Snapshot file (default: `<store>.backup`)
    /// - `GEOLAYER_STORE_MAX_SIZE_MB`: LMDB map size (default: 1024)
    /// - `GEOLAYER_SUPERUSER_KEY`: Superuser secret
    /// - `GEOLAYER_DEBUG`: Debug logging (default: false)
    /// - `GEOLAYER_LOG_JSON`: JSON log output (default: false)
    /// - `GEOLAYER_ADMIN_BIND`: Admin listener (default: 127.0.0.1:3333)
    /// - `GEOLAYER_ADMIN_IDLE_TIMEOUT_SECS`: Admin idle timeout (default: 300)
    /// - `GEOLAYER_ADMIN_MAX_SESSION_SECS`: Admin session cap (default: 3600)
    /// - `GEOLAYER_CACHE_IDLE_TTL_SECS`: Layer idle TTL (default: 90)
    /// - `GEOLAYER_CACHE_BUSY_INTERVAL_SECS`: Sweep interval when non-empty (default: 15)
    /// - `GEOLAYER_CACHE_IDLE_INTERVAL_SECS`: Sweep interval when empty (default: 60)
    /// - `GEOLAYER_OGR2OGR`: Shapefile converter (default: ogr2ogr)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());
        let secs = |name: &str, default: Duration| {
            parsed(name).map(Duration::from_secs).unwrap_or(default)
        };

        let bind = lookup("GEOLAYER_BIND")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.bind);

        let port = lookup("GEOLAYER_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let store_path = lookup("GEOLAYER_STORE_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let backup_path = lookup("GEOLAYER_BACKUP_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_backup_path(&store_path));

        let store_max_size_mb = lookup("GEOLAYER_STORE_MAX_SIZE_MB")
            .and_then(|s| s.trim().parse().ok())
            .filter(|mb| *mb > 0)
            .unwrap_or(defaults.store_max_size_mb);

        let superuser_key = match lookup("GEOLAYER_SUPERUSER_KEY").filter(|s| !s.is_empty()) {
            Some(key) => SuperuserKey::new(key),
            None => {
                tracing::warn!(
                    "GEOLAYER_SUPERUSER_KEY not set, using the insecure default superuser key"
                );
                defaults.superuser_key
            }
        };

        let debug = lookup("GEOLAYER_DEBUG").map(|s| parse_flag(&s)).unwrap_or(false);
        let log_json = lookup("GEOLAYER_LOG_JSON").map(|s| parse_flag(&s)).unwrap_or(false);

        let admin_bind = lookup("GEOLAYER_ADMIN_BIND")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.admin.bind);

        let admin = AdminConfig {
            bind: admin_bind,
            idle_timeout: secs("GEOLAYER_ADMIN_IDLE_TIMEOUT_SECS", defaults.admin.idle_timeout),
            max_session: secs("GEOLAYER_ADMIN_MAX_SESSION_SECS", defaults.admin.max_session),
            ogr2ogr: lookup("GEOLAYER_OGR2OGR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.admin.ogr2ogr),
        };

        let cache = CacheConfig {
            idle_ttl: secs("GEOLAYER_CACHE_IDLE_TTL_SECS", defaults.cache.idle_ttl),
            busy_interval: secs(
                "GEOLAYER_CACHE_BUSY_INTERVAL_SECS",
                defaults.cache.busy_interval,
            ),
            idle_interval: secs(
                "GEOLAYER_CACHE_IDLE_INTERVAL_SECS",
                defaults.cache.idle_interval,
            ),
        };

        Self {
            bind,
            port,
            store_path,
            backup_path,
            store_max_size_mb,
            superuser_key,
            debug,
            log_json,
            admin,
            cache,
        }
    }

    /// HTTP listener address as `host:port`.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.http_addr(), "0.0.0.0:8080");
        assert_eq!(config.store_path, PathBuf::from("./geolayer.db"));
        assert_eq!(config.backup_path, PathBuf::from("./geolayer.db.backup"));
        assert_eq!(config.admin.bind, DEFAULT_ADMIN_BIND);
        assert_eq!(config.admin.bind.to_string(), "127.0.0.1:3333");
        assert_eq!(config.admin.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.cache, CacheConfig::default());
        assert!(config.superuser_key.is_insecure_default());
        assert!(!config.debug);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("GEOLAYER_STORE_PATH", "/var/lib/geolayer"),
            ("GEOLAYER_SUPERUSER_KEY", "topsecret"),
            ("GEOLAYER_DEBUG", "true"),
            ("GEOLAYER_ADMIN_BIND", "127.0.0.1:4444"),
            ("GEOLAYER_CACHE_IDLE_TTL_SECS", "5"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.backup_path, PathBuf::from("/var/lib/geolayer.backup"));
        assert!(config.superuser_key.verify("topsecret"));
        assert!(config.debug);
        assert_eq!(config.admin.bind.port(), 4444);
        assert_eq!(config.cache.idle_ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_geolayer_port_wins_over_port() {
        let config = config_from(&[("PORT", "9000"), ("GEOLAYER_PORT", "9100")]);
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_from(&[
            ("GEOLAYER_PORT", "eighty"),
            ("GEOLAYER_ADMIN_BIND", "not an addr"),
            ("GEOLAYER_CACHE_BUSY_INTERVAL_SECS", "-1"),
            ("GEOLAYER_STORE_MAX_SIZE_MB", "0"),
        ]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.admin.bind, DEFAULT_ADMIN_BIND);
        assert_eq!(config.cache.busy_interval, Duration::from_secs(15));
        assert_eq!(config.store_max_size_mb, DEFAULT_STORE_MAX_SIZE_MB);
    }
}
