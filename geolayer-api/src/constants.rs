//! Constants for the GeoLayer API
//!
//! Default values for every configurable setting live here.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

// ============================================================================
// HTTP
// ============================================================================

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// STORE
// ============================================================================

/// Default LMDB directory
pub const DEFAULT_STORE_PATH: &str = "./geolayer.db";

/// Default LMDB map size in megabytes
pub const DEFAULT_STORE_MAX_SIZE_MB: usize = 1024;

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Superuser key used when none is configured. Never rely on it outside
/// local development.
pub const INSECURE_DEFAULT_SUPERUSER_KEY: &str = "7q1qcqmsxnvw";

// ============================================================================
// ADMIN PROTOCOL
// ============================================================================

/// Default admin port
pub const DEFAULT_ADMIN_PORT: u16 = 3333;

/// Default admin listener (loopback only)
pub const DEFAULT_ADMIN_BIND: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_ADMIN_PORT));

/// Default idle read timeout for an admin session in seconds (5 minutes)
pub const DEFAULT_ADMIN_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default maximum admin session duration in seconds (1 hour)
pub const DEFAULT_ADMIN_MAX_SESSION_SECS: u64 = 3600;

/// Longest accepted admin request line in bytes
pub const MAX_ADMIN_LINE_BYTES: usize = 64 * 1024 * 1024;

/// Default shapefile converter executable
pub const DEFAULT_OGR2OGR: &str = "ogr2ogr";

// ============================================================================
// WEBSOCKET
// ============================================================================

/// Capacity of each subscriber's outbound queue
pub const WS_SUBSCRIBER_BUFFER: usize = 32;
