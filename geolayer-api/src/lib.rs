//! GeoLayer API
//!
//! HTTP, WebSocket and admin-protocol front ends over the layer store.

pub mod admin;
pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod extractors;
pub mod hub;
pub mod macros;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod ws;

pub use auth::SuperuserKey;
pub use config::{AdminConfig, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::HubEvent;
pub use hub::{Subscription, UpdateHub};
pub use routes::create_api_router;
pub use state::AppState;
