//! REST API Route Modules
//!
//! Route layout:
//! - `/ping`
//! - `/api/v1/layers`, `/api/v1/layer/...`, `/api/v1/customer`
//! - `/management/...`
//! - `/ws/{datasource}`

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod customer;
pub mod feature;
pub mod health;
pub mod layer;
pub mod management;

/// Build the complete HTTP router with CORS and request tracing.
pub fn create_api_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(layer::create_router())
        .merge(feature::create_router())
        .merge(customer::create_router());

    Router::new()
        .merge(health::create_router())
        .nest("/api/v1", api_routes)
        .nest("/management", management::create_router())
        .merge(crate::ws::create_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
