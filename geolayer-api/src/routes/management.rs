//! Management endpoints.
//!
//! All routes require the superuser authkey:
//! - /management/profile - uptime, cores, cache statistics, subscribers
//! - /management/loaded - datasources currently held in the cache
//! - /management/unload/{ds} - drop one datasource from the cache

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use geolayer_storage::{CacheStats, LayerCache};
use serde::Serialize;

use crate::{
    auth::SuperuserKey, error::ApiResult, extractors::Credentials, hub::UpdateHub,
    state::AppState,
};

#[derive(Debug, Clone, Serialize)]
pub struct ProfileData {
    pub version: String,
    pub uptime_seconds: u64,
    pub num_cores: usize,
    pub cache: CacheStats,
    pub subscribers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub status: String,
    pub data: ProfileData,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedResponse {
    pub status: String,
    pub datasources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnloadResponse {
    pub status: String,
    pub datasource: String,
    pub unloaded: bool,
}

/// GET /management/profile
pub async fn profile(
    State(superuser): State<SuperuserKey>,
    State(cache): State<Arc<LayerCache>>,
    State(hub): State<Arc<UpdateHub>>,
    State(start_time): State<Instant>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    creds.require_superuser(&superuser)?;

    let num_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Ok(Json(ProfileResponse {
        status: "ok".to_string(),
        data: ProfileData {
            version: geolayer_core::VERSION.to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
            num_cores,
            cache: cache.stats(),
            subscribers: hub.subscriber_count(),
        },
    }))
}

/// GET /management/loaded
pub async fn loaded(
    State(superuser): State<SuperuserKey>,
    State(cache): State<Arc<LayerCache>>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    creds.require_superuser(&superuser)?;
    Ok(Json(LoadedResponse {
        status: "ok".to_string(),
        datasources: cache.loaded(),
    }))
}

/// GET /management/unload/{ds}
pub async fn unload(
    State(superuser): State<SuperuserKey>,
    State(cache): State<Arc<LayerCache>>,
    Path(datasource): Path<String>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    creds.require_superuser(&superuser)?;
    let unloaded = cache.unload(&datasource);
    tracing::info!(datasource = %datasource, unloaded, "Manual cache unload");

    Ok(Json(UnloadResponse {
        status: "ok".to_string(),
        datasource,
        unloaded,
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/loaded", get(loaded))
        .route("/unload/:datasource", get(unload))
}
