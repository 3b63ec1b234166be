//! Feature REST API Routes
//!
//! Features are addressed by their position in the layer's collection.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Uri,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use geolayer_core::Feature;
use geolayer_storage::{CustomerRegistry, LayerCache};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    extractors::Credentials,
    hub::UpdateHub,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAddedResponse {
    pub status: String,
    pub datasource: String,
    pub message: String,
}

/// POST /api/v1/layer/{ds}/feature - Append a feature
pub async fn add_feature(
    State(registry): State<Arc<CustomerRegistry>>,
    State(cache): State<Arc<LayerCache>>,
    State(hub): State<Arc<UpdateHub>>,
    Path(datasource): Path<String>,
    uri: Uri,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let creds = Credentials::from_uri(&uri)?;
    registry.authorize(creds.apikey()?, &datasource)?;

    let feature = Feature::from_slice(&body)?;
    let index = cache.update_layer(&datasource, |layer| {
        layer.add_feature(feature);
        Ok(layer.len() - 1)
    })?;
    tracing::debug!(datasource = %datasource, index, "Feature added");
    hub.notify_updated(&datasource);

    Ok(Json(FeatureAddedResponse {
        status: "ok".to_string(),
        datasource,
        message: "feature added".to_string(),
    }))
}

/// GET /api/v1/layer/{ds}/feature/{k} - Feature at index k
pub async fn get_feature(
    State(registry): State<Arc<CustomerRegistry>>,
    State(cache): State<Arc<LayerCache>>,
    Path((datasource, index)): Path<(String, String)>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    let index: usize = index
        .parse()
        .map_err(|_| ApiError::invalid_input(format!("invalid feature index: {}", index)))?;
    registry.authorize(creds.apikey()?, &datasource)?;

    let layer = cache.get_layer(&datasource)?;
    let feature = layer.feature(index)?.clone();
    Ok(Json(feature))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/layer/:datasource/feature", post(add_feature))
        .route("/layer/:datasource/feature/:index", get(get_feature))
}
