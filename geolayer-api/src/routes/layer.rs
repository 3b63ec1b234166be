//! Layer REST API Routes
//!
//! Every route resolves the caller's apikey to a customer first. Routes on a
//! specific datasource also require that the customer lists it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use geolayer_core::{new_datasource_id, Layer};
use geolayer_storage::{CustomerRegistry, LayerCache};
use serde::{Deserialize, Serialize};

use crate::{
    auth::SuperuserKey,
    error::ApiResult,
    extractors::Credentials,
    state::AppState,
};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerCreatedResponse {
    pub status: String,
    pub datasource: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSharedResponse {
    pub status: String,
    pub datasource: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDeletedResponse {
    pub status: String,
    pub datasource: String,
    pub result: String,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/layers - The caller's customer record
pub async fn list_layers(
    State(registry): State<Arc<CustomerRegistry>>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    let customer = registry.get_customer(creds.apikey()?)?;
    Ok(Json(customer))
}

/// POST /api/v1/layer - Create an empty layer owned by the caller
pub async fn create_layer(
    State(registry): State<Arc<CustomerRegistry>>,
    State(cache): State<Arc<LayerCache>>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    let apikey = creds.apikey()?;
    registry.get_customer(apikey)?;

    let datasource = new_datasource_id();
    cache.put_layer(&datasource, Layer::new())?;
    registry.assign_datasource(apikey, &datasource)?;
    tracing::info!(datasource = %datasource, "Layer created");

    Ok(Json(LayerCreatedResponse {
        status: "success".to_string(),
        datasource,
    }))
}

/// GET /api/v1/layer/{ds} - Full layer
pub async fn get_layer(
    State(registry): State<Arc<CustomerRegistry>>,
    State(cache): State<Arc<LayerCache>>,
    Path(datasource): Path<String>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    registry.authorize(creds.apikey()?, &datasource)?;
    let layer = cache.get_layer(&datasource)?;
    Ok(Json(layer))
}

/// PUT /api/v1/layer/{ds} - Superuser shares an existing layer with a customer
pub async fn share_layer(
    State(registry): State<Arc<CustomerRegistry>>,
    State(superuser): State<SuperuserKey>,
    Path(datasource): Path<String>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    creds.require_superuser(&superuser)?;
    registry.assign_datasource(creds.apikey()?, &datasource)?;

    Ok(Json(LayerSharedResponse {
        status: "ok".to_string(),
        datasource,
    }))
}

/// DELETE /api/v1/layer/{ds} - Unlink the layer from the caller
///
/// The stored layer is kept so it can be recovered.
pub async fn delete_layer(
    State(registry): State<Arc<CustomerRegistry>>,
    Path(datasource): Path<String>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    let apikey = creds.apikey()?;
    registry.authorize(apikey, &datasource)?;
    registry.unlink_datasource(apikey, &datasource)?;

    Ok(Json(LayerDeletedResponse {
        status: "ok".to_string(),
        datasource,
        result: "datasource deleted".to_string(),
    }))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/layers", get(list_layers))
        .route("/layer", post(create_layer))
        .route(
            "/layer/:datasource",
            get(get_layer).put(share_layer).delete(delete_layer),
        )
}
