//! Customer REST API Routes

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use geolayer_storage::CustomerRegistry;
use serde::{Deserialize, Serialize};

use crate::{auth::SuperuserKey, error::ApiResult, extractors::Credentials, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCreatedResponse {
    pub status: String,
    pub apikey: String,
    pub result: String,
}

/// POST /api/v1/customer - Mint a new customer (superuser only)
pub async fn create_customer(
    State(registry): State<Arc<CustomerRegistry>>,
    State(superuser): State<SuperuserKey>,
    creds: Credentials,
) -> ApiResult<impl IntoResponse> {
    creds.require_superuser(&superuser)?;
    let customer = registry.create_customer()?;

    Ok(Json(CustomerCreatedResponse {
        status: "success".to_string(),
        apikey: customer.apikey,
        result: "customer created".to_string(),
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/customer", post(create_customer))
}
