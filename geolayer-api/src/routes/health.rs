//! Liveness endpoint.
//!
//! `GET /ping` needs no credentials.

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingData {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub data: PingData,
}

/// GET /ping - Liveness check
pub async fn ping() -> impl IntoResponse {
    Json(PingResponse {
        status: "success".to_string(),
        data: PingData {
            result: "pong".to_string(),
        },
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/ping", get(ping))
}
