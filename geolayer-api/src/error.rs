//! Error Types for the GeoLayer HTTP API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Errors are serialized as `{"status":"error","code":"…","error":"…"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geolayer_core::{EntityKind, GeoError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    Unauthorized,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    MissingField,

    InvalidInput,

    MalformedRequest,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    ApiKeyNotFound,

    DatasourceNotFound,

    FeatureNotFound,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    StorageUnavailable,

    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,

            ErrorCode::MissingField | ErrorCode::InvalidInput | ErrorCode::MalformedRequest => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::ApiKeyNotFound
            | ErrorCode::DatasourceNotFound
            | ErrorCode::FeatureNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StorageUnavailable | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::MissingField => "required parameter is missing",
            ErrorCode::InvalidInput => "invalid input",
            ErrorCode::MalformedRequest => "malformed request",
            ErrorCode::ApiKeyNotFound => "apikey not found",
            ErrorCode::DatasourceNotFound => "datasource not found",
            ErrorCode::FeatureNotFound => "feature not found",
            ErrorCode::StorageUnavailable => "storage unavailable",
            ErrorCode::InternalError => "internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// Wire shape of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub code: ErrorCode,
    pub error: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("required parameter '{}' is missing", field),
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: "error".to_string(),
            code: self.code,
            error: self.message.clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = %self.code, error = %self.message, "Request failed");
        } else {
            tracing::debug!(code = %self.code, error = %self.message, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<GeoError> for ApiError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::NotFound { kind, .. } => {
                let code = match kind {
                    EntityKind::Customer => ErrorCode::ApiKeyNotFound,
                    EntityKind::Datasource => ErrorCode::DatasourceNotFound,
                    EntityKind::Feature => ErrorCode::FeatureNotFound,
                };
                ApiError::new(code, err.to_string())
            }
            GeoError::Unauthorized(message) => ApiError::unauthorized(message),
            GeoError::BadRequest(message) => ApiError::invalid_input(message),
            GeoError::Malformed(message) => ApiError::new(ErrorCode::MalformedRequest, message),
            GeoError::StorageUnavailable(message) => {
                ApiError::new(ErrorCode::StorageUnavailable, message)
            }
            GeoError::Internal(message) => ApiError::internal_error(message),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_error_status_mapping() {
        let cases = [
            (GeoError::datasource_not_found("x"), StatusCode::NOT_FOUND),
            (GeoError::customer_not_found("x"), StatusCode::NOT_FOUND),
            (GeoError::feature_not_found(3), StatusCode::NOT_FOUND),
            (GeoError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (GeoError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
            (GeoError::Malformed("bad".into()), StatusCode::BAD_REQUEST),
            (
                GeoError::StorageUnavailable("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (GeoError::Internal("oops".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_error_body_shape() {
        let body = ApiError::missing_field("apikey").body();
        let json = serde_json::to_value(&body).expect("serialize should succeed");
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "MISSING_FIELD");
        assert_eq!(json["error"], "required parameter 'apikey' is missing");
    }

    #[test]
    fn test_feature_not_found_code() {
        let err = ApiError::from(GeoError::feature_not_found(9));
        assert_eq!(err.code, ErrorCode::FeatureNotFound);
        assert_eq!(err.message, "feature not found: 9");
    }
}
