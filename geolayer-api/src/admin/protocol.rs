//! Admin wire format: one JSON object per line in each direction.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use geolayer_core::{GeoError, GeoResult};

/// Nested `data` object of a request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestData {
    pub apikey: Option<String>,
    pub datasources: Option<Vec<String>>,
    pub datasource: Option<String>,
    pub feature: Option<Value>,
    pub geo_id: Option<Value>,
    pub layer: Option<Value>,
}

/// One request line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub apikey: Option<String>,
    #[serde(default)]
    pub authkey: Option<String>,
    #[serde(default)]
    pub datasource: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: RequestData,
}

fn null_as_default<'de, D>(deserializer: D) -> Result<RequestData, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RequestData>::deserialize(deserializer)?.unwrap_or_default())
}

impl AdminRequest {
    /// Parse a request line.
    ///
    /// A line that is not a JSON object is `Malformed`. An object whose
    /// fields have the wrong types is `BadRequest`.
    pub fn parse(line: &str) -> GeoResult<Self> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| GeoError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(GeoError::Malformed("request must be a JSON object".to_string()));
        }
        serde_json::from_value(value)
            .map_err(|e| GeoError::BadRequest(format!("invalid request: {}", e)))
    }

    /// The requested method name, if any.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Frame {
    Ok { data: Value },
    Error { error: String },
}

impl Frame {
    pub fn ok(data: Value) -> Self {
        Frame::Ok { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error {
            error: message.into(),
        }
    }

    /// Error frame for a failed operation. Message-carrying variants are
    /// reported without their category prefix.
    pub fn from_error(err: &GeoError) -> Self {
        let message = match err {
            GeoError::NotFound { .. } => err.to_string(),
            GeoError::Unauthorized(m)
            | GeoError::BadRequest(m)
            | GeoError::StorageUnavailable(m)
            | GeoError::Internal(m) => m.clone(),
            GeoError::Malformed(m) => format!("malformed request: {}", m),
        };
        Frame::error(message)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Frame::Ok { .. })
    }

    /// Encode as a single newline-terminated line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","error":{}}}"#,
                Value::String(format!("failed to encode response: {}", e))
            )
        });
        line.push('\n');
        line
    }
}
