//! Customer and layer records.
//!
//! Both are persisted as JSON. Field names follow the wire format existing
//! clients already consume (`Apikey` / `Datasources`, GeoJSON for layers).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{GeoError, GeoResult};
use crate::identity::{ApiKey, DatasourceId};

// ============================================================================
// CUSTOMER
// ============================================================================

/// An API customer and the datasources it may access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "Apikey")]
    pub apikey: ApiKey,

    #[serde(rename = "Datasources", default, deserialize_with = "null_as_empty")]
    pub datasources: Vec<DatasourceId>,
}

impl Customer {
    /// Create a customer with no datasources.
    pub fn new(apikey: impl Into<ApiKey>) -> Self {
        Self {
            apikey: apikey.into(),
            datasources: Vec::new(),
        }
    }

    /// True iff `datasource` is listed for this customer.
    pub fn owns(&self, datasource: &str) -> bool {
        self.datasources.iter().any(|ds| ds == datasource)
    }

    /// Append a datasource. Returns false if it was already listed.
    pub fn add_datasource(&mut self, datasource: impl Into<DatasourceId>) -> bool {
        let datasource = datasource.into();
        if self.owns(&datasource) {
            return false;
        }
        self.datasources.push(datasource);
        true
    }

    /// Remove every occurrence of a datasource. Returns false if none was listed.
    pub fn remove_datasource(&mut self, datasource: &str) -> bool {
        let before = self.datasources.len();
        self.datasources.retain(|ds| ds != datasource);
        self.datasources.len() != before
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<DatasourceId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<DatasourceId>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// FEATURE
// ============================================================================

fn feature_type() -> String {
    "Feature".to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// One geometry + properties record of a layer.
///
/// Geometry semantics are not interpreted; only the shape of the record is
/// checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    pub geometry: Value,

    #[serde(default = "empty_object")]
    pub properties: Value,

    /// Foreign members such as `bbox`, kept as given.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// Build a feature from a geometry and a properties object.
    pub fn new(geometry: Value, properties: Value) -> Self {
        Self {
            kind: feature_type(),
            id: None,
            geometry,
            properties,
            extra: Map::new(),
        }
    }

    /// Parse and validate a feature from a request body.
    pub fn from_slice(body: &[u8]) -> GeoResult<Self> {
        let feature: Feature = serde_json::from_slice(body)
            .map_err(|e| GeoError::BadRequest(format!("invalid feature: {}", e)))?;
        feature.validate()?;
        Ok(feature)
    }

    /// Parse and validate a feature from an already-decoded JSON value.
    pub fn from_value(value: Value) -> GeoResult<Self> {
        let feature: Feature = serde_json::from_value(value)
            .map_err(|e| GeoError::BadRequest(format!("invalid feature: {}", e)))?;
        feature.validate()?;
        Ok(feature)
    }

    /// Geometry must be null or an object carrying a string `type`.
    pub fn validate(&self) -> GeoResult<()> {
        if self.kind != "Feature" {
            return Err(GeoError::BadRequest(format!(
                "invalid feature: type must be \"Feature\", got \"{}\"",
                self.kind
            )));
        }
        match &self.geometry {
            Value::Null => {}
            Value::Object(geometry) => {
                if !geometry.get("type").is_some_and(Value::is_string) {
                    return Err(GeoError::BadRequest(
                        "invalid feature: geometry has no type".to_string(),
                    ));
                }
            }
            _ => {
                return Err(GeoError::BadRequest(
                    "invalid feature: geometry must be an object".to_string(),
                ))
            }
        }
        if !matches!(self.properties, Value::Object(_) | Value::Null) {
            return Err(GeoError::BadRequest(
                "invalid feature: properties must be an object".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// LAYER
// ============================================================================

fn collection_type() -> String {
    "FeatureCollection".to_string()
}

/// A datasource's content: an ordered GeoJSON feature collection.
///
/// Feature indexes are positional and not stable across edits that change
/// the collection's length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(rename = "type", default = "collection_type")]
    pub kind: String,

    #[serde(default, deserialize_with = "null_as_empty_features")]
    pub features: Vec<Feature>,

    /// Collection-level foreign members (`crs`, `name`, `bbox`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty_features<'de, D>(deserializer: D) -> Result<Vec<Feature>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Feature>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for Layer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer {
    /// An empty feature collection.
    pub fn new() -> Self {
        Self {
            kind: collection_type(),
            features: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature at positional index `k`.
    pub fn feature(&self, k: usize) -> GeoResult<&Feature> {
        self.features
            .get(k)
            .ok_or_else(|| GeoError::feature_not_found(k))
    }

    pub fn add_feature(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Replace the feature at index `k` in place.
    pub fn replace_feature(&mut self, k: usize, feature: Feature) -> GeoResult<()> {
        let slot = self
            .features
            .get_mut(k)
            .ok_or_else(|| GeoError::feature_not_found(k))?;
        *slot = feature;
        Ok(())
    }

    /// Parse a layer payload, validating every feature.
    pub fn from_value(value: Value) -> GeoResult<Self> {
        let layer: Layer = serde_json::from_value(value)
            .map_err(|e| GeoError::BadRequest(format!("invalid layer: {}", e)))?;
        if layer.kind != "FeatureCollection" {
            return Err(GeoError::BadRequest(format!(
                "invalid layer: type must be \"FeatureCollection\", got \"{}\"",
                layer.kind
            )));
        }
        for feature in &layer.features {
            feature.validate()?;
        }
        Ok(layer)
    }
}
