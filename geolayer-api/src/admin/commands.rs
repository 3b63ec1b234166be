//! Admin command implementations.
//!
//! Each command takes a parsed request and returns the `data` payload of an
//! ok frame. Authentication is enforced by the session before dispatch.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use geolayer_core::{new_datasource_id, Customer, Feature, GeoError, GeoResult, Layer};
use geolayer_storage::{CustomerRegistry, LayerCache};
use serde_json::{json, Value};

use crate::auth::SuperuserKey;
use crate::events::HubEvent;
use crate::hub::UpdateHub;
use crate::state::AppState;

use super::importer::Importer;
use super::protocol::AdminRequest;

// ============================================================================
// METHODS
// ============================================================================

/// Admin protocol methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Ping,
    Help,
    Authenticate,
    AssignDatasource,
    CreateApikey,
    InsertApikey,
    InsertFeature,
    EditFeature,
    CreateDatasource,
    ExportApikeys,
    ExportApikey,
    ExportDatasources,
    ExportDatasource,
    ImportFile,
    DeleteDatasource,
}

impl Method {
    pub const ALL: [Method; 15] = [
        Method::Ping,
        Method::Help,
        Method::Authenticate,
        Method::AssignDatasource,
        Method::CreateApikey,
        Method::InsertApikey,
        Method::InsertFeature,
        Method::EditFeature,
        Method::CreateDatasource,
        Method::ExportApikeys,
        Method::ExportApikey,
        Method::ExportDatasources,
        Method::ExportDatasource,
        Method::ImportFile,
        Method::DeleteDatasource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Ping => "ping",
            Method::Help => "help",
            Method::Authenticate => "authenticate",
            Method::AssignDatasource => "assign_datasource",
            Method::CreateApikey => "create_apikey",
            Method::InsertApikey => "insert_apikey",
            Method::InsertFeature => "insert_feature",
            Method::EditFeature => "edit_feature",
            Method::CreateDatasource => "create_datasource",
            Method::ExportApikeys => "export_apikeys",
            Method::ExportApikey => "export_apikey",
            Method::ExportDatasources => "export_datasources",
            Method::ExportDatasource => "export_datasource",
            Method::ImportFile => "import_file",
            Method::DeleteDatasource => "delete_datasource",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Method::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// `ping`, `help` and `authenticate` are open to every session.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Method::Ping | Method::Help | Method::Authenticate)
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything an admin session can touch.
#[derive(Clone)]
pub struct AdminContext {
    pub cache: Arc<LayerCache>,
    pub registry: Arc<CustomerRegistry>,
    pub hub: Arc<UpdateHub>,
    pub superuser: SuperuserKey,
    pub importer: Importer,
}

fn missing() -> GeoError {
    GeoError::BadRequest("missing required parameters".to_string())
}

fn required(value: Option<&str>) -> GeoResult<&str> {
    value.filter(|s| !s.is_empty()).ok_or_else(missing)
}

/// Feature index from a JSON number or numeric string.
fn parse_index(value: &Value) -> GeoResult<usize> {
    let index = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    index
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| GeoError::BadRequest(format!("invalid geo_id: {}", value)))
}

impl AdminContext {
    pub fn new(state: &AppState, importer: Importer) -> Self {
        Self {
            cache: Arc::clone(&state.cache),
            registry: Arc::clone(&state.registry),
            hub: Arc::clone(&state.hub),
            superuser: state.superuser.clone(),
            importer,
        }
    }

    pub fn ping(&self) -> Value {
        json!({"message": "pong", "version": geolayer_core::VERSION})
    }

    pub fn help(&self) -> Value {
        let methods: Vec<&str> = Method::ALL.iter().map(Method::as_str).collect();
        json!({ "methods": methods })
    }

    /// Check a presented superuser key.
    pub fn authenticate(&self, req: &AdminRequest) -> GeoResult<Value> {
        match req.authkey.as_deref() {
            Some(key) if self.superuser.verify(key) => Ok(json!({})),
            _ => Err(GeoError::Unauthorized("incorrect authkey".to_string())),
        }
    }

    pub fn assign_datasource(&self, req: &AdminRequest) -> GeoResult<Value> {
        let apikey = required(req.apikey.as_deref().or(req.data.apikey.as_deref()))?;
        let datasource = required(req.datasource.as_deref().or(req.data.datasource.as_deref()))?;
        self.registry.assign_datasource(apikey, datasource)?;
        Ok(json!({}))
    }

    pub fn create_apikey(&self) -> GeoResult<Value> {
        let customer = self.registry.create_customer()?;
        Ok(json!({ "apikey": customer.apikey }))
    }

    /// Store a customer exactly as given, dropping repeated datasources.
    pub fn insert_apikey(&self, req: &AdminRequest) -> GeoResult<Value> {
        let apikey = required(req.data.apikey.as_deref())?;
        let mut customer = Customer::new(apikey);
        for datasource in req.data.datasources.iter().flatten() {
            customer.add_datasource(datasource.clone());
        }
        self.registry.put_customer(&customer)?;
        Ok(json!({ "apikey": customer.apikey }))
    }

    pub fn insert_feature(&self, req: &AdminRequest) -> GeoResult<Value> {
        let datasource = required(req.data.datasource.as_deref())?;
        let feature = Feature::from_value(req.data.feature.clone().ok_or_else(missing)?)?;

        self.cache.update_layer(datasource, |layer| {
            layer.add_feature(feature);
            Ok(())
        })?;
        self.hub.notify_updated(datasource);
        Ok(json!({"datasource_id": datasource, "message": "feature added"}))
    }

    pub fn edit_feature(&self, req: &AdminRequest) -> GeoResult<Value> {
        let datasource = required(req.data.datasource.as_deref())?;
        let index = parse_index(req.data.geo_id.as_ref().ok_or_else(missing)?)?;
        let feature = Feature::from_value(req.data.feature.clone().ok_or_else(missing)?)?;

        self.cache
            .update_layer(datasource, |layer| layer.replace_feature(index, feature))?;
        self.hub.notify_updated(datasource);
        Ok(json!({"datasource_id": datasource, "message": "feature edited"}))
    }

    /// Store `data.layer` under `data.datasource`, or an empty layer under a
    /// freshly minted id.
    pub fn create_datasource(&self, req: &AdminRequest) -> GeoResult<Value> {
        let (datasource, layer) = match req.data.datasource.as_deref().filter(|s| !s.is_empty()) {
            Some(datasource) => {
                let layer = match req.data.layer.clone() {
                    Some(value) => Layer::from_value(value)?,
                    None => Layer::new(),
                };
                (datasource.to_string(), layer)
            }
            None => (new_datasource_id(), Layer::new()),
        };

        self.cache.put_layer(&datasource, layer)?;
        tracing::info!(datasource = %datasource, "Datasource created");
        // A supplied id may replace a layer that already has subscribers.
        self.hub.notify_updated(&datasource);
        Ok(json!({ "datasource_id": datasource }))
    }

    pub fn export_apikeys(&self) -> GeoResult<Value> {
        Ok(serde_json::to_value(self.registry.list_customers()?)?)
    }

    pub fn export_apikey(&self, req: &AdminRequest) -> GeoResult<Value> {
        let apikey = required(req.apikey.as_deref().or(req.data.apikey.as_deref()))?;
        Ok(serde_json::to_value(self.registry.get_customer(apikey)?)?)
    }

    pub fn export_datasources(&self) -> GeoResult<Value> {
        let layers: BTreeMap<String, Layer> = self.cache.scan_layers()?.into_iter().collect();
        Ok(serde_json::to_value(layers)?)
    }

    pub fn export_datasource(&self, req: &AdminRequest) -> GeoResult<Value> {
        let datasource = required(req.datasource.as_deref().or(req.data.datasource.as_deref()))?;
        Ok(serde_json::to_value(self.cache.get_layer(datasource)?)?)
    }

    /// Import a file from the server's filesystem as a new datasource.
    pub async fn import_file(&self, req: &AdminRequest) -> GeoResult<Value> {
        let file = required(req.file.as_deref())?;
        let layer = self.importer.load(Path::new(file)).await?;

        let datasource = new_datasource_id();
        let features = layer.len();
        self.cache.put_layer(&datasource, layer)?;
        tracing::info!(datasource = %datasource, file = %file, features, "File imported");
        Ok(json!({ "datasource": datasource }))
    }

    /// Physically remove a layer and unlink it from every customer.
    pub fn delete_datasource(&self, req: &AdminRequest) -> GeoResult<Value> {
        let datasource = required(req.datasource.as_deref().or(req.data.datasource.as_deref()))?;
        if !self.cache.delete_layer(datasource)? {
            return Err(GeoError::datasource_not_found(datasource));
        }
        let unlinked = self.registry.unlink_everywhere(datasource)?;
        self.hub.broadcast(
            datasource,
            HubEvent::LayerDeleted {
                datasource: datasource.to_string(),
            },
        );
        tracing::info!(datasource = %datasource, unlinked, "Datasource deleted");
        Ok(json!({ "datasource": datasource, "unlinked": unlinked }))
    }
}
