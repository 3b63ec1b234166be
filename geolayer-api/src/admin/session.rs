//! Per-connection admin session state machine.

use std::sync::Arc;

use geolayer_core::{GeoError, GeoResult};
use serde_json::Value;

use super::commands::{AdminContext, Method};
use super::protocol::{AdminRequest, Frame};

/// Authentication state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// What the connection should do after writing a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Close,
}

/// One admin connection. Every session starts unauthenticated.
pub struct Session {
    ctx: Arc<AdminContext>,
    state: SessionState,
}

impl Session {
    pub fn new(ctx: Arc<AdminContext>) -> Self {
        Self {
            ctx,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one request line.
    ///
    /// A line that is not a JSON object gets an error frame and closes the
    /// connection. Every other failure leaves the session open.
    pub async fn handle_line(&mut self, line: &str) -> (Frame, Outcome) {
        let req = match AdminRequest::parse(line) {
            Ok(req) => req,
            Err(e @ GeoError::Malformed(_)) => {
                tracing::warn!(error = %e, "Malformed admin request");
                return (Frame::from_error(&e), Outcome::Close);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Invalid admin request");
                return (Frame::from_error(&e), Outcome::Continue);
            }
        };

        let Some(method) = req.method().and_then(Method::parse) else {
            tracing::debug!(method = ?req.method(), "Unknown admin method");
            return (Frame::error("method not found"), Outcome::Continue);
        };

        if method.requires_auth() && self.state != SessionState::Authenticated {
            tracing::debug!(method = method.as_str(), "Admin request before authentication");
            return (
                Frame::error("connection not authenticated"),
                Outcome::Continue,
            );
        }

        let frame = match self.dispatch(method, &req).await {
            Ok(data) => Frame::ok(data),
            Err(e) => {
                tracing::debug!(method = method.as_str(), error = %e, "Admin command failed");
                Frame::from_error(&e)
            }
        };
        (frame, Outcome::Continue)
    }

    async fn dispatch(&mut self, method: Method, req: &AdminRequest) -> GeoResult<Value> {
        let ctx = &self.ctx;
        match method {
            Method::Ping => Ok(ctx.ping()),
            Method::Help => Ok(ctx.help()),
            Method::Authenticate => {
                let data = ctx.authenticate(req)?;
                self.state = SessionState::Authenticated;
                tracing::info!("Admin session authenticated");
                Ok(data)
            }
            Method::AssignDatasource => ctx.assign_datasource(req),
            Method::CreateApikey => ctx.create_apikey(),
            Method::InsertApikey => ctx.insert_apikey(req),
            Method::InsertFeature => ctx.insert_feature(req),
            Method::EditFeature => ctx.edit_feature(req),
            Method::CreateDatasource => ctx.create_datasource(req),
            Method::ExportApikeys => ctx.export_apikeys(),
            Method::ExportApikey => ctx.export_apikey(req),
            Method::ExportDatasources => ctx.export_datasources(),
            Method::ExportDatasource => ctx.export_datasource(req),
            Method::ImportFile => ctx.import_file(req).await,
            Method::DeleteDatasource => ctx.delete_datasource(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::importer::{Importer, Ogr2OgrConverter};
    use crate::auth::SuperuserKey;
    use crate::events::HubEvent;
    use crate::hub::UpdateHub;
    use crate::state::AppState;
    use geolayer_test_utils::TestStore;
    use serde_json::json;

    const KEY: &str = "admin-secret";

    fn session(store: &TestStore) -> Session {
        session_with_hub(store, Arc::new(UpdateHub::new()))
    }

    fn session_with_hub(store: &TestStore, hub: Arc<UpdateHub>) -> Session {
        let state = AppState::new(store.cache(), store.registry(), hub, SuperuserKey::new(KEY));
        let importer = Importer::new(Arc::new(Ogr2OgrConverter::new("ogr2ogr")));
        Session::new(Arc::new(AdminContext::new(&state, importer)))
    }

    async fn call(session: &mut Session, line: serde_json::Value) -> Frame {
        let (frame, outcome) = session.handle_line(&line.to_string()).await;
        assert_eq!(outcome, Outcome::Continue);
        frame
    }

    fn data(frame: Frame) -> serde_json::Value {
        match frame {
            Frame::Ok { data } => data,
            Frame::Error { error } => panic!("expected ok frame, got error: {}", error),
        }
    }

    #[tokio::test]
    async fn test_ping_and_help_without_auth() {
        let store = TestStore::new();
        let mut session = session(&store);

        let pong = data(call(&mut session, json!({"method": "ping"})).await);
        assert_eq!(pong["message"], "pong");

        let help = data(call(&mut session, json!({"method": "help"})).await);
        let methods = help["methods"].as_array().expect("methods should be a list");
        assert_eq!(methods.len(), Method::ALL.len());
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_privileged_method_requires_auth() {
        let store = TestStore::new();
        let mut session = session(&store);

        let frame = call(&mut session, json!({"method": "create_apikey"})).await;
        assert_eq!(frame, Frame::error("connection not authenticated"));
        assert!(store.registry().list_customers().expect("list should succeed").is_empty());
    }

    #[tokio::test]
    async fn test_wrong_key_keeps_state() {
        let store = TestStore::new();
        let mut session = session(&store);

        let frame = call(&mut session, json!({"method": "authenticate", "authkey": "nope"})).await;
        assert_eq!(frame, Frame::error("incorrect authkey"));
        assert_eq!(session.state(), SessionState::Unauthenticated);

        let frame = call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;
        assert!(frame.is_ok());
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let store = TestStore::new();
        let mut session = session(&store);
        let frame = call(&mut session, json!({"method": "drop_everything"})).await;
        assert_eq!(frame, Frame::error("method not found"));
    }

    #[tokio::test]
    async fn test_object_without_method_keeps_session() {
        let store = TestStore::new();
        let mut session = session(&store);

        for line in [json!({}), json!({"datasource": "x"})] {
            let frame = call(&mut session, line).await;
            assert_eq!(frame, Frame::error("method not found"));
        }

        let (frame, outcome) = session.handle_line(r#"{"method":5}"#).await;
        assert!(!frame.is_ok());
        assert_eq!(outcome, Outcome::Continue);
    }

    #[tokio::test]
    async fn test_malformed_line_closes() {
        let store = TestStore::new();
        let mut session = session(&store);
        let (frame, outcome) = session.handle_line("{not json").await;
        assert!(!frame.is_ok());
        assert_eq!(outcome, Outcome::Close);
    }

    #[tokio::test]
    async fn test_customer_and_feature_workflow() {
        let store = TestStore::new();
        let mut session = session(&store);
        call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;

        let created = data(call(&mut session, json!({"method": "create_apikey"})).await);
        let apikey = created["apikey"].as_str().expect("apikey should be a string").to_string();

        let ds = data(call(&mut session, json!({"method": "create_datasource", "data": {}})).await);
        let datasource = ds["datasource_id"].as_str().expect("id should be a string").to_string();

        let assigned = call(
            &mut session,
            json!({"method": "assign_datasource", "apikey": apikey, "datasource": datasource}),
        )
        .await;
        assert!(assigned.is_ok());

        let feature = json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}});
        let added = call(
            &mut session,
            json!({"method": "insert_feature", "data": {"datasource": datasource, "feature": feature}}),
        )
        .await;
        assert_eq!(data(added)["message"], "feature added");

        let edited = call(
            &mut session,
            json!({"method": "edit_feature", "data": {"datasource": datasource, "geo_id": "0", "feature": {"type": "Feature", "geometry": null, "properties": {"v": 2}}}}),
        )
        .await;
        assert_eq!(data(edited)["message"], "feature edited");

        let out_of_range = call(
            &mut session,
            json!({"method": "edit_feature", "data": {"datasource": datasource, "geo_id": 1, "feature": feature}}),
        )
        .await;
        assert!(!out_of_range.is_ok());

        let layer = data(call(&mut session, json!({"method": "export_datasource", "datasource": datasource})).await);
        assert_eq!(layer["features"][0]["properties"]["v"], 2);

        let customer = data(call(&mut session, json!({"method": "export_apikey", "apikey": apikey})).await);
        assert_eq!(customer["Datasources"], json!([datasource]));
    }

    #[tokio::test]
    async fn test_replacing_datasource_notifies_subscribers() {
        let store = TestStore::new();
        let hub = Arc::new(UpdateHub::new());
        let mut session = session_with_hub(&store, hub.clone());
        call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;

        let mut subscription = hub.subscribe("parcels");
        let layer = json!({"type": "FeatureCollection", "features": []});
        let created = call(
            &mut session,
            json!({"method": "create_datasource", "data": {"datasource": "parcels", "layer": layer}}),
        )
        .await;
        assert!(created.is_ok());

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), subscription.recv())
            .await
            .expect("event should arrive in time");
        assert_eq!(
            event,
            Some(HubEvent::LayerUpdated {
                datasource: "parcels".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let store = TestStore::new();
        let mut session = session(&store);
        call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;

        for method in ["assign_datasource", "insert_apikey", "insert_feature", "edit_feature", "import_file"] {
            let frame = call(&mut session, json!({"method": method, "data": null})).await;
            assert_eq!(frame, Frame::error("missing required parameters"), "method {}", method);
        }
    }

    #[tokio::test]
    async fn test_insert_apikey_dedupes() {
        let store = TestStore::new();
        let mut session = session(&store);
        call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;

        let frame = call(
            &mut session,
            json!({"method": "insert_apikey", "data": {"apikey": "k1", "datasources": ["a", "b", "a"]}}),
        )
        .await;
        assert!(frame.is_ok());
        let customer = store.registry().get_customer("k1").expect("customer should exist");
        assert_eq!(customer.datasources, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_datasource_unlinks() {
        let store = TestStore::new();
        let (customer, datasource) =
            geolayer_test_utils::seed_customer_with_layer(&store.registry(), &store.cache(), 2);
        let mut session = session(&store);
        call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;

        let deleted = data(call(&mut session, json!({"method": "delete_datasource", "datasource": datasource})).await);
        assert_eq!(deleted["unlinked"], 1);

        let customer = store
            .registry()
            .get_customer(&customer.apikey)
            .expect("customer should still exist");
        assert!(customer.datasources.is_empty());

        let again = call(&mut session, json!({"method": "delete_datasource", "datasource": datasource})).await;
        assert!(!again.is_ok());
    }

    #[tokio::test]
    async fn test_export_datasources_keyed_by_id() {
        let store = TestStore::new();
        let (_customer, datasource) =
            geolayer_test_utils::seed_customer_with_layer(&store.registry(), &store.cache(), 3);
        let mut session = session(&store);
        call(&mut session, json!({"method": "authenticate", "authkey": KEY})).await;

        let all = data(call(&mut session, json!({"method": "export_datasources"})).await);
        assert_eq!(all[&datasource]["features"].as_array().map(Vec::len), Some(3));
    }
}
