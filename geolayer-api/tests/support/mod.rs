//! Shared helpers for the API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use geolayer_api::admin::{AdminContext, AdminServer, Importer, Ogr2OgrConverter, SessionLimits};
use geolayer_api::{create_api_router, AppState, SuperuserKey, UpdateHub};
use geolayer_test_utils::TestStore;
use serde_json::Value;
use tower::ServiceExt;

pub const SUPERUSER: &str = "test-superuser-key";

/// A fully wired application over a temporary store.
pub struct TestApp {
    pub store: TestStore,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(TestStore::new())
    }

    pub fn with_store(store: TestStore) -> Self {
        let state = AppState::new(
            store.cache(),
            store.registry(),
            Arc::new(UpdateHub::new()),
            SuperuserKey::new(SUPERUSER),
        );
        Self { store, state }
    }

    pub fn router(&self) -> Router {
        create_api_router(self.state.clone())
    }

    pub fn admin_context(&self) -> AdminContext {
        let importer = Importer::new(Arc::new(Ogr2OgrConverter::new("ogr2ogr")))
            .with_scratch_dir(self.store.dir.path());
        AdminContext::new(&self.state, importer)
    }

    /// Bind an admin server on an ephemeral loopback port.
    pub async fn admin_server(&self, limits: SessionLimits) -> AdminServer {
        AdminServer::bind(
            "127.0.0.1:0".parse().expect("addr should parse"),
            self.admin_context(),
            limits,
        )
        .await
        .expect("admin server should bind")
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(empty_request("GET", uri)).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn form_request(method: &str, uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("request should build")
}

pub fn short_limits() -> SessionLimits {
    SessionLimits {
        idle_timeout: Duration::from_secs(5),
        max_session: Duration::from_secs(30),
    }
}
