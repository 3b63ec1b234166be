//! Admin protocol tests over a real loopback TCP connection.

mod support;

use std::sync::Arc;
use std::time::Duration;

use geolayer_api::admin::{serve_session, Frame, SessionLimits};
use serde_json::{json, Value};
use support::{short_limits, TestApp, SUPERUSER};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;

struct AdminClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl AdminClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect should succeed");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("write should succeed");
    }

    async fn read_frame(&mut self) -> Option<Frame> {
        let mut line = String::new();
        let read = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("response should arrive in time")
            .expect("read should succeed");
        if read == 0 {
            return None;
        }
        Some(serde_json::from_str(line.trim()).expect("response should be a frame"))
    }

    async fn call(&mut self, request: Value) -> Frame {
        self.send_line(&request.to_string()).await;
        self.read_frame().await.expect("connection should stay open")
    }

    async fn authenticate(&mut self) {
        let frame = self.call(json!({"method": "authenticate", "authkey": SUPERUSER})).await;
        assert!(frame.is_ok());
    }

    async fn is_closed(&mut self) -> bool {
        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), self.reader.read_to_end(&mut rest))
            .await
            .expect("close should arrive in time")
            .expect("read should succeed");
        read == 0
    }
}

fn ok_data(frame: Frame) -> Value {
    match frame {
        Frame::Ok { data } => data,
        Frame::Error { error } => panic!("expected ok frame, got error: {}", error),
    }
}

/// Start an admin server and return its address and shutdown handle.
async fn start(app: &TestApp, limits: SessionLimits) -> (std::net::SocketAddr, watch::Sender<bool>) {
    let server = app.admin_server(limits).await;
    let addr = server.local_addr().expect("server should have an address");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.run(shutdown_rx));
    (addr, shutdown_tx)
}

#[tokio::test]
async fn test_ping_without_auth() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;

    let data = ok_data(client.call(json!({"method": "ping"})).await);
    assert_eq!(data["message"], "pong");
}

#[tokio::test]
async fn test_malformed_line_gets_one_frame_then_close() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;

    client.send_line("this is not json").await;
    let frame = client.read_frame().await.expect("an error frame should arrive");
    assert!(!frame.is_ok());
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_object_without_method_keeps_connection() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;

    let frame = client.call(json!({})).await;
    assert_eq!(frame, Frame::error("method not found"));

    let frame = client.call(json!({"method": ["ping"]})).await;
    assert!(!frame.is_ok());

    let data = ok_data(client.call(json!({"method": "ping"})).await);
    assert_eq!(data["message"], "pong");
}

#[tokio::test]
async fn test_unauthenticated_privileged_keeps_connection() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;

    let frame = client.call(json!({"method": "export_apikeys"})).await;
    assert_eq!(frame, Frame::error("connection not authenticated"));

    let frame = client.call(json!({"method": "not_a_method"})).await;
    assert_eq!(frame, Frame::error("method not found"));

    client.authenticate().await;
    let data = ok_data(client.call(json!({"method": "export_apikeys"})).await);
    assert_eq!(data, json!([]));
}

#[tokio::test]
async fn test_authentication_is_per_connection() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;

    let mut first = AdminClient::connect(addr).await;
    first.authenticate().await;

    let mut second = AdminClient::connect(addr).await;
    let frame = second.call(json!({"method": "create_apikey"})).await;
    assert_eq!(frame, Frame::error("connection not authenticated"));
}

#[tokio::test]
async fn test_null_data_and_blank_lines() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;
    client.authenticate().await;

    client.send_line("").await;
    let frame = client
        .call(json!({"method": "insert_feature", "data": null}))
        .await;
    assert_eq!(frame, Frame::error("missing required parameters"));
}

#[tokio::test]
async fn test_full_admin_workflow() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;
    client.authenticate().await;

    let layer = json!({"type": "FeatureCollection", "features": [
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 1]}, "properties": {"n": 1}}
    ]});
    let created = ok_data(
        client
            .call(json!({"method": "create_datasource", "data": {"datasource": "parcels", "layer": layer}}))
            .await,
    );
    assert_eq!(created["datasource_id"], "parcels");

    let frame = client
        .call(json!({"method": "insert_apikey", "data": {"apikey": "k-1", "datasources": ["parcels"]}}))
        .await;
    assert!(frame.is_ok());

    let exported = ok_data(client.call(json!({"method": "export_apikeys"})).await);
    assert_eq!(exported, json!([{"Apikey": "k-1", "Datasources": ["parcels"]}]));

    let all = ok_data(client.call(json!({"method": "export_datasources"})).await);
    assert_eq!(all["parcels"]["features"].as_array().map(Vec::len), Some(1));

    let deleted = ok_data(
        client
            .call(json!({"method": "delete_datasource", "datasource": "parcels"}))
            .await,
    );
    assert_eq!(deleted["unlinked"], 1);

    let frame = client
        .call(json!({"method": "export_datasource", "datasource": "parcels"}))
        .await;
    assert_eq!(frame, Frame::error("datasource not found: parcels"));
}

#[tokio::test]
async fn test_import_geojson_file() {
    let app = TestApp::new();
    let (addr, _shutdown) = start(&app, short_limits()).await;
    let mut client = AdminClient::connect(addr).await;
    client.authenticate().await;

    let file = app.store.dir.path().join("roads.geojson");
    std::fs::write(
        &file,
        r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":null,"properties":{}}]}"#,
    )
    .expect("write should succeed");

    let data = ok_data(
        client
            .call(json!({"method": "import_file", "file": file.display().to_string()}))
            .await,
    );
    let datasource = data["datasource"].as_str().expect("datasource should be a string");
    let layer = app.state.cache.get_layer(datasource).expect("imported layer should exist");
    assert_eq!(layer.len(), 1);

    let frame = client
        .call(json!({"method": "import_file", "file": "/no/such/file.txt"}))
        .await;
    assert!(!frame.is_ok());
}

#[tokio::test]
async fn test_idle_session_closed() {
    let app = TestApp::new();
    let limits = SessionLimits {
        idle_timeout: Duration::from_millis(100),
        max_session: Duration::from_secs(30),
    };
    let (addr, _shutdown) = start(&app, limits).await;
    let mut client = AdminClient::connect(addr).await;

    let frame = client.read_frame().await.expect("timeout frame should arrive");
    assert_eq!(frame, Frame::error("session idle timeout"));
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_session_time_limit() {
    let app = TestApp::new();
    let limits = SessionLimits {
        idle_timeout: Duration::from_secs(30),
        max_session: Duration::from_millis(200),
    };
    let (addr, _shutdown) = start(&app, limits).await;
    let mut client = AdminClient::connect(addr).await;

    assert!(client.call(json!({"method": "ping"})).await.is_ok());
    let frame = client.read_frame().await.expect("expiry frame should arrive");
    assert_eq!(frame, Frame::error("session expired"));
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_non_local_peer_gets_nothing() {
    let app = TestApp::new();
    let ctx = Arc::new(app.admin_context());
    let (server_side, mut client_side) = tokio::io::duplex(1024);
    let peer = "203.0.113.7:40000".parse().expect("addr should parse");

    let session = tokio::spawn(serve_session(server_side, peer, ctx, short_limits()));
    // The server may already have dropped its end.
    let _ = client_side.write_all(b"{\"method\":\"ping\"}\n").await;

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client_side.read_to_end(&mut received))
        .await
        .expect("server should close the stream")
        .expect("read should succeed");
    assert!(received.is_empty());
    session.await.expect("session task should not panic");
}
