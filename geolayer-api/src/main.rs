//! GeoLayer Server Entry Point
//!
//! Opens the store, starts the eviction task and the admin listener, then
//! serves HTTP until Ctrl-C. On shutdown it waits for live WebSocket
//! subscribers to leave and writes a final backup snapshot.

use std::sync::Arc;

use geolayer_api::admin::{AdminContext, AdminServer, Importer, Ogr2OgrConverter, SessionLimits};
use geolayer_api::telemetry::init_tracing;
use geolayer_api::{create_api_router, ApiError, ApiResult, AppState, ServerConfig, UpdateHub};
use geolayer_storage::{spawn_eviction_task, CustomerRegistry, LayerCache, Store};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ServerConfig::from_env();
    init_tracing(config.debug, config.log_json)?;
    if config.superuser_key.is_insecure_default() {
        tracing::warn!("Running with the insecure default superuser key");
    }

    let store = Store::open(&config.store_path, config.store_max_size_mb).map_err(|e| {
        tracing::error!(path = %config.store_path.display(), error = %e, "Failed to open store");
        ApiError::internal_error(format!("Failed to open store: {}", e))
    })?;
    let store = Arc::new(store);
    tracing::info!(path = %config.store_path.display(), "Store opened");

    if let Err(e) = store.backup(&config.backup_path) {
        tracing::warn!(path = %config.backup_path.display(), error = %e, "Startup backup failed");
    }

    let cache = Arc::new(LayerCache::new(Arc::clone(&store)));
    let registry = Arc::new(CustomerRegistry::new(Arc::clone(&store)));
    let hub = Arc::new(UpdateHub::new());
    let state = AppState::new(
        Arc::clone(&cache),
        registry,
        Arc::clone(&hub),
        config.superuser_key.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let eviction = spawn_eviction_task(Arc::clone(&cache), config.cache.clone(), shutdown_rx.clone());

    let importer = Importer::new(Arc::new(Ogr2OgrConverter::new(config.admin.ogr2ogr.clone())));
    let limits = SessionLimits {
        idle_timeout: config.admin.idle_timeout,
        max_session: config.admin.max_session,
    };
    let admin = AdminServer::bind(config.admin.bind, AdminContext::new(&state, importer), limits)
        .await
        .map_err(|e| {
            ApiError::internal_error(format!("Failed to bind admin listener {}: {}", config.admin.bind, e))
        })?;
    let admin_task = tokio::spawn(admin.run(shutdown_rx.clone()));

    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, version = geolayer_core::VERSION, "Starting GeoLayer server");

    let app = create_api_router(state);
    let mut http_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = http_shutdown.wait_for(|stop| *stop).await;
    });
    let server_task = tokio::spawn(async move { server.await });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    shutdown_tx.send_replace(true);

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }
    if let Err(e) = admin_task.await {
        tracing::error!(error = %e, "Admin server task failed");
    }
    if let Err(e) = eviction.await {
        tracing::error!(error = %e, "Eviction task failed");
    }

    let subscribers = hub.subscriber_count();
    if subscribers > 0 {
        tracing::info!(subscribers, "Waiting for WebSocket subscribers to disconnect");
    }
    hub.wait_for_drain().await;

    store.backup(&config.backup_path).map_err(|e| {
        ApiError::internal_error(format!("Shutdown backup failed: {}", e))
    })?;
    tracing::info!("GeoLayer server stopped");
    Ok(())
}
