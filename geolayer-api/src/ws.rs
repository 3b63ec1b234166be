//! WebSocket handler for live layer updates.
//!
//! `GET /ws/{datasource}` upgrades to a WebSocket and subscribes the
//! connection to that datasource's notifications in the [`UpdateHub`].
//! Client frames are read only to detect disconnects.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::events::HubEvent;
use crate::hub::UpdateHub;
use crate::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(datasource): Path<String>,
    State(hub): State<Arc<UpdateHub>>,
) -> Response {
    info!(datasource = %datasource, "WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, hub, datasource))
}

async fn handle_socket(socket: WebSocket, hub: Arc<UpdateHub>, datasource: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = hub.subscribe(&datasource);
    info!(datasource = %datasource, subscriber = subscription.id(), "WebSocket connected");

    let connected = HubEvent::Connected {
        datasource: datasource.clone(),
    };
    if let Err(e) = send_event(&mut sender, &connected).await {
        error!(datasource = %datasource, error = %e, "Failed to send Connected event");
        return;
    }

    let ds = datasource.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!(datasource = %ds, "Client sent close frame");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(datasource = %ds, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    debug!(datasource = %datasource, "Subscription closed by hub");
                    break;
                };
                if let Err(e) = send_event(&mut sender, &event).await {
                    warn!(datasource = %datasource, error = %e, "Failed to send event, closing connection");
                    break;
                }
            }

            _ = &mut recv_task => {
                debug!(datasource = %datasource, "Receiver task finished");
                break;
            }
        }
    }

    recv_task.abort();
    drop(subscription);
    let _ = sender.close().await;
    info!(datasource = %datasource, "WebSocket disconnected");
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &HubEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(|e| {
        error!(error = %e, "Failed to serialize event");
        axum::Error::new(e)
    })?;

    sender.send(Message::Text(json)).await
}

/// Router for the WebSocket endpoint.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/ws/:datasource", get(ws_handler))
}
