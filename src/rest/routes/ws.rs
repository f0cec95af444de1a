//! WebSocket push feed of audit events.
//!
//! Every connected client receives every event as a JSON text frame. Clients
//! only listen: inbound frames other than close are ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::audit::AuditEvent;
use crate::rest::state::ApiState;

/// Upgrade to a WebSocket and stream audit events
#[utoipa::path(
    get,
    path = "/api/v1/ws",
    tag = "Audit",
    responses(
        (status = 101, description = "Switching to the audit event feed")
    )
)]
pub async fn feed(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    // Subscribe before the upgrade so nothing published meanwhile is missed
    let events = state.controller.notifier().subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, events))
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<AuditEvent>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("Event listener connected");

    let mut forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event listener lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let text = match encode(&event) {
                Some(text) => text,
                None => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    // Whichever side finishes first ends the connection
    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }
    debug!("Event listener disconnected");
}

fn encode(event: &AuditEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(event = event.event_type(), error = %e, "Failed to encode event");
            None
        }
    }
}
