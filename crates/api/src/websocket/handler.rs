//! Hub WebSocket handler
//!
//! Connecting needs no credentials. Each subscription carries its own grant,
//! signed over this socket's id and the channel name exactly as sent.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use livedesk_shared::ChannelName;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::channels::ChannelAuthorizer;
use crate::state::AppState;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
    state::WebSocketState,
};

/// Upgrade to a hub connection
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let hub = app_state.ws_state.clone();
    let authorizer = app_state.channel_auth.clone();

    ws.on_upgrade(move |socket| handle_socket(socket, hub, authorizer))
}

async fn handle_socket(socket: WebSocket, hub: WebSocketState, authorizer: ChannelAuthorizer) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = hub.add_connection(Connection::new(tx)).await;
    let socket_id = conn.socket_id.clone();

    let _ = conn.send(ServerEvent::Connected {
        socket_id: socket_id.clone(),
    });

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize hub event");
                }
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(event, &conn, &hub, &authorizer).await,
                Err(e) => {
                    tracing::debug!(error = %e, socket_id = %socket_id, "Unparseable hub frame");
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => break,
            // Ping/pong frames are answered by axum; binary is ignored
            _ => {}
        }
    }

    tracing::debug!(socket_id = %socket_id, "Hub connection closing");
    hub.remove_connection(&socket_id).await;
    send_task.abort();
}

async fn handle_client_event(
    event: ClientEvent,
    conn: &Arc<Connection>,
    hub: &WebSocketState,
    authorizer: &ChannelAuthorizer,
) {
    match event {
        ClientEvent::Subscribe { channel, auth } => {
            let Ok(name) = channel.parse::<ChannelName>() else {
                let _ = conn.send(ServerEvent::Error {
                    message: format!("Unknown channel: {}", channel),
                });
                return;
            };

            if !authorizer.verify(&conn.socket_id, &channel, &auth) {
                tracing::warn!(
                    socket_id = %conn.socket_id,
                    channel = %name,
                    "Rejected hub subscription with invalid grant"
                );
                let _ = conn.send(ServerEvent::Error {
                    message: "Invalid channel grant".to_string(),
                });
                return;
            }

            hub.rooms.join(name, Arc::clone(conn)).await;
            let _ = conn.send(ServerEvent::Subscribed { channel });
        }

        ClientEvent::Unsubscribe { channel } => {
            if let Ok(name) = channel.parse::<ChannelName>() {
                hub.rooms.leave(&name, conn).await;
            }
        }

        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}
