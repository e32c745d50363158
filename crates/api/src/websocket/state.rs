//! Hub-wide connection registry

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::connection::Connection;
use super::room::RoomManager;

/// Shared hub state: live connections and channel rooms
#[derive(Clone)]
pub struct WebSocketState {
    /// Live connections keyed by socket id
    pub connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,

    pub rooms: Arc<RoomManager>,
}

impl WebSocketState {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RoomManager::new()),
        }
    }

    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.socket_id.clone(), Arc::clone(&conn));

        tracing::info!(
            socket_id = %conn.socket_id,
            total_connections = connections.len(),
            "Hub connection added"
        );

        conn
    }

    /// Drop a connection and every subscription it held
    pub async fn remove_connection(&self, socket_id: &str) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.remove(socket_id) {
            self.rooms.remove_connection(&conn).await;

            tracing::info!(
                socket_id = %socket_id,
                remaining_connections = connections.len(),
                "Hub connection removed"
            );
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedesk_shared::ChannelName;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_remove_connection_drops_subscriptions() {
        let state = WebSocketState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = state.add_connection(Connection::new(tx)).await;
        let channel = ChannelName::Conversation(Uuid::new_v4());

        state.rooms.join(channel, Arc::clone(&conn)).await;
        assert_eq!(state.connection_count().await, 1);

        state.remove_connection(&conn.socket_id).await;
        assert_eq!(state.connection_count().await, 0);
        assert_eq!(state.rooms.room_size(&channel).await, 0);
    }
}
