//! Channel rooms for fan-out

use livedesk_shared::ChannelName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::connection::Connection;
use super::events::ServerEvent;

/// Connections grouped by the channel they subscribed to
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<ChannelName, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a channel room and record the subscription on
    /// the connection. Joining twice is a no-op.
    pub async fn join(&self, channel: ChannelName, conn: Arc<Connection>) {
        if !conn.subscribe(channel).await {
            return;
        }

        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(channel).or_default();
        members.push(Arc::clone(&conn));

        tracing::debug!(
            channel = %channel,
            socket_id = %conn.socket_id,
            room_size = members.len(),
            "Connection joined channel"
        );
    }

    pub async fn leave(&self, channel: &ChannelName, conn: &Connection) {
        if !conn.unsubscribe(channel).await {
            return;
        }

        let mut rooms = self.rooms.write().await;
        Self::drop_member(&mut rooms, channel, &conn.socket_id);
    }

    /// Send an event to every member of a room. Returns how many accepted it.
    ///
    /// Closed connections are skipped; they are removed on disconnect.
    pub async fn broadcast(&self, channel: &ChannelName, event: ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for conn in members {
            match conn.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(
                        socket_id = %conn.socket_id,
                        channel = %channel,
                        "Dropped event for closed connection"
                    );
                }
            }
        }

        delivered
    }

    /// Remove a connection from the rooms it joined
    pub async fn remove_connection(&self, conn: &Connection) {
        let channels = conn.take_subscriptions().await;
        if channels.is_empty() {
            return;
        }

        let mut rooms = self.rooms.write().await;
        for channel in &channels {
            Self::drop_member(&mut rooms, channel, &conn.socket_id);
        }
    }

    fn drop_member(
        rooms: &mut HashMap<ChannelName, Vec<Arc<Connection>>>,
        channel: &ChannelName,
        socket_id: &str,
    ) {
        if let Some(members) = rooms.get_mut(channel) {
            members.retain(|c| c.socket_id != socket_id);
            if members.is_empty() {
                rooms.remove(channel);
            }
        }
    }

    pub async fn room_size(&self, channel: &ChannelName) -> usize {
        self.rooms.read().await.get(channel).map_or(0, Vec::len)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
