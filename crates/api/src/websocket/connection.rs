//! A live hub connection and the channels it is subscribed to

use livedesk_shared::ChannelName;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::events::ServerEvent;

/// An open WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Socket id in `N.N` form; grants are signed over it
    pub socket_id: String,

    /// Outbound frames for this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    pub subscriptions: Arc<RwLock<HashSet<ChannelName>>>,
}

impl Connection {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            socket_id: generate_socket_id(),
            sender,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Queue a frame. Fails once the writer task has gone away.
    #[allow(clippy::result_large_err)]
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    pub async fn subscribe(&self, channel: ChannelName) -> bool {
        self.subscriptions.write().await.insert(channel)
    }

    pub async fn unsubscribe(&self, channel: &ChannelName) -> bool {
        self.subscriptions.write().await.remove(channel)
    }

    pub async fn is_subscribed(&self, channel: &ChannelName) -> bool {
        self.subscriptions.read().await.contains(channel)
    }

    /// Clear and return every channel this connection joined
    pub async fn take_subscriptions(&self) -> Vec<ChannelName> {
        self.subscriptions.write().await.drain().collect()
    }
}

fn generate_socket_id() -> String {
    format!("{}.{}", rand::random::<u32>(), rand::random::<u32>())
}
