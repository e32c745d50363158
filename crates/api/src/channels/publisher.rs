//! Channel publishing seam

use async_trait::async_trait;
use livedesk_shared::ChannelName;

use crate::websocket::{events::ServerEvent, WebSocketState};

/// Pushes named events onto realtime channels.
///
/// Delivery is at-least-once from the subscriber's point of view; callers
/// decide whether a failure matters.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Publish `event` with `payload` to every subscriber of `channel`.
    async fn publish(
        &self,
        channel: ChannelName,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Channel service request failed: {0}")]
    Transport(String),
    #[error("Channel service rejected the event with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Event payload could not be encoded: {0}")]
    Encoding(String),
    #[error("Request signing failed")]
    Signing,
}

/// Publishes to the in-process WebSocket hub
#[derive(Clone)]
pub struct LocalPublisher {
    hub: WebSocketState,
}

impl LocalPublisher {
    pub fn new(hub: WebSocketState) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl ChannelPublisher for LocalPublisher {
    async fn publish(
        &self,
        channel: ChannelName,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        let delivered = self
            .hub
            .rooms
            .broadcast(
                &channel,
                ServerEvent::Event {
                    channel: channel.wire_name(),
                    event: event.to_string(),
                    data: payload,
                },
            )
            .await;

        tracing::debug!(
            channel = %channel,
            event = %event,
            recipients = delivered,
            "Published to local hub"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Connection;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_local_publish_reaches_room_members_only() {
        let hub = WebSocketState::new();
        let publisher = LocalPublisher::new(hub.clone());
        let conversation = ChannelName::Conversation(Uuid::new_v4());
        let elsewhere = ChannelName::Conversation(Uuid::new_v4());

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let subscriber = hub.add_connection(Connection::new(tx1)).await;
        let bystander = hub.add_connection(Connection::new(tx2)).await;
        hub.rooms.join(conversation, Arc::clone(&subscriber)).await;
        hub.rooms.join(elsewhere, Arc::clone(&bystander)).await;

        publisher
            .publish(conversation, "new-message", json!({"text": "Hello"}))
            .await
            .unwrap();

        match rx1.try_recv().unwrap() {
            ServerEvent::Event { channel, event, data } => {
                assert_eq!(channel, conversation.wire_name());
                assert_eq!(event, "new-message");
                assert_eq!(data["text"], "Hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_local_publish_without_subscribers_succeeds() {
        let publisher = LocalPublisher::new(WebSocketState::new());

        let result = publisher
            .publish(ChannelName::Agent(Uuid::new_v4()), "new-conversation", json!({}))
            .await;

        assert!(result.is_ok());
    }
}
