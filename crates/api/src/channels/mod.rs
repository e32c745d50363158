//! Realtime channels: subscription grants and event publishing

pub mod authorizer;
pub mod publisher;
pub mod pusher;

use std::sync::Arc;

pub use authorizer::{check_scope, is_valid_socket_id, ChannelAuthError, ChannelAuthorizer};
pub use publisher::{ChannelPublisher, LocalPublisher, PublishError};
pub use pusher::PusherPublisher;

use crate::config::{ChannelProvider, Config};
use crate::websocket::WebSocketState;

/// Build the publisher selected by `CHANNEL_PROVIDER`
pub fn build_publisher(config: &Config, hub: &WebSocketState) -> Arc<dyn ChannelPublisher> {
    match config.channel_provider {
        ChannelProvider::Local => Arc::new(LocalPublisher::new(hub.clone())),
        ChannelProvider::Pusher => Arc::new(PusherPublisher::new(
            &config.channel_host,
            &config.channel_app_id,
            &config.channel_key,
            &config.channel_secret,
        )),
    }
}
