//! Hub wire frames
//!
//! Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

/// Frames sent by clients
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a channel. `auth` is the grant from `/channel-auth`.
    Subscribe { channel: String, auth: String },

    Unsubscribe { channel: String },

    /// Heartbeat
    Ping,
}

/// Frames sent by the server
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection
    Connected { socket_id: String },

    Subscribed { channel: String },

    /// A published event, relayed to a subscriber
    Event {
        channel: String,
        event: String,
        data: serde_json::Value,
    },

    Pong,

    Error { message: String },
}
