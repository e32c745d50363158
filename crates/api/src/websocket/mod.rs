//! In-process channel hub
//!
//! Serves `GET /ws` when `CHANNEL_PROVIDER=local`. Clients subscribe to
//! private channels with the same grants `/channel-auth` issues for the
//! hosted service, and receive `event` frames for everything published to
//! those channels.
//!
//! # Architecture
//!
//! - **Connection**: one socket, its id and its subscriptions
//! - **Room**: channel-keyed fan-out
//! - **State**: every live connection plus the rooms
//! - **Handler**: the axum upgrade route and the frame loop
//! - **Events**: wire frames in both directions

pub mod connection;
pub mod events;
pub mod handler;
pub mod room;
pub mod state;

pub use handler::ws_handler;
pub use state::WebSocketState;
