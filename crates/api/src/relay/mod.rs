//! Conversation relay
//!
//! Turns an inbound message into durable state plus channel events. See
//! [`service::RelayService::submit`] for the write path.

pub mod events;
pub mod routing;
pub mod service;

pub use routing::{build_selector, AgentSelector, BroadcastToAll, DesignatedAgent};
pub use service::{
    ConversationDetail, ConversationSummary, RelayError, RelayService, SubmitMessage,
    SubmitOutcome,
};
