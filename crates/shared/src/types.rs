//! Common types used across LiveDesk

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::DeskError;

// =============================================================================
// Sender Role
// =============================================================================

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "sender_role", rename_all = "lowercase")]
pub enum SenderRole {
    Agent,
    Customer,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Agent => "agent",
            SenderRole::Customer => "customer",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderRole {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(SenderRole::Agent),
            "customer" => Ok(SenderRole::Customer),
            other => Err(DeskError::InvalidSender(other.to_string())),
        }
    }
}

// =============================================================================
// Conversations & Messages
// =============================================================================

/// A customer conversation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub customer_name: String,
    pub is_active: bool,
    pub assigned_to: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A persisted message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub text: String,
    pub sender: SenderRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// =============================================================================
// Channel Names
// =============================================================================

const CONVERSATION_PREFIX: &str = "conversation:";
const AGENT_PREFIX: &str = "agent:";
const WIRE_CONVERSATION_PREFIX: &str = "private-conversation-";
const WIRE_AGENT_PREFIX: &str = "private-agent-";

/// A private realtime channel.
///
/// The logical form (`conversation:{id}`, `agent:{id}`) is what the relay
/// routes on. Hosted providers reject `:` in channel names, so clients
/// subscribe using the wire form (`private-conversation-{id}`,
/// `private-agent-{id}`). Both forms parse to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    Conversation(Uuid),
    Agent(Uuid),
}

impl ChannelName {
    /// Provider-facing channel name
    pub fn wire_name(&self) -> String {
        match self {
            ChannelName::Conversation(id) => format!("{}{}", WIRE_CONVERSATION_PREFIX, id),
            ChannelName::Agent(id) => format!("{}{}", WIRE_AGENT_PREFIX, id),
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelName::Conversation(id) => write!(f, "{}{}", CONVERSATION_PREFIX, id),
            ChannelName::Agent(id) => write!(f, "{}{}", AGENT_PREFIX, id),
        }
    }
}

impl FromStr for ChannelName {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_id = |raw: &str| {
            Uuid::parse_str(raw).map_err(|_| DeskError::InvalidChannel(s.to_string()))
        };

        if let Some(rest) = s
            .strip_prefix(CONVERSATION_PREFIX)
            .or_else(|| s.strip_prefix(WIRE_CONVERSATION_PREFIX))
        {
            return parse_id(rest).map(ChannelName::Conversation);
        }

        if let Some(rest) = s
            .strip_prefix(AGENT_PREFIX)
            .or_else(|| s.strip_prefix(WIRE_AGENT_PREFIX))
        {
            return parse_id(rest).map(ChannelName::Agent);
        }

        Err(DeskError::InvalidChannel(s.to_string()))
    }
}
