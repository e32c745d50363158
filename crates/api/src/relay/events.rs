//! Events the relay publishes

use livedesk_shared::{Conversation, Message};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Published to `conversation:{id}` for every persisted message
pub const NEW_MESSAGE: &str = "new-message";
/// Published to `agent:{id}` when a customer opens a conversation
pub const NEW_CONVERSATION: &str = "new-conversation";
/// Published to `conversation:{id}` when the active flag changes
pub const CONVERSATION_UPDATED: &str = "conversation-updated";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationEvent<'a> {
    pub id: Uuid,
    pub customer_name: &'a str,
    pub message: &'a Message,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_active: bool,
}

impl<'a> NewConversationEvent<'a> {
    pub fn new(conversation: &'a Conversation, message: &'a Message) -> Self {
        Self {
            id: conversation.id,
            customer_name: &conversation.customer_name,
            message,
            created_at: conversation.created_at,
            is_active: conversation.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdatedEvent {
    pub id: Uuid,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedesk_shared::SenderRole;

    #[test]
    fn test_new_conversation_payload_shape() {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            customer_name: "Guest 1234".to_string(),
            is_active: true,
            assigned_to: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            text: "Hello".to_string(),
            sender: SenderRole::Customer,
            sender_id: None,
            sent_at: OffsetDateTime::UNIX_EPOCH,
            metadata: None,
        };

        let value = serde_json::to_value(NewConversationEvent::new(&conversation, &message)).unwrap();

        assert_eq!(value["id"], conversation.id.to_string());
        assert_eq!(value["customerName"], "Guest 1234");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(value["message"]["text"], "Hello");
        assert_eq!(value["message"]["sender"], "customer");
    }
}
