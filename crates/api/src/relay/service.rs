//! Conversation relay: persist, then publish

use futures::future::join_all;
use livedesk_shared::{ChannelName, Conversation, Message, SenderRole};
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use super::events::{
    ConversationUpdatedEvent, NewConversationEvent, CONVERSATION_UPDATED, NEW_CONVERSATION,
    NEW_MESSAGE,
};
use super::routing::AgentSelector;
use crate::channels::ChannelPublisher;

pub const MAX_MESSAGE_CHARS: usize = 50_000;
const MAX_CUSTOMER_NAME_CHARS: usize = 100;

const CONVERSATION_COLUMNS: &str =
    "id, customer_name, is_active, assigned_to, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, text, sender, sender_id, sent_at, metadata";

/// An inbound message, before validation
#[derive(Debug, Clone)]
pub struct SubmitMessage {
    pub text: String,
    pub conversation_id: Option<Uuid>,
    pub sender: SenderRole,
    /// Agent user id, when an agent is sending
    pub sender_id: Option<Uuid>,
    /// Customer display name, used only when a conversation is created
    pub sender_name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub conversation: Conversation,
    pub message: Message,
    pub created: bool,
}

/// A conversation with its full history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: Uuid,
    pub customer_name: String,
    pub is_active: bool,
    pub messages: Vec<Message>,
}

/// List entry for the agent dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub unread_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("A conversation id is required")]
    MissingConversation,
    #[error("Conversation not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persists messages and fans them out over channels.
///
/// Store writes for one submission share a transaction. Publishing happens
/// after commit and never fails the submission.
pub struct RelayService {
    pool: PgPool,
    publisher: Arc<dyn ChannelPublisher>,
    selector: Arc<dyn AgentSelector>,
}

impl RelayService {
    pub fn new(
        pool: PgPool,
        publisher: Arc<dyn ChannelPublisher>,
        selector: Arc<dyn AgentSelector>,
    ) -> Self {
        Self {
            pool,
            publisher,
            selector,
        }
    }

    /// Channel backend in use
    pub fn publisher_name(&self) -> &'static str {
        self.publisher.name()
    }

    /// Accept a message: store it, then deliver it
    pub async fn submit(&self, input: SubmitMessage) -> Result<SubmitOutcome, RelayError> {
        validate_text(&input.text)?;

        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        let (conversation, created) = match input.conversation_id {
            Some(id) => {
                let touched: Option<Conversation> = sqlx::query_as(&format!(
                    "UPDATE conversations SET updated_at = GREATEST(updated_at, $2) \
                     WHERE id = $1 RETURNING {}",
                    CONVERSATION_COLUMNS
                ))
                .bind(id)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?;

                (touched.ok_or(RelayError::NotFound)?, false)
            }
            None if input.sender == SenderRole::Customer => {
                let inserted: Conversation = sqlx::query_as(&format!(
                    "INSERT INTO conversations (id, customer_name, is_active, created_at, updated_at) \
                     VALUES ($1, $2, TRUE, $3, $3) RETURNING {}",
                    CONVERSATION_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(customer_label(input.sender_name.as_deref()))
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

                (inserted, true)
            }
            None => return Err(RelayError::MissingConversation),
        };

        let message: Message = sqlx::query_as(&format!(
            "INSERT INTO messages (id, conversation_id, text, sender, sender_id, metadata, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(conversation.id)
        .bind(&input.text)
        .bind(input.sender)
        .bind(input.sender_id)
        .bind(&input.metadata)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            sender = %message.sender,
            created,
            "Message stored"
        );

        self.publish_json(ChannelName::Conversation(conversation.id), NEW_MESSAGE, &message)
            .await;

        if created {
            self.notify_agents(&conversation, &message).await;
        }

        Ok(SubmitOutcome {
            conversation,
            message,
            created,
        })
    }

    /// Full history of one conversation, oldest first
    pub async fn get_conversation(&self, id: Uuid) -> Result<ConversationDetail, RelayError> {
        let conversation: Conversation = sqlx::query_as(&format!(
            "SELECT {} FROM conversations WHERE id = $1",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RelayError::NotFound)?;

        let messages: Vec<Message> = sqlx::query_as(&format!(
            "SELECT {} FROM messages WHERE conversation_id = $1 ORDER BY sent_at ASC, id ASC",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ConversationDetail {
            id: conversation.id,
            customer_name: conversation.customer_name,
            is_active: conversation.is_active,
            messages,
        })
    }

    /// Every conversation, most recently active first
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, RelayError> {
        let conversations: Vec<Conversation> = sqlx::query_as(&format!(
            "SELECT {} FROM conversations ORDER BY updated_at DESC, id ASC",
            CONVERSATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations
            .into_iter()
            .map(|conversation| ConversationSummary {
                conversation,
                messages: Vec::new(),
                unread_count: 0,
            })
            .collect())
    }

    /// Open or close a conversation
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Conversation, RelayError> {
        let conversation: Conversation = sqlx::query_as(&format!(
            "UPDATE conversations SET is_active = $2 WHERE id = $1 RETURNING {}",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RelayError::NotFound)?;

        let event = ConversationUpdatedEvent {
            id: conversation.id,
            is_active: conversation.is_active,
            updated_at: conversation.updated_at,
        };
        self.publish_json(ChannelName::Conversation(id), CONVERSATION_UPDATED, &event)
            .await;

        Ok(conversation)
    }

    pub async fn conversation_exists(&self, id: Uuid) -> Result<bool, RelayError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM conversations WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn notify_agents(&self, conversation: &Conversation, message: &Message) {
        let agents = match self.selector.select(&self.pool).await {
            Ok(agents) => agents,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    conversation_id = %conversation.id,
                    policy = self.selector.name(),
                    "Failed to select agents for new conversation"
                );
                return;
            }
        };

        if agents.is_empty() {
            tracing::warn!(
                conversation_id = %conversation.id,
                policy = self.selector.name(),
                "No agent to notify about new conversation"
            );
            return;
        }

        let payload = match serde_json::to_value(NewConversationEvent::new(conversation, message)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    conversation_id = %conversation.id,
                    event = NEW_CONVERSATION,
                    "Failed to encode event"
                );
                return;
            }
        };

        // One slow agent channel must not hold up the others
        join_all(agents.into_iter().map(|agent_id| {
            self.publish_value(ChannelName::Agent(agent_id), NEW_CONVERSATION, payload.clone())
        }))
        .await;
    }

    /// Publish, logging and swallowing any failure
    async fn publish_json<T: Serialize + ?Sized>(&self, channel: ChannelName, event: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(payload) => self.publish_value(channel, event, payload).await,
            Err(e) => {
                tracing::error!(error = %e, channel = %channel, event, "Failed to encode event");
            }
        }
    }

    async fn publish_value(&self, channel: ChannelName, event: &str, payload: serde_json::Value) {
        if let Err(e) = self.publisher.publish(channel, event, payload).await {
            tracing::warn!(
                error = %e,
                channel = %channel,
                event,
                publisher = self.publisher.name(),
                "Publish failed; subscribers will catch up from history"
            );
        }
    }
}

/// Reject blank or oversized message text
pub fn validate_text(text: &str) -> Result<(), RelayError> {
    if text.trim().is_empty() {
        return Err(RelayError::InvalidArgument(
            "Message text must not be empty".to_string(),
        ));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(RelayError::InvalidArgument(format!(
            "Message text must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

/// Display name for a new conversation's customer
pub fn customer_label(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.chars().take(MAX_CUSTOMER_NAME_CHARS).collect(),
        None => format!("Guest {}", rand::thread_rng().gen_range(1000..10000)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_rejected() {
        assert!(matches!(
            validate_text("   \n\t"),
            Err(RelayError::InvalidArgument(_))
        ));
        assert!(validate_text(" Hello ").is_ok());
    }

    #[test]
    fn test_oversized_text_rejected() {
        let text = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(validate_text(&text).is_err());
        assert!(validate_text(&"a".repeat(MAX_MESSAGE_CHARS)).is_ok());
    }

    #[test]
    fn test_customer_label() {
        assert_eq!(customer_label(Some("  Ada  ")), "Ada");

        let guest = customer_label(Some("   "));
        let number: u32 = guest.strip_prefix("Guest ").unwrap().parse().unwrap();
        assert!((1000..10000).contains(&number));

        assert!(customer_label(None).starts_with("Guest "));
        assert_eq!(customer_label(Some(&"x".repeat(500))).len(), 100);
    }

    #[test]
    fn test_summary_flattens_conversation() {
        let summary = ConversationSummary {
            conversation: Conversation {
                id: Uuid::new_v4(),
                customer_name: "Ada".to_string(),
                is_active: true,
                assigned_to: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_at: OffsetDateTime::UNIX_EPOCH,
            },
            messages: Vec::new(),
            unread_count: 0,
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["customerName"], "Ada");
        assert_eq!(value["unreadCount"], 0);
        assert_eq!(value["messages"].as_array().map(Vec::len), Some(0));
        assert_eq!(value["updatedAt"], "1970-01-01T00:00:00Z");
    }

    struct FixedSelector(Vec<Uuid>);

    #[async_trait::async_trait]
    impl AgentSelector for FixedSelector {
        async fn select(&self, _pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Completes only once every expected publish is in flight at once
    struct RendezvousPublisher {
        barrier: tokio::sync::Barrier,
        channels: std::sync::Mutex<Vec<ChannelName>>,
    }

    #[async_trait::async_trait]
    impl ChannelPublisher for RendezvousPublisher {
        async fn publish(
            &self,
            channel: ChannelName,
            event: &str,
            _payload: serde_json::Value,
        ) -> Result<(), crate::channels::PublishError> {
            assert_eq!(event, NEW_CONVERSATION);
            self.channels.lock().unwrap().push(channel);
            self.barrier.wait().await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "rendezvous"
        }
    }

    #[tokio::test]
    async fn test_agents_are_notified_concurrently() {
        let agents: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let publisher = Arc::new(RendezvousPublisher {
            barrier: tokio::sync::Barrier::new(agents.len()),
            channels: std::sync::Mutex::new(Vec::new()),
        });
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/livedesk_unused")
            .unwrap();
        let relay = RelayService::new(
            pool,
            publisher.clone(),
            Arc::new(FixedSelector(agents.clone())),
        );

        let conversation = Conversation {
            id: Uuid::new_v4(),
            customer_name: "Ada".to_string(),
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

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            relay.notify_agents(&conversation, &message),
        )
        .await
        .expect("publishes to agent channels should overlap");

        let channels = publisher.channels.lock().unwrap();
        assert_eq!(channels.len(), agents.len());
        for agent_id in agents {
            assert!(channels.contains(&ChannelName::Agent(agent_id)));
        }
    }
}
