//! Who hears about new conversations

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, RoutingPolicy};

/// Picks the agents notified when a customer opens a conversation
#[async_trait]
pub trait AgentSelector: Send + Sync {
    async fn select(&self, pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error>;

    /// Policy name for logs
    fn name(&self) -> &'static str;
}

/// One agent: the configured email, otherwise the first user to register
pub struct DesignatedAgent {
    email: Option<String>,
}

impl DesignatedAgent {
    pub fn new(email: Option<String>) -> Self {
        Self {
            email: email.map(|e| e.trim().to_lowercase()),
        }
    }
}

#[async_trait]
impl AgentSelector for DesignatedAgent {
    async fn select(&self, pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        let agent: Option<Uuid> = match &self.email {
            Some(email) => {
                sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
                    .bind(email)
                    .fetch_optional(pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT id FROM users ORDER BY created_at ASC, id ASC LIMIT 1")
                    .fetch_optional(pool)
                    .await?
            }
        };

        Ok(agent.into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "designated"
    }
}

/// Every agent
pub struct BroadcastToAll;

#[async_trait]
impl AgentSelector for BroadcastToAll {
    async fn select(&self, pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM users ORDER BY created_at ASC, id ASC")
            .fetch_all(pool)
            .await
    }

    fn name(&self) -> &'static str {
        "broadcast"
    }
}

/// Build the selector named by `AGENT_ROUTING`
pub fn build_selector(config: &Config) -> Arc<dyn AgentSelector> {
    match config.agent_routing {
        RoutingPolicy::Designated => Arc::new(DesignatedAgent::new(config.notify_agent_email.clone())),
        RoutingPolicy::Broadcast => Arc::new(BroadcastToAll),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_designated_email_is_normalized() {
        let selector = DesignatedAgent::new(Some(" Lead@Example.COM ".to_string()));
        assert_eq!(selector.email.as_deref(), Some("lead@example.com"));
    }

    #[test]
    fn test_build_selector_follows_config() {
        let mut config = Config::test_default();
        assert_eq!(build_selector(&config).name(), "designated");

        config.agent_routing = RoutingPolicy::Broadcast;
        assert_eq!(build_selector(&config).name(), "broadcast");
    }
}
