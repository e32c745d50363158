//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{AuthState, SessionManager};
use crate::channels::{build_publisher, ChannelAuthorizer, ChannelPublisher};
use crate::config::Config;
use crate::relay::{build_selector, AgentSelector, RelayService};
use crate::websocket::WebSocketState;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub sessions: SessionManager,
    pub channel_auth: ChannelAuthorizer,
    pub relay: Arc<RelayService>,
    /// Local hub; idle when a hosted channel service is configured
    pub ws_state: WebSocketState,
}

impl AppState {
    /// Wire up the publisher and agent selector named in `config`
    pub fn new(pool: PgPool, config: Config) -> Self {
        let ws_state = WebSocketState::new();
        let publisher = build_publisher(&config, &ws_state);
        let selector = build_selector(&config);

        Self::with_parts(pool, config, ws_state, publisher, selector)
    }

    /// Assemble state around an explicit publisher and selector
    pub fn with_parts(
        pool: PgPool,
        config: Config,
        ws_state: WebSocketState,
        publisher: Arc<dyn ChannelPublisher>,
        selector: Arc<dyn AgentSelector>,
    ) -> Self {
        tracing::info!(
            publisher = publisher.name(),
            agent_routing = selector.name(),
            "Relay configured"
        );

        Self {
            sessions: SessionManager::new(&config.session_secret, config.session_expiry_hours),
            channel_auth: ChannelAuthorizer::new(&config.channel_key, &config.channel_secret),
            relay: Arc::new(RelayService::new(pool.clone(), publisher, selector)),
            ws_state,
            pool,
            config: Arc::new(config),
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            pool: self.pool.clone(),
            sessions: self.sessions.clone(),
        }
    }
}
