//! HTTP routes

pub mod auth;
pub mod channel_auth;
pub mod conversations;
pub mod extract;
pub mod health;
pub mod messages;
pub mod settings;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{identify_caller, require_auth, require_identity},
    config::{ChannelProvider, Config},
    state::AppState,
    websocket::ws_handler,
};

/// Generic acknowledgement body
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Create all routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Liveness and readiness checks
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Widget-facing and session routes; each method carries its own guard
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/messages",
            post(messages::submit_message)
                .route_layer(middleware::from_fn_with_state(
                    auth_state.clone(),
                    identify_caller,
                ))
                .get(messages::get_messages),
        )
        .route(
            "/channel-auth",
            post(channel_auth::authorize_channel).route_layer(middleware::from_fn_with_state(
                auth_state.clone(),
                require_identity,
            )),
        )
        .route(
            "/settings",
            post(settings::update_settings)
                .route_layer(middleware::from_fn_with_state(
                    auth_state.clone(),
                    require_auth,
                ))
                .get(settings::get_public_settings),
        );

    // Agent dashboard routes
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/:id", patch(conversations::set_active))
        .route("/settings/me", get(settings::get_my_settings))
        .route("/users", get(users::list_users))
        .route("/users/:id", delete(users::delete_user))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    let mut app = Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .merge(protected_routes);

    if state.config.channel_provider == ChannelProvider::Local {
        app = app.route("/ws", get(ws_handler));
    }

    app.layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
