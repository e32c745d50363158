//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub channels: &'static str,
    /// Open hub connections; absent with a hosted provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<usize>,
}

/// Overall health, including the database and the channel backend in use
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = database_reachable(&state).await;
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let channels = state.relay.publisher_name();
    let connections = if channels == "local" {
        Some(state.ws_state.connection_count().await)
    } else {
        None
    };

    (
        status,
        Json(HealthResponse {
            status: if db_ok { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            database: if db_ok { "healthy" } else { "unhealthy" },
            channels,
            connections,
        }),
    )
}

/// Liveness check
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check: ready once the database answers
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if database_reachable(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn database_reachable(state: &AppState) -> bool {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    }
}
