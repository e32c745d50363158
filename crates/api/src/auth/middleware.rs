//! Request authentication middleware
//!
//! Agents authenticate with a session token, sent either as
//! `Authorization: Bearer <token>` or in the session cookie. Widget visitors
//! carry a visitor token scoped to the conversation they started.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{SessionManager, TokenType};
use crate::error::ApiError;

/// Name of the cookie carrying the agent session token
pub const SESSION_COOKIE: &str = "livedesk_session";

/// State needed by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub pool: PgPool,
    pub sessions: SessionManager,
}

/// An authenticated dashboard agent
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Whoever is making the request, if anyone
#[derive(Debug, Clone)]
pub enum Caller {
    Agent(AuthUser),
    Visitor { conversation_id: Uuid },
    Anonymous,
}

impl Caller {
    pub fn agent(&self) -> Option<&AuthUser> {
        match self {
            Caller::Agent(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    id: Uuid,
    email: String,
}

/// Pull a token from the Authorization header, falling back to the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| session_cookie(headers))
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve the caller behind a request. Invalid or stale tokens resolve to
/// `Anonymous`; only database failures are errors.
pub async fn resolve_caller(state: &AuthState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let Some(token) = extract_token(headers) else {
        return Ok(Caller::Anonymous);
    };

    let claims = match state.sessions.validate_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return Ok(Caller::Anonymous);
        }
    };

    match claims.token_type {
        TokenType::Visitor => Ok(Caller::Visitor {
            conversation_id: claims.sub,
        }),
        TokenType::Session => {
            // A deleted agent's token stops working
            let user: Option<SessionUserRow> =
                sqlx::query_as("SELECT id, email FROM users WHERE id = $1")
                    .bind(claims.sub)
                    .fetch_optional(&state.pool)
                    .await?;

            Ok(match user {
                Some(user) => Caller::Agent(AuthUser {
                    user_id: user.id,
                    email: user.email,
                }),
                None => {
                    tracing::info!(user_id = %claims.sub, "Session token for a deleted user");
                    Caller::Anonymous
                }
            })
        }
    }
}

/// Require a signed-in agent. Inserts `Extension<AuthUser>`.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = resolve_caller(&state, request.headers()).await?;
    let Caller::Agent(user) = caller else {
        return Err(ApiError::Unauthorized);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Identify the caller without rejecting anyone. Inserts `Extension<Caller>`.
pub async fn identify_caller(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = resolve_caller(&state, request.headers()).await?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Require an agent session or a visitor token. Runs before the body is
/// read, so anonymous callers get 401 whatever they send.
pub async fn require_identity(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = resolve_caller(&state, request.headers()).await?;
    if caller.is_anonymous() {
        return Err(ApiError::Unauthorized);
    }

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("livedesk_session=from-cookie"),
        );

        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; livedesk_session=tok123; other=1"),
        );

        assert_eq!(extract_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        headers.insert(header::COOKIE, HeaderValue::from_static("livedesk_session="));

        assert!(extract_token(&headers).is_none());
    }
}
