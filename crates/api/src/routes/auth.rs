//! Agent session routes

use axum::{
    extract::{Extension, State},
    http::{header, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        hash_password, validate_password_strength, verify_against_dummy, verify_password,
        AuthUser, SESSION_COOKIE,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::{extract::ApiJson, SuccessResponse};

const MAX_NAME_CHARS: usize = 100;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public view of an agent account
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(FromRow)]
struct CredentialsRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: OffsetDateTime,
}

type SessionReply = ([(header::HeaderName, String); 1], Json<AuthResponse>);

// =============================================================================
// Handlers
// =============================================================================

/// Create an agent account and its workspace settings, then sign in
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, SessionReply)> {
    if !state.config.enable_signup {
        return Err(ApiError::BadRequest(
            "Registration is currently disabled".to_string(),
        ));
    }

    let name = validate_name(&req.name)?;
    let email = normalize_email(&req.email)?;
    validate_password_strength(&req.password).map_err(|e| ApiError::Validation(e.to_string()))?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if exists {
        return Err(ApiError::EmailAlreadyExists);
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "register: password hashing failed");
        ApiError::Internal
    })?;

    let mut tx = state.pool.begin().await?;

    let user: UserResponse = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match ApiError::from(e) {
        // Lost a race with another signup for the same address
        ApiError::Conflict(_) => ApiError::EmailAlreadyExists,
        other => other,
    })?;

    sqlx::query("INSERT INTO workspace_settings (id, user_id) VALUES ($1, $2)")
        .bind(Uuid::new_v4())
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "Agent registered");

    Ok((StatusCode::CREATED, session_reply(&state, user)?))
}

/// Exchange email and password for a session
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<SessionReply> {
    // Every outcome takes at least MIN_RESPONSE_TIME
    let start = std::time::Instant::now();
    const MIN_RESPONSE_TIME: std::time::Duration = std::time::Duration::from_millis(300);

    let result = login_inner(&state, &req).await;

    let elapsed = start.elapsed();
    if elapsed < MIN_RESPONSE_TIME {
        tokio::time::sleep(MIN_RESPONSE_TIME - elapsed).await;
    }

    result
}

async fn login_inner(state: &AppState, req: &LoginRequest) -> ApiResult<SessionReply> {
    let email = req.email.trim().to_lowercase();

    let row: Option<CredentialsRow> = sqlx::query_as(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?;

    let Some(row) = row else {
        verify_against_dummy(&req.password);
        tracing::info!("login: unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let valid = verify_password(&req.password, &row.password_hash).map_err(|e| {
        tracing::error!(error = %e, user_id = %row.id, "login: stored hash unreadable");
        ApiError::Internal
    })?;

    if !valid {
        tracing::info!(user_id = %row.id, "login: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    tracing::info!(user_id = %row.id, "Agent signed in");

    session_reply(
        state,
        UserResponse {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        },
    )
}

/// Clear the session cookie. Tokens are stateless and stay valid until
/// expiry; clients holding one in storage should discard it.
pub async fn logout(
    State(state): State<AppState>,
) -> ([(header::HeaderName, String); 1], Json<SuccessResponse>) {
    (
        [(header::SET_COOKIE, clear_cookie(state.config.session_cookie_secure))],
        Json(SuccessResponse::ok()),
    )
}

/// The signed-in agent
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    let user: UserResponse =
        sqlx::query_as("SELECT id, name, email, created_at FROM users WHERE id = $1")
            .bind(auth_user.user_id)
            .fetch_one(&state.pool)
            .await?;

    Ok(Json(user))
}

// =============================================================================
// Helpers
// =============================================================================

fn session_reply(state: &AppState, user: UserResponse) -> ApiResult<SessionReply> {
    let token = state
        .sessions
        .generate_session_token(user.id, &user.email)
        .map_err(|e| {
            tracing::error!(error = %e, "Session token generation failed");
            ApiError::Internal
        })?;

    let cookie = session_cookie(
        &token,
        state.sessions.session_expiry_hours() * 3600,
        state.config.session_cookie_secure,
    );

    Ok(([(header::SET_COOKIE, cookie)], Json(AuthResponse { token, user })))
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        max_age_secs,
        if secure { "; Secure" } else { "" }
    )
}

fn clear_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Trim and bound a display name
pub fn validate_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::Validation(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

/// Lower-case and validate an email address
pub fn normalize_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    Ok(email)
}

fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > 254 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty()
        || local.len() > 64
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._+-".contains(c))
    {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("agent@example.com"));
        assert!(is_valid_email("first.last+desk@mail.example.co"));

        assert!(!is_valid_email("agent"));
        assert!(!is_valid_email("agent@localhost"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email(".agent@example.com"));
        assert!(!is_valid_email("agent@-example.com"));
        assert!(!is_valid_email("agent@example..com"));
    }

    #[test]
    fn test_normalize_email_lowercases() {
        assert_eq!(
            normalize_email("  Agent@Example.COM ").unwrap(),
            "agent@example.com"
        );
        assert!(normalize_email("nope").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Ada  ").unwrap(), "Ada");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 86400, false);
        assert_eq!(
            cookie,
            "livedesk_session=tok; HttpOnly; Path=/; SameSite=Lax; Max-Age=86400"
        );

        assert!(session_cookie("tok", 60, true).ends_with("; Secure"));
        assert!(clear_cookie(false).contains("livedesk_session=;"));
        assert!(clear_cookie(false).contains("Max-Age=0"));
    }
}
