//! Session and visitor token generation and validation

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Visitor tokens outlive agent sessions so a returning customer keeps their thread
const VISITOR_TOKEN_EXPIRY_DAYS: i64 = 30;

pub const MAX_SESSION_EXPIRY_HOURS: i64 = 8760;

/// JWT claims for LiveDesk-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID for sessions, conversation ID for visitors
    pub sub: Uuid,
    /// Agent email (sessions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Token type
    pub token_type: TokenType,
    /// JWT ID
    pub jti: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Signed-in dashboard agent
    Session,
    /// Widget visitor, scoped to the conversation they started
    Visitor,
}

/// Token manager for agent sessions and visitor grants
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_expiry_hours: i64,
}

impl SessionManager {
    /// `session_expiry_hours` is clamped to one hour .. one year
    pub fn new(secret: &str, session_expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_expiry_hours: session_expiry_hours.clamp(1, MAX_SESSION_EXPIRY_HOURS),
        }
    }

    pub fn session_expiry_hours(&self) -> i64 {
        self.session_expiry_hours
    }

    /// Issue a session token for an agent
    pub fn generate_session_token(&self, user_id: Uuid, email: &str) -> Result<String, SessionError> {
        self.issue(
            user_id,
            Some(email.to_string()),
            TokenType::Session,
            Duration::hours(self.session_expiry_hours),
        )
    }

    /// Issue a visitor token scoped to a single conversation
    pub fn generate_visitor_token(&self, conversation_id: Uuid) -> Result<String, SessionError> {
        self.issue(
            conversation_id,
            None,
            TokenType::Visitor,
            Duration::days(VISITOR_TOKEN_EXPIRY_DAYS),
        )
    }

    fn issue(
        &self,
        sub: Uuid,
        email: Option<String>,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<String, SessionError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub,
            email,
            iat: now.unix_timestamp(),
            exp: (now + lifetime).unix_timestamp(),
            token_type,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Encoding(e.to_string()))
    }

    /// Validate and decode a token of any type
    pub fn validate_token(&self, token: &str) -> Result<Claims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => SessionError::Invalid,
                _ => SessionError::Validation(e.to_string()),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Token encoding failed: {0}")]
    Encoding(String),
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Token validation failed: {0}")]
    Validation(String),
}
