//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use livedesk_shared::DeskError;
use serde_json::json;

use crate::channels::ChannelAuthError;
use crate::relay::RelayError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailAlreadyExists,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("A conversation id is required")]
    MissingConversation,

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("Resource already exists")]
    Conflict(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string()),
            ApiError::EmailAlreadyExists => (StatusCode::CONFLICT, "EMAIL_EXISTS", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::MissingConversation => (StatusCode::BAD_REQUEST, "MISSING_CONVERSATION", self.to_string()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique violation
                if db_err.code().as_deref() == Some("23505") {
                    tracing::warn!(error = %db_err, "Unique constraint violation");
                    return ApiError::Conflict("Resource already exists".to_string());
                }
                tracing::error!(error = %db_err, "Database error");
                ApiError::Database(db_err.to_string())
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                ApiError::Database(err.to_string())
            }
        }
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::InvalidArgument(msg) => ApiError::Validation(msg),
            RelayError::MissingConversation => ApiError::MissingConversation,
            RelayError::NotFound => ApiError::NotFound,
            RelayError::Database(e) => e.into(),
        }
    }
}

impl From<ChannelAuthError> for ApiError {
    fn from(err: ChannelAuthError) -> Self {
        match err {
            ChannelAuthError::InvalidSocketId | ChannelAuthError::InvalidChannel(_) => {
                ApiError::Validation(err.to_string())
            }
            ChannelAuthError::Unauthenticated => ApiError::Unauthorized,
            ChannelAuthError::OutOfScope => ApiError::Forbidden,
            ChannelAuthError::HmacInitFailed => {
                tracing::error!("Channel grant signing failed");
                ApiError::Internal
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::MissingConversation, StatusCode::BAD_REQUEST),
            (ApiError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::Conflict("dup".into()), StatusCode::CONFLICT),
            (ApiError::EmailAlreadyExists, StatusCode::CONFLICT),
            (ApiError::Database("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_database_details_are_not_exposed() {
        let response = ApiError::Database("relation \"secret_table\" does not exist".into())
            .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("DATABASE_ERROR"));
        assert!(!text.contains("secret_table"));
    }

    #[test]
    fn test_relay_and_channel_errors_map() {
        assert!(matches!(
            ApiError::from(RelayError::MissingConversation),
            ApiError::MissingConversation
        ));
        assert!(matches!(ApiError::from(RelayError::NotFound), ApiError::NotFound));
        assert!(matches!(
            ApiError::from(ChannelAuthError::OutOfScope),
            ApiError::Forbidden
        ));
        assert!(matches!(
            ApiError::from(ChannelAuthError::Unauthenticated),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(ChannelAuthError::InvalidSocketId),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            ApiError::from(sqlx::Error::RowNotFound),
            ApiError::NotFound
        ));
    }
}
