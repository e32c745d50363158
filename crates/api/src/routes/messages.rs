//! Message submission and history

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use livedesk_shared::SenderRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::Caller,
    error::{ApiError, ApiResult},
    relay::{ConversationDetail, SubmitMessage},
    state::AppState,
};

use super::extract::ApiJson;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessageRequest {
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub sender: String,
    /// Customer display name for a new conversation
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessageResponse {
    pub success: bool,
    pub conversation_id: Uuid,
    /// Issued with a new conversation so the widget can subscribe to it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub conversation_id: Option<String>,
}

/// `POST /messages`
///
/// Customers may post without credentials; the first message without a
/// conversation id opens a conversation. Agents need a session.
pub async fn submit_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(req): ApiJson<SubmitMessageRequest>,
) -> ApiResult<(StatusCode, Json<SubmitMessageResponse>)> {
    let sender: SenderRole = req.sender.parse()?;
    let conversation_id = parse_conversation_id(req.conversation_id.as_deref())?;

    let sender_id = match sender {
        SenderRole::Agent => Some(caller.agent().ok_or(ApiError::Unauthorized)?.user_id),
        SenderRole::Customer => None,
    };

    let outcome = state
        .relay
        .submit(SubmitMessage {
            text: req.text,
            conversation_id,
            sender,
            sender_id,
            sender_name: req.sender_name,
            metadata: req.metadata,
        })
        .await?;

    let conversation_id = outcome.conversation.id;

    if !outcome.created {
        return Ok((
            StatusCode::OK,
            Json(SubmitMessageResponse {
                success: true,
                conversation_id,
                visitor_token: None,
            }),
        ));
    }

    // The conversation is committed; a token failure must not turn into a retry
    let visitor_token = match state.sessions.generate_visitor_token(conversation_id) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::error!(error = %e, conversation_id = %conversation_id, "Visitor token generation failed");
            None
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SubmitMessageResponse {
            success: true,
            conversation_id,
            visitor_token,
        }),
    ))
}

/// `GET /messages?conversationId=`
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ConversationDetail>> {
    let id = parse_conversation_id(query.conversation_id.as_deref())?
        .ok_or_else(|| ApiError::Validation("conversationId is required".to_string()))?;

    Ok(Json(state.relay.get_conversation(id).await?))
}

/// Blank means absent; anything else must be a UUID
fn parse_conversation_id(raw: Option<&str>) -> ApiResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| ApiError::Validation("conversationId must be a UUID".to_string())),
    }
}
