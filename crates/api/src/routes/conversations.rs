//! Agent conversation routes

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use livedesk_shared::Conversation;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiResult,
    relay::ConversationSummary,
    state::AppState,
};

use super::extract::ApiJson;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// `GET /conversations`
pub async fn list_conversations(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.relay.list_conversations().await?))
}

/// `PATCH /conversations/:id` opens or closes a conversation
pub async fn set_active(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<SetActiveRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state.relay.set_active(id, req.is_active).await?;

    tracing::info!(
        conversation_id = %id,
        user_id = %auth_user.user_id,
        is_active = req.is_active,
        "Conversation status changed"
    );

    Ok(Json(conversation))
}
