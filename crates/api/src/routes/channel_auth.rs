//! Private channel authorization endpoint

use axum::{
    extract::{Extension, State},
    Json,
};
use livedesk_shared::ChannelName;
use serde::{Deserialize, Serialize};

use crate::{
    auth::Caller,
    channels::{check_scope, is_valid_socket_id, ChannelAuthError},
    error::ApiResult,
    state::AppState,
};

use super::extract::JsonOrForm;

const MAX_CHANNEL_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ChannelAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelAuthResponse {
    pub auth: String,
}

/// `POST /channel-auth`
///
/// Agents may subscribe to their own agent channel and to any existing
/// conversation. Visitors may subscribe only to the conversation their
/// token names.
pub async fn authorize_channel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    JsonOrForm(req): JsonOrForm<ChannelAuthRequest>,
) -> ApiResult<Json<ChannelAuthResponse>> {
    if !is_valid_socket_id(&req.socket_id) {
        return Err(ChannelAuthError::InvalidSocketId.into());
    }
    if !is_well_formed_channel(&req.channel_name) {
        return Err(ChannelAuthError::InvalidChannel(req.channel_name).into());
    }

    // Well-formed names we don't serve are out of scope rather than invalid
    let channel: ChannelName = req
        .channel_name
        .parse()
        .map_err(|_| ChannelAuthError::OutOfScope)?;

    let conversation_exists = match (&caller, channel) {
        (Caller::Anonymous, _) => false,
        (Caller::Visitor { conversation_id }, ChannelName::Conversation(id))
            if *conversation_id != id =>
        {
            false
        }
        (_, ChannelName::Conversation(id)) => state.relay.conversation_exists(id).await?,
        (_, ChannelName::Agent(_)) => false,
    };

    if let Err(e) = check_scope(&caller, channel, conversation_exists) {
        tracing::info!(channel = %channel, error = %e, "Channel authorization denied");
        return Err(e.into());
    }

    let auth = state
        .channel_auth
        .sign(&req.socket_id, &req.channel_name)?;

    tracing::debug!(channel = %channel, socket_id = %req.socket_id, "Channel authorized");

    Ok(Json(ChannelAuthResponse { auth }))
}

/// Characters channel providers accept in a name
fn is_well_formed_channel(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CHANNEL_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-=@,.;:".contains(c))
}
