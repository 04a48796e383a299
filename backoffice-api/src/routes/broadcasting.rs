/// Realtime channel authorization
///
/// # Endpoint
///
/// ```text
/// POST /v1/broadcasting/auth
/// { "socket_id": "1234.5678", "channel_name": "presence-chat.<uuid>" }
/// ```
///
/// # Channels
///
/// - `private-user.{user_id}`: only that user
/// - `presence-chat.{conversation_id}`: only the conversation owner; the
///   response carries `channel_data` with the member's name and email
///
/// A malformed socket id is a 400, any other refusal a 403. Deactivated
/// accounts are refused every channel.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use backoffice_shared::{
    auth::{authorization::require_active, middleware::AuthContext},
    broadcast::{self, Channel, ChannelAuth, PresenceData, PresenceUserInfo},
    models::{conversation::Conversation, user::User},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChannelAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

pub async fn authorize(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChannelAuthRequest>,
) -> ApiResult<Json<ChannelAuth>> {
    broadcast::validate_socket_id(&req.socket_id)?;
    let channel = Channel::parse(&req.channel_name)?;

    let presence = match channel {
        Channel::PrivateUser(user_id) => {
            if user_id != auth.user_id {
                return Err(forbidden(&req.channel_name));
            }
            None
        }
        Channel::PresenceChat(conversation_id) => {
            let owned = Conversation::find_by_id(&state.db, conversation_id)
                .await?
                .is_some_and(|c| c.user_id == auth.user_id);
            if !owned {
                return Err(forbidden(&req.channel_name));
            }

            let user = User::find_by_id(&state.db, auth.user_id)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

            Some(PresenceData {
                user_id: user.id,
                user_info: PresenceUserInfo {
                    name: user.name,
                    email: user.email,
                },
            })
        }
    };

    require_active(&state.db, &auth).await?;

    let signed = broadcast::authorize(
        &state.config.broadcast.app_key,
        &state.config.broadcast.app_secret,
        &req.socket_id,
        &channel,
        presence.as_ref(),
    )
    .map_err(|e| ApiError::InternalError(format!("Failed to encode channel data: {}", e)))?;

    tracing::debug!(user_id = %auth.user_id, channel = %req.channel_name, "Channel authorized");

    Ok(Json(signed))
}

fn forbidden(channel: &str) -> ApiError {
    ApiError::Forbidden(format!("Not allowed to join {}", channel))
}
