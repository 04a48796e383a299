/// Conversation endpoints
///
/// Every query is scoped to the caller. Another user's conversation is
/// reported as missing, never as forbidden.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{created, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::conversation::{
        Conversation, ConversationSummary, ConversationWithMessages, CreateConversation,
        Message, MessageRole,
    },
    pagination::Page,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    pub ai_model_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMessageRequest {
    #[serde(default)]
    pub role: MessageRole,

    #[validate(length(min = 1, max = 100000, message = "Content must be 1-100000 characters"))]
    pub content: String,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<ConversationSummary>>> {
    require_permission(&state.db, &auth, "view ai conversations").await?;

    Ok(Json(
        Conversation::list_for_user(&state.db, auth.user_id, page.params()).await?,
    ))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<Created<Conversation>> {
    require_permission(&state.db, &auth, "create ai conversations").await?;
    req.validate()?;

    let conversation = Conversation::create(
        &state.db,
        CreateConversation {
            user_id: auth.user_id,
            ai_model_id: req.ai_model_id,
            title: req.title.trim().to_string(),
        },
    )
    .await?;

    Ok(created(conversation))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConversationWithMessages>> {
    require_permission(&state.db, &auth, "view ai conversations").await?;

    Conversation::with_messages(&state.db, id, auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Conversation"))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete ai conversations").await?;

    if !Conversation::delete(&state.db, id, auth.user_id).await? {
        return Err(ApiError::not_found("Conversation"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a message; role defaults to `user`
///
/// Clients that generate replies post them back here with role `assistant`.
pub async fn add_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMessageRequest>,
) -> ApiResult<Created<Message>> {
    require_permission(&state.db, &auth, "create ai conversations").await?;
    req.validate()?;

    let message =
        Conversation::add_message(&state.db, id, auth.user_id, req.role, req.content).await?;

    Ok(created(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_defaults_to_user() {
        let req: AddMessageRequest = serde_json::from_str(r#"{"content": "Hello"}"#).unwrap();
        assert_eq!(req.role, MessageRole::User);
        assert!(req.validate().is_ok());

        let reply: AddMessageRequest =
            serde_json::from_str(r#"{"role": "assistant", "content": "Hi"}"#).unwrap();
        assert_eq!(reply.role, MessageRole::Assistant);
    }

    #[test]
    fn test_empty_message_rejected() {
        let req: AddMessageRequest = serde_json::from_str(r#"{"content": ""}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
