/// AI conversations
///
/// Conversations are private to the user who started them. Every read and
/// write takes the acting user and filters on ownership in SQL, so a
/// conversation owned by someone else looks exactly like a missing one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::ModelError;
use crate::pagination::{Page, PageParams};

const CONVERSATION_COLUMNS: &str = "id, user_id, ai_model_id, title, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, created_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ai_model_id: Option<Uuid>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub ai_model_id: Option<Uuid>,
    pub model_name: Option<String>,
    pub title: String,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct CreateConversation {
    pub user_id: Uuid,
    pub ai_model_id: Option<Uuid>,
    pub title: String,
}

impl Conversation {
    /// Starts a conversation; the model, if given, must exist and be active
    pub async fn create(pool: &PgPool, data: CreateConversation) -> Result<Self, ModelError> {
        if let Some(model_id) = data.ai_model_id {
            let active: Option<bool> =
                sqlx::query_scalar("SELECT is_active FROM ai_models WHERE id = $1")
                    .bind(model_id)
                    .fetch_optional(pool)
                    .await?;

            match active {
                None => return Err(ModelError::NotFound("AI model")),
                Some(false) => {
                    return Err(ModelError::invalid("ai_model_id", "AI model is inactive"))
                }
                Some(true) => {}
            }
        }

        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "INSERT INTO ai_conversations (user_id, ai_model_id, title) VALUES ($1, $2, $3) \
             RETURNING {}",
            CONVERSATION_COLUMNS
        ))
        .bind(data.user_id)
        .bind(data.ai_model_id)
        .bind(data.title.trim().to_string())
        .fetch_one(pool)
        .await?;

        Ok(conversation)
    }

    /// Finds a conversation owned by `user_id`
    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {} FROM ai_conversations WHERE id = $1 AND user_id = $2",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a conversation regardless of owner
    ///
    /// Used where the caller compares the owner itself, such as presence
    /// channel authorization.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {} FROM ai_conversations WHERE id = $1",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// The user's conversations, most recently active first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        params: PageParams,
    ) -> Result<Page<ConversationSummary>, sqlx::Error> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ai_conversations WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT c.id, c.ai_model_id, m.name AS model_name, c.title,
                   (SELECT COUNT(*) FROM ai_messages am WHERE am.conversation_id = c.id) AS message_count,
                   c.created_at, c.updated_at
            FROM ai_conversations c
            LEFT JOIN ai_models m ON m.id = c.ai_model_id
            WHERE c.user_id = $1
            ORDER BY c.updated_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(rows, total, params))
    }

    /// Conversation with its messages in chronological order
    pub async fn with_messages(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ConversationWithMessages>, sqlx::Error> {
        let Some(conversation) = Self::find_owned(pool, id, user_id).await? else {
            return Ok(None);
        };

        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM ai_messages WHERE conversation_id = $1 ORDER BY created_at, id",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(ConversationWithMessages {
            conversation,
            messages,
        }))
    }

    /// Appends a message and bumps the conversation's activity time
    pub async fn add_message(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        role: MessageRole,
        content: String,
    ) -> Result<Message, ModelError> {
        let mut tx = pool.begin().await?;

        let touched = sqlx::query(
            "UPDATE ai_conversations SET updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(ModelError::NotFound("Conversation"));
        }

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO ai_messages (conversation_id, role, content) VALUES ($1, $2, $3) \
             RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .bind(role)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Deletes an owned conversation with its messages
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_conversations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
