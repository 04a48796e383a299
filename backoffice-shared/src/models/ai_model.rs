/// AI model catalogue
///
/// Registered models are selectable when starting a conversation. A model is
/// identified by its provider plus the provider's own identifier
/// (e.g. `openai` / `gpt-4o`), which is unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, ModelError};
use crate::pagination::{Page, PageParams};

const AI_MODEL_COLUMNS: &str =
    "id, name, provider, model_identifier, context_window, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiModel {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub model_identifier: String,
    pub context_window: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAiModel {
    pub name: String,
    pub provider: String,
    pub model_identifier: String,
    pub context_window: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAiModel {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub model_identifier: Option<String>,
    pub context_window: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AiModelFilter {
    pub provider: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl AiModelFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(provider) = self.provider.as_deref().filter(|p| !p.trim().is_empty()) {
            builder
                .push(" AND provider = ")
                .push_bind(provider.trim().to_lowercase());
        }
        if let Some(is_active) = self.is_active {
            builder.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR model_identifier ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl AiModel {
    pub async fn create(pool: &PgPool, data: CreateAiModel) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AiModel>(&format!(
            "INSERT INTO ai_models (name, provider, model_identifier, context_window, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            AI_MODEL_COLUMNS
        ))
        .bind(data.name)
        .bind(data.provider.trim().to_lowercase())
        .bind(data.model_identifier)
        .bind(data.context_window)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AiModel>(&format!(
            "SELECT {} FROM ai_models WHERE id = $1",
            AI_MODEL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &AiModelFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ai_models");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM ai_models", AI_MODEL_COLUMNS));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY provider, name LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<AiModel>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateAiModel) -> Result<Self, ModelError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(ModelError::NotFound("AI model"))?;

        let model = sqlx::query_as::<_, AiModel>(&format!(
            "UPDATE ai_models SET name = $2, provider = $3, model_identifier = $4, \
             context_window = $5, is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING {}",
            AI_MODEL_COLUMNS
        ))
        .bind(id)
        .bind(data.name.unwrap_or(existing.name))
        .bind(
            data.provider
                .map(|p| p.trim().to_lowercase())
                .unwrap_or(existing.provider),
        )
        .bind(data.model_identifier.unwrap_or(existing.model_identifier))
        .bind(data.context_window.unwrap_or(existing.context_window))
        .bind(data.is_active.unwrap_or(existing.is_active))
        .fetch_one(pool)
        .await?;

        Ok(model)
    }

    /// Deletes a model; conversations using it keep their history
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_models WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
