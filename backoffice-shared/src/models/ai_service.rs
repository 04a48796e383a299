/// AI provider services
///
/// A service is an endpoint plus credential for one provider. The stored
/// API key is only ever read by the connection test; every other read goes
/// through [`AiServiceView`], which carries a masked key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::ModelError;
use crate::pagination::{Page, PageParams};

const AI_SERVICE_COLUMNS: &str =
    "id, name, provider, base_url, api_key, is_active, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AiService {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response shape with the API key masked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiServiceView {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub has_api_key: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AiService> for AiServiceView {
    fn from(service: AiService) -> Self {
        AiServiceView {
            id: service.id,
            name: service.name,
            provider: service.provider,
            base_url: service.base_url,
            has_api_key: service.api_key.is_some(),
            api_key: service.api_key.as_deref().map(mask_api_key),
            is_active: service.is_active,
            created_at: service.created_at,
            updated_at: service.updated_at,
        }
    }
}

/// Masks a secret as first three characters, an ellipsis and the last four
///
/// Keys of eight characters or fewer are fully hidden.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "••••".to_string();
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[derive(Debug, Clone)]
pub struct CreateAiService {
    pub name: String,
    pub provider: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub is_active: bool,
}

/// `api_key: Some(None)` clears the stored key, `None` keeps it
#[derive(Debug, Clone, Default)]
pub struct UpdateAiService {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl AiService {
    /// Endpoint the connection test calls
    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }

    pub async fn create(pool: &PgPool, data: CreateAiService) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AiService>(&format!(
            "INSERT INTO ai_services (name, provider, base_url, api_key, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            AI_SERVICE_COLUMNS
        ))
        .bind(data.name)
        .bind(data.provider.trim().to_lowercase())
        .bind(data.base_url)
        .bind(data.api_key.filter(|k| !k.is_empty()))
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AiService>(&format!(
            "SELECT {} FROM ai_services WHERE id = $1",
            AI_SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, params: PageParams) -> Result<Page<AiServiceView>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_services")
            .fetch_one(pool)
            .await?;

        let rows = sqlx::query_as::<_, AiService>(&format!(
            "SELECT {} FROM ai_services ORDER BY name LIMIT $1 OFFSET $2",
            AI_SERVICE_COLUMNS
        ))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(AiServiceView::from).collect(),
            total,
            params,
        ))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateAiService) -> Result<Self, ModelError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(ModelError::NotFound("AI service"))?;

        let api_key = match data.api_key {
            Some(key) => key.filter(|k| !k.is_empty()),
            None => existing.api_key,
        };

        let service = sqlx::query_as::<_, AiService>(&format!(
            "UPDATE ai_services SET name = $2, provider = $3, base_url = $4, api_key = $5, \
             is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING {}",
            AI_SERVICE_COLUMNS
        ))
        .bind(id)
        .bind(data.name.unwrap_or(existing.name))
        .bind(
            data.provider
                .map(|p| p.trim().to_lowercase())
                .unwrap_or(existing.provider),
        )
        .bind(data.base_url.unwrap_or(existing.base_url))
        .bind(api_key)
        .bind(data.is_active.unwrap_or(existing.is_active))
        .fetch_one(pool)
        .await?;

        Ok(service)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_services WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("sk-1234567890abcd"), "sk-…abcd");
        assert_eq!(mask_api_key("123456789"), "123…6789");
        assert_eq!(mask_api_key("12345678"), "••••");
        assert_eq!(mask_api_key(""), "••••");
    }

    #[test]
    fn test_view_never_carries_full_key() {
        let service = AiService {
            id: Uuid::new_v4(),
            name: "OpenAI".to_string(),
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
            api_key: Some("sk-live-secret-value-wxyz".to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(service.models_url(), "https://api.openai.com/v1/models");

        let view = AiServiceView::from(service);
        assert!(view.has_api_key);
        assert_eq!(view.api_key.as_deref(), Some("sk-…wxyz"));

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("secret"));
    }
}
