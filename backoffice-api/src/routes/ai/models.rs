use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{created, nullable, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::ai_model::{AiModel, AiModelFilter, CreateAiModel, UpdateAiModel},
    pagination::Page,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct AiModelQuery {
    pub provider: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAiModelRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "Provider must be 1-50 characters"))]
    pub provider: String,

    #[validate(length(min = 1, max = 150, message = "Model identifier must be 1-150 characters"))]
    pub model_identifier: String,

    #[validate(range(min = 1, message = "Context window must be positive"))]
    pub context_window: Option<i32>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAiModelRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Provider must be 1-50 characters"))]
    pub provider: Option<String>,

    #[validate(length(min = 1, max = 150, message = "Model identifier must be 1-150 characters"))]
    pub model_identifier: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub context_window: Option<Option<i32>>,

    pub is_active: Option<bool>,
}

impl UpdateAiModelRequest {
    fn check_context_window(&self) -> ApiResult<()> {
        match self.context_window {
            Some(Some(size)) if size < 1 => Err(ApiError::invalid(
                "context_window",
                "Context window must be positive",
            )),
            _ => Ok(()),
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<AiModelQuery>,
) -> ApiResult<Json<Page<AiModel>>> {
    require_permission(&state.db, &auth, "view ai models").await?;

    let filter = AiModelFilter {
        provider: query.provider,
        is_active: query.is_active,
        search: query.search,
    };

    Ok(Json(AiModel::list(&state.db, &filter, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateAiModelRequest>,
) -> ApiResult<Created<AiModel>> {
    require_permission(&state.db, &auth, "create ai models").await?;
    req.validate()?;

    let model = AiModel::create(
        &state.db,
        CreateAiModel {
            name: req.name.trim().to_string(),
            provider: req.provider,
            model_identifier: req.model_identifier.trim().to_string(),
            context_window: req.context_window,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(created(model))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AiModel>> {
    require_permission(&state.db, &auth, "view ai models").await?;

    AiModel::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("AI model"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAiModelRequest>,
) -> ApiResult<Json<AiModel>> {
    require_permission(&state.db, &auth, "edit ai models").await?;
    req.validate()?;
    req.check_context_window()?;

    let model = AiModel::update(
        &state.db,
        id,
        UpdateAiModel {
            name: req.name,
            provider: req.provider,
            model_identifier: req.model_identifier,
            context_window: req.context_window,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(Json(model))
}

/// Deletes a model; conversations keep their history but lose the link
pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete ai models").await?;

    if !AiModel::delete(&state.db, id).await? {
        return Err(ApiError::not_found("AI model"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_window_must_be_positive() {
        let req: UpdateAiModelRequest = serde_json::from_str(r#"{"context_window": 0}"#).unwrap();
        assert!(req.check_context_window().is_err());

        let cleared: UpdateAiModelRequest =
            serde_json::from_str(r#"{"context_window": null}"#).unwrap();
        assert!(cleared.check_context_window().is_ok());
    }
}
