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
    models::prompt_template::{
        CreatePromptTemplate, PromptTemplate, PromptTemplateDetail, PromptTemplateFilter,
        RenderedPrompt, UpdatePromptTemplate,
    },
    pagination::Page,
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct PromptTemplateQuery {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePromptTemplateRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 50000, message = "Content must be 1-50000 characters"))]
    pub content: String,

    #[validate(length(max = 50, message = "Category must be at most 50 characters"))]
    pub category: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePromptTemplateRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    #[validate(length(min = 1, max = 50000, message = "Content must be 1-50000 characters"))]
    pub content: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,

    pub is_active: Option<bool>,
}

impl UpdatePromptTemplateRequest {
    fn check_lengths(&self) -> ApiResult<()> {
        if let Some(Some(description)) = &self.description {
            if description.chars().count() > 1000 {
                return Err(ApiError::invalid(
                    "description",
                    "Description must be at most 1000 characters",
                ));
            }
        }
        if let Some(Some(category)) = &self.category {
            if category.chars().count() > 50 {
                return Err(ApiError::invalid(
                    "category",
                    "Category must be at most 50 characters",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<PromptTemplateQuery>,
) -> ApiResult<Json<Page<PromptTemplate>>> {
    require_permission(&state.db, &auth, "view prompt templates").await?;

    let filter = PromptTemplateFilter {
        category: query.category,
        is_active: query.is_active,
        search: query.search,
    };

    Ok(Json(
        PromptTemplate::list(&state.db, &filter, page.params()).await?,
    ))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePromptTemplateRequest>,
) -> ApiResult<Created<PromptTemplateDetail>> {
    require_permission(&state.db, &auth, "create prompt templates").await?;
    req.validate()?;

    let template = PromptTemplate::create(
        &state.db,
        CreatePromptTemplate {
            name: req.name,
            description: req.description,
            content: req.content,
            category: req.category,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(created(template.into_detail()))
}

/// Template plus the placeholder names found in its content
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PromptTemplateDetail>> {
    require_permission(&state.db, &auth, "view prompt templates").await?;

    PromptTemplate::find_by_id(&state.db, id)
        .await?
        .map(|template| Json(template.into_detail()))
        .ok_or_else(|| ApiError::not_found("Prompt template"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePromptTemplateRequest>,
) -> ApiResult<Json<PromptTemplateDetail>> {
    require_permission(&state.db, &auth, "edit prompt templates").await?;
    req.validate()?;
    req.check_lengths()?;

    let template = PromptTemplate::update(
        &state.db,
        id,
        UpdatePromptTemplate {
            name: req.name,
            description: req.description,
            content: req.content,
            category: req.category,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(Json(template.into_detail()))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete prompt templates").await?;

    if !PromptTemplate::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Prompt template"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Substitutes `{{name}}` placeholders; unknown names are reported in `missing`
pub async fn render(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenderRequest>,
) -> ApiResult<Json<RenderedPrompt>> {
    require_permission(&state.db, &auth, "view prompt templates").await?;

    let template = PromptTemplate::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prompt template"))?;

    Ok(Json(template.render(&req.variables)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_request_defaults_to_no_variables() {
        let req: RenderRequest = serde_json::from_str("{}").unwrap();
        assert!(req.variables.is_empty());

        let req: RenderRequest =
            serde_json::from_str(r#"{"variables": {"customer": "Ada"}}"#).unwrap();
        assert_eq!(req.variables.get("customer").map(String::as_str), Some("Ada"));
    }

    #[test]
    fn test_update_lengths() {
        let long = "x".repeat(51);
        let req: UpdatePromptTemplateRequest =
            serde_json::from_value(serde_json::json!({ "category": long })).unwrap();
        assert!(req.check_lengths().is_err());

        let cleared: UpdatePromptTemplateRequest =
            serde_json::from_str(r#"{"category": null, "description": null}"#).unwrap();
        assert!(cleared.check_lengths().is_ok());
    }
}
