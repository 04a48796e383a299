/// Projects
///
/// `show` includes the number of tasks in each status. Deleting a project
/// deletes its tasks.

use super::{check_date_range, created, empty_as_none, nullable, Created, PageQuery};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::project::{
        CreateProject, Project, ProjectDetail, ProjectFilter, ProjectStatus, UpdateProject,
    },
    pagination::Page,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,

    /// Defaults to `planned`
    pub status: Option<ProjectStatus>,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// Defaults to the creating user
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub status: Option<ProjectStatus>,

    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "nullable")]
    pub owner_id: Option<Option<Uuid>>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Page<Project>>> {
    require_permission(&state.db, &auth, "view projects").await?;

    let filter = ProjectFilter {
        status: query.status,
        search: query.search,
    };

    Ok(Json(Project::list(&state.db, &filter, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Created<Project>> {
    require_permission(&state.db, &auth, "create projects").await?;
    req.validate()?;
    check_date_range(req.start_date, req.end_date)?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: req.name.trim().to_string(),
            description: req.description,
            status: req.status,
            start_date: req.start_date,
            end_date: req.end_date,
            owner_id: req.owner_id.or(Some(auth.user_id)),
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, user_id = %auth.user_id, "Project created");
    Ok(created(project))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    require_permission(&state.db, &auth, "view projects").await?;

    Project::detail(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Project"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    require_permission(&state.db, &auth, "edit projects").await?;
    req.validate()?;

    let project = Project::update(
        &state.db,
        id,
        UpdateProject {
            name: req.name,
            description: req.description,
            status: req.status,
            start_date: req.start_date,
            end_date: req.end_date,
            owner_id: req.owner_id,
        },
    )
    .await?;

    Ok(Json(project))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete projects").await?;

    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Project"));
    }

    tracing::info!(project_id = %id, user_id = %auth.user_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_clears_dates() {
        let req: UpdateProjectRequest =
            serde_json::from_str(r#"{"end_date": null, "status": "on_hold"}"#).unwrap();

        assert_eq!(req.end_date, Some(None));
        assert_eq!(req.start_date, None);
        assert_eq!(req.status, Some(ProjectStatus::OnHold));
    }
}
