/// Project tasks
///
/// Tasks are listed and created under their project
/// (`/v1/projects/:id/tasks`) and addressed directly afterwards
/// (`/v1/tasks/:id`).

use super::{created, empty_as_none, nullable, Created, PageQuery};
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
    models::{
        project::Project,
        task::{CreateTask, Task, TaskFilter, TaskPriority, TaskStatus, UpdateTask},
    },
    pagination::Page,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<TaskStatus>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

async fn ensure_project(state: &AppState, project_id: Uuid) -> ApiResult<()> {
    Project::find_by_id(&state.db, project_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Project"))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<Page<Task>>> {
    require_permission(&state.db, &auth, "view tasks").await?;
    ensure_project(&state, project_id).await?;

    let filter = TaskFilter {
        status: query.status,
        assignee_id: query.assignee_id,
    };

    Ok(Json(
        Task::list_by_project(&state.db, project_id, &filter, page.params()).await?,
    ))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Created<Task>> {
    require_permission(&state.db, &auth, "create tasks").await?;
    req.validate()?;

    let task = Task::create(
        &state.db,
        CreateTask {
            project_id,
            title: req.title.trim().to_string(),
            description: req.description,
            status: req.status,
            priority: req.priority,
            assignee_id: req.assignee_id,
            due_date: req.due_date,
        },
    )
    .await?;

    Ok(created(task))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    require_permission(&state.db, &auth, "view tasks").await?;

    Task::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Task"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    require_permission(&state.db, &auth, "edit tasks").await?;
    req.validate()?;

    let task = Task::update(
        &state.db,
        id,
        UpdateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            assignee_id: req.assignee_id,
            due_date: req.due_date,
        },
    )
    .await?;

    Ok(Json(task))
}

/// Moves a task to another column of the board
pub async fn set_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Task>> {
    require_permission(&state.db, &auth, "edit tasks").await?;
    Ok(Json(Task::set_status(&state.db, id, req.status).await?))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete tasks").await?;

    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Task"));
    }

    Ok(StatusCode::NO_CONTENT)
}
