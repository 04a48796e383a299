/// Role administration
///
/// `show` returns the role editor view-model: the role, the permissions it
/// holds grouped by module, and the full catalogue grouped the same way so
/// a client can render checkboxes without a second request.

use super::{created, nullable, Created};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::{
        permission::{group_by_module, GroupedPermission, Permission},
        role::{CreateRole, Role, RoleSummary, UpdateRole},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub permission_ids: Option<Vec<Uuid>>,
}

/// Role editor payload
#[derive(Debug, Serialize)]
pub struct RoleEditor {
    pub role: Role,
    pub permission_ids: Vec<Uuid>,
    pub permissions: BTreeMap<String, Vec<GroupedPermission>>,
    pub all_permissions: BTreeMap<String, Vec<GroupedPermission>>,
}

async fn existing_permissions(pool: &PgPool, mut ids: Vec<Uuid>) -> ApiResult<Vec<Uuid>> {
    ids.sort_unstable();
    ids.dedup();

    if Permission::count_existing(pool, &ids).await? != ids.len() as i64 {
        return Err(ApiError::invalid(
            "permission_ids",
            "One or more permissions do not exist",
        ));
    }

    Ok(ids)
}

async fn editor(pool: &PgPool, role: Role) -> ApiResult<RoleEditor> {
    let held = Permission::list_by_role(pool, role.id).await?;
    let all = Permission::list(pool).await?;

    Ok(RoleEditor {
        permission_ids: held.iter().map(|p| p.id).collect(),
        permissions: group_by_module(&held),
        all_permissions: group_by_module(&all),
        role,
    })
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<RoleSummary>>> {
    require_permission(&state.db, &auth, "view roles").await?;
    Ok(Json(Role::list_with_counts(&state.db).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<Created<RoleEditor>> {
    require_permission(&state.db, &auth, "create roles").await?;
    req.validate()?;

    let permission_ids = existing_permissions(&state.db, req.permission_ids).await?;
    let role = Role::create(
        &state.db,
        CreateRole {
            name: req.name,
            description: req.description,
            permission_ids,
        },
    )
    .await?;

    Ok(created(editor(&state.db, role).await?))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RoleEditor>> {
    require_permission(&state.db, &auth, "view roles").await?;

    let role = Role::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Role"))?;

    Ok(Json(editor(&state.db, role).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleEditor>> {
    require_permission(&state.db, &auth, "edit roles").await?;
    req.validate()?;

    let permission_ids = match req.permission_ids {
        Some(ids) => Some(existing_permissions(&state.db, ids).await?),
        None => None,
    };

    let role = Role::update(
        &state.db,
        id,
        UpdateRole {
            name: req.name,
            description: req.description,
            permission_ids,
        },
    )
    .await?;

    tracing::info!(role_id = %id, updated_by = %auth.user_id, "Role updated");
    Ok(Json(editor(&state.db, role).await?))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete roles").await?;

    Role::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
