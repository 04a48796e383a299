/// Permission catalogue
///
/// Permission names follow `"<action> <resource>"`; the index groups them by
/// the module their resource belongs to.

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
    models::permission::{group_by_module, GroupedPermission, Permission, PermissionName},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::{created, Created};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<BTreeMap<String, Vec<GroupedPermission>>>> {
    require_permission(&state.db, &auth, "view permissions").await?;

    let permissions = Permission::list(&state.db).await?;
    Ok(Json(group_by_module(&permissions)))
}

/// Creates a permission
///
/// # Errors
///
/// - `422`: the name is not `"<action> <resource>"`
/// - `409`: the permission already exists
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePermissionRequest>,
) -> ApiResult<Created<Permission>> {
    require_permission(&state.db, &auth, "create permissions").await?;
    req.validate()?;

    let name = PermissionName::parse(&req.name).ok_or_else(|| {
        ApiError::invalid("name", "Use the form \"<action> <resource>\", e.g. \"view invoices\"")
    })?;

    let permission = Permission::create(&state.db, &name).await?;
    tracing::info!(permission = %permission.name, created_by = %auth.user_id, "Permission created");

    Ok(created(permission))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete permissions").await?;

    if !Permission::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Permission"));
    }

    Ok(StatusCode::NO_CONTENT)
}
