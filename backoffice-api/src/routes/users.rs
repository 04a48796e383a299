/// User administration
///
/// # Endpoints
///
/// - `GET /v1/users` - List users (`search`, `role`, `is_active`)
/// - `POST /v1/users` - Create a user with roles
/// - `GET /v1/users/:id` - User with role names
/// - `PUT|PATCH /v1/users/:id` - Update profile, password, status or roles
/// - `DELETE /v1/users/:id` - Delete a user
///
/// At least one active administrator always remains; requests that would
/// remove the last one get `409 Conflict`.

use super::{created, Created, PageQuery};
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
    auth::{authorization::require_permission, middleware::AuthContext, password},
    models::{
        role::Role,
        user::{CreateUser, UpdateUser, User, UserFilter, UserSummary},
    },
    pagination::Page,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Listing filters
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub password: String,

    #[serde(default)]
    pub role_ids: Vec<Uuid>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Update user request; omitted fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    /// New password; blank keeps the current one
    pub password: Option<String>,

    pub is_active: Option<bool>,

    /// Replaces every role when present
    pub role_ids: Option<Vec<Uuid>>,
}

/// User with role names
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}

/// Rejects unknown role ids, returning the list deduplicated
async fn existing_roles(pool: &PgPool, mut role_ids: Vec<Uuid>) -> ApiResult<Vec<Uuid>> {
    role_ids.sort_unstable();
    role_ids.dedup();

    let found = Role::count_existing(pool, &role_ids).await?;
    if found != role_ids.len() as i64 {
        return Err(ApiError::invalid("role_ids", "One or more roles do not exist"));
    }

    Ok(role_ids)
}

fn hash_new_password(raw: &str) -> ApiResult<String> {
    password::validate_password_strength(raw).map_err(|e| ApiError::invalid("password", e))?;
    Ok(password::hash_password(raw)?)
}

async fn detail(pool: &PgPool, user: User) -> ApiResult<UserDetail> {
    let roles = Role::names_for_user(pool, user.id).await?;
    Ok(UserDetail { user, roles })
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Page<UserSummary>>> {
    require_permission(&state.db, &auth, "view users").await?;

    let filter = UserFilter {
        search: query.search,
        role: query.role,
        is_active: query.is_active,
    };

    Ok(Json(User::list(&state.db, &filter, page.params()).await?))
}

/// Creates a user
///
/// # Errors
///
/// - `422`: invalid fields, weak password, unknown roles
/// - `409`: email already taken
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Created<UserDetail>> {
    require_permission(&state.db, &auth, "create users").await?;
    req.validate()?;

    if User::email_exists(&state.db, &req.email, None).await? {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash_new_password(&req.password)?;
    let role_ids = existing_roles(&state.db, req.role_ids).await?;

    let user = User::create_with_roles(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name.trim().to_string(),
            is_active: req.is_active,
        },
        &role_ids,
    )
    .await?;

    tracing::info!(user_id = %user.id, created_by = %auth.user_id, "User created via admin");
    Ok(created(detail(&state.db, user).await?))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserDetail>> {
    require_permission(&state.db, &auth, "view users").await?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(detail(&state.db, user).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserDetail>> {
    require_permission(&state.db, &auth, "edit users").await?;
    req.validate()?;

    if let Some(email) = &req.email {
        if User::email_exists(&state.db, email, Some(id)).await? {
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }
    }

    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(raw) => Some(hash_new_password(raw)?),
        None => None,
    };

    let role_ids = match req.role_ids {
        Some(ids) => Some(existing_roles(&state.db, ids).await?),
        None => None,
    };

    let user = User::update(
        &state.db,
        id,
        UpdateUser {
            email: req.email,
            password_hash,
            name: req.name.map(|n| n.trim().to_string()),
            is_active: req.is_active,
            role_ids,
        },
    )
    .await?;

    tracing::info!(user_id = %id, updated_by = %auth.user_id, "User updated");
    Ok(Json(detail(&state.db, user).await?))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete users").await?;

    User::delete(&state.db, id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email": "ops@example.com", "name": "Ops", "password": "Str0ng!Pass"}"#,
        )
        .unwrap();

        assert!(req.is_active);
        assert!(req.role_ids.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_blank_name() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email": "ops@example.com", "name": "", "password": "x"}"#,
        )
        .unwrap();

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_weak_password_is_a_field_error() {
        match hash_new_password("short") {
            Err(ApiError::ValidationError(details)) => assert_eq!(details[0].field, "password"),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }
}
