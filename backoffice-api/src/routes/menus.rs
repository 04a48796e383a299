/// CMS navigation menus
///
/// # Endpoints
///
/// - `GET|POST /v1/menus`
/// - `GET|PUT|PATCH|DELETE /v1/menus/:id` - `show` returns the item tree
/// - `POST /v1/menus/:id/items` - Add an item
/// - `POST /v1/menus/:id/reorder` - Apply a drag-and-drop reorder
/// - `PUT|PATCH|DELETE /v1/menu-items/:id` - Deleting removes children too
/// - `GET /v1/public/menus/:location` - Active tree for a site location
///
/// An item's parent must be in the same menu and cannot be the item itself
/// or one of its descendants.

use super::{created, nullable, Created, PageQuery};
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
    models::menu::{
        CreateMenu, CreateMenuItem, Menu, MenuItem, MenuItemNode, MenuSummary, MenuTree,
        ReorderEntry, UpdateMenu, UpdateMenuItem,
    },
    pagination::Page,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Locations are slugs such as `header` or `footer-legal`
fn validate_location(location: &str) -> Result<(), ValidationError> {
    let valid = location
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("location");
        error.message = Some("Location may only contain letters, digits, '-' and '_'".into());
        Err(error)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMenuRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "Location must be 1-50 characters"),
        custom(function = "validate_location")
    )]
    pub location: String,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMenuRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(
        length(min = 1, max = 50, message = "Location must be 1-50 characters"),
        custom(function = "validate_location")
    )]
    pub location: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMenuItemRequest {
    pub parent_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Label must be 1-100 characters"))]
    pub label: String,

    #[validate(length(min = 1, max = 2048, message = "URL must be 1-2048 characters"))]
    pub url: String,

    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMenuItemRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<Uuid>>,

    #[validate(length(min = 1, max = 100, message = "Label must be 1-100 characters"))]
    pub label: Option<String>,

    #[validate(length(min = 1, max = 2048, message = "URL must be 1-2048 characters"))]
    pub url: Option<String>,

    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,

    pub is_active: Option<bool>,
}

/// Checks the shape of a reorder payload before it reaches the database
fn check_reorder(entries: &[ReorderEntry]) -> ApiResult<()> {
    if entries.is_empty() {
        return Err(ApiError::invalid("items", "Nothing to reorder"));
    }
    if entries.iter().any(|e| e.position < 0) {
        return Err(ApiError::invalid("items", "Position cannot be negative"));
    }

    let mut ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != entries.len() {
        return Err(ApiError::invalid("items", "Each item may appear only once"));
    }

    Ok(())
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<MenuSummary>>> {
    require_permission(&state.db, &auth, "view menus").await?;
    Ok(Json(Menu::list(&state.db, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMenuRequest>,
) -> ApiResult<Created<Menu>> {
    require_permission(&state.db, &auth, "create menus").await?;
    req.validate()?;

    let menu = Menu::create(
        &state.db,
        CreateMenu {
            name: req.name.trim().to_string(),
            location: req.location,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(created(menu))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MenuTree>> {
    require_permission(&state.db, &auth, "view menus").await?;

    Menu::tree(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Menu"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMenuRequest>,
) -> ApiResult<Json<Menu>> {
    require_permission(&state.db, &auth, "edit menus").await?;
    req.validate()?;

    let menu = Menu::update(
        &state.db,
        id,
        UpdateMenu {
            name: req.name,
            location: req.location,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(Json(menu))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete menus").await?;

    if !Menu::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Menu"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn store_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(menu_id): Path<Uuid>,
    Json(req): Json<CreateMenuItemRequest>,
) -> ApiResult<Created<MenuItem>> {
    require_permission(&state.db, &auth, "edit menus").await?;
    req.validate()?;

    let item = MenuItem::create(
        &state.db,
        menu_id,
        CreateMenuItem {
            parent_id: req.parent_id,
            label: req.label.trim().to_string(),
            url: req.url.trim().to_string(),
            position: req.position,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(created(item))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMenuItemRequest>,
) -> ApiResult<Json<MenuItem>> {
    require_permission(&state.db, &auth, "edit menus").await?;
    req.validate()?;

    let item = MenuItem::update(
        &state.db,
        id,
        UpdateMenuItem {
            parent_id: req.parent_id,
            label: req.label,
            url: req.url,
            position: req.position,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(Json(item))
}

pub async fn destroy_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "edit menus").await?;

    if !MenuItem::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Menu item"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Applies `[{id, parent_id, position}, ...]` atomically and returns the new tree
pub async fn reorder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(menu_id): Path<Uuid>,
    Json(entries): Json<Vec<ReorderEntry>>,
) -> ApiResult<Json<Vec<MenuItemNode>>> {
    require_permission(&state.db, &auth, "edit menus").await?;
    check_reorder(&entries)?;

    let tree = Menu::reorder(&state.db, menu_id, &entries).await?;
    tracing::info!(menu_id = %menu_id, entries = entries.len(), user_id = %auth.user_id, "Menu reordered");

    Ok(Json(tree))
}

/// Public: active menu for a location, inactive items omitted
pub async fn public_show(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> ApiResult<Json<MenuTree>> {
    Menu::active_tree_by_location(&state.db, &location)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Menu"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Uuid, position: i32) -> ReorderEntry {
        ReorderEntry {
            id,
            parent_id: None,
            position,
        }
    }

    #[test]
    fn test_check_reorder() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(check_reorder(&[entry(a, 0), entry(b, 1)]).is_ok());
        assert!(check_reorder(&[]).is_err());
        assert!(check_reorder(&[entry(a, -1)]).is_err());
        assert!(check_reorder(&[entry(a, 0), entry(a, 1)]).is_err());
    }

    #[test]
    fn test_location_validation() {
        let ok = CreateMenuRequest {
            name: "Header".to_string(),
            location: "footer-legal".to_string(),
            is_active: true,
        };
        assert!(ok.validate().is_ok());

        let bad = CreateMenuRequest {
            location: "main menu!".to_string(),
            ..ok
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("location"));
    }
}
