use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::dashboard::DashboardStats,
};

/// Summary counts for the admin landing page
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardStats>> {
    require_permission(&state.db, &auth, "view dashboard").await?;

    Ok(Json(DashboardStats::load(&state.db).await?))
}
