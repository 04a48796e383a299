/// Backing service verification
///
/// ```text
/// GET /v1/system/integrations
/// ```
///
/// Probes run in sequence and never fail the request; each result carries
/// its own `healthy` flag and status string.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    integrations::{self, IntegrationReport},
};

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<IntegrationReport>> {
    require_permission(&state.db, &auth, "view integrations").await?;

    let report = integrations::run_all(
        &state.db,
        &state.redis,
        &state.config.storage.path,
        &state.config.queue.connection,
    )
    .await;

    if !report.healthy {
        let failing: Vec<&str> = report
            .checks
            .iter()
            .filter(|c| !c.healthy)
            .map(|c| c.name.as_str())
            .collect();
        tracing::warn!(?failing, "Integration checks failed");
    }

    Ok(Json(report))
}
