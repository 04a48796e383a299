/// AI provider service endpoints
///
/// Responses never carry the stored API key; see [`AiServiceView`]. The
/// connection test is the only place the key leaves the database, as a
/// bearer token on a single outbound request.
///
/// ```text
/// GET    /v1/ai/services
/// POST   /v1/ai/services
/// GET    /v1/ai/services/:id
/// PUT    /v1/ai/services/:id
/// DELETE /v1/ai/services/:id
/// POST   /v1/ai/services/:id/test
/// ```

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
    models::ai_service::{AiService, AiServiceView, CreateAiService, UpdateAiService},
    pagination::Page,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Timeout for the connection test request
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts absolute `http` and `https` URLs only
fn validate_base_url(url: &str) -> Result<(), ValidationError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| {
        let mut err = ValidationError::new("base_url");
        err.message = Some("Base URL must be an absolute URL".into());
        err
    })?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => {
            let mut err = ValidationError::new("base_url");
            err.message = Some("Base URL must use http or https".into());
            Err(err)
        }
    }
}

/// Empty strings clear the key rather than storing a blank credential
fn blank_key_to_none(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAiServiceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "Provider must be 1-50 characters"))]
    pub provider: String,

    #[validate(custom(function = "validate_base_url"))]
    pub base_url: String,

    pub api_key: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAiServiceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Provider must be 1-50 characters"))]
    pub provider: Option<String>,

    #[validate(custom(function = "validate_base_url"))]
    pub base_url: Option<String>,

    /// Absent keeps the stored key, `null` removes it
    #[serde(default, deserialize_with = "nullable")]
    pub api_key: Option<Option<String>>,

    pub is_active: Option<bool>,
}

/// Outcome of a connection test
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionTestResult {
    pub ok: bool,

    /// HTTP status returned by the provider, if one was received
    pub status: Option<u16>,

    pub latency_ms: u64,

    pub error: Option<String>,
}

impl ConnectionTestResult {
    fn from_status(status: reqwest::StatusCode, latency: Duration) -> Self {
        let ok = status.is_success();
        ConnectionTestResult {
            ok,
            status: Some(status.as_u16()),
            latency_ms: latency.as_millis() as u64,
            error: (!ok).then(|| format!("Provider responded with {}", status)),
        }
    }

    fn from_error(err: &reqwest::Error, latency: Duration) -> Self {
        let error = if err.is_timeout() {
            format!("Request timed out after {}s", TEST_TIMEOUT.as_secs())
        } else {
            err.to_string()
        };

        ConnectionTestResult {
            ok: false,
            status: err.status().map(|s| s.as_u16()),
            latency_ms: latency.as_millis() as u64,
            error: Some(error),
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<AiServiceView>>> {
    require_permission(&state.db, &auth, "view ai services").await?;

    Ok(Json(AiService::list(&state.db, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateAiServiceRequest>,
) -> ApiResult<Created<AiServiceView>> {
    require_permission(&state.db, &auth, "create ai services").await?;
    req.validate()?;

    let service = AiService::create(
        &state.db,
        CreateAiService {
            name: req.name.trim().to_string(),
            provider: req.provider,
            base_url: req.base_url,
            api_key: blank_key_to_none(req.api_key),
            is_active: req.is_active,
        },
    )
    .await?;

    tracing::info!(service_id = %service.id, provider = %service.provider, "AI service created");

    Ok(created(service.into()))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AiServiceView>> {
    require_permission(&state.db, &auth, "view ai services").await?;

    AiService::find_by_id(&state.db, id)
        .await?
        .map(|service| Json(service.into()))
        .ok_or_else(|| ApiError::not_found("AI service"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAiServiceRequest>,
) -> ApiResult<Json<AiServiceView>> {
    require_permission(&state.db, &auth, "edit ai services").await?;
    req.validate()?;

    let service = AiService::update(
        &state.db,
        id,
        UpdateAiService {
            name: req.name,
            provider: req.provider,
            base_url: req.base_url,
            api_key: req.api_key.map(blank_key_to_none),
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(Json(service.into()))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete ai services").await?;

    if !AiService::delete(&state.db, id).await? {
        return Err(ApiError::not_found("AI service"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Calls `{base_url}/models` once and reports the outcome
///
/// Provider failures are part of the result, not an error response.
pub async fn test_connection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConnectionTestResult>> {
    require_permission(&state.db, &auth, "edit ai services").await?;

    let service = AiService::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("AI service"))?;

    let mut request = state.http.get(service.models_url()).timeout(TEST_TIMEOUT);
    if let Some(key) = service.api_key.as_deref() {
        request = request.bearer_auth(key);
    }

    let started = Instant::now();
    let result = match request.send().await {
        Ok(response) => ConnectionTestResult::from_status(response.status(), started.elapsed()),
        Err(e) => ConnectionTestResult::from_error(&e, started.elapsed()),
    };

    tracing::info!(
        service_id = %service.id,
        ok = result.ok,
        status = ?result.status,
        latency_ms = result.latency_ms,
        "AI service connection test"
    );

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url("https://api.openai.com/v1").is_ok());
        assert!(validate_base_url("http://localhost:11434").is_ok());
        assert!(validate_base_url("ftp://files.example.com").is_err());
        assert!(validate_base_url("api.openai.com").is_err());
    }

    #[test]
    fn test_blank_key_is_cleared() {
        assert_eq!(blank_key_to_none(Some("  ".to_string())), None);
        assert_eq!(
            blank_key_to_none(Some(" sk-abc ".to_string())),
            Some("sk-abc".to_string())
        );
        assert_eq!(blank_key_to_none(None), None);
    }

    #[test]
    fn test_status_result() {
        let ok = ConnectionTestResult::from_status(reqwest::StatusCode::OK, Duration::from_millis(42));
        assert!(ok.ok);
        assert_eq!(ok.status, Some(200));
        assert_eq!(ok.latency_ms, 42);
        assert_eq!(ok.error, None);

        let denied =
            ConnectionTestResult::from_status(reqwest::StatusCode::UNAUTHORIZED, Duration::ZERO);
        assert!(!denied.ok);
        assert_eq!(denied.status, Some(401));
        assert!(denied.error.unwrap().contains("401"));
    }

    #[test]
    fn test_update_key_can_be_removed() {
        let req: UpdateAiServiceRequest = serde_json::from_str(r#"{"api_key": null}"#).unwrap();
        assert_eq!(req.api_key, Some(None));

        let keep: UpdateAiServiceRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(keep.api_key, None);
    }
}
