/// Guest inquiries: the public contact form and the support inbox
///
/// # Endpoints
///
/// - `POST /v1/public/inquiries` - Public submission (rate limited per IP)
/// - `GET /v1/guest-inquiries` - Filtered list with per-status counts
/// - `GET /v1/guest-inquiries/export` - Same filters, streamed as CSV
/// - `POST /v1/guest-inquiries/bulk-status` - Set status on many inquiries
/// - `GET|PUT|PATCH|DELETE /v1/guest-inquiries/:id`
///
/// # Filters
///
/// `search` (name, email, subject), `status`, `date_from`, `date_to`
/// (inclusive, `YYYY-MM-DD`), `sort` (`newest` | `oldest`), `page`,
/// `per_page`. Empty values are ignored.

use super::{check_date_range, created, csv_download, empty_as_none, nullable, Created, PageQuery};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::rate_limit::client_ip,
};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::guest_inquiry::{
        CreateGuestInquiry, GuestInquiry, InquiryFilter, InquirySort, InquiryStatus,
        StatusCounts, UpdateGuestInquiry,
    },
    pagination::Page,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;
use validator::Validate;

/// Public submission
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitInquiryRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Subject must be 1-255 characters"))]
    pub subject: String,

    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,

    #[validate(length(max = 50, message = "Source must be at most 50 characters"))]
    pub source: Option<String>,
}

/// Acknowledgement returned to the guest
#[derive(Debug, Serialize)]
pub struct SubmitInquiryResponse {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InquiryQuery {
    pub search: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<InquiryStatus>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_from: Option<NaiveDate>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_to: Option<NaiveDate>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub sort: Option<InquirySort>,
}

impl InquiryQuery {
    pub fn into_filter(self) -> ApiResult<InquiryFilter> {
        check_date_range(self.date_from, self.date_to)?;

        Ok(InquiryFilter {
            search: self.search.filter(|s| !s.trim().is_empty()),
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
            sort: self.sort.unwrap_or_default(),
        })
    }
}

/// Inbox payload
#[derive(Debug, Serialize)]
pub struct InquiryIndex {
    #[serde(flatten)]
    pub inquiries: Page<GuestInquiry>,
    pub counts: StatusCounts,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInquiryRequest {
    pub status: Option<InquiryStatus>,

    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl UpdateInquiryRequest {
    const MAX_NOTES: usize = 10_000;

    fn check_notes(&self) -> ApiResult<()> {
        match &self.notes {
            Some(Some(notes)) if notes.chars().count() > Self::MAX_NOTES => Err(
                ApiError::invalid("notes", "Notes must be at most 10000 characters"),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkStatusRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 inquiries"))]
    pub ids: Vec<Uuid>,

    pub status: InquiryStatus,
}

#[derive(Debug, Serialize)]
pub struct BulkStatusResponse {
    pub updated: u64,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Public contact form submission
///
/// Records the client IP (first `X-Forwarded-For` hop, `X-Real-IP`, or the
/// socket address).
pub async fn submit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<SubmitInquiryRequest>,
) -> ApiResult<Created<SubmitInquiryResponse>> {
    req.validate()?;

    let ip_address = client_ip(&headers, connect_info.map(|info| info.0));

    let inquiry = GuestInquiry::create(
        &state.db,
        CreateGuestInquiry {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            phone: blank_to_none(req.phone),
            subject: req.subject.trim().to_string(),
            message: req.message,
            source: blank_to_none(req.source),
            ip_address,
        },
    )
    .await?;

    tracing::info!(inquiry_id = %inquiry.id, source = %inquiry.source, "Guest inquiry received");

    Ok(created(SubmitInquiryResponse {
        id: inquiry.id,
        message: "Thank you, we will get back to you shortly".to_string(),
    }))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<InquiryQuery>,
) -> ApiResult<Json<InquiryIndex>> {
    require_permission(&state.db, &auth, "view guest inquiries").await?;

    let filter = query.into_filter()?;
    let inquiries = GuestInquiry::list(&state.db, &filter, page.params()).await?;
    let counts = GuestInquiry::status_counts(&state.db).await?;

    Ok(Json(InquiryIndex { inquiries, counts }))
}

/// CSV export of every inquiry matching the filters
///
/// Rows are read from a database cursor and written in chunks, so the
/// response starts before the query finishes.
pub async fn export(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<InquiryQuery>,
) -> ApiResult<Response> {
    require_permission(&state.db, &auth, "export guest inquiries").await?;

    let filter = query.into_filter()?;
    tracing::info!(user_id = %auth.user_id, "Guest inquiry export started");

    Ok(csv_download::<GuestInquiry, _>(
        state.db.clone(),
        "guest-inquiries",
        move || filter.export_query(),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GuestInquiry>> {
    require_permission(&state.db, &auth, "view guest inquiries").await?;

    GuestInquiry::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Guest inquiry"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInquiryRequest>,
) -> ApiResult<Json<GuestInquiry>> {
    require_permission(&state.db, &auth, "edit guest inquiries").await?;
    req.check_notes()?;

    let inquiry = GuestInquiry::update(
        &state.db,
        id,
        UpdateGuestInquiry {
            status: req.status,
            notes: req.notes.map(blank_to_none),
        },
    )
    .await?;

    tracing::info!(inquiry_id = %id, status = inquiry.status.as_str(), user_id = %auth.user_id, "Guest inquiry updated");
    Ok(Json(inquiry))
}

pub async fn bulk_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<BulkStatusRequest>,
) -> ApiResult<Json<BulkStatusResponse>> {
    require_permission(&state.db, &auth, "edit guest inquiries").await?;
    req.validate()?;

    let updated = GuestInquiry::bulk_update_status(&state.db, &req.ids, req.status).await?;
    tracing::info!(updated, status = req.status.as_str(), user_id = %auth.user_id, "Bulk inquiry status update");

    Ok(Json(BulkStatusResponse { updated }))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete guest inquiries").await?;

    if !GuestInquiry::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Guest inquiry"));
    }

    Ok(StatusCode::NO_CONTENT)
}
