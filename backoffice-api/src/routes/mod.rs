/// API route handlers
///
/// Handlers are organized by resource. Resource routes follow the usual
/// verbs: `index`, `store`, `show`, `update`, `destroy`.
///
/// - `health`: Health check endpoint
/// - `auth`: Login, refresh, current user
/// - `users`, `roles`, `permissions`: Administration
/// - `guest_inquiries`: Public contact form and support inbox
/// - `finance`: Accounts, transactions, invoices, expenses, reconciliations
/// - `projects`, `tasks`: Project management
/// - `menus`: CMS navigation
/// - `ai`: Models, services, prompt templates, conversations
/// - `broadcasting`: Realtime channel authorization
/// - `integrations`: Backing service probes
/// - `dashboard`: Summary counts

pub mod ai;
pub mod auth;
pub mod broadcasting;
pub mod dashboard;
pub mod finance;
pub mod guest_inquiries;
pub mod health;
pub mod integrations;
pub mod menus;
pub mod permissions;
pub mod projects;
pub mod roles;
pub mod tasks;
pub mod users;

use crate::error::{ApiError, ApiResult};
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use backoffice_shared::{
    export::{csv_stream, export_filename, stream_in_chunks, CsvExport, EXPORT_CHUNK_SIZE},
    pagination::PageParams,
};
use chrono::{NaiveDate, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};
use serde::de::{value::StrDeserializer, DeserializeOwned};
use serde::{Deserialize, Deserializer};

/// `201 Created` with a JSON body
pub type Created<T> = (StatusCode, Json<T>);

pub fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

/// `page` / `per_page` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn params(&self) -> PageParams {
        PageParams::new(self.page, self.per_page)
    }
}

/// Rejects a `date_from` later than `date_to`
pub fn check_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> ApiResult<()> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(ApiError::invalid(
            "date_to",
            "End date must be on or after the start date",
        )),
        _ => Ok(()),
    }
}

/// Streams the rows of `build` as a CSV attachment named `{prefix}-{today}.csv`
pub fn csv_download<T, F>(pool: PgPool, prefix: &str, build: F) -> Response
where
    T: CsvExport + for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    F: FnOnce() -> QueryBuilder<'static, Postgres> + Send + 'static,
{
    let chunks = stream_in_chunks::<T, F>(pool, EXPORT_CHUNK_SIZE, build);
    let filename = export_filename(prefix, Utc::now().date_naive());

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from_stream(csv_stream(chunks)),
    )
        .into_response()
}

/// Distinguishes an absent field from an explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: missing gives `None`, `null` gives `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Treats an empty query value as absent
///
/// Filter forms submit `?status=` when no option is picked. Works for any
/// type that deserializes from a string (enums, UUIDs, dates).
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => T::deserialize(StrDeserializer::<D::Error>::new(raw)).map(Some),
    }
}
