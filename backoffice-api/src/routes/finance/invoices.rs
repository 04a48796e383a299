/// Invoices
///
/// # Endpoints
///
/// - `GET /v1/finance/invoices` - List (`status`, `search`)
/// - `GET /v1/finance/invoices/export` - Same filters as CSV
/// - `POST /v1/finance/invoices` - Create a draft with items
/// - `GET|PUT|PATCH|DELETE /v1/finance/invoices/:id`
/// - `POST /v1/finance/invoices/:id/status` - Move through the workflow
///
/// Totals are always computed server-side from the items and tax rate.
/// Only drafts can be edited or deleted.
///
/// # Workflow
///
/// ```text
/// draft ──► sent ──► paid
///   │        │  ▲
///   │        ▼  │
///   │      overdue
///   ▼        │
/// cancelled ◄┘
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{created, csv_download, empty_as_none, nullable, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::invoice::{
        CreateInvoice, Invoice, InvoiceFilter, InvoiceItemInput, InvoiceStatus, InvoiceWithItems,
        UpdateInvoice,
    },
    pagination::Page,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<InvoiceStatus>,
    pub search: Option<String>,
}

impl From<InvoiceQuery> for InvoiceFilter {
    fn from(query: InvoiceQuery) -> Self {
        InvoiceFilter {
            status: query.status,
            search: query.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    /// Generated as `INV-YYYYMM-NNNN` when omitted
    #[validate(length(min = 1, max = 50, message = "Number must be 1-50 characters"))]
    pub number: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Customer name must be 1-255 characters"))]
    pub customer_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub customer_email: Option<String>,

    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,

    /// Percentage, 0-100
    #[serde(default)]
    pub tax_rate: Decimal,

    pub notes: Option<String>,

    #[validate(length(min = 1, message = "An invoice needs at least one item"))]
    pub items: Vec<InvoiceItemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, max = 255, message = "Customer name must be 1-255 characters"))]
    pub customer_name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub customer_email: Option<Option<String>>,

    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,

    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,

    /// Replaces every item when present
    #[validate(length(min = 1, message = "An invoice needs at least one item"))]
    pub items: Option<Vec<InvoiceItemInput>>,
}

impl UpdateInvoiceRequest {
    fn check_email(&self) -> ApiResult<()> {
        match &self.customer_email {
            Some(Some(email)) if !validator::ValidateEmail::validate_email(email) => {
                Err(ApiError::invalid("customer_email", "Invalid email format"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: InvoiceStatus,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<Json<Page<Invoice>>> {
    require_permission(&state.db, &auth, "view invoices").await?;

    let filter = InvoiceFilter::from(query);
    Ok(Json(Invoice::list(&state.db, &filter, page.params()).await?))
}

pub async fn export(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<Response> {
    require_permission(&state.db, &auth, "export invoices").await?;

    let filter = InvoiceFilter::from(query);
    tracing::info!(user_id = %auth.user_id, "Invoice export started");

    Ok(csv_download::<Invoice, _>(state.db.clone(), "invoices", move || {
        filter.export_query()
    }))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<Created<InvoiceWithItems>> {
    require_permission(&state.db, &auth, "create invoices").await?;
    req.validate()?;

    let invoice = Invoice::create(
        &state.db,
        CreateInvoice {
            number: req.number.map(|n| n.trim().to_string()),
            customer_name: req.customer_name.trim().to_string(),
            customer_email: req.customer_email,
            issue_date: req.issue_date,
            due_date: req.due_date,
            tax_rate: req.tax_rate,
            notes: req.notes,
            items: req.items,
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    Ok(created(invoice))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvoiceWithItems>> {
    require_permission(&state.db, &auth, "view invoices").await?;

    Invoice::find_with_items(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Invoice"))
}

/// Updates a draft invoice (409 once sent)
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceRequest>,
) -> ApiResult<Json<InvoiceWithItems>> {
    require_permission(&state.db, &auth, "edit invoices").await?;
    req.validate()?;
    req.check_email()?;

    let invoice = Invoice::update(
        &state.db,
        id,
        UpdateInvoice {
            customer_name: req.customer_name,
            customer_email: req.customer_email,
            issue_date: req.issue_date,
            due_date: req.due_date,
            tax_rate: req.tax_rate,
            notes: req.notes,
            items: req.items,
        },
    )
    .await?;

    Ok(Json(invoice))
}

pub async fn transition(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<Json<Invoice>> {
    require_permission(&state.db, &auth, "edit invoices").await?;

    let invoice = Invoice::transition(&state.db, id, req.status).await?;
    tracing::info!(invoice_id = %id, status = invoice.status.as_str(), user_id = %auth.user_id, "Invoice status changed");

    Ok(Json(invoice))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete invoices").await?;

    Invoice::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_items() {
        let req: CreateInvoiceRequest = serde_json::from_str(
            r#"{"customer_name": "Acme", "issue_date": "2026-03-01",
                "due_date": "2026-03-31", "items": []}"#,
        )
        .unwrap();

        assert_eq!(req.tax_rate, Decimal::ZERO);
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn test_update_request_email_check() {
        let bad: UpdateInvoiceRequest =
            serde_json::from_str(r#"{"customer_email": "nope"}"#).unwrap();
        assert!(bad.check_email().is_err());

        let cleared: UpdateInvoiceRequest =
            serde_json::from_str(r#"{"customer_email": null}"#).unwrap();
        assert!(cleared.check_email().is_ok());
        assert_eq!(cleared.customer_email, Some(None));
    }

    #[test]
    fn test_query_into_filter() {
        let query: InvoiceQuery = serde_json::from_str(r#"{"status": "", "search": " "}"#).unwrap();
        let filter = InvoiceFilter::from(query);
        assert!(filter.status.is_none());
        assert!(filter.search.is_none());
    }
}
