/// Expense claims
///
/// Expenses start `pending`; approving or rejecting records the reviewer
/// and is final. Only pending expenses can be edited or deleted.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{check_date_range, created, empty_as_none, nullable, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::expense::{
        CreateExpense, Expense, ExpenseFilter, ExpenseStatus, ReviewDecision, UpdateExpense,
    },
    pagination::Page,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<ExpenseStatus>,
    pub category: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_from: Option<NaiveDate>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_to: Option<NaiveDate>,

    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,

    pub amount: Decimal,
    pub expense_date: NaiveDate,

    #[validate(length(max = 255, message = "Vendor must be at most 255 characters"))]
    pub vendor: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: Option<String>,

    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "nullable")]
    pub vendor: Option<Option<String>>,
}

/// Optional note sent with approve / reject
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<ExpenseQuery>,
) -> ApiResult<Json<Page<Expense>>> {
    require_permission(&state.db, &auth, "view expenses").await?;
    check_date_range(query.date_from, query.date_to)?;

    let filter = ExpenseFilter {
        status: query.status,
        category: query.category,
        date_from: query.date_from,
        date_to: query.date_to,
        search: query.search,
    };

    Ok(Json(Expense::list(&state.db, &filter, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateExpenseRequest>,
) -> ApiResult<Created<Expense>> {
    require_permission(&state.db, &auth, "create expenses").await?;
    req.validate()?;

    let expense = Expense::create(
        &state.db,
        CreateExpense {
            category: req.category.trim().to_string(),
            description: req.description.trim().to_string(),
            amount: req.amount,
            expense_date: req.expense_date,
            vendor: req.vendor.filter(|v| !v.trim().is_empty()),
            submitted_by: Some(auth.user_id),
        },
    )
    .await?;

    Ok(created(expense))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Expense>> {
    require_permission(&state.db, &auth, "view expenses").await?;

    Expense::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Expense"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateExpenseRequest>,
) -> ApiResult<Json<Expense>> {
    require_permission(&state.db, &auth, "edit expenses").await?;
    req.validate()?;

    let expense = Expense::update(
        &state.db,
        id,
        UpdateExpense {
            category: req.category,
            description: req.description,
            amount: req.amount,
            expense_date: req.expense_date,
            vendor: req.vendor,
        },
    )
    .await?;

    Ok(Json(expense))
}

async fn review(
    state: AppState,
    auth: AuthContext,
    id: Uuid,
    decision: ReviewDecision,
    req: ReviewRequest,
) -> ApiResult<Json<Expense>> {
    require_permission(&state.db, &auth, "approve expenses").await?;
    req.validate()?;

    let note = req.note.filter(|n| !n.trim().is_empty());
    let expense = Expense::review(&state.db, id, decision, auth.user_id, note).await?;

    tracing::info!(
        expense_id = %id,
        reviewer = %auth.user_id,
        status = expense.status.as_str(),
        "Expense reviewed"
    );
    Ok(Json(expense))
}

/// Approves a pending expense; the body `{ "note": "..." }` is optional
pub async fn approve(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequest>>,
) -> ApiResult<Json<Expense>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    review(state, auth, id, ReviewDecision::Approve, req).await
}

/// Rejects a pending expense; the body `{ "note": "..." }` is optional
pub async fn reject(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequest>>,
) -> ApiResult<Json<Expense>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    review(state, auth, id, ReviewDecision::Reject, req).await
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete expenses").await?;

    Expense::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_note_limit() {
        let ok = ReviewRequest {
            note: Some("Receipt attached".to_string()),
        };
        assert!(ok.validate().is_ok());

        let long = ReviewRequest {
            note: Some("x".repeat(1001)),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_query_parses_status() {
        let query: ExpenseQuery =
            serde_json::from_str(r#"{"status": "approved", "date_to": ""}"#).unwrap();
        assert_eq!(query.status, Some(ExpenseStatus::Approved));
        assert!(query.date_to.is_none());
    }
}
