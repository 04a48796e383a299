/// Ledger transactions
///
/// Posting a transaction moves its account's balance in the same database
/// transaction; deleting one reverses the effect. Transactions are never
/// edited, only deleted and re-entered.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{check_date_range, created, empty_as_none, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::transaction::{CreateTransaction, Transaction, TransactionDirection, TransactionFilter},
    pagination::Page,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub account_id: Option<Uuid>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub direction: Option<TransactionDirection>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_from: Option<NaiveDate>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub account_id: Uuid,
    pub transaction_date: NaiveDate,

    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,

    pub amount: Decimal,
    pub direction: TransactionDirection,

    #[validate(length(max = 100, message = "Reference must be at most 100 characters"))]
    pub reference: Option<String>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Page<Transaction>>> {
    require_permission(&state.db, &auth, "view transactions").await?;
    check_date_range(query.date_from, query.date_to)?;

    let filter = TransactionFilter {
        account_id: query.account_id,
        direction: query.direction,
        date_from: query.date_from,
        date_to: query.date_to,
    };

    Ok(Json(Transaction::list(&state.db, &filter, page.params()).await?))
}

/// Records a transaction
///
/// # Errors
///
/// - `422`: amount not positive, inactive account
/// - `404`: account does not exist
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTransactionRequest>,
) -> ApiResult<Created<Transaction>> {
    require_permission(&state.db, &auth, "create transactions").await?;
    req.validate()?;

    let transaction = Transaction::create(
        &state.db,
        CreateTransaction {
            account_id: req.account_id,
            transaction_date: req.transaction_date,
            description: req.description.trim().to_string(),
            amount: req.amount,
            direction: req.direction,
            reference: req.reference.filter(|r| !r.trim().is_empty()),
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    Ok(created(transaction))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Transaction>> {
    require_permission(&state.db, &auth, "view transactions").await?;

    Transaction::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Transaction"))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete transactions").await?;

    Transaction::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_amount_accepts_string_and_number() {
        let base = r#""account_id": "6f1c2d7e-0000-4000-8000-000000000001",
                      "transaction_date": "2026-02-14", "description": "Office rent",
                      "direction": "debit""#;

        let text: CreateTransactionRequest =
            serde_json::from_str(&format!(r#"{{{}, "amount": "1250.50"}}"#, base)).unwrap();
        assert_eq!(text.amount, Decimal::from_str("1250.50").unwrap());

        let number: CreateTransactionRequest =
            serde_json::from_str(&format!(r#"{{{}, "amount": 99}}"#, base)).unwrap();
        assert_eq!(number.amount, Decimal::from(99));
    }

    #[test]
    fn test_query_accepts_empty_account() {
        let query: TransactionQuery =
            serde_json::from_str(r#"{"account_id": "", "direction": "credit"}"#).unwrap();
        assert!(query.account_id.is_none());
        assert_eq!(query.direction, Some(TransactionDirection::Credit));
    }
}
