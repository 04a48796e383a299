/// Bank statement reconciliations
///
/// Creating a reconciliation records the bank statement (account, period,
/// opening and closing balance). Transactions of that account inside the
/// period are then matched until the difference reaches zero, at which
/// point the reconciliation can be completed. Completed reconciliations
/// are read-only.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{created, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::reconciliation::{
        CreateReconciliation, Reconciliation, ReconciliationDetail, ReconciliationSummary,
    },
    pagination::Page,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct CreateReconciliationRequest {
    pub account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransactionIdsRequest {
    #[validate(length(min = 1, max = 1000, message = "Select between 1 and 1000 transactions"))]
    pub transaction_ids: Vec<Uuid>,
}

impl TransactionIdsRequest {
    fn into_ids(self) -> ApiResult<Vec<Uuid>> {
        self.validate()?;

        let mut ids = self.transaction_ids;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

async fn load_detail(state: &AppState, id: Uuid) -> ApiResult<ReconciliationDetail> {
    Reconciliation::detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Reconciliation"))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<ReconciliationSummary>>> {
    require_permission(&state.db, &auth, "view reconciliations").await?;
    Ok(Json(Reconciliation::list(&state.db, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateReconciliationRequest>,
) -> ApiResult<Created<ReconciliationDetail>> {
    require_permission(&state.db, &auth, "create reconciliations").await?;

    let reconciliation = Reconciliation::create(
        &state.db,
        CreateReconciliation {
            account_id: req.account_id,
            period_start: req.period_start,
            period_end: req.period_end,
            opening_balance: req.opening_balance,
            closing_balance: req.closing_balance,
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    Ok(created(load_detail(&state, reconciliation.id).await?))
}

/// Statement, matched transactions, unmatched candidates and the difference
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReconciliationDetail>> {
    require_permission(&state.db, &auth, "view reconciliations").await?;
    Ok(Json(load_detail(&state, id).await?))
}

pub async fn match_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransactionIdsRequest>,
) -> ApiResult<Json<ReconciliationDetail>> {
    require_permission(&state.db, &auth, "edit reconciliations").await?;

    let ids = req.into_ids()?;
    let reconciliation = Reconciliation::match_transactions(&state.db, id, &ids).await?;
    tracing::debug!(reconciliation_id = %id, matched = ids.len(), difference = %reconciliation.difference, "Transactions matched");

    Ok(Json(load_detail(&state, id).await?))
}

pub async fn unmatch_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransactionIdsRequest>,
) -> ApiResult<Json<ReconciliationDetail>> {
    require_permission(&state.db, &auth, "edit reconciliations").await?;

    let ids = req.into_ids()?;
    Reconciliation::unmatch_transactions(&state.db, id, &ids).await?;

    Ok(Json(load_detail(&state, id).await?))
}

/// Completes a reconciliation whose difference is zero (409 otherwise)
pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReconciliationDetail>> {
    require_permission(&state.db, &auth, "edit reconciliations").await?;

    Reconciliation::complete(&state.db, id).await?;
    tracing::info!(reconciliation_id = %id, user_id = %auth.user_id, "Reconciliation completed");

    Ok(Json(load_detail(&state, id).await?))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete reconciliations").await?;

    Reconciliation::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_deduplicated() {
        let id = Uuid::new_v4();
        let req = TransactionIdsRequest {
            transaction_ids: vec![id, id],
        };
        assert_eq!(req.into_ids().unwrap(), vec![id]);
    }

    #[test]
    fn test_transaction_ids_required() {
        let req = TransactionIdsRequest {
            transaction_ids: Vec::new(),
        };
        assert!(matches!(req.into_ids(), Err(ApiError::ValidationError(_))));
    }
}
