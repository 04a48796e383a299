/// Chart of accounts
///
/// The account type is fixed at creation and the balance only moves
/// through transactions, so neither can be set on update.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{created, empty_as_none, nullable, Created, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use backoffice_shared::{
    auth::{authorization::require_permission, middleware::AuthContext},
    models::{
        account::{Account, AccountFilter, AccountType, CreateAccount, UpdateAccount},
        transaction::Transaction,
    },
    pagination::Page,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Transactions shown on the account page
const RECENT_TRANSACTIONS: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub account_type: Option<AccountType>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 20, message = "Code must be 1-20 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub account_type: AccountType,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,

    pub description: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 20, message = "Code must be 1-20 characters"))]
    pub code: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AccountDetail {
    #[serde(flatten)]
    pub account: Account,
    pub recent_transactions: Vec<Transaction>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<AccountQuery>,
) -> ApiResult<Json<Page<Account>>> {
    require_permission(&state.db, &auth, "view accounts").await?;

    let filter = AccountFilter {
        account_type: query.account_type,
        is_active: query.is_active,
        search: query.search,
    };

    Ok(Json(Account::list(&state.db, &filter, page.params()).await?))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Created<Account>> {
    require_permission(&state.db, &auth, "create accounts").await?;
    req.validate()?;

    let account = Account::create(
        &state.db,
        CreateAccount {
            code: req.code,
            name: req.name,
            account_type: req.account_type,
            currency: req.currency,
            description: req.description,
            is_active: req.is_active,
        },
    )
    .await?;

    tracing::info!(account_id = %account.id, code = %account.code, user_id = %auth.user_id, "Account created");
    Ok(created(account))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AccountDetail>> {
    require_permission(&state.db, &auth, "view accounts").await?;

    let account = Account::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;
    let recent_transactions =
        Transaction::recent_for_account(&state.db, id, RECENT_TRANSACTIONS).await?;

    Ok(Json(AccountDetail {
        account,
        recent_transactions,
    }))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Json<Account>> {
    require_permission(&state.db, &auth, "edit accounts").await?;
    req.validate()?;

    let account = Account::update(
        &state.db,
        id,
        UpdateAccount {
            code: req.code,
            name: req.name,
            currency: req.currency,
            description: req.description,
            is_active: req.is_active,
        },
    )
    .await?;

    Ok(Json(account))
}

/// Deletes an account that has no transactions (409 otherwise)
pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, "delete accounts").await?;

    Account::delete(&state.db, id).await?;
    tracing::info!(account_id = %id, user_id = %auth.user_id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_cannot_be_updated() {
        // unknown fields are ignored, so a type change is silently dropped
        let req: UpdateAccountRequest =
            serde_json::from_str(r#"{"account_type": "equity", "name": "Cash"}"#).unwrap();
        assert_eq!(req.name.as_deref(), Some("Cash"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_currency_must_be_three_letters() {
        let req: CreateAccountRequest = serde_json::from_str(
            r#"{"code": "1000", "name": "Cash", "account_type": "asset", "currency": "EURO"}"#,
        )
        .unwrap();
        assert!(req.is_active);

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("currency"));
    }
}
