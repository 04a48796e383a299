/// Chart of accounts
///
/// Each account carries a running `balance` that is only ever changed by
/// recording or deleting a ledger transaction (see `transaction`). Asset and
/// expense accounts are debit-normal: a debit increases their balance. All
/// other account types are credit-normal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::transaction::TransactionDirection;
use super::{like_pattern, ModelError};
use crate::pagination::{Page, PageParams};

const ACCOUNT_COLUMNS: &str = "id, code, name, account_type, balance, currency, description, \
                               is_active, created_at, updated_at";

/// Account classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
        }
    }

    /// Whether a debit increases the balance
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Signed change a transaction makes to an account of this type
    ///
    /// ```
    /// use backoffice_shared::models::account::AccountType;
    /// use backoffice_shared::models::transaction::TransactionDirection;
    /// use rust_decimal::Decimal;
    ///
    /// let ten = Decimal::new(10, 0);
    /// assert_eq!(AccountType::Asset.balance_effect(TransactionDirection::Debit, ten), ten);
    /// assert_eq!(AccountType::Income.balance_effect(TransactionDirection::Debit, ten), -ten);
    /// ```
    pub fn balance_effect(&self, direction: TransactionDirection, amount: Decimal) -> Decimal {
        match (self.is_debit_normal(), direction) {
            (true, TransactionDirection::Debit) | (false, TransactionDirection::Credit) => amount,
            _ => -amount,
        }
    }
}

/// Ledger account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,

    /// Short unique code, e.g. `1000`
    pub code: String,

    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,

    /// ISO 4217 code
    pub currency: String,

    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}

/// The account type is fixed once created; the balance only moves through transactions
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    pub code: Option<String>,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub account_type: Option<AccountType>,
    pub is_active: Option<bool>,

    /// Matches code or name
    pub search: Option<String>,
}

impl AccountFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(account_type) = self.account_type {
            builder.push(" AND account_type = ").push_bind(account_type);
        }
        if let Some(is_active) = self.is_active {
            builder.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (code ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl Account {
    pub async fn create(pool: &PgPool, data: CreateAccount) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (code, name, account_type, currency, description, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(data.code.trim().to_string())
        .bind(data.name)
        .bind(data.account_type)
        .bind(
            data.currency
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
        )
        .bind(data.description)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &AccountFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM accounts");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM accounts", ACCOUNT_COLUMNS));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY code LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<Account>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateAccount) -> Result<Self, ModelError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE accounts SET updated_at = NOW()");
        if let Some(code) = data.code {
            builder.push(", code = ").push_bind(code.trim().to_string());
        }
        if let Some(name) = data.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(currency) = data.currency {
            builder.push(", currency = ").push_bind(currency.trim().to_uppercase());
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(is_active) = data.is_active {
            builder.push(", is_active = ").push_bind(is_active);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(ACCOUNT_COLUMNS);

        builder
            .build_query_as::<Account>()
            .fetch_optional(pool)
            .await?
            .ok_or(ModelError::NotFound("Account"))
    }

    /// Deletes an account that has never been posted to
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ModelError> {
        let (transactions, statements): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM transactions WHERE account_id = $1),
                (SELECT COUNT(*) FROM bank_statements WHERE account_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        if transactions > 0 || statements > 0 {
            return Err(ModelError::Conflict(
                "Account has transactions or bank statements; deactivate it instead".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ModelError::NotFound("Account"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_debit_normal_accounts() {
        assert!(AccountType::Asset.is_debit_normal());
        assert!(AccountType::Expense.is_debit_normal());
        assert!(!AccountType::Liability.is_debit_normal());
        assert!(!AccountType::Equity.is_debit_normal());
        assert!(!AccountType::Income.is_debit_normal());
    }

    #[test]
    fn test_balance_effect_signs() {
        let amount = dec("125.50");

        assert_eq!(AccountType::Asset.balance_effect(TransactionDirection::Debit, amount), amount);
        assert_eq!(AccountType::Asset.balance_effect(TransactionDirection::Credit, amount), -amount);
        assert_eq!(AccountType::Liability.balance_effect(TransactionDirection::Credit, amount), amount);
        assert_eq!(AccountType::Income.balance_effect(TransactionDirection::Debit, amount), -amount);
        assert_eq!(AccountType::Expense.balance_effect(TransactionDirection::Debit, amount), amount);
    }

    #[test]
    fn test_account_type_labels() {
        let json = serde_json::to_string(&AccountType::Liability).unwrap();
        assert_eq!(json, "\"liability\"");
        assert_eq!(AccountType::Equity.as_str(), "equity");
    }
}
