/// Ledger transactions
///
/// A transaction posts a positive amount to one account as either a debit or
/// a credit. Recording and deleting a transaction both adjust the account
/// balance inside the same database transaction, with the account row locked
/// so concurrent postings cannot lose an update.
///
/// Transactions matched by a completed reconciliation are frozen.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::account::AccountType;
use super::reconciliation;
use super::ModelError;
use crate::pagination::{Page, PageParams};

const TRANSACTION_COLUMNS: &str = "id, account_id, transaction_date, description, amount, \
                                   direction, reference, created_by, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    Debit,
    Credit,
}

impl TransactionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::Debit => "debit",
            TransactionDirection::Credit => "credit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_date: NaiveDate,
    pub description: String,

    /// Always positive; `direction` carries the sign
    pub amount: Decimal,

    pub direction: TransactionDirection,
    pub reference: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub account_id: Uuid,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: TransactionDirection,
    pub reference: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub account_id: Option<Uuid>,
    pub direction: Option<TransactionDirection>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TransactionFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(account_id) = self.account_id {
            builder.push(" AND account_id = ").push_bind(account_id);
        }
        if let Some(direction) = self.direction {
            builder.push(" AND direction = ").push_bind(direction);
        }
        if let Some(from) = self.date_from {
            builder.push(" AND transaction_date >= ").push_bind(from);
        }
        if let Some(to) = self.date_to {
            builder.push(" AND transaction_date <= ").push_bind(to);
        }
    }
}

impl Transaction {
    /// Records a transaction and moves the account balance
    ///
    /// # Errors
    ///
    /// - `Invalid` for a non-positive amount or an inactive account
    /// - `NotFound` if the account does not exist
    pub async fn create(pool: &PgPool, data: CreateTransaction) -> Result<Self, ModelError> {
        if data.amount <= Decimal::ZERO {
            return Err(ModelError::invalid("amount", "Amount must be greater than zero"));
        }

        let mut tx = pool.begin().await?;

        let (account_type, is_active): (AccountType, bool) = sqlx::query_as(
            "SELECT account_type, is_active FROM accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(data.account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ModelError::NotFound("Account"))?;

        if !is_active {
            return Err(ModelError::invalid("account_id", "Account is inactive"));
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions \
             (account_id, transaction_date, description, amount, direction, reference, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            TRANSACTION_COLUMNS
        ))
        .bind(data.account_id)
        .bind(data.transaction_date)
        .bind(data.description)
        .bind(data.amount)
        .bind(data.direction)
        .bind(data.reference)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let effect = account_type.balance_effect(transaction.direction, transaction.amount);
        sqlx::query("UPDATE accounts SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
            .bind(effect)
            .bind(transaction.account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            transaction_id = %transaction.id,
            account_id = %transaction.account_id,
            amount = %transaction.amount,
            direction = transaction.direction.as_str(),
            "Transaction recorded"
        );
        Ok(transaction)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &TransactionFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM transactions",
            TRANSACTION_COLUMNS
        ));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY transaction_date DESC, created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<Transaction>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    /// Most recent transactions of one account
    pub async fn recent_for_account(
        pool: &PgPool,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE account_id = $1 \
             ORDER BY transaction_date DESC, created_at DESC LIMIT $2",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Deletes a transaction and reverses its balance effect
    ///
    /// A match in an in-progress reconciliation is dropped along with it and
    /// that reconciliation's balance and difference are recomputed.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a completed reconciliation includes the transaction
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ModelError> {
        let mut tx = pool.begin().await?;

        // Reconciliation rows before the transaction row, the order matching takes
        let matched_by: Vec<Uuid> = sqlx::query_scalar(
            "SELECT reconciliation_id FROM reconciliation_items \
             WHERE transaction_id = $1 ORDER BY reconciliation_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for reconciliation_id in matched_by {
            reconciliation::lock_open(&mut tx, reconciliation_id)
                .await
                .map_err(|err| match err {
                    ModelError::Conflict(_) => ModelError::Conflict(
                        "Transaction belongs to a completed reconciliation".to_string(),
                    ),
                    other => other,
                })?;
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ModelError::NotFound("Transaction"))?;

        let reconciled: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM reconciliation_items ri
                JOIN reconciliations r ON r.id = ri.reconciliation_id
                WHERE ri.transaction_id = $1 AND r.status = 'completed'
            )
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if reconciled {
            return Err(ModelError::Conflict(
                "Transaction belongs to a completed reconciliation".to_string(),
            ));
        }

        let account_type: AccountType =
            sqlx::query_scalar("SELECT account_type FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(transaction.account_id)
                .fetch_one(&mut *tx)
                .await?;

        let unmatched: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM reconciliation_items WHERE transaction_id = $1 RETURNING reconciliation_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let effect = account_type.balance_effect(transaction.direction, transaction.amount);
        sqlx::query("UPDATE accounts SET balance = balance - $1, updated_at = NOW() WHERE id = $2")
            .bind(effect)
            .bind(transaction.account_id)
            .execute(&mut *tx)
            .await?;

        for reconciliation_id in unmatched {
            reconciliation::refresh_open(&mut tx, reconciliation_id).await?;
        }

        tx.commit().await?;

        tracing::info!(transaction_id = %id, account_id = %transaction.account_id, "Transaction deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_labels() {
        assert_eq!(TransactionDirection::Debit.as_str(), "debit");
        let parsed: TransactionDirection = serde_json::from_str("\"credit\"").unwrap();
        assert_eq!(parsed, TransactionDirection::Credit);
    }
}
