/// Expense claims
///
/// Expenses are submitted as `pending` and reviewed once: approve or reject.
/// Only pending expenses can be edited, reviewed or deleted, and the review
/// records who made the decision and when.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, ModelError};
use crate::pagination::{Page, PageParams};

const EXPENSE_COLUMNS: &str = "id, category, description, amount, expense_date, vendor, status, \
                               submitted_by, reviewed_by, reviewed_at, review_note, \
                               created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expense_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }
}

/// Outcome of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    fn status(&self) -> ExpenseStatus {
        match self {
            ReviewDecision::Approve => ExpenseStatus::Approved,
            ReviewDecision::Reject => ExpenseStatus::Rejected,
        }
    }
}

/// Refuses changes to an expense that has already been reviewed
pub fn ensure_pending(status: ExpenseStatus, action: &str) -> Result<(), ModelError> {
    if status != ExpenseStatus::Pending {
        return Err(ModelError::Conflict(format!(
            "Only pending expenses can be {}; this one is {}",
            action,
            status.as_str()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
    pub status: ExpenseStatus,
    pub submitted_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateExpense {
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
    pub submitted_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateExpense {
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,
    pub vendor: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub status: Option<ExpenseStatus>,
    pub category: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,

    /// Matches description or vendor
    pub search: Option<String>,
}

impl ExpenseFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            builder.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(from) = self.date_from {
            builder.push(" AND expense_date >= ").push_bind(from);
        }
        if let Some(to) = self.date_to {
            builder.push(" AND expense_date <= ").push_bind(to);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR vendor ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl Expense {
    pub async fn create(pool: &PgPool, data: CreateExpense) -> Result<Self, ModelError> {
        if data.amount <= Decimal::ZERO {
            return Err(ModelError::invalid("amount", "Amount must be greater than zero"));
        }

        let expense = sqlx::query_as::<_, Expense>(&format!(
            "INSERT INTO expenses (category, description, amount, expense_date, vendor, submitted_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            EXPENSE_COLUMNS
        ))
        .bind(data.category.trim().to_string())
        .bind(data.description)
        .bind(data.amount)
        .bind(data.expense_date)
        .bind(data.vendor)
        .bind(data.submitted_by)
        .fetch_one(pool)
        .await?;

        Ok(expense)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {} FROM expenses WHERE id = $1",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &ExpenseFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM expenses");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM expenses", EXPENSE_COLUMNS));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY expense_date DESC, created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<Expense>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    /// Edits a pending expense
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateExpense) -> Result<Self, ModelError> {
        if data.amount.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(ModelError::invalid("amount", "Amount must be greater than zero"));
        }

        let mut tx = pool.begin().await?;
        let status = lock_status(&mut tx, id).await?;
        ensure_pending(status, "edited")?;

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE expenses SET updated_at = NOW()");
        if let Some(category) = data.category {
            builder.push(", category = ").push_bind(category.trim().to_string());
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(amount) = data.amount {
            builder.push(", amount = ").push_bind(amount);
        }
        if let Some(expense_date) = data.expense_date {
            builder.push(", expense_date = ").push_bind(expense_date);
        }
        if let Some(vendor) = data.vendor {
            builder.push(", vendor = ").push_bind(vendor);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(EXPENSE_COLUMNS);

        let expense = builder.build_query_as::<Expense>().fetch_one(&mut *tx).await?;
        tx.commit().await?;
        Ok(expense)
    }

    /// Approves or rejects a pending expense
    pub async fn review(
        pool: &PgPool,
        id: Uuid,
        decision: ReviewDecision,
        reviewer: Uuid,
        note: Option<String>,
    ) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;
        let status = lock_status(&mut tx, id).await?;
        ensure_pending(status, "reviewed")?;

        let expense = sqlx::query_as::<_, Expense>(&format!(
            "UPDATE expenses SET status = $2, reviewed_by = $3, reviewed_at = NOW(), \
             review_note = $4, updated_at = NOW() WHERE id = $1 RETURNING {}",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .bind(decision.status())
        .bind(reviewer)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            expense_id = %id,
            reviewer = %reviewer,
            status = expense.status.as_str(),
            "Expense reviewed"
        );
        Ok(expense)
    }

    /// Deletes a pending expense
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ModelError> {
        let mut tx = pool.begin().await?;
        let status = lock_status(&mut tx, id).await?;
        ensure_pending(status, "deleted")?;

        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn lock_status(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<ExpenseStatus, ModelError> {
    sqlx::query_scalar::<_, ExpenseStatus>("SELECT status FROM expenses WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ModelError::NotFound("Expense"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_expenses_change() {
        assert!(ensure_pending(ExpenseStatus::Pending, "approved").is_ok());

        let err = ensure_pending(ExpenseStatus::Approved, "edited").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only pending expenses can be edited; this one is approved"
        );
        assert!(ensure_pending(ExpenseStatus::Rejected, "reviewed").is_err());
    }

    #[test]
    fn test_review_decision_status() {
        assert_eq!(ReviewDecision::Approve.status(), ExpenseStatus::Approved);
        assert_eq!(ReviewDecision::Reject.status(), ExpenseStatus::Rejected);
    }
}
