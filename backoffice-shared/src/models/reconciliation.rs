/// Bank statements and reconciliations
///
/// A reconciliation ties one bank statement (account, period, opening and
/// closing balance) to the ledger transactions it covers. Staff match
/// transactions until the statement balances:
///
/// ```text
/// reconciled_balance = opening_balance + Σ effect(matched transaction)
/// difference         = closing_balance − reconciled_balance
/// ```
///
/// where `effect` is the signed change the transaction made to the account.
/// Only a reconciliation with a zero difference can be completed, and a
/// completed reconciliation is read-only.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use uuid::Uuid;

use super::account::AccountType;
use super::transaction::{Transaction, TransactionDirection};
use super::ModelError;
use crate::pagination::{Page, PageParams};

const RECONCILIATION_COLUMNS: &str = "id, bank_statement_id, status, reconciled_balance, \
                                      difference, created_by, completed_at, created_at, updated_at";

const STATEMENT_COLUMNS: &str = "id, account_id, period_start, period_end, opening_balance, \
                                 closing_balance, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reconciliation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BankStatement {
    pub id: Uuid,
    pub account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl BankStatement {
    /// Whether a transaction falls inside this statement
    pub fn covers(&self, transaction: &Transaction) -> bool {
        transaction.account_id == self.account_id
            && transaction.transaction_date >= self.period_start
            && transaction.transaction_date <= self.period_end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reconciliation {
    pub id: Uuid,
    pub bank_statement_id: Uuid,
    pub status: ReconciliationStatus,
    pub reconciled_balance: Decimal,
    pub difference: Decimal,
    pub created_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row for the reconciliation index
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReconciliationSummary {
    pub id: Uuid,
    pub status: ReconciliationStatus,
    pub account_id: Uuid,
    pub account_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub closing_balance: Decimal,
    pub difference: Decimal,
    pub matched_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Everything the reconciliation screen needs
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationDetail {
    pub reconciliation: Reconciliation,
    pub statement: BankStatement,

    /// Transactions already matched
    pub matched: Vec<Transaction>,

    /// In-period transactions of the account not matched by any reconciliation
    pub candidates: Vec<Transaction>,
}

#[derive(Debug, Clone)]
pub struct CreateReconciliation {
    pub account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub created_by: Option<Uuid>,
}

/// Returns `(reconciled_balance, difference)`
///
/// ```
/// use backoffice_shared::models::reconciliation::balance;
/// use rust_decimal::Decimal;
///
/// let (reconciled, difference) =
///     balance(Decimal::new(100, 0), Decimal::new(130, 0), [Decimal::new(50, 0), Decimal::new(-20, 0)]);
/// assert_eq!(reconciled, Decimal::new(130, 0));
/// assert!(difference.is_zero());
/// ```
pub fn balance(
    opening: Decimal,
    closing: Decimal,
    effects: impl IntoIterator<Item = Decimal>,
) -> (Decimal, Decimal) {
    let reconciled = opening + effects.into_iter().sum::<Decimal>();
    (reconciled, closing - reconciled)
}

impl Reconciliation {
    /// Records a bank statement and opens a reconciliation for it
    pub async fn create(pool: &PgPool, data: CreateReconciliation) -> Result<Self, ModelError> {
        if data.period_end < data.period_start {
            return Err(ModelError::invalid("period_end", "Period end cannot be before period start"));
        }

        let mut tx = pool.begin().await?;

        let account_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                .bind(data.account_id)
                .fetch_one(&mut *tx)
                .await?;
        if !account_exists {
            return Err(ModelError::NotFound("Account"));
        }

        let statement_id: Uuid = sqlx::query_scalar(
            "INSERT INTO bank_statements \
             (account_id, period_start, period_end, opening_balance, closing_balance) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(data.account_id)
        .bind(data.period_start)
        .bind(data.period_end)
        .bind(data.opening_balance)
        .bind(data.closing_balance)
        .fetch_one(&mut *tx)
        .await?;

        let (reconciled, difference) =
            balance(data.opening_balance, data.closing_balance, std::iter::empty());

        let reconciliation = sqlx::query_as::<_, Reconciliation>(&format!(
            "INSERT INTO reconciliations (bank_statement_id, reconciled_balance, difference, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            RECONCILIATION_COLUMNS
        ))
        .bind(statement_id)
        .bind(reconciled)
        .bind(difference)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(reconciliation_id = %reconciliation.id, account_id = %data.account_id, "Reconciliation started");
        Ok(reconciliation)
    }

    pub async fn list(pool: &PgPool, params: PageParams) -> Result<Page<ReconciliationSummary>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reconciliations")
            .fetch_one(pool)
            .await?;

        let rows = sqlx::query_as::<_, ReconciliationSummary>(
            r#"
            SELECT r.id, r.status, s.account_id, a.name AS account_name,
                   s.period_start, s.period_end, s.closing_balance, r.difference,
                   (SELECT COUNT(*) FROM reconciliation_items ri WHERE ri.reconciliation_id = r.id) AS matched_count,
                   r.created_at
            FROM reconciliations r
            JOIN bank_statements s ON s.id = r.bank_statement_id
            JOIN accounts a ON a.id = s.account_id
            ORDER BY s.period_end DESC, r.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(rows, total, params))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reconciliation>(&format!(
            "SELECT {} FROM reconciliations WHERE id = $1",
            RECONCILIATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Statement, matched transactions and open candidates
    pub async fn detail(pool: &PgPool, id: Uuid) -> Result<Option<ReconciliationDetail>, sqlx::Error> {
        let Some(reconciliation) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let statement = sqlx::query_as::<_, BankStatement>(&format!(
            "SELECT {} FROM bank_statements WHERE id = $1",
            STATEMENT_COLUMNS
        ))
        .bind(reconciliation.bank_statement_id)
        .fetch_one(pool)
        .await?;

        let matched = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT t.id, t.account_id, t.transaction_date, t.description, t.amount,
                   t.direction, t.reference, t.created_by, t.created_at
            FROM transactions t
            JOIN reconciliation_items ri ON ri.transaction_id = t.id
            WHERE ri.reconciliation_id = $1
            ORDER BY t.transaction_date, t.created_at
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let candidates = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT t.id, t.account_id, t.transaction_date, t.description, t.amount,
                   t.direction, t.reference, t.created_by, t.created_at
            FROM transactions t
            WHERE t.account_id = $1
              AND t.transaction_date BETWEEN $2 AND $3
              AND NOT EXISTS (SELECT 1 FROM reconciliation_items ri WHERE ri.transaction_id = t.id)
            ORDER BY t.transaction_date, t.created_at
            "#,
        )
        .bind(statement.account_id)
        .bind(statement.period_start)
        .bind(statement.period_end)
        .fetch_all(pool)
        .await?;

        Ok(Some(ReconciliationDetail {
            reconciliation,
            statement,
            matched,
            candidates,
        }))
    }

    /// Matches transactions and recomputes the difference
    ///
    /// # Errors
    ///
    /// - `Conflict` if the reconciliation is completed
    /// - `Invalid` if a transaction is unknown, outside the statement, or
    ///   already matched elsewhere
    pub async fn match_transactions(
        pool: &PgPool,
        id: Uuid,
        transaction_ids: &[Uuid],
    ) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;
        let statement = lock_open(&mut tx, id).await?;

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, account_id, transaction_date, description, amount,
                   direction, reference, created_by, created_at
            FROM transactions
            WHERE id = ANY($1)
            "#,
        )
        .bind(transaction_ids)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(missing) = transaction_ids
            .iter()
            .find(|id| !transactions.iter().any(|t| t.id == **id))
        {
            return Err(ModelError::invalid(
                "transaction_ids",
                format!("Transaction {} does not exist", missing),
            ));
        }

        if let Some(outside) = transactions.iter().find(|t| !statement.covers(t)) {
            return Err(ModelError::invalid(
                "transaction_ids",
                format!(
                    "Transaction {} is not in the statement's account and period",
                    outside.id
                ),
            ));
        }

        let elsewhere: Option<Uuid> = sqlx::query_scalar(
            "SELECT transaction_id FROM reconciliation_items \
             WHERE transaction_id = ANY($1) AND reconciliation_id <> $2 LIMIT 1",
        )
        .bind(transaction_ids)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(transaction_id) = elsewhere {
            return Err(ModelError::invalid(
                "transaction_ids",
                format!("Transaction {} is already matched by another reconciliation", transaction_id),
            ));
        }

        sqlx::query(
            "INSERT INTO reconciliation_items (reconciliation_id, transaction_id) \
             SELECT $1, UNNEST($2::uuid[]) \
             ON CONFLICT (reconciliation_id, transaction_id) DO NOTHING",
        )
        .bind(id)
        .bind(transaction_ids)
        .execute(&mut *tx)
        .await?;

        let reconciliation = recompute(&mut tx, id, &statement).await?;
        tx.commit().await?;
        Ok(reconciliation)
    }

    /// Removes matches and recomputes the difference
    pub async fn unmatch_transactions(
        pool: &PgPool,
        id: Uuid,
        transaction_ids: &[Uuid],
    ) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;
        let statement = lock_open(&mut tx, id).await?;

        sqlx::query(
            "DELETE FROM reconciliation_items WHERE reconciliation_id = $1 AND transaction_id = ANY($2)",
        )
        .bind(id)
        .bind(transaction_ids)
        .execute(&mut *tx)
        .await?;

        let reconciliation = recompute(&mut tx, id, &statement).await?;
        tx.commit().await?;
        Ok(reconciliation)
    }

    /// Completes a balanced reconciliation
    ///
    /// # Errors
    ///
    /// - `Conflict` if it is already completed or the difference is not zero
    pub async fn complete(pool: &PgPool, id: Uuid) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;
        let statement = lock_open(&mut tx, id).await?;
        let current = recompute(&mut tx, id, &statement).await?;

        if !current.difference.is_zero() {
            return Err(ModelError::Conflict(format!(
                "Reconciliation is out of balance by {}",
                current.difference.round_dp(2)
            )));
        }

        let reconciliation = sqlx::query_as::<_, Reconciliation>(&format!(
            "UPDATE reconciliations SET status = 'completed', completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            RECONCILIATION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(reconciliation_id = %id, "Reconciliation completed");
        Ok(reconciliation)
    }

    /// Deletes an in-progress reconciliation together with its statement
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ModelError> {
        let mut tx = pool.begin().await?;
        let statement = lock_open(&mut tx, id).await?;

        sqlx::query("DELETE FROM bank_statements WHERE id = $1")
            .bind(statement.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Locks an in-progress reconciliation and returns its statement
pub(crate) async fn lock_open(
    tx: &mut PgTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<BankStatement, ModelError> {
    let (status, statement_id): (ReconciliationStatus, Uuid) = sqlx::query_as(
        "SELECT status, bank_statement_id FROM reconciliations WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ModelError::NotFound("Reconciliation"))?;

    if status == ReconciliationStatus::Completed {
        return Err(ModelError::Conflict(
            "Completed reconciliations cannot be changed".to_string(),
        ));
    }

    let statement = sqlx::query_as::<_, BankStatement>(&format!(
        "SELECT {} FROM bank_statements WHERE id = $1",
        STATEMENT_COLUMNS
    ))
    .bind(statement_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(statement)
}

/// Recomputes the stored balance of an in-progress reconciliation
///
/// Runs inside the caller's transaction, for changes made to matched
/// transactions from outside this module.
pub(crate) async fn refresh_open(
    tx: &mut PgTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Reconciliation, ModelError> {
    let statement = lock_open(tx, id).await?;
    Ok(recompute(tx, id, &statement).await?)
}

async fn recompute(
    tx: &mut PgTransaction<'_, Postgres>,
    id: Uuid,
    statement: &BankStatement,
) -> Result<Reconciliation, sqlx::Error> {
    let account_type: AccountType = sqlx::query_scalar("SELECT account_type FROM accounts WHERE id = $1")
        .bind(statement.account_id)
        .fetch_one(&mut **tx)
        .await?;

    let matched: Vec<(Decimal, TransactionDirection)> = sqlx::query_as(
        "SELECT t.amount, t.direction FROM transactions t \
         JOIN reconciliation_items ri ON ri.transaction_id = t.id \
         WHERE ri.reconciliation_id = $1",
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await?;

    let (reconciled, difference) = balance(
        statement.opening_balance,
        statement.closing_balance,
        matched
            .into_iter()
            .map(|(amount, direction)| account_type.balance_effect(direction, amount)),
    );

    sqlx::query_as::<_, Reconciliation>(&format!(
        "UPDATE reconciliations SET reconciled_balance = $2, difference = $3, updated_at = NOW() \
         WHERE id = $1 RETURNING {}",
        RECONCILIATION_COLUMNS
    ))
    .bind(id)
    .bind(reconciled)
    .bind(difference)
    .fetch_one(&mut **tx)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn statement(account_id: Uuid) -> BankStatement {
        BankStatement {
            id: Uuid::new_v4(),
            account_id,
            period_start: date(1),
            period_end: date(31),
            opening_balance: dec("1000"),
            closing_balance: dec("1250.75"),
            created_at: Utc::now(),
        }
    }

    fn transaction(account_id: Uuid, day: u32) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account_id,
            transaction_date: date(day),
            description: "Deposit".to_string(),
            amount: dec("10"),
            direction: TransactionDirection::Debit,
            reference: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_with_no_matches() {
        let (reconciled, difference) = balance(dec("1000"), dec("1250.75"), std::iter::empty());
        assert_eq!(reconciled, dec("1000"));
        assert_eq!(difference, dec("250.75"));
    }

    #[test]
    fn test_balance_reaches_zero() {
        let (reconciled, difference) =
            balance(dec("1000"), dec("1250.75"), [dec("300"), dec("-49.25")]);
        assert_eq!(reconciled, dec("1250.75"));
        assert!(difference.is_zero());
    }

    #[test]
    fn test_statement_covers_account_and_period() {
        let account = Uuid::new_v4();
        let statement = statement(account);

        assert!(statement.covers(&transaction(account, 1)));
        assert!(statement.covers(&transaction(account, 31)));
        assert!(!statement.covers(&transaction(Uuid::new_v4(), 15)));

        let mut late = transaction(account, 15);
        late.transaction_date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(!statement.covers(&late));
    }
}
