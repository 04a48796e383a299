/// Customer invoices and their line items
///
/// Totals are never taken from the client. Every write that touches items or
/// the tax rate recomputes them with [`compute_totals`]:
///
/// ```text
/// item.amount = quantity × unit_price
/// subtotal    = Σ item.amount
/// tax_amount  = round(subtotal × tax_rate / 100, 2)
/// total       = subtotal + tax_amount
/// ```
///
/// Only drafts are editable. Status moves along a fixed graph:
///
/// ```text
/// draft ──▶ sent ──▶ paid
///   │        │  ╲
///   │        │   ▶ overdue ──▶ paid
///   ▼        ▼        │
/// cancelled ◀─────────┘
/// ```

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{like_pattern, ModelError};
use crate::export::CsvExport;
use crate::pagination::{Page, PageParams};

const INVOICE_COLUMNS: &str = "id, number, customer_name, customer_email, issue_date, due_date, \
                               status, subtotal, tax_rate, tax_amount, total, notes, created_by, \
                               created_at, updated_at";

const ITEM_COLUMNS: &str = "id, invoice_id, description, quantity, unit_price, amount, position";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the status graph has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;

        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Sent, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,

    /// `INV-YYYYMM-NNNN` unless given explicitly
    pub number: String,

    pub customer_name: String,
    pub customer_email: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub subtotal: Decimal,

    /// Percentage, e.g. `7.5`
    pub tax_rate: Decimal,

    pub tax_amount: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub position: i32,
}

/// Invoice plus its items, as returned by show
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// One line as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Exclusive upper bound for stored money columns, NUMERIC(19, 4)
const AMOUNT_LIMIT: i64 = 1_000_000_000_000_000;

fn amount_limit() -> Decimal {
    Decimal::from(AMOUNT_LIMIT)
}

fn out_of_range(what: &str) -> ModelError {
    ModelError::invalid("items", format!("{} is too large", what))
}

impl InvoiceItemInput {
    /// Line amount, quantity times unit price
    ///
    /// Fails with `Invalid` when the product does not fit a stored amount.
    pub fn amount(&self) -> Result<Decimal, ModelError> {
        self.quantity
            .checked_mul(self.unit_price)
            .map(|amount| amount.round_dp(4))
            .filter(|amount| *amount < amount_limit())
            .ok_or_else(|| out_of_range(&format!("Amount for \"{}\"", self.description)))
    }
}

/// Derived invoice amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Computes subtotal, tax and total for a set of lines
///
/// ```
/// use backoffice_shared::models::invoice::{compute_totals, InvoiceItemInput};
/// use rust_decimal::Decimal;
///
/// let items = vec![InvoiceItemInput {
///     description: "Consulting".into(),
///     quantity: Decimal::new(3, 0),
///     unit_price: Decimal::new(10000, 2),
/// }];
/// let totals = compute_totals(&items, Decimal::new(10, 0)).unwrap();
/// assert_eq!(totals.total, Decimal::new(33000, 2));
/// ```
pub fn compute_totals(items: &[InvoiceItemInput], tax_rate: Decimal) -> Result<Totals, ModelError> {
    let mut subtotal = Decimal::ZERO;
    for item in items {
        subtotal = subtotal
            .checked_add(item.amount()?)
            .ok_or_else(|| out_of_range("Subtotal"))?;
    }

    let tax_amount = subtotal
        .checked_mul(tax_rate)
        .and_then(|t| t.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| out_of_range("Tax amount"))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let total = subtotal
        .checked_add(tax_amount)
        .filter(|total| *total < amount_limit())
        .ok_or_else(|| out_of_range("Total"))?;

    Ok(Totals {
        subtotal,
        tax_amount,
        total,
    })
}

/// Checks lines and header fields shared by create and update
pub fn validate_invoice(
    items: &[InvoiceItemInput],
    tax_rate: Decimal,
    issue_date: NaiveDate,
    due_date: NaiveDate,
) -> Result<(), ModelError> {
    if items.is_empty() {
        return Err(ModelError::invalid("items", "An invoice needs at least one item"));
    }
    if let Some(item) = items.iter().find(|i| i.quantity <= Decimal::ZERO) {
        return Err(ModelError::invalid(
            "items",
            format!("Quantity for \"{}\" must be greater than zero", item.description),
        ));
    }
    if let Some(item) = items.iter().find(|i| i.unit_price < Decimal::ZERO) {
        return Err(ModelError::invalid(
            "items",
            format!("Unit price for \"{}\" cannot be negative", item.description),
        ));
    }
    if let Some(item) = items
        .iter()
        .find(|i| i.quantity >= amount_limit() || i.unit_price >= amount_limit())
    {
        return Err(out_of_range(&format!("Quantity or unit price for \"{}\"", item.description)));
    }
    if items.iter().any(|i| i.description.trim().is_empty()) {
        return Err(ModelError::invalid("items", "Every item needs a description"));
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(ModelError::invalid("tax_rate", "Tax rate must be between 0 and 100"));
    }
    if due_date < issue_date {
        return Err(ModelError::invalid("due_date", "Due date cannot be before the issue date"));
    }
    Ok(())
}

/// Next number in the monthly sequence, e.g. `INV-202603-0007`
///
/// `last` is the highest sequence already issued with the same prefix,
/// compared numerically so `INV-202603-10000` follows `INV-202603-9999`.
pub fn next_invoice_number(issue_date: NaiveDate, last: Option<i64>) -> String {
    let sequence = last.unwrap_or(0).max(0) + 1;
    format!("{}{:04}", invoice_number_prefix(issue_date), sequence)
}

fn invoice_number_prefix(issue_date: NaiveDate) -> String {
    format!("INV-{:04}{:02}-", issue_date.year(), issue_date.month())
}

#[derive(Debug, Clone)]
pub struct CreateInvoice {
    /// Generated when `None`
    pub number: Option<String>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemInput>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub customer_name: Option<String>,
    pub customer_email: Option<Option<String>>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<Option<String>>,

    /// Replaces every line when present
    pub items: Option<Vec<InvoiceItemInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,

    /// Matches number, customer name or customer email
    pub search: Option<String>,
}

impl InvoiceFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (number ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR customer_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR customer_email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    /// Full select for the export cursor
    pub fn export_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {} FROM invoices", INVOICE_COLUMNS));
        self.push_where(&mut builder);
        builder.push(" ORDER BY issue_date DESC, number DESC");
        builder
    }
}

impl CsvExport for Invoice {
    fn headers() -> &'static [&'static str] {
        &[
            "Number",
            "Customer",
            "Email",
            "Issue Date",
            "Due Date",
            "Status",
            "Subtotal",
            "Tax",
            "Total",
        ]
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.number.clone(),
            self.customer_name.clone(),
            self.customer_email.clone().unwrap_or_default(),
            self.issue_date.to_string(),
            self.due_date.to_string(),
            self.status.as_str().to_string(),
            self.subtotal.round_dp(2).to_string(),
            self.tax_amount.round_dp(2).to_string(),
            self.total.round_dp(2).to_string(),
        ]
    }
}

impl Invoice {
    /// Creates a draft invoice with its items
    pub async fn create(pool: &PgPool, data: CreateInvoice) -> Result<InvoiceWithItems, ModelError> {
        validate_invoice(&data.items, data.tax_rate, data.issue_date, data.due_date)?;
        let totals = compute_totals(&data.items, data.tax_rate)?;

        let mut tx = pool.begin().await?;

        let number = match data.number.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(number) => number,
            None => generate_number(&mut tx, data.issue_date).await?,
        };

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "INSERT INTO invoices \
             (number, customer_name, customer_email, issue_date, due_date, status, \
              subtotal, tax_rate, tax_amount, total, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7, $8, $9, $10, $11) RETURNING {}",
            INVOICE_COLUMNS
        ))
        .bind(number)
        .bind(data.customer_name)
        .bind(data.customer_email)
        .bind(data.issue_date)
        .bind(data.due_date)
        .bind(totals.subtotal)
        .bind(data.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(data.notes)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let items = insert_items(&mut tx, invoice.id, &data.items).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id, number = %invoice.number, total = %invoice.total, "Invoice created");
        Ok(InvoiceWithItems { invoice, items })
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Loads an invoice with its items in position order
    pub async fn find_with_items(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<InvoiceWithItems>, sqlx::Error> {
        let Some(invoice) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = $1 ORDER BY position",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    pub async fn list(
        pool: &PgPool,
        filter: &InvoiceFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM invoices");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM invoices", INVOICE_COLUMNS));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY issue_date DESC, number DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<Invoice>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    /// Edits a draft invoice and recomputes its totals
    ///
    /// # Errors
    ///
    /// - `Conflict` if the invoice is no longer a draft
    /// - `Invalid` if the resulting invoice breaks a validation rule
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateInvoice,
    ) -> Result<InvoiceWithItems, ModelError> {
        let mut tx = pool.begin().await?;
        let existing = lock_invoice(&mut tx, id).await?;

        if existing.status != InvoiceStatus::Draft {
            return Err(ModelError::Conflict(format!(
                "Only draft invoices can be edited; this one is {}",
                existing.status.as_str()
            )));
        }

        let items: Vec<InvoiceItemInput> = match data.items {
            Some(items) => items,
            None => sqlx::query_as::<_, (String, Decimal, Decimal)>(
                "SELECT description, quantity, unit_price FROM invoice_items \
                 WHERE invoice_id = $1 ORDER BY position",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|(description, quantity, unit_price)| InvoiceItemInput {
                description,
                quantity,
                unit_price,
            })
            .collect(),
        };

        let tax_rate = data.tax_rate.unwrap_or(existing.tax_rate);
        let issue_date = data.issue_date.unwrap_or(existing.issue_date);
        let due_date = data.due_date.unwrap_or(existing.due_date);
        validate_invoice(&items, tax_rate, issue_date, due_date)?;
        let totals = compute_totals(&items, tax_rate)?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices SET customer_name = $2, customer_email = $3, issue_date = $4, \
             due_date = $5, tax_rate = $6, notes = $7, subtotal = $8, tax_amount = $9, \
             total = $10, updated_at = NOW() WHERE id = $1 RETURNING {}",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(data.customer_name.unwrap_or(existing.customer_name))
        .bind(data.customer_email.unwrap_or(existing.customer_email))
        .bind(issue_date)
        .bind(due_date)
        .bind(tax_rate)
        .bind(data.notes.unwrap_or(existing.notes))
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let items = insert_items(&mut tx, id, &items).await?;

        tx.commit().await?;
        Ok(InvoiceWithItems { invoice, items })
    }

    /// Moves an invoice along the status graph
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        next: InvoiceStatus,
    ) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;
        let existing = lock_invoice(&mut tx, id).await?;

        if !existing.status.can_transition_to(next) {
            return Err(ModelError::Conflict(format!(
                "Cannot change invoice status from {} to {}",
                existing.status.as_str(),
                next.as_str()
            )));
        }

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            invoice_id = %id,
            from = existing.status.as_str(),
            to = next.as_str(),
            "Invoice status changed"
        );
        Ok(invoice)
    }

    /// Deletes a draft invoice
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ModelError> {
        let mut tx = pool.begin().await?;
        let existing = lock_invoice(&mut tx, id).await?;

        if existing.status != InvoiceStatus::Draft {
            return Err(ModelError::Conflict(
                "Only draft invoices can be deleted; cancel it instead".to_string(),
            ));
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn lock_invoice(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Invoice, ModelError> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {} FROM invoices WHERE id = $1 FOR UPDATE",
        INVOICE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ModelError::NotFound("Invoice"))
}

/// Serializes number generation per transaction with an advisory lock
async fn generate_number(
    tx: &mut Transaction<'_, Postgres>,
    issue_date: NaiveDate,
) -> Result<String, sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext('invoice_number'))")
        .execute(&mut **tx)
        .await?;

    // Custom numbers sharing the prefix are ignored unless fully numeric
    let pattern = format!("^{}([0-9]{{1,18}})$", invoice_number_prefix(issue_date));
    let last: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(CAST(SUBSTRING(number FROM $1) AS BIGINT)) FROM invoices WHERE number ~ $1",
    )
    .bind(pattern)
    .fetch_one(&mut **tx)
    .await?;

    Ok(next_invoice_number(issue_date, last))
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    items: &[InvoiceItemInput],
) -> Result<Vec<InvoiceItem>, ModelError> {
    let mut saved = Vec::with_capacity(items.len());

    for (position, item) in items.iter().enumerate() {
        let row = sqlx::query_as::<_, InvoiceItem>(&format!(
            "INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, amount, position) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(invoice_id)
        .bind(item.description.trim().to_string())
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount()?)
        .bind(position as i32)
        .fetch_one(&mut **tx)
        .await?;

        saved.push(row);
    }

    Ok(saved)
}
