/// Guest inquiries submitted through the public contact form
///
/// Inquiries arrive unauthenticated, start as `new` and are worked through
/// `in_progress` to `resolved` or `closed` by support staff. Status changes
/// are free-form; any status can be set from any other.
///
/// Listing and export share one filter implementation ([`InquiryFilter`]) so
/// the CSV always contains exactly what the index page shows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, ModelError};
use crate::export::CsvExport;
use crate::pagination::{Page, PageParams};

const INQUIRY_COLUMNS: &str = "id, name, email, phone, subject, message, status, source, \
                               ip_address, notes, created_at, updated_at";

/// Inquiry workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "inquiry_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    New,
    InProgress,
    Resolved,
    Closed,
}

impl InquiryStatus {
    /// All statuses in workflow order
    pub const ALL: [InquiryStatus; 4] = [
        InquiryStatus::New,
        InquiryStatus::InProgress,
        InquiryStatus::Resolved,
        InquiryStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::New => "new",
            InquiryStatus::InProgress => "in_progress",
            InquiryStatus::Resolved => "resolved",
            InquiryStatus::Closed => "closed",
        }
    }
}

/// Listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquirySort {
    #[default]
    Newest,
    Oldest,
}

/// Guest inquiry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GuestInquiry {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: InquiryStatus,

    /// Where the inquiry came from (`website` unless the form says otherwise)
    pub source: String,

    pub ip_address: Option<String>,

    /// Internal notes, never shown to the guest
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CsvExport for GuestInquiry {
    fn headers() -> &'static [&'static str] {
        &[
            "ID",
            "Name",
            "Email",
            "Phone",
            "Subject",
            "Message",
            "Status",
            "Source",
            "Submitted At",
        ]
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone().unwrap_or_default(),
            self.subject.clone(),
            self.message.clone(),
            self.status.as_str().to_string(),
            self.source.clone(),
            self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]
    }
}

/// Input for a public submission
#[derive(Debug, Clone)]
pub struct CreateGuestInquiry {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub source: Option<String>,
    pub ip_address: Option<String>,
}

/// Staff-side update; `notes: Some(None)` clears the notes
#[derive(Debug, Clone, Default)]
pub struct UpdateGuestInquiry {
    pub status: Option<InquiryStatus>,
    pub notes: Option<Option<String>>,
}

/// Filters shared by the index page and the CSV export
#[derive(Debug, Clone, Default)]
pub struct InquiryFilter {
    /// Matches name, email or subject
    pub search: Option<String>,
    pub status: Option<InquiryStatus>,

    /// Inclusive, compared against the submission date
    pub date_from: Option<NaiveDate>,

    /// Inclusive, compared against the submission date
    pub date_to: Option<NaiveDate>,

    pub sort: InquirySort,
}

impl InquiryFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR subject ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }

        if let Some(from) = self.date_from {
            builder.push(" AND created_at::date >= ").push_bind(from);
        }

        if let Some(to) = self.date_to {
            builder.push(" AND created_at::date <= ").push_bind(to);
        }
    }

    fn push_order(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(match self.sort {
            InquirySort::Newest => " ORDER BY created_at DESC, id DESC",
            InquirySort::Oldest => " ORDER BY created_at ASC, id ASC",
        });
    }

    /// Full select for the export cursor
    pub fn export_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM guest_inquiries", INQUIRY_COLUMNS));
        self.push_where(&mut builder);
        self.push_order(&mut builder);
        builder
    }
}

/// Number of inquiries per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
    pub total: i64,
}

impl StatusCounts {
    /// Folds `(status, count)` rows into the summary
    pub fn from_rows(rows: &[(InquiryStatus, i64)]) -> Self {
        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status {
                InquiryStatus::New => counts.new += count,
                InquiryStatus::InProgress => counts.in_progress += count,
                InquiryStatus::Resolved => counts.resolved += count,
                InquiryStatus::Closed => counts.closed += count,
            }
            counts.total += count;
        }
        counts
    }
}

impl GuestInquiry {
    /// Records a public submission
    pub async fn create(pool: &PgPool, data: CreateGuestInquiry) -> Result<Self, sqlx::Error> {
        let source = data
            .source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "website".to_string());

        sqlx::query_as::<_, GuestInquiry>(&format!(
            "INSERT INTO guest_inquiries (name, email, phone, subject, message, source, ip_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            INQUIRY_COLUMNS
        ))
        .bind(data.name.trim().to_string())
        .bind(data.email.trim().to_string())
        .bind(data.phone.filter(|p| !p.trim().is_empty()))
        .bind(data.subject.trim().to_string())
        .bind(data.message)
        .bind(source)
        .bind(data.ip_address)
        .fetch_one(pool)
        .await
    }

    /// Finds an inquiry by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, GuestInquiry>(&format!(
            "SELECT {} FROM guest_inquiries WHERE id = $1",
            INQUIRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists inquiries matching the filter
    pub async fn list(
        pool: &PgPool,
        filter: &InquiryFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM guest_inquiries");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM guest_inquiries", INQUIRY_COLUMNS));
        filter.push_where(&mut query);
        filter.push_order(&mut query);
        query
            .push(" LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<GuestInquiry>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    /// Per-status counts across all inquiries
    pub async fn status_counts(pool: &PgPool) -> Result<StatusCounts, sqlx::Error> {
        let rows: Vec<(InquiryStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM guest_inquiries GROUP BY status")
                .fetch_all(pool)
                .await?;

        Ok(StatusCounts::from_rows(&rows))
    }

    /// Updates status and/or notes
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateGuestInquiry,
    ) -> Result<Self, ModelError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("UPDATE guest_inquiries SET updated_at = NOW()");
        if let Some(status) = data.status {
            builder.push(", status = ").push_bind(status);
        }
        if let Some(notes) = data.notes {
            builder.push(", notes = ").push_bind(notes);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(INQUIRY_COLUMNS);

        builder
            .build_query_as::<GuestInquiry>()
            .fetch_optional(pool)
            .await?
            .ok_or(ModelError::NotFound("Guest inquiry"))
    }

    /// Sets the status of several inquiries at once; returns rows changed
    pub async fn bulk_update_status(
        pool: &PgPool,
        ids: &[Uuid],
        status: InquiryStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE guest_inquiries SET status = $1, updated_at = NOW() WHERE id = ANY($2)",
        )
        .bind(status)
        .bind(ids)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes an inquiry
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM guest_inquiries WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts inquiries still marked `new`
    pub async fn count_new(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM guest_inquiries WHERE status = 'new'")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::csv_chunk;
    use chrono::TimeZone;

    fn inquiry() -> GuestInquiry {
        GuestInquiry {
            id: Uuid::nil(),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            subject: "Pricing".to_string(),
            message: "Hello, do you ship abroad?".to_string(),
            status: InquiryStatus::InProgress,
            source: "website".to_string(),
            ip_address: Some("203.0.113.7".to_string()),
            notes: Some("called back".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_status_serde_matches_database_labels() {
        for status in InquiryStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_csv_row_layout() {
        let bytes = csv_chunk(&[inquiry()], true).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "ID,Name,Email,Phone,Subject,Message,Status,Source,Submitted At"
        );
        assert_eq!(
            lines.next().unwrap(),
            "00000000-0000-0000-0000-000000000000,Jane Doe,jane@example.com,,Pricing,\
             \"Hello, do you ship abroad?\",in_progress,website,2026-03-01 09:30:00"
        );
    }

    #[test]
    fn test_status_counts_from_rows() {
        let counts = StatusCounts::from_rows(&[
            (InquiryStatus::New, 4),
            (InquiryStatus::Closed, 2),
        ]);

        assert_eq!(counts.new, 4);
        assert_eq!(counts.in_progress, 0);
        assert_eq!(counts.closed, 2);
        assert_eq!(counts.total, 6);
    }

    #[test]
    fn test_export_query_applies_filters_and_order() {
        let filter = InquiryFilter {
            search: Some("acme".to_string()),
            status: Some(InquiryStatus::New),
            date_from: NaiveDate::from_ymd_opt(2026, 1, 1),
            date_to: None,
            sort: InquirySort::Oldest,
        };

        let builder = filter.export_query();
        let sql = builder.sql();

        assert!(sql.contains("name ILIKE $1 OR email ILIKE $2 OR subject ILIKE $3"));
        assert!(sql.contains("status = $4"));
        assert!(sql.contains("created_at::date >= $5"));
        assert!(!sql.contains("created_at::date <="));
        assert!(sql.ends_with("ORDER BY created_at ASC, id ASC"));
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let builder = InquiryFilter::default().export_query();
        let sql = builder.sql();
        assert!(sql.ends_with("ORDER BY created_at DESC, id DESC"));
        assert!(!sql.contains("ILIKE"));
    }
}
