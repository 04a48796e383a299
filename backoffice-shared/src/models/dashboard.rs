/// Dashboard summary counts
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct DashboardStats {
    pub users: i64,
    pub new_inquiries: i64,
    pub open_invoices: i64,

    /// Sum of totals of sent and overdue invoices
    pub outstanding_total: Decimal,

    pub pending_expenses: i64,
    pub active_projects: i64,

    /// Tasks not yet done
    pub open_tasks: i64,
}

impl DashboardStats {
    /// Collects every count in a single round trip
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM guest_inquiries WHERE status = 'new') AS new_inquiries,
                (SELECT COUNT(*) FROM invoices WHERE status IN ('sent', 'overdue')) AS open_invoices,
                (SELECT COALESCE(SUM(total), 0) FROM invoices WHERE status IN ('sent', 'overdue'))
                    AS outstanding_total,
                (SELECT COUNT(*) FROM expenses WHERE status = 'pending') AS pending_expenses,
                (SELECT COUNT(*) FROM projects WHERE status = 'active') AS active_projects,
                (SELECT COUNT(*) FROM tasks WHERE status <> 'done') AS open_tasks
            "#,
        )
        .fetch_one(pool)
        .await
    }
}
