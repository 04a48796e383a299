/// Projects
///
/// A project groups tasks and has an optional owner and date range. Task
/// counts per status are computed on read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::task::TaskStatus;
use super::{like_pattern, ModelError};
use crate::pagination::{Page, PageParams};

const PROJECT_COLUMNS: &str =
    "id, name, description, status, start_date, end_date, owner_id, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Number of tasks in each status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub todo: i64,
    pub in_progress: i64,
    pub review: i64,
    pub done: i64,
    pub total: i64,
}

impl TaskCounts {
    pub fn from_rows(rows: &[(TaskStatus, i64)]) -> Self {
        let mut counts = TaskCounts::default();
        for (status, count) in rows {
            match status {
                TaskStatus::Todo => counts.todo += count,
                TaskStatus::InProgress => counts.in_progress += count,
                TaskStatus::Review => counts.review += count,
                TaskStatus::Done => counts.done += count,
            }
            counts.total += count;
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub task_counts: TaskCounts,
}

#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub owner_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,

    /// Matches name or description
    pub search: Option<String>,
}

impl ProjectFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), ModelError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ModelError::invalid(
            "end_date",
            "End date cannot be before the start date",
        )),
        _ => Ok(()),
    }
}

impl Project {
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, ModelError> {
        check_dates(data.start_date, data.end_date)?;

        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects (name, description, status, start_date, end_date, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.status.unwrap_or(ProjectStatus::Planned))
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.owner_id)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Project plus task counts per status
    pub async fn detail(pool: &PgPool, id: Uuid) -> Result<Option<ProjectDetail>, sqlx::Error> {
        let Some(project) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let rows: Vec<(TaskStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks WHERE project_id = $1 GROUP BY status")
                .bind(id)
                .fetch_all(pool)
                .await?;

        Ok(Some(ProjectDetail {
            project,
            task_counts: TaskCounts::from_rows(&rows),
        }))
    }

    pub async fn list(
        pool: &PgPool,
        filter: &ProjectFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM projects", PROJECT_COLUMNS));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<Project>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateProject) -> Result<Self, ModelError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(ModelError::NotFound("Project"))?;

        let start_date = data.start_date.unwrap_or(existing.start_date);
        let end_date = data.end_date.unwrap_or(existing.end_date);
        check_dates(start_date, end_date)?;

        let project = sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects SET name = $2, description = $3, status = $4, start_date = $5, \
             end_date = $6, owner_id = $7, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(data.name.unwrap_or(existing.name))
        .bind(data.description.unwrap_or(existing.description))
        .bind(data.status.unwrap_or(existing.status))
        .bind(start_date)
        .bind(end_date)
        .bind(data.owner_id.unwrap_or(existing.owner_id))
        .fetch_optional(pool)
        .await?
        .ok_or(ModelError::NotFound("Project"))?;

        Ok(project)
    }

    /// Deletes a project and, by cascade, its tasks
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dates() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1);
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1);

        assert!(check_dates(jan, feb).is_ok());
        assert!(check_dates(jan, jan).is_ok());
        assert!(check_dates(None, feb).is_ok());
        assert!(check_dates(feb, None).is_ok());
        assert!(check_dates(feb, jan).is_err());
    }

    #[test]
    fn test_task_counts_from_rows() {
        let counts = TaskCounts::from_rows(&[
            (TaskStatus::Todo, 3),
            (TaskStatus::Done, 5),
            (TaskStatus::Review, 1),
        ]);

        assert_eq!(counts.todo, 3);
        assert_eq!(counts.in_progress, 0);
        assert_eq!(counts.review, 1);
        assert_eq!(counts.done, 5);
        assert_eq!(counts.total, 9);
    }

    #[test]
    fn test_project_status_labels() {
        let json = serde_json::to_string(&ProjectStatus::OnHold).unwrap();
        assert_eq!(json, "\"on_hold\"");
    }
}
