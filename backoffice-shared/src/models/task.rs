/// Project tasks
///
/// Tasks belong to exactly one project and are deleted with it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::ModelError;
use crate::pagination::{Page, PageParams};

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, assignee_id, \
                            due_date, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Option<Uuid>>,
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
}

impl Task {
    /// Creates a task in an existing project
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, ModelError> {
        let project_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
                .bind(data.project_id)
                .fetch_one(pool)
                .await?;
        if !project_exists {
            return Err(ModelError::NotFound("Project"));
        }

        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (project_id, title, description, status, priority, assignee_id, due_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(data.project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status.unwrap_or(TaskStatus::Todo))
        .bind(data.priority.unwrap_or_default())
        .bind(data.assignee_id)
        .bind(data.due_date)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Tasks of one project, most urgent first
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: Uuid,
        filter: &TaskFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        fn push_where(builder: &mut QueryBuilder<'_, Postgres>, project_id: Uuid, filter: &TaskFilter) {
            builder.push(" WHERE project_id = ").push_bind(project_id);
            if let Some(status) = filter.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(assignee_id) = filter.assignee_id {
                builder.push(" AND assignee_id = ").push_bind(assignee_id);
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_where(&mut count, project_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        push_where(&mut query, project_id, filter);
        query
            .push(" ORDER BY priority DESC, due_date ASC NULLS LAST, created_at LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<Task>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateTask) -> Result<Self, ModelError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");
        if let Some(title) = data.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            builder.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            builder.push(", priority = ").push_bind(priority);
        }
        if let Some(assignee_id) = data.assignee_id {
            builder.push(", assignee_id = ").push_bind(assignee_id);
        }
        if let Some(due_date) = data.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(TASK_COLUMNS);

        builder
            .build_query_as::<Task>()
            .fetch_optional(pool)
            .await?
            .ok_or(ModelError::NotFound("Task"))
    }

    /// Moves a task to another column of the board
    pub async fn set_status(pool: &PgPool, id: Uuid, status: TaskStatus) -> Result<Self, ModelError> {
        Self::update(
            pool,
            id,
            UpdateTask {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
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
    fn test_default_priority_is_medium() {
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn test_status_and_priority_labels() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
        let priority: TaskPriority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(priority, TaskPriority::Urgent);
    }
}
