//! Task queries, mutations and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use crate::db::{Database, finish};
use crate::error::{StoreError, StoreResult, ValidationErrors};
use crate::models::{Priority, Task, TaskStatus};
use crate::schema::{NewTask, TaskPatch, empty_as_none};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

const TASK_COLUMNS: &str = "id, title, description, status, priority, created_at, completed_at";

/// Filters and paging for a task listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn first_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for TaskQuery {
    fn default() -> Self {
        TaskQuery {
            status: None,
            priority: None,
            search: None,
            page: first_page(),
            limit: default_limit(),
        }
    }
}

impl TaskQuery {
    pub fn validated(mut self) -> StoreResult<Self> {
        let mut errors = ValidationErrors::new();
        if self.page < 1 {
            errors.add("page", "must be at least 1");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.limit) {
            errors.add("limit", format!("must be between 1 and {MAX_PAGE_SIZE}"));
        }
        errors.into_result()?;

        if self.search.as_deref().is_some_and(str::is_empty) {
            self.search = None;
        }
        Ok(self)
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }

    /// Appends the WHERE clause. Dimensions are ANDed; the search term
    /// matches title OR description.
    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut joiner = " WHERE ";
        if let Some(status) = self.status {
            qb.push(joiner).push("status = ").push_bind(status);
            joiner = " AND ";
        }
        if let Some(priority) = self.priority {
            qb.push(joiner).push("priority = ").push_bind(priority);
            joiner = " AND ";
        }
        if let Some(search) = &self.search {
            let pattern = like_pattern(search);
            qb.push(joiner)
                .push("(title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

/// Wraps `term` for a substring LIKE match, escaping LIKE's own wildcards so
/// they only match themselves.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    /// Matching rows before paging.
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub pending: i64,
    pub completion_rate: i64,
}

/// Whole-number percentage of completed tasks; 0 for an empty table.
pub fn completion_rate(completed: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as i64
}

/// Applies the present fields of `patch` to `task`, keeping `completed_at`
/// in step with the status.
pub fn apply_patch(task: &mut Task, patch: TaskPatch, now: DateTime<Utc>) {
    if let Some(title) = patch.title {
        task.title = title;
    }
    if let Some(description) = patch.description {
        task.description = description;
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(status) = patch.status {
        match status {
            TaskStatus::Completed if task.status != TaskStatus::Completed => {
                task.completed_at = Some(now);
            }
            TaskStatus::Completed => {}
            _ => task.completed_at = None,
        }
        task.status = status;
    }
}

impl Database {
    pub async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<TaskPage> {
        let mut conn = self.pool().acquire().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks");
        query.push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        query.push_filters(&mut select);
        select
            .push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(query.offset());
        let tasks = select.build_query_as::<Task>().fetch_all(&mut *conn).await?;

        Ok(TaskPage {
            tasks,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    pub async fn get_task(&self, id: i64) -> StoreResult<Task> {
        let mut conn = self.pool().acquire().await?;
        fetch_task(&mut conn, id).await
    }

    pub async fn create_task(&self, new: NewTask) -> StoreResult<Task> {
        let new = new.validated()?;
        let mut tx = self.begin().await?;
        let result = insert_task(&mut tx, &new, Utc::now()).await;
        let task = finish(tx, result).await?;

        info!(task_id = task.id, "task created");
        Ok(task)
    }

    pub async fn update_task(&self, id: i64, patch: TaskPatch) -> StoreResult<Task> {
        let patch = patch.validated()?;
        let mut tx = self.begin().await?;
        let result: StoreResult<Task> = async {
            let mut task = fetch_task(&mut tx, id).await?;
            apply_patch(&mut task, patch, Utc::now());
            write_task(&mut tx, &task).await?;
            Ok(task)
        }
        .await;
        let task = finish(tx, result).await?;

        debug!(task_id = id, status = %task.status, "task updated");
        Ok(task)
    }

    pub async fn delete_task(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        let result: StoreResult<()> = async {
            let deleted = sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if deleted == 0 {
                return Err(StoreError::NotFound { entity: "Task" });
            }
            Ok(())
        }
        .await;
        finish(tx, result).await?;

        info!(task_id = id, "task deleted");
        Ok(())
    }

    pub async fn task_stats(&self) -> StoreResult<TaskStats> {
        let counts: Vec<(TaskStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(self.pool())
                .await?;

        let mut stats = TaskStats {
            total: 0,
            completed: 0,
            in_progress: 0,
            pending: 0,
            completion_rate: 0,
        };
        for (status, n) in counts {
            stats.total += n;
            match status {
                TaskStatus::Pending => stats.pending += n,
                TaskStatus::InProgress => stats.in_progress += n,
                TaskStatus::Completed => stats.completed += n,
            }
        }
        stats.completion_rate = completion_rate(stats.completed, stats.total);
        Ok(stats)
    }

    pub async fn count_tasks(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(self.pool())
            .await?)
    }
}

async fn fetch_task(conn: &mut SqliteConnection, id: i64) -> StoreResult<Task> {
    sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound { entity: "Task" })
}

async fn insert_task(
    conn: &mut SqliteConnection,
    new: &NewTask,
    now: DateTime<Utc>,
) -> StoreResult<Task> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (title, description, status, priority, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(&new.title)
    .bind(&new.description)
    .bind(TaskStatus::Pending)
    .bind(new.priority)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(task)
}

async fn write_task(conn: &mut SqliteConnection, task: &Task) -> StoreResult<()> {
    sqlx::query(
        "UPDATE tasks
         SET title = ?, description = ?, status = ?, priority = ?, completed_at = ?
         WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.completed_at)
    .bind(task.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Inserts a fully specified row, used by the seed loader.
pub(crate) async fn insert_seed_task(conn: &mut SqliteConnection, task: &Task) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO tasks (title, description, status, priority, created_at, completed_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.created_at)
    .bind(task.completed_at)
    .execute(conn)
    .await?;

    Ok(())
}
