//! Task lifecycle: creation, stopping with transient overall efficiency,
//! and history listing.

use super::extras::list_extra_works_internal;
use super::stages::list_stages_internal;
use super::workers::require_worker;
use super::{Database, elapsed_seconds};
use crate::efficiency::task_efficiency;
use crate::error::ApiError;
use crate::types::{StoppedTask, Task};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use tracing::info;

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        task_number: row.get("task_number")?,
        worker_id: row.get("worker_id")?,
        day_id: row.get("day_id")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        total_duration_seconds: row.get("total_duration_seconds")?,
        created_at: row.get("created_at")?,
        stages: Vec::new(),
        extra_works: Vec::new(),
    })
}

/// Fetch a task row and attach its stages and extra works.
pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
    let task = match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => task,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(load_children(conn, task)?))
}

pub(crate) fn load_children(conn: &Connection, mut task: Task) -> Result<Task> {
    task.stages = list_stages_internal(conn, task.id)?;
    task.extra_works = list_extra_works_internal(conn, task.id)?;
    Ok(task)
}

/// Tasks of a day, newest first, with children loaded.
pub(crate) fn list_day_tasks_internal(conn: &Connection, day_id: i64) -> Result<Vec<Task>> {
    let mut stmt =
        conn.prepare("SELECT * FROM tasks WHERE day_id = ?1 ORDER BY created_at DESC, id DESC")?;
    let rows = stmt
        .query_map(params![day_id], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(|t| load_children(conn, t)).collect()
}

impl Database {
    /// Start a new task for a worker, optionally attached to a day.
    ///
    /// The one-active-task-per-worker rule is caller-side policy; this does
    /// not look for a pre-existing active task.
    pub fn start_task(
        &self,
        worker_id: i64,
        task_number: &str,
        day_id: Option<i64>,
    ) -> Result<Task> {
        if task_number.is_empty() {
            return Err(anyhow!(ApiError::missing_field("task_number")));
        }
        let now = self.now_ms();

        self.with_conn(|conn| {
            require_worker(conn, worker_id)?;

            conn.execute(
                "INSERT INTO tasks (task_number, worker_id, day_id, started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![task_number, worker_id, day_id, now, now],
            )?;
            let id = conn.last_insert_rowid();
            info!(task_id = id, worker_id, task_number, "task started");

            Ok(Task {
                id,
                task_number: task_number.to_string(),
                worker_id,
                day_id,
                started_at: now,
                ended_at: None,
                total_duration_seconds: None,
                created_at: now,
                stages: Vec::new(),
                extra_works: Vec::new(),
            })
        })
    }

    /// Get a task by id with stages and extra works loaded.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Stop a task: persist `ended_at` and the total duration, and return
    /// the mean of its defined stage efficiencies as a transient value.
    ///
    /// Still-active stages are left untouched; callers wanting them counted
    /// must toggle them to completion first.
    pub fn stop_task(&self, task_id: i64) -> Result<StoppedTask> {
        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| anyhow!(ApiError::task_not_found(task_id)))?;

            // From the start timestamp, not ended_at: ended_at is being set
            // in this same operation.
            let total_duration = elapsed_seconds(task.started_at, now);
            let overall_efficiency = task_efficiency(&task.stages);

            tx.execute(
                "UPDATE tasks SET ended_at = ?1, total_duration_seconds = ?2 WHERE id = ?3",
                params![now, total_duration, task_id],
            )?;
            tx.commit()?;

            info!(task_id, total_duration, ?overall_efficiency, "task stopped");

            Ok(StoppedTask {
                task: Task {
                    ended_at: Some(now),
                    total_duration_seconds: Some(total_duration),
                    ..task
                },
                overall_efficiency,
            })
        })
    }

    /// Completed tasks of a worker, newest first, with children loaded.
    pub fn list_tasks(&self, worker_id: i64, limit: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE worker_id = ?1 AND ended_at IS NOT NULL
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![worker_id, limit], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(|t| load_children(conn, t)).collect()
        })
    }
}
