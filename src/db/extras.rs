//! Extra work items: ad-hoc start/stop timers attached to a task, with no
//! efficiency accounting.

use super::{Database, elapsed_seconds};
use crate::error::ApiError;
use crate::types::ExtraWork;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use tracing::debug;

pub(crate) fn parse_extra_work_row(row: &Row) -> rusqlite::Result<ExtraWork> {
    Ok(ExtraWork {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        name: row.get("name")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        duration_seconds: row.get("duration_seconds")?,
    })
}

pub(crate) fn list_extra_works_internal(
    conn: &Connection,
    task_id: i64,
) -> Result<Vec<ExtraWork>> {
    let mut stmt = conn.prepare("SELECT * FROM extra_works WHERE task_id = ?1 ORDER BY id")?;
    let works = stmt
        .query_map(params![task_id], parse_extra_work_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(works)
}

fn get_extra_work_internal(conn: &Connection, id: i64) -> Result<Option<ExtraWork>> {
    let mut stmt = conn.prepare("SELECT * FROM extra_works WHERE id = ?1")?;
    match stmt.query_row(params![id], parse_extra_work_row) {
        Ok(work) => Ok(Some(work)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create an extra work item with no timer running. Unlike stages these
    /// are open-ended, so creation is explicit rather than lazy.
    pub fn add_extra_work(&self, task_id: i64, name: &str) -> Result<ExtraWork> {
        if name.is_empty() {
            return Err(anyhow!(ApiError::missing_field("name")));
        }

        self.with_conn(|conn| {
            let task_exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
                params![task_id],
                |row| row.get(0),
            )?;
            if !task_exists {
                return Err(anyhow!(ApiError::task_not_found(task_id)));
            }

            conn.execute(
                "INSERT INTO extra_works (task_id, name) VALUES (?1, ?2)",
                params![task_id, name],
            )?;

            Ok(ExtraWork {
                id: conn.last_insert_rowid(),
                task_id,
                name: name.to_string(),
                started_at: None,
                ended_at: None,
                duration_seconds: None,
            })
        })
    }

    /// Toggle an extra work timer: a running item is stopped with its
    /// duration recorded; anything else (never started or previously
    /// completed) begins a fresh run.
    pub fn toggle_extra_work(&self, id: i64) -> Result<ExtraWork> {
        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let work = get_extra_work_internal(&tx, id)?
                .ok_or_else(|| anyhow!(ApiError::extra_work_not_found(id)))?;

            let work = if work.is_running() {
                let started_at = work.started_at.unwrap_or(now);
                let duration = elapsed_seconds(started_at, now);
                debug!(id, duration, "stopping extra work");
                tx.execute(
                    "UPDATE extra_works SET ended_at = ?1, duration_seconds = ?2 WHERE id = ?3",
                    params![now, duration, id],
                )?;
                ExtraWork {
                    ended_at: Some(now),
                    duration_seconds: Some(duration),
                    ..work
                }
            } else {
                debug!(id, "starting extra work");
                tx.execute(
                    "UPDATE extra_works SET started_at = ?1, ended_at = NULL,
                        duration_seconds = NULL
                     WHERE id = ?2",
                    params![now, id],
                )?;
                ExtraWork {
                    started_at: Some(now),
                    ended_at: None,
                    duration_seconds: None,
                    ..work
                }
            };

            tx.commit()?;
            Ok(work)
        })
    }

    /// Unconditionally delete an extra work item. Leaf entity, hard delete.
    pub fn remove_extra_work(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM extra_works WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    /// Get an extra work item by id.
    pub fn get_extra_work(&self, id: i64) -> Result<Option<ExtraWork>> {
        self.with_conn(|conn| get_extra_work_internal(conn, id))
    }
}
