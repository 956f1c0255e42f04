//! Worker registration and lookup.

use super::Database;
use crate::types::{Role, Worker};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_worker_row(row: &Row) -> rusqlite::Result<Worker> {
    let role: String = row.get("role")?;
    Ok(Worker {
        id: row.get("id")?,
        external_id: row.get("external_id")?,
        name: row.get("name")?,
        role: Role::parse(&role).unwrap_or(Role::Worker),
        created_at: row.get("created_at")?,
    })
}

fn get_worker_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<Worker>> {
    let mut stmt = conn.prepare("SELECT * FROM workers WHERE external_id = ?1")?;
    match stmt.query_row(params![external_id], parse_worker_row) {
        Ok(worker) => Ok(Some(worker)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Look up a worker by external identity, creating it on first contact.
    /// Idempotent: a second call with the same external id returns the
    /// existing row, name unchanged.
    pub fn register_or_get_worker(&self, external_id: &str, name: &str) -> Result<Worker> {
        let now = self.now_ms();

        self.with_conn(|conn| {
            if let Some(existing) = get_worker_by_external_id(conn, external_id)? {
                return Ok(existing);
            }

            conn.execute(
                "INSERT INTO workers (external_id, name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![external_id, name, Role::Worker.as_str(), now],
            )?;
            let id = conn.last_insert_rowid();

            Ok(Worker {
                id,
                external_id: external_id.to_string(),
                name: name.to_string(),
                role: Role::Worker,
                created_at: now,
            })
        })
    }

    /// Get a worker by primary key.
    pub fn get_worker(&self, worker_id: i64) -> Result<Option<Worker>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM workers WHERE id = ?1")?;
            match stmt.query_row(params![worker_id], parse_worker_row) {
                Ok(worker) => Ok(Some(worker)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Internal existence check usable inside a transaction.
pub(crate) fn require_worker(conn: &Connection, worker_id: i64) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM workers WHERE id = ?1)",
        params![worker_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(anyhow!(crate::error::ApiError::worker_not_found(worker_id)))
    }
}
