//! Stage lifecycle: lazily created per-(task, kind) timers that cycle
//! through unstarted -> active -> completed -> active -> ...

use super::norms::get_norm_internal;
use super::{Database, elapsed_seconds};
use crate::efficiency::stage_efficiency;
use crate::error::ApiError;
use crate::types::{Stage, StageKind};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use tracing::debug;

pub(crate) fn parse_stage_row(row: &Row) -> rusqlite::Result<Stage> {
    let kind: String = row.get("stage_kind")?;
    Ok(Stage {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        // Unknown kinds cannot appear: the column is only ever written from
        // StageKind::as_str.
        stage_kind: StageKind::parse(&kind).unwrap_or(StageKind::Preparation),
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        duration_seconds: row.get("duration_seconds")?,
        units: row.get("units")?,
        efficiency: row.get("efficiency")?,
    })
}

fn get_stage_internal(
    conn: &Connection,
    task_id: i64,
    kind: StageKind,
) -> Result<Option<Stage>> {
    let mut stmt =
        conn.prepare("SELECT * FROM stages WHERE task_id = ?1 AND stage_kind = ?2")?;
    match stmt.query_row(params![task_id, kind.as_str()], parse_stage_row) {
        Ok(stage) => Ok(Some(stage)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn list_stages_internal(conn: &Connection, task_id: i64) -> Result<Vec<Stage>> {
    let mut stmt = conn.prepare("SELECT * FROM stages WHERE task_id = ?1 ORDER BY id")?;
    let stages = stmt
        .query_map(params![task_id], parse_stage_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(stages)
}

impl Database {
    /// Advance the stage timer for (task, kind) by one step.
    ///
    /// - No row yet: create it active with `started_at = now`.
    /// - Active: stop it, derive the duration, and score efficiency against
    ///   the configured norm (freshly supplied units win over stored ones).
    /// - Completed: restart it fresh, clearing end/duration/efficiency so a
    ///   mis-stopped stage can be corrected without a duplicate row.
    ///
    /// Stages of one task are independent timers, not sequential gates.
    pub fn toggle_stage(
        &self,
        task_id: i64,
        kind: StageKind,
        units: Option<f64>,
    ) -> Result<Stage> {
        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
                params![task_id],
                |row| row.get(0),
            )?;
            if !task_exists {
                return Err(anyhow!(ApiError::task_not_found(task_id)));
            }

            let stage = match get_stage_internal(&tx, task_id, kind)? {
                None => {
                    debug!(task_id, stage = kind.as_str(), "starting stage");
                    tx.execute(
                        "INSERT INTO stages (task_id, stage_kind, started_at, units)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![task_id, kind.as_str(), now, units],
                    )?;
                    Stage {
                        id: tx.last_insert_rowid(),
                        task_id,
                        stage_kind: kind,
                        started_at: Some(now),
                        ended_at: None,
                        duration_seconds: None,
                        units,
                        efficiency: None,
                    }
                }
                Some(existing) if existing.is_active() => {
                    let started_at = existing.started_at.unwrap_or(now);
                    let duration = elapsed_seconds(started_at, now);
                    let units = units.or(existing.units);

                    let norm = get_norm_internal(&tx, kind)?;
                    let efficiency = norm
                        .as_ref()
                        .and_then(|n| stage_efficiency(kind, duration, units, n));

                    debug!(
                        task_id,
                        stage = kind.as_str(),
                        duration,
                        ?efficiency,
                        "completing stage"
                    );
                    tx.execute(
                        "UPDATE stages SET ended_at = ?1, duration_seconds = ?2,
                            units = ?3, efficiency = ?4
                         WHERE id = ?5",
                        params![now, duration, units, efficiency, existing.id],
                    )?;
                    Stage {
                        ended_at: Some(now),
                        duration_seconds: Some(duration),
                        units,
                        efficiency,
                        ..existing
                    }
                }
                Some(existing) => {
                    debug!(task_id, stage = kind.as_str(), "restarting stage");
                    tx.execute(
                        "UPDATE stages SET started_at = ?1, ended_at = NULL,
                            duration_seconds = NULL, efficiency = NULL
                         WHERE id = ?2",
                        params![now, existing.id],
                    )?;
                    Stage {
                        started_at: Some(now),
                        ended_at: None,
                        duration_seconds: None,
                        efficiency: None,
                        ..existing
                    }
                }
            };

            tx.commit()?;
            Ok(stage)
        })
    }
}
