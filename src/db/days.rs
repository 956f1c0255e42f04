//! Day lifecycle: a worker's calendar record, from working shift to
//! completed day with aggregated efficiency.

use super::tasks::list_day_tasks_internal;
use super::{Database, elapsed_seconds};
use crate::efficiency::day_efficiency;
use crate::error::ApiError;
use crate::types::{ActiveDay, Day, DayKind};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};
use tracing::info;

pub(crate) fn parse_day_row(row: &Row) -> rusqlite::Result<Day> {
    let date: String = row.get("date")?;
    let kind: String = row.get("kind")?;
    Ok(Day {
        id: row.get("id")?,
        worker_id: row.get("worker_id")?,
        date: date.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
        kind: DayKind::parse(&kind).unwrap_or(DayKind::Working),
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        duration_seconds: row.get("duration_seconds")?,
        efficiency: row.get("efficiency")?,
        created_at: row.get("created_at")?,
        tasks: Vec::new(),
    })
}

fn get_day_internal(conn: &Connection, day_id: i64) -> Result<Option<Day>> {
    let mut stmt = conn.prepare("SELECT * FROM days WHERE id = ?1")?;
    let day = match stmt.query_row(params![day_id], parse_day_row) {
        Ok(day) => day,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(load_tasks(conn, day)?))
}

fn load_tasks(conn: &Connection, mut day: Day) -> Result<Day> {
    day.tasks = list_day_tasks_internal(conn, day.id)?;
    Ok(day)
}

impl Database {
    /// Start a day for (worker, date). The date is compared at day
    /// granularity; a second start for the same calendar date fails with a
    /// conflict carrying the existing row. Weekend days are terminal
    /// immediately and get no timer fields.
    pub fn start_day(&self, worker_id: i64, date: NaiveDate, kind: DayKind) -> Result<Day> {
        let now = self.now_ms();
        let started_at = match kind {
            DayKind::Working => Some(now),
            _ => None,
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            super::workers::require_worker(&tx, worker_id)?;

            let mut stmt = tx.prepare("SELECT * FROM days WHERE worker_id = ?1 AND date = ?2")?;
            let existing = match stmt.query_row(
                params![worker_id, date.to_string()],
                parse_day_row,
            ) {
                Ok(day) => Some(day),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            };
            drop(stmt);

            if let Some(existing) = existing {
                let existing = load_tasks(&tx, existing)?;
                return Err(anyhow!(ApiError::day_exists(existing)));
            }

            tx.execute(
                "INSERT INTO days (worker_id, date, kind, started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![worker_id, date.to_string(), kind.as_str(), started_at, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            info!(day_id = id, worker_id, %date, kind = kind.as_str(), "day started");

            Ok(Day {
                id,
                worker_id,
                date,
                kind,
                started_at,
                ended_at: None,
                duration_seconds: None,
                efficiency: None,
                created_at: now,
                tasks: Vec::new(),
            })
        })
    }

    /// Complete a day: record shift duration and the flattened mean of every
    /// defined stage efficiency across all of the day's tasks.
    pub fn complete_day(&self, day_id: i64) -> Result<Day> {
        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let day = get_day_internal(&tx, day_id)?
                .ok_or_else(|| anyhow!(ApiError::day_not_found(day_id)))?;

            // Pseudo-start at `now` keeps the operation total when the day
            // was created without a timer.
            let started_at = day.started_at.unwrap_or(now);
            let duration = elapsed_seconds(started_at, now);
            let efficiency = day_efficiency(day.tasks.iter().map(|t| t.stages.as_slice()));

            tx.execute(
                "UPDATE days SET kind = ?1, ended_at = ?2, duration_seconds = ?3,
                    efficiency = ?4
                 WHERE id = ?5",
                params![DayKind::Completed.as_str(), now, duration, efficiency, day_id],
            )?;
            tx.commit()?;

            info!(day_id, duration, ?efficiency, "day completed");

            Ok(Day {
                kind: DayKind::Completed,
                ended_at: Some(now),
                duration_seconds: Some(duration),
                efficiency,
                ..day
            })
        })
    }

    /// The worker's single `working` day with its tasks (newest first) and
    /// the currently active task surfaced, or `None`.
    pub fn get_active_day(&self, worker_id: i64) -> Result<Option<ActiveDay>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM days WHERE worker_id = ?1 AND kind = 'working' LIMIT 1",
            )?;
            let day = match stmt.query_row(params![worker_id], parse_day_row) {
                Ok(day) => day,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            drop(stmt);

            let day = load_tasks(conn, day)?;
            let active_task = day.tasks.iter().find(|t| t.is_active()).cloned();

            Ok(Some(ActiveDay { day, active_task }))
        })
    }

    /// Days of a worker within the given month, ascending by date, tasks
    /// loaded. `month` is (year, month); defaults to the clock's current
    /// month.
    pub fn list_days(&self, worker_id: i64, month: Option<(i32, u32)>) -> Result<Vec<Day>> {
        let (year, month) = match month {
            Some(m) => m,
            None => {
                let today = chrono::DateTime::from_timestamp_millis(self.now_ms())
                    .unwrap_or_default()
                    .date_naive();
                (chrono::Datelike::year(&today), chrono::Datelike::month(&today))
            }
        };

        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!(ApiError::invalid_value("month", "invalid month")))?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .expect("first of month is always valid");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM days
                 WHERE worker_id = ?1 AND date >= ?2 AND date < ?3
                 ORDER BY date ASC",
            )?;
            let rows = stmt
                .query_map(
                    params![worker_id, first.to_string(), next_month.to_string()],
                    parse_day_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(|d| load_tasks(conn, d)).collect()
        })
    }
}
