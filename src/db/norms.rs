//! The norm registry: one productivity norm per stage kind.

use super::Database;
use crate::types::{Norm, NormUpdate, StageKind};
use anyhow::Result;
use rusqlite::{Row, params};
use tracing::warn;

/// Default norms applied when the registry is empty. Rates are the shop's
/// historical baselines per stage kind.
const DEFAULT_NORMS: [(StageKind, f64, &str); 5] = [
    (StageKind::Preparation, 4.0, "plate"),
    (StageKind::Exposure, 8.0, "plate"),
    (StageKind::Setup, 2.0, "setup"),
    (StageKind::Printing, 60.0, "impressions"),
    (StageKind::Washing, 6.0, "plate"),
];

pub(crate) fn parse_norm_row(row: &Row) -> rusqlite::Result<Option<Norm>> {
    let kind: String = row.get("stage_kind")?;
    let units_per_hour: f64 = row.get("units_per_hour")?;
    let unit_label: String = row.get("unit_label")?;
    Ok(StageKind::parse(&kind).map(|stage_kind| Norm {
        stage_kind,
        units_per_hour,
        unit_label,
    }))
}

impl Database {
    /// Insert the default norm for every stage kind that has none yet.
    /// Called at open; a no-op once all five rows exist.
    pub(crate) fn seed_default_norms(&self) -> Result<()> {
        self.with_conn(|conn| {
            for (kind, units_per_hour, unit_label) in DEFAULT_NORMS {
                conn.execute(
                    "INSERT OR IGNORE INTO norms (stage_kind, units_per_hour, unit_label)
                     VALUES (?1, ?2, ?3)",
                    params![kind.as_str(), units_per_hour, unit_label],
                )?;
            }
            Ok(())
        })
    }

    /// All norm rows, ordered by stage kind.
    pub fn get_norms(&self) -> Result<Vec<Norm>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM norms ORDER BY stage_kind")?;
            let norms = stmt
                .query_map([], parse_norm_row)?
                .filter_map(|r| r.ok().flatten())
                .collect();
            Ok(norms)
        })
    }

    /// The norm for a single stage kind, if configured.
    pub fn get_norm(&self, kind: StageKind) -> Result<Option<Norm>> {
        self.with_conn(|conn| get_norm_internal(conn, kind))
    }

    /// Bulk norm update. Malformed entries (missing fields, non-positive
    /// rate, empty label) are skipped individually rather than aborting the
    /// batch; norm edits are low-stakes administrative input. Returns the
    /// full registry after the update.
    pub fn update_norms(&self, updates: &[NormUpdate]) -> Result<Vec<Norm>> {
        self.with_conn(|conn| {
            for update in updates {
                let (Some(kind), Some(units_per_hour), Some(label)) = (
                    update.stage_kind,
                    update.units_per_hour,
                    update.unit_label.as_deref(),
                ) else {
                    warn!("skipping malformed norm entry: {:?}", update);
                    continue;
                };
                if units_per_hour <= 0.0 || label.is_empty() {
                    warn!(stage = kind.as_str(), "skipping malformed norm entry");
                    continue;
                }

                conn.execute(
                    "UPDATE norms SET units_per_hour = ?1, unit_label = ?2
                     WHERE stage_kind = ?3",
                    params![units_per_hour, label, kind.as_str()],
                )?;
            }
            Ok(())
        })?;

        self.get_norms()
    }
}

/// Internal norm lookup usable inside a transaction.
pub(crate) fn get_norm_internal(
    conn: &rusqlite::Connection,
    kind: StageKind,
) -> Result<Option<Norm>> {
    let mut stmt = conn.prepare("SELECT * FROM norms WHERE stage_kind = ?1")?;
    match stmt.query_row(params![kind.as_str()], parse_norm_row) {
        Ok(norm) => Ok(norm),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
