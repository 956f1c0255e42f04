//! Pure efficiency math: stage scores against norms and their aggregation.
//!
//! Efficiency is a percentage comparing actual performance against the
//! configured norm; values above 100% mean faster (or more productive) than
//! the norm. Values are never clamped — display formatting is the caller's
//! concern.

use crate::types::{Norm, Stage, StageKind};

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Compute the efficiency percentage for a completed stage.
///
/// Returns `None` when `duration_seconds <= 0`; callers pass `None` for the
/// norm lookup failure case by skipping the call.
///
/// For printing with a positive unit count, the score rewards throughput:
/// produced units per elapsed hour relative to the norm rate. Every other
/// stage (and printing without a unit count) scores elapsed time against the
/// norm's expected seconds-per-unit.
pub fn stage_efficiency(
    kind: StageKind,
    duration_seconds: i64,
    units: Option<f64>,
    norm: &Norm,
) -> Option<f64> {
    if duration_seconds <= 0 {
        return None;
    }
    let duration = duration_seconds as f64;

    match (kind, units) {
        (StageKind::Printing, Some(u)) if u > 0.0 => {
            let actual_units_per_hour = u / (duration / SECONDS_PER_HOUR);
            Some(actual_units_per_hour / norm.units_per_hour * 100.0)
        }
        _ => {
            let norm_seconds_per_unit = SECONDS_PER_HOUR / norm.units_per_hour;
            Some(norm_seconds_per_unit / duration * 100.0)
        }
    }
}

/// Arithmetic mean of the defined values; `None` when none are defined.
pub fn mean_efficiency<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut count = 0u32;
    for value in values.into_iter().flatten() {
        sum += value;
        count += 1;
    }
    if count > 0 { Some(sum / count as f64) } else { None }
}

/// Mean of the defined stage efficiencies in a single task.
pub fn task_efficiency(stages: &[Stage]) -> Option<f64> {
    mean_efficiency(stages.iter().map(|s| s.efficiency))
}

/// Flattened mean over every stage of every task. A task with many completed
/// stages contributes proportionally more than a task with one; this is not a
/// mean of per-task means.
pub fn day_efficiency<'a, I>(tasks: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a [Stage]>,
{
    mean_efficiency(
        tasks
            .into_iter()
            .flat_map(|stages| stages.iter().map(|s| s.efficiency)),
    )
}
