//! Core types for the press-shift tracking server.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The five fixed sub-steps of a print task, each independently timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Preparation,
    Exposure,
    Setup,
    Printing,
    Washing,
}

/// All stage kinds, in process order. The order is advisory for display;
/// the model does not gate one stage on another.
pub const STAGE_KINDS: [StageKind; 5] = [
    StageKind::Preparation,
    StageKind::Exposure,
    StageKind::Setup,
    StageKind::Printing,
    StageKind::Washing,
];

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Preparation => "preparation",
            StageKind::Exposure => "exposure",
            StageKind::Setup => "setup",
            StageKind::Printing => "printing",
            StageKind::Washing => "washing",
        }
    }

    /// Parse from the stored string form. Returns `None` for unknown kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preparation" => Some(StageKind::Preparation),
            "exposure" => Some(StageKind::Exposure),
            "setup" => Some(StageKind::Setup),
            "printing" => Some(StageKind::Printing),
            "washing" => Some(StageKind::Washing),
            _ => None,
        }
    }
}

/// Lifecycle state of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKind {
    /// An active working shift. At most one per worker.
    Working,
    /// A weekend day; terminal immediately, no timer semantics.
    Weekend,
    /// A finished working shift with duration and efficiency recorded.
    Completed,
}

impl DayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayKind::Working => "working",
            DayKind::Weekend => "weekend",
            DayKind::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "working" => Some(DayKind::Working),
            "weekend" => Some(DayKind::Weekend),
            "completed" => Some(DayKind::Completed),
            _ => None,
        }
    }
}

/// Worker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Worker,
    Master,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Master => "master",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "worker" => Some(Role::Worker),
            "master" => Some(Role::Master),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A registered worker, looked up idempotently by external identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub role: Role,
    pub created_at: i64,
}

/// Expected throughput for a stage kind, the baseline for efficiency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Norm {
    pub stage_kind: StageKind,
    pub units_per_hour: f64,
    pub unit_label: String,
}

/// One entry of a bulk norm update. Malformed entries are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormUpdate {
    pub stage_kind: Option<StageKind>,
    pub units_per_hour: Option<f64>,
    pub unit_label: Option<String>,
}

/// A timed stage within a task.
///
/// `ended_at` set implies `started_at` set and
/// `duration_seconds = (ended_at - started_at) / 1000`, floored.
/// `efficiency` is computed at completion, when a norm exists for the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub task_id: i64,
    pub stage_kind: StageKind,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    /// Produced units; meaningful for the printing stage.
    pub units: Option<f64>,
    pub efficiency: Option<f64>,
}

impl Stage {
    /// Timer started and not yet stopped.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }
}

/// An ad-hoc timed work item attached to a task. Never counted in efficiency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraWork {
    pub id: i64,
    pub task_id: i64,
    pub name: String,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub duration_seconds: Option<i64>,
}

impl ExtraWork {
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }
}

/// A print task with its stages and extra works loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub task_number: String,
    pub worker_id: i64,
    pub day_id: Option<i64>,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub total_duration_seconds: Option<i64>,
    pub created_at: i64,
    pub stages: Vec<Stage>,
    pub extra_works: Vec<ExtraWork>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Result of stopping a task: the updated row plus the transient overall
/// efficiency (mean of defined stage efficiencies, not persisted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoppedTask {
    #[serde(flatten)]
    pub task: Task,
    pub overall_efficiency: Option<f64>,
}

/// A worker's calendar-date record with its tasks loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Day {
    pub id: i64,
    pub worker_id: i64,
    pub date: NaiveDate,
    pub kind: DayKind,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub efficiency: Option<f64>,
    pub created_at: i64,
    pub tasks: Vec<Task>,
}

/// The active working day with the currently running task surfaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveDay {
    #[serde(flatten)]
    pub day: Day,
    pub active_task: Option<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_kind_roundtrip() {
        for kind in STAGE_KINDS {
            assert_eq!(StageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(StageKind::parse("laminating"), None);
    }

    #[test]
    fn day_kind_roundtrip() {
        for kind in [DayKind::Working, DayKind::Weekend, DayKind::Completed] {
            assert_eq!(DayKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DayKind::parse(""), None);
    }
}
