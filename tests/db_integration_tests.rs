//! Integration tests for the database layer.
//!
//! These tests drive the lifecycle operations against an in-memory SQLite
//! database with a manually advanced clock, so durations are exact without
//! wall-clock waits.

use press_shift::db::{Clock, Database, ManualClock};
use press_shift::error::{ApiError, ErrorCode};
use press_shift::types::{DayKind, StageKind};
use chrono::NaiveDate;
use std::sync::Arc;

/// Helper to create a fresh in-memory database with a manual clock.
fn setup() -> (Database, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let db = Database::open_in_memory_with_clock(clock.clone())
        .expect("Failed to create in-memory database");
    (db, clock)
}

fn setup_worker(db: &Database) -> i64 {
    db.register_or_get_worker("tg:1001", "Anna").unwrap().id
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn error_code(err: &anyhow::Error) -> ErrorCode {
    err.downcast_ref::<ApiError>()
        .expect("expected an ApiError")
        .code
}

mod worker_tests {
    use super::*;

    #[test]
    fn register_creates_worker() {
        let (db, _) = setup();

        let worker = db.register_or_get_worker("tg:42", "Boris").unwrap();

        assert_eq!(worker.external_id, "tg:42");
        assert_eq!(worker.name, "Boris");
        assert!(worker.id > 0);
    }

    #[test]
    fn register_is_idempotent_by_external_id() {
        let (db, _) = setup();

        let first = db.register_or_get_worker("tg:42", "Boris").unwrap();
        let second = db.register_or_get_worker("tg:42", "Renamed").unwrap();

        assert_eq!(first.id, second.id);
        // Existing row wins; the name is not rewritten.
        assert_eq!(second.name, "Boris");
    }

    #[test]
    fn get_worker_returns_none_for_unknown_id() {
        let (db, _) = setup();
        assert!(db.get_worker(999).unwrap().is_none());
    }

    #[test]
    fn database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");

        {
            let db = Database::open(&path).unwrap();
            db.register_or_get_worker("tg:7", "Vera").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let worker = db.register_or_get_worker("tg:7", "Vera").unwrap();
        assert_eq!(worker.name, "Vera");
        assert_eq!(db.get_norms().unwrap().len(), 5);
    }
}

mod norm_tests {
    use super::*;
    use press_shift::types::NormUpdate;

    #[test]
    fn defaults_are_seeded_for_all_five_kinds() {
        let (db, _) = setup();

        let norms = db.get_norms().unwrap();

        assert_eq!(norms.len(), 5);
        let printing = norms
            .iter()
            .find(|n| n.stage_kind == StageKind::Printing)
            .unwrap();
        assert_eq!(printing.units_per_hour, 60.0);
    }

    #[test]
    fn update_applies_valid_entries() {
        let (db, _) = setup();

        let norms = db
            .update_norms(&[NormUpdate {
                stage_kind: Some(StageKind::Setup),
                units_per_hour: Some(3.0),
                unit_label: Some("makeready".to_string()),
            }])
            .unwrap();

        let setup = norms
            .iter()
            .find(|n| n.stage_kind == StageKind::Setup)
            .unwrap();
        assert_eq!(setup.units_per_hour, 3.0);
        assert_eq!(setup.unit_label, "makeready");
    }

    #[test]
    fn update_skips_malformed_entries_without_aborting() {
        let (db, _) = setup();

        let norms = db
            .update_norms(&[
                NormUpdate {
                    stage_kind: None,
                    units_per_hour: Some(3.0),
                    unit_label: Some("x".to_string()),
                },
                NormUpdate {
                    stage_kind: Some(StageKind::Washing),
                    units_per_hour: Some(-1.0),
                    unit_label: Some("plate".to_string()),
                },
                NormUpdate {
                    stage_kind: Some(StageKind::Exposure),
                    units_per_hour: Some(10.0),
                    unit_label: Some("plate".to_string()),
                },
            ])
            .unwrap();

        let washing = norms
            .iter()
            .find(|n| n.stage_kind == StageKind::Washing)
            .unwrap();
        assert_eq!(washing.units_per_hour, 6.0); // untouched default
        let exposure = norms
            .iter()
            .find(|n| n.stage_kind == StageKind::Exposure)
            .unwrap();
        assert_eq!(exposure.units_per_hour, 10.0);
    }
}

mod stage_tests {
    use super::*;

    #[test]
    fn first_toggle_creates_active_stage() {
        let (db, _) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        let stage = db.toggle_stage(task.id, StageKind::Setup, None).unwrap();

        assert!(stage.is_active());
        assert!(stage.ended_at.is_none());
        assert!(stage.duration_seconds.is_none());
        assert!(stage.efficiency.is_none());
    }

    #[test]
    fn second_toggle_completes_with_duration_and_efficiency() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        db.toggle_stage(task.id, StageKind::Setup, None).unwrap();
        clock.advance_secs(900);
        let stage = db.toggle_stage(task.id, StageKind::Setup, None).unwrap();

        assert_eq!(stage.duration_seconds, Some(900));
        // Setup norm is 2/h: 1800 expected seconds over 900 actual = 200%.
        let eff = stage.efficiency.unwrap();
        assert!((eff - 200.0).abs() < 1e-9);
    }

    #[test]
    fn third_toggle_restarts_fresh() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        let first = db.toggle_stage(task.id, StageKind::Washing, None).unwrap();
        clock.advance_secs(60);
        db.toggle_stage(task.id, StageKind::Washing, None).unwrap();
        clock.advance_secs(60);
        let restarted = db.toggle_stage(task.id, StageKind::Washing, None).unwrap();

        // Same row, reset to a fresh active state.
        assert_eq!(restarted.id, first.id);
        assert!(restarted.is_active());
        assert!(restarted.duration_seconds.is_none());
        assert!(restarted.efficiency.is_none());
    }

    #[test]
    fn printing_scores_units_per_hour_against_norm() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        db.toggle_stage(task.id, StageKind::Printing, None).unwrap();
        clock.advance_secs(1800);
        let stage = db
            .toggle_stage(task.id, StageKind::Printing, Some(40.0))
            .unwrap();

        // 40 units in half an hour against 60/h = 133.33%.
        let eff = stage.efficiency.unwrap();
        assert!((eff - 40.0 / 0.5 / 60.0 * 100.0).abs() < 1e-9);
        assert_eq!(stage.units, Some(40.0));
    }

    #[test]
    fn units_given_at_completion_override_stored_units() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        db.toggle_stage(task.id, StageKind::Printing, Some(10.0))
            .unwrap();
        clock.advance_secs(3600);
        let stage = db
            .toggle_stage(task.id, StageKind::Printing, Some(90.0))
            .unwrap();

        assert_eq!(stage.units, Some(90.0));
        let eff = stage.efficiency.unwrap();
        assert!((eff - 150.0).abs() < 1e-9);
    }

    #[test]
    fn stored_units_are_used_when_none_given_at_completion() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        db.toggle_stage(task.id, StageKind::Printing, Some(30.0))
            .unwrap();
        clock.advance_secs(1800);
        let stage = db.toggle_stage(task.id, StageKind::Printing, None).unwrap();

        assert_eq!(stage.units, Some(30.0));
        let eff = stage.efficiency.unwrap();
        assert!((eff - 100.0).abs() < 1e-9);
    }

    #[test]
    fn stages_of_one_task_are_independent_timers() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-100", None).unwrap();

        db.toggle_stage(task.id, StageKind::Preparation, None).unwrap();
        clock.advance_secs(10);
        db.toggle_stage(task.id, StageKind::Exposure, None).unwrap();
        clock.advance_secs(50);
        let prep = db.toggle_stage(task.id, StageKind::Preparation, None).unwrap();

        assert_eq!(prep.duration_seconds, Some(60));
        let loaded = db.get_task(task.id).unwrap().unwrap();
        let exposure = loaded
            .stages
            .iter()
            .find(|s| s.stage_kind == StageKind::Exposure)
            .unwrap();
        assert!(exposure.is_active());
    }

    #[test]
    fn toggle_on_missing_task_is_not_found() {
        let (db, _) = setup();

        let err = db.toggle_stage(404, StageKind::Setup, None).unwrap_err();

        assert_eq!(error_code(&err), ErrorCode::TaskNotFound);
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn start_task_sets_start_timestamp() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);

        let task = db.start_task(worker, "A-7", None).unwrap();

        assert_eq!(task.started_at, clock.now_ms());
        assert!(task.is_active());
    }

    #[test]
    fn start_task_for_unknown_worker_fails() {
        let (db, _) = setup();

        let err = db.start_task(999, "A-7", None).unwrap_err();

        assert_eq!(error_code(&err), ErrorCode::WorkerNotFound);
    }

    #[test]
    fn stop_task_records_duration_and_returns_transient_efficiency() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-7", None).unwrap();

        // Two completed stages: setup at 200%, washing at 100%.
        db.toggle_stage(task.id, StageKind::Setup, None).unwrap();
        clock.advance_secs(900);
        db.toggle_stage(task.id, StageKind::Setup, None).unwrap();
        db.toggle_stage(task.id, StageKind::Washing, None).unwrap();
        clock.advance_secs(600);
        db.toggle_stage(task.id, StageKind::Washing, None).unwrap();

        clock.advance_secs(300);
        let stopped = db.stop_task(task.id).unwrap();

        assert_eq!(stopped.task.total_duration_seconds, Some(1800));
        let eff = stopped.overall_efficiency.unwrap();
        assert!((eff - 150.0).abs() < 1e-9);

        // The aggregate is transient: not stored on the task row.
        let reloaded = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(reloaded.total_duration_seconds, Some(1800));
        assert!(reloaded.ended_at.is_some());
    }

    #[test]
    fn stop_task_with_no_completed_stages_has_no_efficiency() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-7", None).unwrap();

        clock.advance_secs(120);
        let stopped = db.stop_task(task.id).unwrap();

        assert_eq!(stopped.overall_efficiency, None);
        assert_eq!(stopped.task.total_duration_seconds, Some(120));
    }

    #[test]
    fn stop_task_leaves_active_stages_untouched() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-7", None).unwrap();

        db.toggle_stage(task.id, StageKind::Printing, None).unwrap();
        clock.advance_secs(60);
        db.stop_task(task.id).unwrap();

        let reloaded = db.get_task(task.id).unwrap().unwrap();
        let printing = reloaded
            .stages
            .iter()
            .find(|s| s.stage_kind == StageKind::Printing)
            .unwrap();
        assert!(printing.is_active());
        assert!(printing.efficiency.is_none());
    }

    #[test]
    fn stop_missing_task_is_not_found() {
        let (db, _) = setup();

        let err = db.stop_task(404).unwrap_err();

        assert_eq!(error_code(&err), ErrorCode::TaskNotFound);
    }

    #[test]
    fn list_tasks_returns_completed_newest_first() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);

        let a = db.start_task(worker, "A-1", None).unwrap();
        clock.advance_secs(1);
        let b = db.start_task(worker, "A-2", None).unwrap();
        clock.advance_secs(1);
        let still_active = db.start_task(worker, "A-3", None).unwrap();

        db.stop_task(a.id).unwrap();
        db.stop_task(b.id).unwrap();

        let tasks = db.list_tasks(worker, 50).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, b.id);
        assert_eq!(tasks[1].id, a.id);
        assert!(!tasks.iter().any(|t| t.id == still_active.id));
    }

    #[test]
    fn list_tasks_honors_limit() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);

        for i in 0..5 {
            let t = db.start_task(worker, &format!("A-{}", i), None).unwrap();
            db.stop_task(t.id).unwrap();
            clock.advance_secs(1);
        }

        assert_eq!(db.list_tasks(worker, 3).unwrap().len(), 3);
    }
}

mod day_tests {
    use super::*;

    #[test]
    fn start_working_day_sets_timer() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);

        let day = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap();

        assert_eq!(day.kind, DayKind::Working);
        assert_eq!(day.started_at, Some(clock.now_ms()));
    }

    #[test]
    fn weekend_day_has_no_timer() {
        let (db, _) = setup();
        let worker = setup_worker(&db);

        let day = db
            .start_day(worker, date("2025-06-07"), DayKind::Weekend)
            .unwrap();

        assert_eq!(day.kind, DayKind::Weekend);
        assert!(day.started_at.is_none());
    }

    #[test]
    fn second_start_for_same_date_conflicts_with_existing_row() {
        let (db, _) = setup();
        let worker = setup_worker(&db);

        let first = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap();
        let err = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap_err();

        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_err.code, ErrorCode::DayExists);
        assert_eq!(api_err.day.as_ref().unwrap().id, first.id);

        // No duplicate row was created.
        let days = db.list_days(worker, Some((2025, 6))).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn same_date_different_workers_do_not_conflict() {
        let (db, _) = setup();
        let a = db.register_or_get_worker("tg:1", "A").unwrap().id;
        let b = db.register_or_get_worker("tg:2", "B").unwrap().id;

        db.start_day(a, date("2025-06-02"), DayKind::Working).unwrap();
        db.start_day(b, date("2025-06-02"), DayKind::Working).unwrap();
    }

    #[test]
    fn complete_day_records_duration_and_flattened_efficiency() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let day = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap();

        // Task one: setup at 100% (1800s vs 1800 expected) and washing at
        // 50% (1200s vs 600 expected).
        let t1 = db.start_task(worker, "A-1", Some(day.id)).unwrap();
        db.toggle_stage(t1.id, StageKind::Setup, None).unwrap();
        clock.advance_secs(1800);
        db.toggle_stage(t1.id, StageKind::Setup, None).unwrap();
        db.toggle_stage(t1.id, StageKind::Washing, None).unwrap();
        clock.advance_secs(1200);
        db.toggle_stage(t1.id, StageKind::Washing, None).unwrap();
        db.stop_task(t1.id).unwrap();

        // Task two: preparation at 75% (1200s vs 900 expected).
        let t2 = db.start_task(worker, "A-2", Some(day.id)).unwrap();
        db.toggle_stage(t2.id, StageKind::Preparation, None).unwrap();
        clock.advance_secs(1200);
        db.toggle_stage(t2.id, StageKind::Preparation, None).unwrap();
        db.stop_task(t2.id).unwrap();

        clock.advance_secs(600);
        let completed = db.complete_day(day.id).unwrap();

        assert_eq!(completed.kind, DayKind::Completed);
        assert_eq!(completed.duration_seconds, Some(4800));
        // Flattened mean over three stages, not a mean of per-task means:
        // (100 + 50 + 75) / 3 = 75.
        let eff = completed.efficiency.unwrap();
        assert!((eff - 75.0).abs() < 1e-9);
    }

    #[test]
    fn complete_day_with_no_stage_efficiencies_has_none() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let day = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap();

        clock.advance_secs(3600);
        let completed = db.complete_day(day.id).unwrap();

        assert_eq!(completed.efficiency, None);
        assert_eq!(completed.duration_seconds, Some(3600));
    }

    #[test]
    fn complete_missing_day_is_not_found() {
        let (db, _) = setup();

        let err = db.complete_day(404).unwrap_err();

        assert_eq!(error_code(&err), ErrorCode::DayNotFound);
    }

    #[test]
    fn complete_weekend_day_falls_back_to_zero_duration() {
        let (db, _) = setup();
        let worker = setup_worker(&db);
        let day = db
            .start_day(worker, date("2025-06-07"), DayKind::Weekend)
            .unwrap();

        // No start timer: the pseudo-start keeps the operation total.
        let completed = db.complete_day(day.id).unwrap();
        assert_eq!(completed.duration_seconds, Some(0));
    }

    #[test]
    fn active_day_surfaces_running_task() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let day = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap();

        let done = db.start_task(worker, "A-1", Some(day.id)).unwrap();
        db.stop_task(done.id).unwrap();
        clock.advance_secs(1);
        let running = db.start_task(worker, "A-2", Some(day.id)).unwrap();

        let active = db.get_active_day(worker).unwrap().unwrap();

        assert_eq!(active.day.id, day.id);
        assert_eq!(active.day.tasks.len(), 2);
        assert_eq!(active.active_task.as_ref().unwrap().id, running.id);
    }

    #[test]
    fn no_active_day_after_completion() {
        let (db, _) = setup();
        let worker = setup_worker(&db);
        let day = db
            .start_day(worker, date("2025-06-02"), DayKind::Working)
            .unwrap();

        assert!(db.get_active_day(worker).unwrap().is_some());
        db.complete_day(day.id).unwrap();
        assert!(db.get_active_day(worker).unwrap().is_none());
    }

    #[test]
    fn list_days_filters_by_month_and_orders_ascending() {
        let (db, _) = setup();
        let worker = setup_worker(&db);

        db.start_day(worker, date("2025-06-10"), DayKind::Weekend).unwrap();
        db.start_day(worker, date("2025-06-02"), DayKind::Weekend).unwrap();
        db.start_day(worker, date("2025-07-01"), DayKind::Weekend).unwrap();

        let days = db.list_days(worker, Some((2025, 6))).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date("2025-06-02"));
        assert_eq!(days[1].date, date("2025-06-10"));
    }

    #[test]
    fn list_days_december_rolls_into_next_year() {
        let (db, _) = setup();
        let worker = setup_worker(&db);

        db.start_day(worker, date("2025-12-31"), DayKind::Weekend).unwrap();
        db.start_day(worker, date("2026-01-01"), DayKind::Weekend).unwrap();

        let days = db.list_days(worker, Some((2025, 12))).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, date("2025-12-31"));
    }
}

mod extra_work_tests {
    use super::*;

    #[test]
    fn add_creates_item_with_no_timer() {
        let (db, _) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-1", None).unwrap();

        let work = db.add_extra_work(task.id, "plate cleanup").unwrap();

        assert_eq!(work.name, "plate cleanup");
        assert!(work.started_at.is_none());
        assert!(!work.is_running());
    }

    #[test]
    fn add_to_missing_task_is_not_found() {
        let (db, _) = setup();

        let err = db.add_extra_work(404, "cleanup").unwrap_err();

        assert_eq!(error_code(&err), ErrorCode::TaskNotFound);
    }

    #[test]
    fn toggle_starts_then_stops_with_duration() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-1", None).unwrap();
        let work = db.add_extra_work(task.id, "cleanup").unwrap();

        let started = db.toggle_extra_work(work.id).unwrap();
        assert!(started.is_running());

        clock.advance_secs(420);
        let stopped = db.toggle_extra_work(work.id).unwrap();

        assert!(!stopped.is_running());
        assert_eq!(stopped.duration_seconds, Some(420));
    }

    #[test]
    fn toggle_after_completion_starts_a_fresh_run() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-1", None).unwrap();
        let work = db.add_extra_work(task.id, "cleanup").unwrap();

        db.toggle_extra_work(work.id).unwrap();
        clock.advance_secs(60);
        db.toggle_extra_work(work.id).unwrap();
        clock.advance_secs(60);
        let restarted = db.toggle_extra_work(work.id).unwrap();

        assert!(restarted.is_running());
        assert!(restarted.duration_seconds.is_none());
        assert_eq!(restarted.started_at, Some(clock.now_ms()));
    }

    #[test]
    fn remove_deletes_and_subsequent_toggle_is_not_found() {
        let (db, _) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-1", None).unwrap();
        let work = db.add_extra_work(task.id, "cleanup").unwrap();

        db.remove_extra_work(work.id).unwrap();

        assert!(db.get_extra_work(work.id).unwrap().is_none());
        let err = db.toggle_extra_work(work.id).unwrap_err();
        assert_eq!(error_code(&err), ErrorCode::ExtraWorkNotFound);
    }

    #[test]
    fn extra_work_never_contributes_to_efficiency() {
        let (db, clock) = setup();
        let worker = setup_worker(&db);
        let task = db.start_task(worker, "A-1", None).unwrap();

        let work = db.add_extra_work(task.id, "cleanup").unwrap();
        db.toggle_extra_work(work.id).unwrap();
        clock.advance_secs(600);
        db.toggle_extra_work(work.id).unwrap();

        let stopped = db.stop_task(task.id).unwrap();
        assert_eq!(stopped.overall_efficiency, None);
    }
}
