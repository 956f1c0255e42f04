//! Axum server wiring the lifecycle operations to JSON routes.
//!
//! Route shapes follow the operation table: workers, days, tasks, stages,
//! extra work, and norms. Transport framing is deliberately thin; all state
//! logic lives in the db layer.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::Database;
use crate::error::ApiError;
use crate::types::{
    ActiveDay, Day, DayKind, ExtraWork, Norm, NormUpdate, Stage, StageKind, StoppedTask, Task,
    Worker,
};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

type ApiResponse<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
struct RegisterWorkerRequest {
    external_id: Option<String>,
    name: Option<String>,
}

/// POST /api/workers — idempotent get-or-create by external identity.
async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<RegisterWorkerRequest>,
) -> ApiResponse<Worker> {
    let external_id = req
        .external_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::missing_field("external_id"))?;
    let name = req
        .name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::missing_field("name"))?;

    let worker = state
        .db
        .register_or_get_worker(&external_id, &name)
        .map_err(ApiError::from)?;
    Ok(Json(worker))
}

#[derive(Deserialize)]
struct StartDayRequest {
    worker_id: Option<i64>,
    date: Option<String>,
    kind: Option<DayKind>,
}

/// Accept a bare date or a full RFC 3339 timestamp; the time-of-day is
/// discarded either way.
fn parse_day_date(raw: &str) -> Result<NaiveDate, ApiError> {
    raw.parse::<NaiveDate>()
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive())
        })
        .map_err(|_| ApiError::invalid_value("date", "expected YYYY-MM-DD or RFC 3339"))
}

/// POST /api/days
async fn start_day(
    State(state): State<AppState>,
    Json(req): Json<StartDayRequest>,
) -> ApiResponse<Day> {
    let worker_id = req
        .worker_id
        .ok_or_else(|| ApiError::missing_field("worker_id"))?;
    let raw_date = req.date.ok_or_else(|| ApiError::missing_field("date"))?;
    let date = parse_day_date(&raw_date)?;
    let kind = req.kind.unwrap_or(DayKind::Working);

    let day = state
        .db
        .start_day(worker_id, date, kind)
        .map_err(ApiError::from)?;
    Ok(Json(day))
}

/// PUT /api/days/{id}
async fn complete_day(
    State(state): State<AppState>,
    Path(day_id): Path<i64>,
) -> ApiResponse<Day> {
    let day = state.db.complete_day(day_id).map_err(ApiError::from)?;
    Ok(Json(day))
}

#[derive(Deserialize)]
struct WorkerQuery {
    worker_id: i64,
}

/// GET /api/days/active?worker_id=
async fn get_active_day(
    State(state): State<AppState>,
    Query(query): Query<WorkerQuery>,
) -> ApiResponse<Option<ActiveDay>> {
    let active = state
        .db
        .get_active_day(query.worker_id)
        .map_err(ApiError::from)?;
    Ok(Json(active))
}

#[derive(Deserialize)]
struct ListDaysQuery {
    worker_id: i64,
    /// `YYYY-MM`; defaults to the current month.
    month: Option<String>,
}

fn parse_month(raw: &str) -> Result<(i32, u32), ApiError> {
    let invalid = || ApiError::invalid_value("month", "expected YYYY-MM");
    let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// GET /api/days?worker_id=&month=YYYY-MM
async fn list_days(
    State(state): State<AppState>,
    Query(query): Query<ListDaysQuery>,
) -> ApiResponse<Vec<Day>> {
    let month = query.month.as_deref().map(parse_month).transpose()?;
    let days = state
        .db
        .list_days(query.worker_id, month)
        .map_err(ApiError::from)?;
    Ok(Json(days))
}

#[derive(Deserialize)]
struct StartTaskRequest {
    worker_id: Option<i64>,
    task_number: Option<String>,
    day_id: Option<i64>,
}

/// POST /api/tasks
async fn start_task(
    State(state): State<AppState>,
    Json(req): Json<StartTaskRequest>,
) -> ApiResponse<Task> {
    let worker_id = req
        .worker_id
        .ok_or_else(|| ApiError::missing_field("worker_id"))?;
    let task_number = req
        .task_number
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::missing_field("task_number"))?;

    let task = state
        .db
        .start_task(worker_id, &task_number, req.day_id)
        .map_err(ApiError::from)?;
    Ok(Json(task))
}

/// PUT /api/tasks/{id}
async fn stop_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> ApiResponse<StoppedTask> {
    let stopped = state.db.stop_task(task_id).map_err(ApiError::from)?;
    Ok(Json(stopped))
}

#[derive(Deserialize)]
struct ListTasksQuery {
    worker_id: i64,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct TaskListResponse {
    tasks: Vec<Task>,
}

/// GET /api/tasks?worker_id=&limit=
async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResponse<TaskListResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let tasks = state
        .db
        .list_tasks(query.worker_id, limit)
        .map_err(ApiError::from)?;
    Ok(Json(TaskListResponse { tasks }))
}

#[derive(Deserialize)]
struct ToggleStageRequest {
    stage_kind: Option<StageKind>,
    units: Option<f64>,
}

/// PUT /api/tasks/{id}/stage
async fn toggle_stage(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(req): Json<ToggleStageRequest>,
) -> ApiResponse<Stage> {
    let kind = req
        .stage_kind
        .ok_or_else(|| ApiError::missing_field("stage_kind"))?;

    let stage = state
        .db
        .toggle_stage(task_id, kind, req.units)
        .map_err(ApiError::from)?;
    Ok(Json(stage))
}

#[derive(Deserialize)]
struct AddExtraWorkRequest {
    name: Option<String>,
}

/// POST /api/tasks/{id}/extra-work
async fn add_extra_work(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(req): Json<AddExtraWorkRequest>,
) -> ApiResponse<ExtraWork> {
    let name = req
        .name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::missing_field("name"))?;

    let work = state
        .db
        .add_extra_work(task_id, &name)
        .map_err(ApiError::from)?;
    Ok(Json(work))
}

/// PUT /api/extra-work/{id}
async fn toggle_extra_work(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResponse<ExtraWork> {
    let work = state.db.toggle_extra_work(id).map_err(ApiError::from)?;
    Ok(Json(work))
}

#[derive(Serialize)]
struct RemoveResponse {
    success: bool,
}

/// DELETE /api/extra-work/{id}
async fn remove_extra_work(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResponse<RemoveResponse> {
    state.db.remove_extra_work(id).map_err(ApiError::from)?;
    Ok(Json(RemoveResponse { success: true }))
}

/// GET /api/norms
async fn get_norms(State(state): State<AppState>) -> ApiResponse<Vec<Norm>> {
    let norms = state.db.get_norms().map_err(ApiError::from)?;
    Ok(Json(norms))
}

#[derive(Deserialize)]
struct UpdateNormsRequest {
    norms: Vec<NormUpdate>,
}

/// PUT /api/norms — bulk update, malformed entries skipped.
async fn update_norms(
    State(state): State<AppState>,
    Json(req): Json<UpdateNormsRequest>,
) -> ApiResponse<Vec<Norm>> {
    let norms = state.db.update_norms(&req.norms).map_err(ApiError::from)?;
    Ok(Json(norms))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /api/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/workers", post(register_worker))
        .route("/api/days", get(list_days).post(start_day))
        .route("/api/days/active", get(get_active_day))
        .route("/api/days/{id}", put(complete_day))
        .route("/api/tasks", get(list_tasks).post(start_task))
        .route("/api/tasks/{id}", put(stop_task))
        .route("/api/tasks/{id}/stage", put(toggle_stage))
        .route("/api/tasks/{id}/extra-work", post(add_extra_work))
        .route(
            "/api/extra-work/{id}",
            put(toggle_extra_work).delete(remove_extra_work),
        )
        .route("/api/norms", get(get_norms).put(update_norms))
        .route("/api/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the specified port.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    db: Database,
    port: u16,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(AppState::new(db));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("press-shift API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_month_accepts_valid() {
        assert_eq!(parse_month("2025-03").unwrap(), (2025, 3));
        assert_eq!(parse_month("1999-12").unwrap(), (1999, 12));
    }

    #[test]
    fn parse_month_rejects_garbage() {
        assert!(parse_month("2025").is_err());
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("march").is_err());
    }

    #[test]
    fn parse_day_date_truncates_time() {
        let d = parse_day_date("2025-06-01T14:30:00+03:00").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let d = parse_day_date("2025-06-01").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }
}
