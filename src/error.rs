//! Structured error types for API responses.

use crate::types::Day;
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    WorkerNotFound,
    DayNotFound,
    TaskNotFound,
    ExtraWorkNotFound,

    // Conflict errors
    DayExists,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::WorkerNotFound
                | ErrorCode::DayNotFound
                | ErrorCode::TaskNotFound
                | ErrorCode::ExtraWorkNotFound
        )
    }
}

/// Structured error returned by lifecycle operations.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The pre-existing day, attached to `DayExists` so the caller can decide
    /// how to proceed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<Day>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            day: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn worker_not_found(worker_id: i64) -> Self {
        Self::new(
            ErrorCode::WorkerNotFound,
            format!("Worker not found: {}", worker_id),
        )
    }

    pub fn day_not_found(day_id: i64) -> Self {
        Self::new(ErrorCode::DayNotFound, format!("Day not found: {}", day_id))
    }

    pub fn task_not_found(task_id: i64) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn extra_work_not_found(id: i64) -> Self {
        Self::new(
            ErrorCode::ExtraWorkNotFound,
            format!("Extra work not found: {}", id),
        )
    }

    pub fn day_exists(existing: Day) -> Self {
        let mut err = Self::new(
            ErrorCode::DayExists,
            format!("Day already exists for {}", existing.date),
        );
        err.day = Some(existing);
        err
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to ApiError first
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => ApiError::internal(err),
        }
    }
}

/// Result type for lifecycle operations surfaced to the API layer.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
