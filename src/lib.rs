//! Press-shift tracking library.
//!
//! Core state model for print-shop shift tracking: workdays, per-task stage
//! timers, extra work items, and efficiency scoring against configurable
//! norms.

pub mod api;
pub mod config;
pub mod db;
pub mod efficiency;
pub mod error;
pub mod types;
