//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod count_service;
pub mod history_service;
pub mod ledger_service;

/// Current wall-clock time in epoch milliseconds.
///
/// Stamps set by services (count timestamps, session transitions); row
/// bookkeeping timestamps are stamped in SQL by the repositories.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
