//! Domain model for the inventory ledger and count workflow.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep quantity/audit invariants enforceable at the type level where
//!   construction can do so.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID (or rowid for
//!   history entries).
//! - History entries are immutable facts; their delta is computed at
//!   construction, never supplied by callers.

pub mod count_session;
pub mod history;
pub mod material;
pub mod org;
