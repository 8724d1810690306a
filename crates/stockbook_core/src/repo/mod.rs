//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//! - Scope every query by the owning organization.
//!
//! # Invariants
//! - Repository writes enforce model `validate()` before persistence.
//! - Quantity mutations and their history entries commit in one
//!   transaction; a failed append aborts the quantity change.
//! - Repository APIs return semantic errors (`MaterialNotFound`,
//!   `DuplicateSku`) in addition to DB transport errors.

pub mod count_session_repo;
pub mod history_repo;
pub mod material_repo;
