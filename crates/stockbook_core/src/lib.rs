//! Inventory ledger and count-reconciliation core.
//! This crate is the single source of truth for quantity/audit invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::count_session::{
    CountItem, CountSession, CountSessionId, CountSessionStatus, CountSessionValidationError,
};
pub use model::history::{
    HistoryAction, HistoryEntry, HistoryEntryId, NewHistoryEntry,
};
pub use model::material::{
    normalize_sku, Material, MaterialId, MaterialStatus, MaterialValidationError,
};
pub use model::org::{InvalidOrgId, OrgId};
pub use repo::count_session_repo::{
    CountSessionListQuery, CountSessionRepository, SqliteCountSessionRepository,
};
pub use repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
pub use repo::material_repo::{
    AdjustmentCommand, MaterialListQuery, MaterialRepository, RepoError, RepoResult,
    SqliteMaterialRepository,
};
pub use service::count_service::{
    CountError, CountService, NewCountSession, RecordCountRequest,
};
pub use service::history_service::HistoryService;
pub use service::ledger_service::{LedgerError, LedgerService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
