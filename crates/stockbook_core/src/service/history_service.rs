//! History log read facade.
//!
//! # Responsibility
//! - Expose the append-only audit trail to core callers.
//! - Provide the audited-quantity sum used to cross-check the ledger.
//!
//! # Invariants
//! - No API here can modify or remove an existing entry.

use crate::model::history::{HistoryAction, HistoryEntry, HistoryEntryId, NewHistoryEntry};
use crate::model::material::MaterialId;
use crate::repo::history_repo::HistoryRepository;
use crate::repo::material_repo::RepoResult;

/// Use-case facade over the history log.
pub struct HistoryService<R: HistoryRepository> {
    repo: R,
}

impl<R: HistoryRepository> HistoryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Appends one entry.
    ///
    /// Ledger operations append through their own transactions; this path
    /// serves flows outside the ledger (e.g. location transfers).
    pub fn append(&mut self, entry: &NewHistoryEntry) -> RepoResult<HistoryEntryId> {
        self.repo.append(entry)
    }

    /// Lists a material's entries, newest first.
    pub fn list_for_material(
        &self,
        material_uuid: MaterialId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>> {
        self.repo.list_for_material(material_uuid, limit, offset)
    }

    /// Lists entries of one action kind, newest first.
    pub fn list_by_action(
        &self,
        action: HistoryAction,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>> {
        self.repo.list_by_action(action, limit, offset)
    }

    /// Lists the organization's entries across materials, newest first.
    pub fn list_recent(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<HistoryEntry>> {
        self.repo.list_recent(limit, offset)
    }

    /// Reconstructs a material's on-hand from its audit trail.
    ///
    /// For a material that still exists this equals the live value; a
    /// mismatch means the ledger/log invariant has been violated.
    pub fn audited_on_hand(&self, material_uuid: MaterialId) -> RepoResult<i64> {
        self.repo.sum_changes_for_material(material_uuid)
    }
}
