//! Append-only quantity history model.
//!
//! # Responsibility
//! - Define the immutable audit record written alongside every quantity
//!   change.
//!
//! # Invariants
//! - `quantity_change` always equals `quantity_after - quantity_before`;
//!   it is computed at construction and re-checked when rows are read
//!   back.
//! - Material name/SKU are snapshotted so the trail stays meaningful
//!   after renames or deletion.

use crate::model::material::MaterialId;
use serde::{Deserialize, Serialize};

/// Rowid of a stored history entry.
pub type HistoryEntryId = i64;

/// Source operation of one quantity change.
///
/// `Transfer` is recorded by location-transfer flows outside this engine;
/// the log reader lists and filters it like any other action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Adjustment,
    Count,
    Receive,
    Issue,
    Delete,
    Transfer,
}

/// A not-yet-persisted history fact.
///
/// Constructed exclusively through [`NewHistoryEntry::new`] so the delta
/// can never disagree with its before/after pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub material_uuid: MaterialId,
    /// Name snapshot taken at write time.
    pub material_name: String,
    /// SKU snapshot taken at write time.
    pub material_sku: String,
    pub action: HistoryAction,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub quantity_change: i64,
    pub reason: String,
    pub performed_by: String,
    pub notes: Option<String>,
}

impl NewHistoryEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        material_uuid: MaterialId,
        material_name: impl Into<String>,
        material_sku: impl Into<String>,
        action: HistoryAction,
        quantity_before: i64,
        quantity_after: i64,
        reason: impl Into<String>,
        performed_by: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            material_uuid,
            material_name: material_name.into(),
            material_sku: material_sku.into(),
            action,
            quantity_before,
            quantity_after,
            quantity_change: quantity_after - quantity_before,
            reason: reason.into(),
            performed_by: performed_by.into(),
            notes,
        }
    }
}

/// A stored history fact, ordered by `created_at DESC, id DESC`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub material_uuid: MaterialId,
    pub material_name: String,
    pub material_sku: String,
    pub action: HistoryAction,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub quantity_change: i64,
    pub reason: String,
    pub performed_by: String,
    pub notes: Option<String>,
    /// Insert timestamp in epoch milliseconds.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::{HistoryAction, NewHistoryEntry};
    use uuid::Uuid;

    #[test]
    fn constructor_computes_signed_delta() {
        let entry = NewHistoryEntry::new(
            Uuid::new_v4(),
            "Gasket",
            "GSK-9",
            HistoryAction::Issue,
            12,
            5,
            "maintenance issue",
            "j.ortiz",
            None,
        );
        assert_eq!(entry.quantity_change, -7);
    }
}
