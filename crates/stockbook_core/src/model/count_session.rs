//! Count session and count item models.
//!
//! # Responsibility
//! - Define the physical-count workflow state machine and its per-item
//!   records.
//! - Keep aggregate counters derivable from item state in one place.
//!
//! # Invariants
//! - `expected_quantity` is frozen at session creation and never
//!   refreshed, even if the live ledger moves.
//! - `counted_items`/`variance_count` are always recomputed from items,
//!   never adjusted incrementally.
//! - Status moves only forward, except the jump to `Cancelled` from any
//!   non-terminal state.

use crate::model::material::{Material, MaterialId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a count session.
pub type CountSessionId = Uuid;

/// Workflow state of a count session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSessionStatus {
    /// Created with a frozen snapshot; no counts recorded yet.
    Draft,
    /// Accepting counts.
    InProgress,
    /// Every item counted at least once. Terminal.
    Completed,
    /// Abandoned. Terminal, no ledger side effects.
    Cancelled,
}

impl CountSessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Counts may only be recorded while in progress.
    pub fn accepts_counts(self) -> bool {
        self == Self::InProgress
    }

    pub fn can_start(self) -> bool {
        self == Self::Draft
    }

    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

/// Validation failure for count session construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSessionValidationError {
    NilUuid,
    EmptyName,
    EmptyCreator,
    /// A session with no items would be born complete.
    EmptyItemSet,
    /// The same material appears twice in one session.
    DuplicateItem(MaterialId),
}

impl Display for CountSessionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "count session uuid cannot be nil"),
            Self::EmptyName => write!(f, "count session name cannot be empty"),
            Self::EmptyCreator => write!(f, "count session creator cannot be empty"),
            Self::EmptyItemSet => write!(f, "count session requires at least one item"),
            Self::DuplicateItem(id) => {
                write!(f, "material {id} appears more than once in session")
            }
        }
    }
}

impl Error for CountSessionValidationError {}

/// Per-material record inside one count session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountItem {
    pub material_uuid: MaterialId,
    /// Name snapshot taken when the session was created.
    pub material_name: String,
    /// SKU snapshot taken when the session was created.
    pub material_sku: String,
    /// On-hand quantity frozen at session creation.
    pub expected_quantity: i64,
    /// Absent until the item is counted.
    pub counted_quantity: Option<i64>,
    /// `counted_quantity - expected_quantity`; absent until counted.
    pub variance: Option<i64>,
    pub counted: bool,
    pub counted_at: Option<i64>,
    pub counted_by: Option<String>,
    pub notes: Option<String>,
}

impl CountItem {
    /// Snapshots one material's live quantity as the count baseline.
    pub fn snapshot(material: &Material) -> Self {
        Self {
            material_uuid: material.uuid,
            material_name: material.name.clone(),
            material_sku: material.sku.clone(),
            expected_quantity: material.on_hand,
            counted_quantity: None,
            variance: None,
            counted: false,
            counted_at: None,
            counted_by: None,
            notes: None,
        }
    }

    /// Records a count. Re-counting overwrites the prior result; no
    /// intermediate counts are kept at the item level.
    pub fn record(
        &mut self,
        counted_quantity: i64,
        counted_by: impl Into<String>,
        counted_at: i64,
        notes: Option<String>,
    ) {
        self.counted_quantity = Some(counted_quantity);
        self.variance = Some(counted_quantity - self.expected_quantity);
        self.counted = true;
        self.counted_at = Some(counted_at);
        self.counted_by = Some(counted_by.into());
        self.notes = notes;
    }

    /// True for counted items whose count disagrees with the baseline.
    pub fn has_variance(&self) -> bool {
        self.counted && self.variance.unwrap_or(0) != 0
    }
}

/// One physical-count exercise over a frozen set of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSession {
    pub uuid: CountSessionId,
    pub name: String,
    /// Optional facility scope chosen at creation.
    pub facility: Option<String>,
    /// Optional category scope chosen at creation.
    pub category: Option<String>,
    pub status: CountSessionStatus,
    pub created_by: String,
    pub notes: Option<String>,
    pub total_items: i64,
    pub counted_items: i64,
    pub variance_count: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    /// Items in creation order.
    pub items: Vec<CountItem>,
}

impl CountSession {
    /// Creates a draft session over the given item snapshots.
    pub fn new(
        name: impl Into<String>,
        created_by: impl Into<String>,
        items: Vec<CountItem>,
    ) -> Self {
        let mut session = Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            facility: None,
            category: None,
            status: CountSessionStatus::Draft,
            created_by: created_by.into(),
            notes: None,
            total_items: 0,
            counted_items: 0,
            variance_count: 0,
            started_at: None,
            completed_at: None,
            items,
        };
        session.recompute_counters();
        session
    }

    /// Checks construction rules before any write is attempted.
    pub fn validate(&self) -> Result<(), CountSessionValidationError> {
        if self.uuid.is_nil() {
            return Err(CountSessionValidationError::NilUuid);
        }
        if self.name.trim().is_empty() {
            return Err(CountSessionValidationError::EmptyName);
        }
        if self.created_by.trim().is_empty() {
            return Err(CountSessionValidationError::EmptyCreator);
        }
        if self.items.is_empty() {
            return Err(CountSessionValidationError::EmptyItemSet);
        }
        for (index, item) in self.items.iter().enumerate() {
            if self.items[..index]
                .iter()
                .any(|prior| prior.material_uuid == item.material_uuid)
            {
                return Err(CountSessionValidationError::DuplicateItem(
                    item.material_uuid,
                ));
            }
        }
        Ok(())
    }

    /// Recomputes aggregate counters from item state.
    pub fn recompute_counters(&mut self) {
        self.total_items = self.items.len() as i64;
        self.counted_items = self.items.iter().filter(|item| item.counted).count() as i64;
        self.variance_count = self.items.iter().filter(|item| item.has_variance()).count() as i64;
    }

    /// True once every item has been counted at least once.
    pub fn all_counted(&self) -> bool {
        self.total_items > 0 && self.counted_items == self.total_items
    }

    pub fn item(&self, material_uuid: MaterialId) -> Option<&CountItem> {
        self.items
            .iter()
            .find(|item| item.material_uuid == material_uuid)
    }

    pub fn item_mut(&mut self, material_uuid: MaterialId) -> Option<&mut CountItem> {
        self.items
            .iter_mut()
            .find(|item| item.material_uuid == material_uuid)
    }
}
