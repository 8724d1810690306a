//! Material domain model.
//!
//! # Responsibility
//! - Define the trackable inventory item and its validation rules.
//! - Provide the low-stock predicate used by read views.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another material.
//! - `on_hand` is mutated exclusively through the ledger adjustment
//!   primitive; this model never changes it directly.
//! - `sku` is stored normalized (trimmed, uppercased) and unique within
//!   one organization.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a material.
pub type MaterialId = Uuid;

static SKU_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9._-]*$").expect("valid sku regex"));

/// Lifecycle status of a material record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    /// Visible in stock views and countable.
    Active,
    /// Retained for history but excluded from low-stock views.
    Inactive,
}

/// Validation failure for material fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialValidationError {
    NilUuid,
    EmptyName,
    /// Normalized SKU does not match the accepted shape.
    InvalidSku(String),
    NegativeMinLevel(i64),
    NegativeInitialQuantity(i64),
}

impl Display for MaterialValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "material uuid cannot be nil"),
            Self::EmptyName => write!(f, "material name cannot be empty"),
            Self::InvalidSku(sku) => write!(f, "invalid sku `{sku}`"),
            Self::NegativeMinLevel(value) => write!(f, "min_level cannot be negative: {value}"),
            Self::NegativeInitialQuantity(value) => {
                write!(f, "initial on_hand cannot be negative: {value}")
            }
        }
    }
}

impl Error for MaterialValidationError {}

/// One trackable inventory item.
///
/// Timestamps are epoch milliseconds stamped by the persistence layer;
/// they are `None`/zero on instances not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    /// Stable global ID used for ledger, history and count references.
    pub uuid: MaterialId,
    /// Display name; mutable via profile updates.
    pub name: String,
    /// Normalized stock-keeping unit, unique within one organization.
    pub sku: String,
    /// Current tracked stock level. Kept >= 0 by ledger policy.
    pub on_hand: i64,
    /// Low-stock threshold. `0` disables the low-stock view for this item.
    pub min_level: i64,
    pub department: Option<String>,
    pub location: Option<String>,
    pub facility: Option<String>,
    pub status: MaterialStatus,
    /// Epoch ms of the last count-sourced adjustment.
    pub last_counted_at: Option<i64>,
    /// Epoch ms of the last manual adjustment.
    pub last_adjusted_at: Option<i64>,
}

impl Material {
    /// Creates a material with a generated stable ID and normalized SKU.
    ///
    /// # Invariants
    /// - `on_hand` and `min_level` start at zero.
    /// - `status` starts as `Active`.
    pub fn new(name: impl Into<String>, sku: &str) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            sku: normalize_sku(sku),
            on_hand: 0,
            min_level: 0,
            department: None,
            location: None,
            facility: None,
            status: MaterialStatus::Active,
            last_counted_at: None,
            last_adjusted_at: None,
        }
    }

    /// Creates a material with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        uuid: MaterialId,
        name: impl Into<String>,
        sku: &str,
    ) -> Result<Self, MaterialValidationError> {
        if uuid.is_nil() {
            return Err(MaterialValidationError::NilUuid);
        }
        let mut material = Self::new(name, sku);
        material.uuid = uuid;
        Ok(material)
    }

    /// Checks field-level rules before any write is attempted.
    pub fn validate(&self) -> Result<(), MaterialValidationError> {
        if self.uuid.is_nil() {
            return Err(MaterialValidationError::NilUuid);
        }
        if self.name.trim().is_empty() {
            return Err(MaterialValidationError::EmptyName);
        }
        if !SKU_RE.is_match(&self.sku) {
            return Err(MaterialValidationError::InvalidSku(self.sku.clone()));
        }
        if self.min_level < 0 {
            return Err(MaterialValidationError::NegativeMinLevel(self.min_level));
        }
        if self.on_hand < 0 {
            return Err(MaterialValidationError::NegativeInitialQuantity(
                self.on_hand,
            ));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == MaterialStatus::Active
    }

    /// Low-stock predicate shared by the read views.
    ///
    /// A zero threshold means "not tracked", so it never flags.
    pub fn is_low_stock(&self) -> bool {
        self.is_active() && self.min_level > 0 && self.on_hand <= self.min_level
    }
}

/// Normalizes a raw SKU to its stored form (trimmed, uppercased).
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize_sku, Material, MaterialValidationError};

    #[test]
    fn normalize_sku_trims_and_uppercases() {
        assert_eq!(normalize_sku("  mx-104a "), "MX-104A");
    }

    #[test]
    fn validate_rejects_malformed_sku() {
        let material = Material::new("Bearing", "-BAD SKU-");
        assert!(matches!(
            material.validate(),
            Err(MaterialValidationError::InvalidSku(_))
        ));
    }

    #[test]
    fn low_stock_requires_positive_threshold() {
        let mut material = Material::new("Bearing", "BRG-01");
        material.on_hand = 0;
        material.min_level = 0;
        assert!(!material.is_low_stock());

        material.min_level = 5;
        material.on_hand = 5;
        assert!(material.is_low_stock());

        material.on_hand = 6;
        assert!(!material.is_low_stock());
    }
}
