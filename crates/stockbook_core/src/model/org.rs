//! Organization scope identifier.
//!
//! # Responsibility
//! - Carry the opaque tenant identifier supplied by the external
//!   tenant-resolution layer.
//!
//! # Invariants
//! - The value is opaque to this crate; it is matched byte-for-byte when
//!   scoping queries and never parsed.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque organization identifier scoping all persistence operations.
///
/// The engine does not authenticate or resolve tenants; it records and
/// filters on whatever identifier it is handed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(String);

/// Rejected empty/whitespace organization identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOrgId;

impl Display for InvalidOrgId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "organization id cannot be empty")
    }
}

impl Error for InvalidOrgId {}

impl OrgId {
    /// Wraps a non-empty identifier; whitespace-only input is rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidOrgId> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(InvalidOrgId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrgId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
