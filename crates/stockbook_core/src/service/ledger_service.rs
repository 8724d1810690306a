//! Material ledger use-case service.
//!
//! # Responsibility
//! - Provide the adjustment primitive and its receive/issue/create/delete
//!   wrappers to core callers.
//! - Enforce pure preconditions (reason, performer, quantity sign) before
//!   any write is attempted.
//! - Expose the stateless read views over live material state.
//!
//! # Invariants
//! - Every quantity change goes through `adjust`; wrappers only compute
//!   the target quantity.
//! - Issue clamps at zero instead of going negative; callers needing a
//!   hard floor must check first.

use crate::model::history::HistoryAction;
use crate::model::material::{Material, MaterialId, MaterialStatus, MaterialValidationError};
use crate::repo::history_repo::action_to_db;
use crate::repo::material_repo::{
    AdjustmentCommand, MaterialListQuery, MaterialRepository, RepoError,
};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CREATE_REASON: &str = "material created";

/// Service error for ledger use-cases.
#[derive(Debug)]
pub enum LedgerError {
    /// Reason text is required on every quantity change.
    EmptyReason,
    /// Performer identity is required on every quantity change.
    EmptyPerformer,
    /// Receive/issue quantities must be strictly positive.
    NonPositiveQuantity(i64),
    MaterialNotFound(MaterialId),
    DuplicateSku(String),
    Validation(MaterialValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyReason => write!(f, "reason cannot be empty"),
            Self::EmptyPerformer => write!(f, "performer cannot be empty"),
            Self::NonPositiveQuantity(value) => {
                write!(f, "quantity must be positive, got {value}")
            }
            Self::MaterialNotFound(id) => write!(f, "material not found: {id}"),
            Self::DuplicateSku(sku) => write!(f, "sku already in use: `{sku}`"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::MaterialNotFound(id) => Self::MaterialNotFound(id),
            RepoError::DuplicateSku(sku) => Self::DuplicateSku(sku),
            RepoError::MaterialValidation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Material ledger facade over repository implementations.
///
/// Owns the one code path all quantity mutations funnel through, whatever
/// their source (manual adjustment, receipt, issue, count reconciliation).
pub struct LedgerService<R: MaterialRepository> {
    repo: R,
}

impl<R: MaterialRepository> LedgerService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a material and its synthetic `create` history entry.
    ///
    /// # Contract
    /// - Initial `on_hand` may be nonzero; the trail still starts at zero
    ///   (`before=0, after=initial`).
    /// - Duplicate SKU within the organization is rejected before insert.
    pub fn create(
        &mut self,
        material: Material,
        performed_by: &str,
    ) -> Result<Material, LedgerError> {
        require_nonblank(performed_by, LedgerError::EmptyPerformer)?;
        material.validate().map_err(LedgerError::Validation)?;

        let created = self
            .repo
            .insert_material(&material, CREATE_REASON, performed_by)?;
        info!(
            "event=material_create module=ledger status=ok material={} sku={} on_hand={}",
            created.uuid, created.sku, created.on_hand
        );
        Ok(created)
    }

    /// The adjustment primitive: sets on-hand to an absolute value and
    /// appends the matching history entry in the same transaction.
    ///
    /// # Contract
    /// - `action = count` stamps `last_counted_at`; `action = adjustment`
    ///   stamps `last_adjusted_at`.
    /// - A zero-delta command is not suppressed; it writes a zero-delta
    ///   entry.
    pub fn adjust(&mut self, command: AdjustmentCommand) -> Result<Material, LedgerError> {
        require_nonblank(&command.reason, LedgerError::EmptyReason)?;
        require_nonblank(&command.performed_by, LedgerError::EmptyPerformer)?;

        let updated = self.repo.adjust_quantity(&command)?;
        info!(
            "event=quantity_adjust module=ledger status=ok material={} action={} after={}",
            updated.uuid,
            action_to_db(command.action),
            updated.on_hand
        );
        Ok(updated)
    }

    /// Adds received stock on top of the current on-hand.
    pub fn receive(
        &mut self,
        material_uuid: MaterialId,
        quantity: i64,
        reason: &str,
        performed_by: &str,
        notes: Option<String>,
    ) -> Result<Material, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::NonPositiveQuantity(quantity));
        }
        let current = self.require_material(material_uuid)?;
        self.adjust(AdjustmentCommand {
            material_uuid,
            new_quantity: current.on_hand + quantity,
            action: HistoryAction::Receive,
            reason: reason.to_string(),
            performed_by: performed_by.to_string(),
            notes,
        })
    }

    /// Removes issued stock, clamping at zero.
    ///
    /// Issuing more than on-hand truncates to zero rather than erroring;
    /// the history entry records the actual (clamped) delta.
    pub fn issue(
        &mut self,
        material_uuid: MaterialId,
        quantity: i64,
        reason: &str,
        performed_by: &str,
        notes: Option<String>,
    ) -> Result<Material, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::NonPositiveQuantity(quantity));
        }
        let current = self.require_material(material_uuid)?;
        self.adjust(AdjustmentCommand {
            material_uuid,
            new_quantity: (current.on_hand - quantity).max(0),
            action: HistoryAction::Issue,
            reason: reason.to_string(),
            performed_by: performed_by.to_string(),
            notes,
        })
    }

    /// Deletes a material after appending its terminal history entry.
    pub fn delete(
        &mut self,
        material_uuid: MaterialId,
        reason: &str,
        performed_by: &str,
    ) -> Result<(), LedgerError> {
        require_nonblank(reason, LedgerError::EmptyReason)?;
        require_nonblank(performed_by, LedgerError::EmptyPerformer)?;

        self.repo.delete_material(material_uuid, reason, performed_by)?;
        info!(
            "event=material_delete module=ledger status=ok material={material_uuid}"
        );
        Ok(())
    }

    /// Updates profile fields (name, threshold, associations, status).
    /// Writes no history entry; `on_hand` and `sku` are untouched.
    pub fn update_profile(&mut self, material: &Material) -> Result<(), LedgerError> {
        self.repo.update_material_profile(material)?;
        Ok(())
    }

    /// Flips a material's lifecycle status via a profile update.
    pub fn set_status(
        &mut self,
        material_uuid: MaterialId,
        status: MaterialStatus,
    ) -> Result<Material, LedgerError> {
        let mut material = self.require_material(material_uuid)?;
        material.status = status;
        self.repo.update_material_profile(&material)?;
        Ok(material)
    }

    pub fn get(&self, material_uuid: MaterialId) -> Result<Option<Material>, LedgerError> {
        Ok(self.repo.get_material(material_uuid)?)
    }

    pub fn get_by_sku(&self, sku: &str) -> Result<Option<Material>, LedgerError> {
        Ok(self.repo.get_material_by_sku(sku)?)
    }

    /// Lists materials using filter and pagination options.
    pub fn list(&self, query: &MaterialListQuery) -> Result<Vec<Material>, LedgerError> {
        Ok(self.repo.list_materials(query)?)
    }

    /// Active items at or below their positive low-stock threshold.
    pub fn list_low_stock(&self) -> Result<Vec<Material>, LedgerError> {
        self.list(&MaterialListQuery {
            low_stock_only: true,
            ..MaterialListQuery::default()
        })
    }

    pub fn list_by_department(&self, department: &str) -> Result<Vec<Material>, LedgerError> {
        self.list(&MaterialListQuery {
            department: Some(department.to_string()),
            ..MaterialListQuery::default()
        })
    }

    pub fn list_by_facility(&self, facility: &str) -> Result<Vec<Material>, LedgerError> {
        self.list(&MaterialListQuery {
            facility: Some(facility.to_string()),
            ..MaterialListQuery::default()
        })
    }

    pub fn list_by_location(&self, location: &str) -> Result<Vec<Material>, LedgerError> {
        self.list(&MaterialListQuery {
            location: Some(location.to_string()),
            ..MaterialListQuery::default()
        })
    }

    fn require_material(&self, material_uuid: MaterialId) -> Result<Material, LedgerError> {
        self.repo
            .get_material(material_uuid)?
            .ok_or(LedgerError::MaterialNotFound(material_uuid))
    }
}

fn require_nonblank(value: &str, error: LedgerError) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(error);
    }
    Ok(())
}
