//! Count session use-case service.
//!
//! # Responsibility
//! - Drive the count workflow state machine (draft, in_progress,
//!   completed, cancelled).
//! - Snapshot expected quantities at session creation.
//! - Reconcile counted quantities into the ledger through its adjustment
//!   primitive.
//!
//! # Invariants
//! - This service never writes on-hand directly; reconciliation always
//!   calls back into the ledger so the audit path stays single.
//! - Sessions complete automatically on the count that covers the last
//!   uncounted item; there is no explicit complete call.

use crate::model::count_session::{
    CountItem, CountSession, CountSessionId, CountSessionStatus, CountSessionValidationError,
};
use crate::model::history::HistoryAction;
use crate::model::material::{Material, MaterialId};
use crate::repo::count_session_repo::{CountSessionListQuery, CountSessionRepository};
use crate::repo::material_repo::{AdjustmentCommand, MaterialRepository, RepoError};
use crate::service::ledger_service::{LedgerError, LedgerService};
use crate::service::now_epoch_ms;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const RECONCILE_REASON: &str = "count reconciliation";

/// Service error for count workflow use-cases.
#[derive(Debug)]
pub enum CountError {
    SessionNotFound(CountSessionId),
    /// Material is not part of this session's frozen scope.
    ItemNotFound {
        session: CountSessionId,
        material: MaterialId,
    },
    /// Session creation referenced a material that does not exist.
    UnknownMaterial(MaterialId),
    /// Start/cancel attempted from a state that does not allow it.
    InvalidTransition {
        session: CountSessionId,
        from: CountSessionStatus,
    },
    /// Recording or reconciliation attempted in an ineligible state.
    NotAcceptingCounts {
        session: CountSessionId,
        status: CountSessionStatus,
    },
    /// Counter/applier identity is required.
    EmptyCounter,
    /// Counted quantities cannot be negative.
    NegativeCount(i64),
    Validation(CountSessionValidationError),
    Ledger(LedgerError),
    Repo(RepoError),
}

impl Display for CountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "count session not found: {id}"),
            Self::ItemNotFound { session, material } => {
                write!(f, "material {material} is not part of session {session}")
            }
            Self::UnknownMaterial(id) => write!(f, "material not found: {id}"),
            Self::InvalidTransition { session, from } => {
                write!(f, "invalid transition for session {session} from {from:?}")
            }
            Self::NotAcceptingCounts { session, status } => {
                write!(f, "session {session} does not accept counts in {status:?}")
            }
            Self::EmptyCounter => write!(f, "counter identity cannot be empty"),
            Self::NegativeCount(value) => {
                write!(f, "counted quantity cannot be negative: {value}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Ledger(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CountError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::SessionNotFound(id) => Self::SessionNotFound(id),
            RepoError::SessionValidation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<LedgerError> for CountError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

/// Request model for creating a count session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCountSession {
    pub name: String,
    pub facility: Option<String>,
    pub category: Option<String>,
    /// Materials whose live on-hand is snapshotted as the baseline.
    pub material_uuids: Vec<MaterialId>,
    pub created_by: String,
    pub notes: Option<String>,
}

/// Request model for recording one item count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCountRequest {
    pub session_uuid: CountSessionId,
    pub material_uuid: MaterialId,
    pub counted_quantity: i64,
    pub counted_by: String,
    pub notes: Option<String>,
    /// Reconcile the ledger immediately when the count disagrees with the
    /// baseline, instead of waiting for a deferred apply.
    pub apply_to_inventory: bool,
}

/// Count workflow facade over session persistence and the ledger.
pub struct CountService<S: CountSessionRepository, M: MaterialRepository> {
    sessions: S,
    ledger: LedgerService<M>,
}

impl<S: CountSessionRepository, M: MaterialRepository> CountService<S, M> {
    /// Creates a service over session storage and the ledger it
    /// reconciles into.
    pub fn new(sessions: S, ledger: LedgerService<M>) -> Self {
        Self { sessions, ledger }
    }

    /// Creates a draft session snapshotting each material's live on-hand
    /// as the frozen count baseline.
    pub fn create(&mut self, request: NewCountSession) -> Result<CountSession, CountError> {
        let mut items = Vec::with_capacity(request.material_uuids.len());
        for material_uuid in &request.material_uuids {
            let material = self
                .ledger
                .get(*material_uuid)?
                .ok_or(CountError::UnknownMaterial(*material_uuid))?;
            items.push(CountItem::snapshot(&material));
        }

        let mut session = CountSession::new(request.name, request.created_by, items);
        session.facility = request.facility;
        session.category = request.category;
        session.notes = request.notes;
        session.validate().map_err(CountError::Validation)?;

        self.sessions.insert_session(&session)?;
        info!(
            "event=count_session_create module=count status=ok session={} total_items={}",
            session.uuid, session.total_items
        );
        Ok(session)
    }

    /// Moves a draft session into progress. Fails from any other state.
    pub fn start(&mut self, session_uuid: CountSessionId) -> Result<CountSession, CountError> {
        let mut session = self.require_session(session_uuid)?;
        if !session.status.can_start() {
            return Err(CountError::InvalidTransition {
                session: session_uuid,
                from: session.status,
            });
        }

        session.status = CountSessionStatus::InProgress;
        session.started_at = Some(now_epoch_ms());
        self.sessions.update_session(&session)?;
        info!(
            "event=count_session_start module=count status=ok session={session_uuid}"
        );
        Ok(session)
    }

    /// Records one item count; last write wins on re-counts.
    ///
    /// Completes the session automatically when this count covers the
    /// last uncounted item. With `apply_to_inventory` set and a nonzero
    /// variance, the ledger is adjusted in the same call.
    pub fn record_count(
        &mut self,
        request: RecordCountRequest,
    ) -> Result<CountSession, CountError> {
        if request.counted_by.trim().is_empty() {
            return Err(CountError::EmptyCounter);
        }
        if request.counted_quantity < 0 {
            return Err(CountError::NegativeCount(request.counted_quantity));
        }

        let mut session = self.require_session(request.session_uuid)?;
        if !session.status.accepts_counts() {
            return Err(CountError::NotAcceptingCounts {
                session: request.session_uuid,
                status: session.status,
            });
        }

        let counted_at = now_epoch_ms();
        let item = session
            .item_mut(request.material_uuid)
            .ok_or(CountError::ItemNotFound {
                session: request.session_uuid,
                material: request.material_uuid,
            })?;
        item.record(
            request.counted_quantity,
            request.counted_by.as_str(),
            counted_at,
            request.notes.clone(),
        );
        let variance = item.variance.unwrap_or(0);

        session.recompute_counters();
        if session.all_counted() {
            session.status = CountSessionStatus::Completed;
            session.completed_at = Some(counted_at);
        }
        self.sessions.update_session(&session)?;
        info!(
            "event=count_record module=count status=ok session={} material={} variance={} counted_items={}/{}",
            session.uuid, request.material_uuid, variance, session.counted_items, session.total_items
        );

        if request.apply_to_inventory && variance != 0 {
            self.ledger.adjust(AdjustmentCommand {
                material_uuid: request.material_uuid,
                new_quantity: request.counted_quantity,
                action: HistoryAction::Count,
                reason: RECONCILE_REASON.to_string(),
                performed_by: request.counted_by,
                notes: request.notes,
            })?;
        }

        Ok(session)
    }

    /// Reconciles every counted item with nonzero variance into the
    /// ledger, one adjustment per item.
    ///
    /// Not idempotent across repeated calls once other sources have moved
    /// the live quantity: re-applying overwrites whatever is live with
    /// the session's counted value again.
    pub fn apply_to_inventory(
        &mut self,
        session_uuid: CountSessionId,
        applied_by: &str,
    ) -> Result<Vec<Material>, CountError> {
        if applied_by.trim().is_empty() {
            return Err(CountError::EmptyCounter);
        }

        let session = self.require_session(session_uuid)?;
        if !matches!(
            session.status,
            CountSessionStatus::InProgress | CountSessionStatus::Completed
        ) {
            return Err(CountError::NotAcceptingCounts {
                session: session_uuid,
                status: session.status,
            });
        }

        let mut adjusted = Vec::new();
        for item in session.items.iter().filter(|item| item.has_variance()) {
            let Some(counted_quantity) = item.counted_quantity else {
                continue;
            };
            let material = self.ledger.adjust(AdjustmentCommand {
                material_uuid: item.material_uuid,
                new_quantity: counted_quantity,
                action: HistoryAction::Count,
                reason: RECONCILE_REASON.to_string(),
                performed_by: applied_by.to_string(),
                notes: item.notes.clone(),
            })?;
            adjusted.push(material);
        }

        info!(
            "event=count_apply module=count status=ok session={} adjusted={}",
            session_uuid,
            adjusted.len()
        );
        Ok(adjusted)
    }

    /// Cancels a draft or in-progress session. Terminal, no ledger side
    /// effects.
    pub fn cancel(&mut self, session_uuid: CountSessionId) -> Result<CountSession, CountError> {
        let mut session = self.require_session(session_uuid)?;
        if !session.status.can_cancel() {
            return Err(CountError::InvalidTransition {
                session: session_uuid,
                from: session.status,
            });
        }

        session.status = CountSessionStatus::Cancelled;
        self.sessions.update_session(&session)?;
        info!(
            "event=count_session_cancel module=count status=ok session={session_uuid}"
        );
        Ok(session)
    }

    pub fn get(&self, session_uuid: CountSessionId) -> Result<Option<CountSession>, CountError> {
        Ok(self.sessions.get_session(session_uuid)?)
    }

    /// Lists sessions using filter and pagination options.
    pub fn list(&self, query: &CountSessionListQuery) -> Result<Vec<CountSession>, CountError> {
        Ok(self.sessions.list_sessions(query)?)
    }

    fn require_session(&self, session_uuid: CountSessionId) -> Result<CountSession, CountError> {
        self.sessions
            .get_session(session_uuid)?
            .ok_or(CountError::SessionNotFound(session_uuid))
    }
}
