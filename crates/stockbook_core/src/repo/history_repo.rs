//! Append-only history log storage.
//!
//! # Responsibility
//! - Append immutable quantity-change entries.
//! - Provide newest-first read access with pagination.
//!
//! # Invariants
//! - No update or delete statement exists in this module; the log is
//!   write-once, read-many.
//! - Read paths reject rows whose stored delta disagrees with their
//!   before/after pair.
//! - Every statement filters on the repository's organization scope.

use crate::model::history::{HistoryAction, HistoryEntry, HistoryEntryId, NewHistoryEntry};
use crate::model::material::MaterialId;
use crate::model::org::OrgId;
use crate::repo::material_repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const HISTORY_DEFAULT_LIMIT: u32 = 50;
const HISTORY_LIMIT_MAX: u32 = 200;

const HISTORY_SELECT_SQL: &str = "SELECT
    id,
    material_uuid,
    material_name,
    material_sku,
    action,
    quantity_before,
    quantity_after,
    quantity_change,
    reason,
    performed_by,
    notes,
    created_at
FROM history_entries";

/// Repository interface for the append-only history log.
pub trait HistoryRepository {
    /// Appends one entry. The only write the log supports.
    fn append(&mut self, entry: &NewHistoryEntry) -> RepoResult<HistoryEntryId>;
    /// Lists a material's entries, newest first.
    fn list_for_material(
        &self,
        material_uuid: MaterialId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>>;
    /// Lists entries of one action kind, newest first.
    fn list_by_action(
        &self,
        action: HistoryAction,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>>;
    /// Lists the organization's entries across materials, newest first.
    fn list_recent(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<HistoryEntry>>;
    /// Sums `quantity_change` over a material's entries. For a material
    /// that still exists this equals its current on-hand.
    fn sum_changes_for_material(&self, material_uuid: MaterialId) -> RepoResult<i64>;
}

/// SQLite-backed history log scoped to one organization.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
    org: OrgId,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection, org: OrgId) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, org })
    }

    fn list_where(
        &self,
        predicate: &str,
        extra_bind: Option<String>,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>> {
        let sql = format!(
            "{HISTORY_SELECT_SQL} WHERE org_id = ?{predicate}
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?;"
        );

        let mut bind_values: Vec<Value> = vec![Value::Text(self.org.as_str().to_string())];
        if let Some(value) = extra_bind {
            bind_values.push(Value::Text(value));
        }
        bind_values.push(Value::Integer(i64::from(normalize_history_limit(limit))));
        bind_values.push(Value::Integer(i64::from(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn append(&mut self, entry: &NewHistoryEntry) -> RepoResult<HistoryEntryId> {
        insert_entry(self.conn, &self.org, entry)
    }

    fn list_for_material(
        &self,
        material_uuid: MaterialId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>> {
        self.list_where(
            " AND material_uuid = ?",
            Some(material_uuid.to_string()),
            limit,
            offset,
        )
    }

    fn list_by_action(
        &self,
        action: HistoryAction,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>> {
        self.list_where(
            " AND action = ?",
            Some(action_to_db(action).to_string()),
            limit,
            offset,
        )
    }

    fn list_recent(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<HistoryEntry>> {
        self.list_where("", None, limit, offset)
    }

    fn sum_changes_for_material(&self, material_uuid: MaterialId) -> RepoResult<i64> {
        let sum: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(quantity_change), 0)
             FROM history_entries
             WHERE org_id = ?1 AND material_uuid = ?2;",
            params![self.org.as_str(), material_uuid.to_string()],
            |row| row.get(0),
        )?;
        Ok(sum)
    }
}

/// Inserts one history row. Shared with ledger transactions so quantity
/// writes and their audit entries can commit atomically.
pub(crate) fn insert_entry(
    conn: &Connection,
    org: &OrgId,
    entry: &NewHistoryEntry,
) -> RepoResult<HistoryEntryId> {
    conn.execute(
        "INSERT INTO history_entries (
            org_id,
            material_uuid,
            material_name,
            material_sku,
            action,
            quantity_before,
            quantity_after,
            quantity_change,
            reason,
            performed_by,
            notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            org.as_str(),
            entry.material_uuid.to_string(),
            entry.material_name.as_str(),
            entry.material_sku.as_str(),
            action_to_db(entry.action),
            entry.quantity_before,
            entry.quantity_after,
            entry.quantity_change,
            entry.reason.as_str(),
            entry.performed_by.as_str(),
            entry.notes.as_deref(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Normalizes list limit according to the history log contract.
pub fn normalize_history_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => HISTORY_DEFAULT_LIMIT,
        Some(value) if value > HISTORY_LIMIT_MAX => HISTORY_LIMIT_MAX,
        Some(value) => value,
        None => HISTORY_DEFAULT_LIMIT,
    }
}

/// Canonical storage/log form of an action kind.
pub fn action_to_db(action: HistoryAction) -> &'static str {
    match action {
        HistoryAction::Create => "create",
        HistoryAction::Adjustment => "adjustment",
        HistoryAction::Count => "count",
        HistoryAction::Receive => "receive",
        HistoryAction::Issue => "issue",
        HistoryAction::Delete => "delete",
        HistoryAction::Transfer => "transfer",
    }
}

fn parse_action(value: &str) -> Option<HistoryAction> {
    match value {
        "create" => Some(HistoryAction::Create),
        "adjustment" => Some(HistoryAction::Adjustment),
        "count" => Some(HistoryAction::Count),
        "receive" => Some(HistoryAction::Receive),
        "issue" => Some(HistoryAction::Issue),
        "delete" => Some(HistoryAction::Delete),
        "transfer" => Some(HistoryAction::Transfer),
        _ => None,
    }
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryEntry> {
    let uuid_text: String = row.get("material_uuid")?;
    let material_uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in history_entries.material_uuid"
        ))
    })?;

    let action_text: String = row.get("action")?;
    let action = parse_action(&action_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid action `{action_text}` in history_entries.action"
        ))
    })?;

    let quantity_before: i64 = row.get("quantity_before")?;
    let quantity_after: i64 = row.get("quantity_after")?;
    let quantity_change: i64 = row.get("quantity_change")?;
    if quantity_change != quantity_after - quantity_before {
        return Err(RepoError::InvalidData(format!(
            "history entry delta {quantity_change} disagrees with before {quantity_before} / after {quantity_after}"
        )));
    }

    Ok(HistoryEntry {
        id: row.get("id")?,
        material_uuid,
        material_name: row.get("material_name")?,
        material_sku: row.get("material_sku")?,
        action,
        quantity_before,
        quantity_after,
        quantity_change,
        reason: row.get("reason")?,
        performed_by: row.get("performed_by")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::normalize_history_limit;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_history_limit(None), 50);
        assert_eq!(normalize_history_limit(Some(0)), 50);
        assert_eq!(normalize_history_limit(Some(25)), 25);
        assert_eq!(normalize_history_limit(Some(10_000)), 200);
    }
}
