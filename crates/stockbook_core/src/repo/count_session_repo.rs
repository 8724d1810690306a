//! Count session repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist count sessions with their embedded item snapshots.
//! - Keep header aggregates and item rows consistent by updating both in
//!   one transaction.
//!
//! # Invariants
//! - `expected_quantity` is written once at insert and never updated.
//! - `update_session` persists the header and every item atomically; a
//!   partial write is impossible.
//! - Every statement filters on the repository's organization scope.

use crate::model::count_session::{CountItem, CountSession, CountSessionId, CountSessionStatus};
use crate::model::org::OrgId;
use crate::repo::material_repo::{
    ensure_connection_ready, table_exists, table_has_column, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const SESSION_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    facility,
    category,
    status,
    created_by,
    notes,
    total_items,
    counted_items,
    variance_count,
    started_at,
    completed_at
FROM count_sessions";

const ITEM_SELECT_SQL: &str = "SELECT
    material_uuid,
    material_name,
    material_sku,
    expected_quantity,
    counted_quantity,
    variance,
    counted,
    counted_at,
    counted_by,
    notes
FROM count_items";

/// Query options for session listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSessionListQuery {
    pub status: Option<CountSessionStatus>,
    pub facility: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for count session persistence.
pub trait CountSessionRepository {
    /// Inserts a session header and its item snapshots in one transaction.
    fn insert_session(&mut self, session: &CountSession) -> RepoResult<()>;
    fn get_session(&self, id: CountSessionId) -> RepoResult<Option<CountSession>>;
    /// Lists sessions newest first; items are loaded per session.
    fn list_sessions(&self, query: &CountSessionListQuery) -> RepoResult<Vec<CountSession>>;
    /// Persists header state, aggregates and every item atomically.
    fn update_session(&mut self, session: &CountSession) -> RepoResult<()>;
}

/// SQLite-backed count session repository scoped to one organization.
pub struct SqliteCountSessionRepository<'conn> {
    conn: &'conn Connection,
    org: OrgId,
}

impl<'conn> SqliteCountSessionRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection, org: OrgId) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        ensure_count_connection_ready(conn)?;
        Ok(Self { conn, org })
    }
}

impl CountSessionRepository for SqliteCountSessionRepository<'_> {
    fn insert_session(&mut self, session: &CountSession) -> RepoResult<()> {
        session.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO count_sessions (
                uuid,
                org_id,
                name,
                facility,
                category,
                status,
                created_by,
                notes,
                total_items,
                counted_items,
                variance_count,
                started_at,
                completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                session.uuid.to_string(),
                self.org.as_str(),
                session.name.as_str(),
                session.facility.as_deref(),
                session.category.as_deref(),
                session_status_to_db(session.status),
                session.created_by.as_str(),
                session.notes.as_deref(),
                session.total_items,
                session.counted_items,
                session.variance_count,
                session.started_at,
                session.completed_at,
            ],
        )?;

        for (index, item) in session.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO count_items (
                    session_uuid,
                    material_uuid,
                    material_name,
                    material_sku,
                    expected_quantity,
                    counted_quantity,
                    variance,
                    counted,
                    counted_at,
                    counted_by,
                    notes,
                    sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                params![
                    session.uuid.to_string(),
                    item.material_uuid.to_string(),
                    item.material_name.as_str(),
                    item.material_sku.as_str(),
                    item.expected_quantity,
                    item.counted_quantity,
                    item.variance,
                    bool_to_int(item.counted),
                    item.counted_at,
                    item.counted_by.as_deref(),
                    item.notes.as_deref(),
                    index as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_session(&self, id: CountSessionId) -> RepoResult<Option<CountSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL} WHERE org_id = ?1 AND uuid = ?2;"
        ))?;
        let mut rows = stmt.query(params![self.org.as_str(), id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut session = parse_session_row(row)?;
            session.items = load_items_for_session(self.conn, id)?;
            return Ok(Some(session));
        }
        Ok(None)
    }

    fn list_sessions(&self, query: &CountSessionListQuery) -> RepoResult<Vec<CountSession>> {
        let mut sql = format!("{SESSION_SELECT_SQL} WHERE org_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(self.org.as_str().to_string())];

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(session_status_to_db(status).to_string()));
        }
        if let Some(facility) = query.facility.as_ref() {
            sql.push_str(" AND facility = ?");
            bind_values.push(Value::Text(facility.clone()));
        }

        sql.push_str(" ORDER BY created_at DESC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row)?);
        }

        for session in &mut sessions {
            session.items = load_items_for_session(self.conn, session.uuid)?;
        }

        Ok(sessions)
    }

    fn update_session(&mut self, session: &CountSession) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE count_sessions
             SET
                name = ?3,
                status = ?4,
                notes = ?5,
                total_items = ?6,
                counted_items = ?7,
                variance_count = ?8,
                started_at = ?9,
                completed_at = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE org_id = ?1 AND uuid = ?2;",
            params![
                self.org.as_str(),
                session.uuid.to_string(),
                session.name.as_str(),
                session_status_to_db(session.status),
                session.notes.as_deref(),
                session.total_items,
                session.counted_items,
                session.variance_count,
                session.started_at,
                session.completed_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::SessionNotFound(session.uuid));
        }

        // expected_quantity and the snapshots are deliberately absent:
        // the baseline is frozen at insert.
        for item in &session.items {
            tx.execute(
                "UPDATE count_items
                 SET
                    counted_quantity = ?3,
                    variance = ?4,
                    counted = ?5,
                    counted_at = ?6,
                    counted_by = ?7,
                    notes = ?8
                 WHERE session_uuid = ?1 AND material_uuid = ?2;",
                params![
                    session.uuid.to_string(),
                    item.material_uuid.to_string(),
                    item.counted_quantity,
                    item.variance,
                    bool_to_int(item.counted),
                    item.counted_at,
                    item.counted_by.as_deref(),
                    item.notes.as_deref(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_items_for_session(
    conn: &Connection,
    session_uuid: CountSessionId,
) -> RepoResult<Vec<CountItem>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL} WHERE session_uuid = ?1 ORDER BY sort_order ASC;"
    ))?;
    let mut rows = stmt.query([session_uuid.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }
    Ok(items)
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<CountSession> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in count_sessions.uuid"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = parse_session_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in count_sessions.status"
        ))
    })?;

    Ok(CountSession {
        uuid,
        name: row.get("name")?,
        facility: row.get("facility")?,
        category: row.get("category")?,
        status,
        created_by: row.get("created_by")?,
        notes: row.get("notes")?,
        total_items: row.get("total_items")?,
        counted_items: row.get("counted_items")?,
        variance_count: row.get("variance_count")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        items: Vec::new(),
    })
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<CountItem> {
    let uuid_text: String = row.get("material_uuid")?;
    let material_uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in count_items.material_uuid"
        ))
    })?;

    let counted = match row.get::<_, i64>("counted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid counted value `{other}` in count_items.counted"
            )));
        }
    };

    Ok(CountItem {
        material_uuid,
        material_name: row.get("material_name")?,
        material_sku: row.get("material_sku")?,
        expected_quantity: row.get("expected_quantity")?,
        counted_quantity: row.get("counted_quantity")?,
        variance: row.get("variance")?,
        counted,
        counted_at: row.get("counted_at")?,
        counted_by: row.get("counted_by")?,
        notes: row.get("notes")?,
    })
}

fn session_status_to_db(status: CountSessionStatus) -> &'static str {
    match status {
        CountSessionStatus::Draft => "draft",
        CountSessionStatus::InProgress => "in_progress",
        CountSessionStatus::Completed => "completed",
        CountSessionStatus::Cancelled => "cancelled",
    }
}

fn parse_session_status(value: &str) -> Option<CountSessionStatus> {
    match value {
        "draft" => Some(CountSessionStatus::Draft),
        "in_progress" => Some(CountSessionStatus::InProgress),
        "completed" => Some(CountSessionStatus::Completed),
        "cancelled" => Some(CountSessionStatus::Cancelled),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_count_connection_ready(conn: &Connection) -> RepoResult<()> {
    for table in ["count_sessions", "count_items"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in ["org_id", "status", "counted_items", "variance_count"] {
        if !table_has_column(conn, "count_sessions", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "count_sessions",
                column,
            });
        }
    }

    for column in ["expected_quantity", "counted", "variance", "sort_order"] {
        if !table_has_column(conn, "count_items", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "count_items",
                column,
            });
        }
    }

    Ok(())
}
