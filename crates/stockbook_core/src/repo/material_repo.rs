//! Material ledger repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over `materials` storage.
//! - Own the single transactional primitive every quantity change funnels
//!   through (`adjust_quantity`), including its audit append.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Material::validate()` before SQL mutations.
//! - A material update and its history entry commit or abort together.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - Every statement filters on the repository's organization scope.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::count_session::{CountSessionId, CountSessionValidationError};
use crate::model::history::{HistoryAction, NewHistoryEntry};
use crate::model::material::{Material, MaterialId, MaterialStatus, MaterialValidationError};
use crate::model::org::OrgId;
use crate::repo::history_repo;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const MATERIAL_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    sku,
    on_hand,
    min_level,
    department,
    location,
    facility,
    status,
    last_counted_at,
    last_adjusted_at
FROM materials";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for ledger, history and count persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    MaterialNotFound(MaterialId),
    SessionNotFound(CountSessionId),
    /// SKU already taken within the organization.
    DuplicateSku(String),
    MaterialValidation(MaterialValidationError),
    SessionValidation(CountSessionValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::MaterialNotFound(id) => write!(f, "material not found: {id}"),
            Self::SessionNotFound(id) => write!(f, "count session not found: {id}"),
            Self::DuplicateSku(sku) => write!(f, "sku already in use: `{sku}`"),
            Self::MaterialValidation(err) => write!(f, "{err}"),
            Self::SessionValidation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::MaterialValidation(err) => Some(err),
            Self::SessionValidation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<MaterialValidationError> for RepoError {
    fn from(value: MaterialValidationError) -> Self {
        Self::MaterialValidation(value)
    }
}

impl From<CountSessionValidationError> for RepoError {
    fn from(value: CountSessionValidationError) -> Self {
        Self::SessionValidation(value)
    }
}

/// One quantity mutation routed through the ledger primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentCommand {
    pub material_uuid: MaterialId,
    /// Absolute new on-hand value; the delta is derived inside the
    /// transaction from the quantity read there.
    pub new_quantity: i64,
    pub action: HistoryAction,
    pub reason: String,
    pub performed_by: String,
    pub notes: Option<String>,
}

/// Query options for material listing and read views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialListQuery {
    pub status: Option<MaterialStatus>,
    pub department: Option<String>,
    pub facility: Option<String>,
    pub location: Option<String>,
    /// Restrict to active items at or below their positive threshold.
    pub low_stock_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for material ledger operations.
pub trait MaterialRepository {
    /// Inserts a material and its synthetic `create` history entry in one
    /// transaction.
    fn insert_material(
        &mut self,
        material: &Material,
        reason: &str,
        performed_by: &str,
    ) -> RepoResult<Material>;
    /// The single primitive all quantity changes funnel through.
    fn adjust_quantity(&mut self, command: &AdjustmentCommand) -> RepoResult<Material>;
    /// Updates profile fields (name, threshold, associations, status).
    /// Never touches `on_hand` or `sku` and writes no history entry.
    fn update_material_profile(&mut self, material: &Material) -> RepoResult<()>;
    /// Appends the terminal `delete` history entry, then removes the row.
    fn delete_material(
        &mut self,
        id: MaterialId,
        reason: &str,
        performed_by: &str,
    ) -> RepoResult<()>;
    fn get_material(&self, id: MaterialId) -> RepoResult<Option<Material>>;
    fn get_material_by_sku(&self, sku: &str) -> RepoResult<Option<Material>>;
    fn list_materials(&self, query: &MaterialListQuery) -> RepoResult<Vec<Material>>;
}

/// SQLite-backed material repository scoped to one organization.
pub struct SqliteMaterialRepository<'conn> {
    conn: &'conn Connection,
    org: OrgId,
}

impl<'conn> SqliteMaterialRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection, org: OrgId) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, org })
    }

    fn get_material_in(
        &self,
        conn: &Connection,
        id: MaterialId,
    ) -> RepoResult<Option<Material>> {
        let mut stmt = conn.prepare(&format!(
            "{MATERIAL_SELECT_SQL} WHERE org_id = ?1 AND uuid = ?2;"
        ))?;
        let mut rows = stmt.query(params![self.org.as_str(), id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_material_row(row)?));
        }
        Ok(None)
    }
}

impl MaterialRepository for SqliteMaterialRepository<'_> {
    fn insert_material(
        &mut self,
        material: &Material,
        reason: &str,
        performed_by: &str,
    ) -> RepoResult<Material> {
        material.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if sku_taken(&tx, self.org.as_str(), &material.sku)? {
            return Err(RepoError::DuplicateSku(material.sku.clone()));
        }

        tx.execute(
            "INSERT INTO materials (
                uuid,
                org_id,
                name,
                sku,
                on_hand,
                min_level,
                department,
                location,
                facility,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                material.uuid.to_string(),
                self.org.as_str(),
                material.name.as_str(),
                material.sku.as_str(),
                material.on_hand,
                material.min_level,
                material.department.as_deref(),
                material.location.as_deref(),
                material.facility.as_deref(),
                status_to_db(material.status),
            ],
        )?;

        // Synthetic create entry: the trail starts at zero even when the
        // material is born with stock.
        let entry = NewHistoryEntry::new(
            material.uuid,
            material.name.as_str(),
            material.sku.as_str(),
            HistoryAction::Create,
            0,
            material.on_hand,
            reason,
            performed_by,
            None,
        );
        history_repo::insert_entry(&tx, &self.org, &entry)?;

        let created = self
            .get_material_in(&tx, material.uuid)?
            .ok_or_else(|| RepoError::InvalidData("created material not readable".to_string()))?;
        tx.commit()?;
        Ok(created)
    }

    fn adjust_quantity(&mut self, command: &AdjustmentCommand) -> RepoResult<Material> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let current = self
            .get_material_in(&tx, command.material_uuid)?
            .ok_or(RepoError::MaterialNotFound(command.material_uuid))?;

        // Count-sourced adjustments stamp last_counted_at; manual ones
        // stamp last_adjusted_at. Other actions leave both untouched.
        let stamp_column = match command.action {
            HistoryAction::Count => Some("last_counted_at"),
            HistoryAction::Adjustment => Some("last_adjusted_at"),
            _ => None,
        };
        let stamp_sql = stamp_column
            .map(|column| format!("{column} = (strftime('%s', 'now') * 1000),"))
            .unwrap_or_default();

        tx.execute(
            &format!(
                "UPDATE materials
                 SET
                    on_hand = ?3,
                    {stamp_sql}
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE org_id = ?1 AND uuid = ?2;"
            ),
            params![
                self.org.as_str(),
                command.material_uuid.to_string(),
                command.new_quantity,
            ],
        )?;

        let entry = NewHistoryEntry::new(
            current.uuid,
            current.name.as_str(),
            current.sku.as_str(),
            command.action,
            current.on_hand,
            command.new_quantity,
            command.reason.as_str(),
            command.performed_by.as_str(),
            command.notes.clone(),
        );
        history_repo::insert_entry(&tx, &self.org, &entry)?;

        let updated = self
            .get_material_in(&tx, command.material_uuid)?
            .ok_or(RepoError::MaterialNotFound(command.material_uuid))?;
        tx.commit()?;
        Ok(updated)
    }

    fn update_material_profile(&mut self, material: &Material) -> RepoResult<()> {
        material.validate()?;

        let changed = self.conn.execute(
            "UPDATE materials
             SET
                name = ?3,
                min_level = ?4,
                department = ?5,
                location = ?6,
                facility = ?7,
                status = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE org_id = ?1 AND uuid = ?2;",
            params![
                self.org.as_str(),
                material.uuid.to_string(),
                material.name.as_str(),
                material.min_level,
                material.department.as_deref(),
                material.location.as_deref(),
                material.facility.as_deref(),
                status_to_db(material.status),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::MaterialNotFound(material.uuid));
        }

        Ok(())
    }

    fn delete_material(
        &mut self,
        id: MaterialId,
        reason: &str,
        performed_by: &str,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        // Degraded-but-defined path: a row already gone is treated as
        // quantity zero, with snapshots recovered from the latest history
        // entry when one exists.
        let (name, sku, on_hand) = match self.get_material_in(&tx, id)? {
            Some(material) => (material.name, material.sku, material.on_hand),
            None => {
                let (name, sku) = latest_snapshot(&tx, self.org.as_str(), id)?
                    .unwrap_or_else(|| (String::new(), String::new()));
                (name, sku, 0)
            }
        };

        let entry = NewHistoryEntry::new(
            id,
            name,
            sku,
            HistoryAction::Delete,
            on_hand,
            0,
            reason,
            performed_by,
            None,
        );
        history_repo::insert_entry(&tx, &self.org, &entry)?;

        tx.execute(
            "DELETE FROM materials WHERE org_id = ?1 AND uuid = ?2;",
            params![self.org.as_str(), id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_material(&self, id: MaterialId) -> RepoResult<Option<Material>> {
        self.get_material_in(self.conn, id)
    }

    fn get_material_by_sku(&self, sku: &str) -> RepoResult<Option<Material>> {
        let normalized = crate::model::material::normalize_sku(sku);
        let mut stmt = self.conn.prepare(&format!(
            "{MATERIAL_SELECT_SQL} WHERE org_id = ?1 AND sku = ?2;"
        ))?;
        let mut rows = stmt.query(params![self.org.as_str(), normalized])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_material_row(row)?));
        }
        Ok(None)
    }

    fn list_materials(&self, query: &MaterialListQuery) -> RepoResult<Vec<Material>> {
        let mut sql = format!("{MATERIAL_SELECT_SQL} WHERE org_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(self.org.as_str().to_string())];

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status_to_db(status).to_string()));
        }
        if let Some(department) = query.department.as_ref() {
            sql.push_str(" AND department = ?");
            bind_values.push(Value::Text(department.clone()));
        }
        if let Some(facility) = query.facility.as_ref() {
            sql.push_str(" AND facility = ?");
            bind_values.push(Value::Text(facility.clone()));
        }
        if let Some(location) = query.location.as_ref() {
            sql.push_str(" AND location = ?");
            bind_values.push(Value::Text(location.clone()));
        }
        if query.low_stock_only {
            sql.push_str(" AND status = 'active' AND min_level > 0 AND on_hand <= min_level");
        }

        sql.push_str(" ORDER BY name ASC, uuid ASC");

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
        let mut materials = Vec::new();
        while let Some(row) = rows.next()? {
            materials.push(parse_material_row(row)?);
        }

        Ok(materials)
    }
}

fn parse_material_row(row: &Row<'_>) -> RepoResult<Material> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in materials.uuid"))
    })?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in materials.status"
        ))
    })?;

    Ok(Material {
        uuid,
        name: row.get("name")?,
        sku: row.get("sku")?,
        on_hand: row.get("on_hand")?,
        min_level: row.get("min_level")?,
        department: row.get("department")?,
        location: row.get("location")?,
        facility: row.get("facility")?,
        status,
        last_counted_at: row.get("last_counted_at")?,
        last_adjusted_at: row.get("last_adjusted_at")?,
    })
}

fn status_to_db(status: MaterialStatus) -> &'static str {
    match status {
        MaterialStatus::Active => "active",
        MaterialStatus::Inactive => "inactive",
    }
}

fn parse_status(value: &str) -> Option<MaterialStatus> {
    match value {
        "active" => Some(MaterialStatus::Active),
        "inactive" => Some(MaterialStatus::Inactive),
        _ => None,
    }
}

fn sku_taken(conn: &Connection, org_id: &str, sku: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM materials WHERE org_id = ?1 AND sku = ?2
        );",
        params![org_id, sku],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn latest_snapshot(
    conn: &Connection,
    org_id: &str,
    id: MaterialId,
) -> RepoResult<Option<(String, String)>> {
    let snapshot = conn
        .query_row(
            "SELECT material_name, material_sku
             FROM history_entries
             WHERE org_id = ?1 AND material_uuid = ?2
             ORDER BY id DESC
             LIMIT 1;",
            params![org_id, id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(snapshot)
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["materials", "history_entries"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in ["org_id", "sku", "on_hand", "min_level", "status"] {
        if !table_has_column(conn, "materials", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "materials",
                column,
            });
        }
    }

    for column in ["org_id", "action", "quantity_change", "performed_by"] {
        if !table_has_column(conn, "history_entries", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "history_entries",
                column,
            });
        }
    }

    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
