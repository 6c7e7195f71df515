//! SQLite-backed node collection.
//!
//! # Responsibility
//! - Map `NodeStore` calls onto the `nodes` table.
//! - Convert between typed links and the `0`-sentinel wire columns.
//!
//! # Invariants
//! - The wrapped connection is migrated to the latest schema version.
//! - One store call is one SQLite statement batch; nothing spans calls.

use super::{NodeFilter, NodeStore, StoreError, StoreResult};
use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory};
use crate::model::node::{NewNode, Node, NodeId, NodePatch, NodeType};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NODE_SELECT_SQL: &str = "SELECT
    id,
    parent_id,
    type,
    name,
    content,
    context,
    external_id,
    prev_id,
    next_id
FROM nodes";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "parent_id",
    "type",
    "name",
    "content",
    "context",
    "external_id",
    "prev_id",
    "next_id",
];

/// Node store over one owned SQLite connection.
pub struct SqliteNodeStore {
    conn: Mutex<Connection>,
}

impl SqliteNodeStore {
    /// Wraps a migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_nodes_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens (and migrates) a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl NodeStore for SqliteNodeStore {
    async fn insert_records(&self, records: Vec<NewNode>) -> StoreResult<Vec<Node>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for record in &records {
            if let Some(id) = record.id {
                let exists: i64 = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM nodes WHERE id = ?1);",
                    [id.get()],
                    |row| row.get(0),
                )?;
                if exists == 1 {
                    return Err(StoreError::DuplicateId(id));
                }
            }
        }

        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            let context = encode_context(&record)?;
            tx.execute(
                "INSERT INTO nodes (
                    id,
                    parent_id,
                    type,
                    name,
                    content,
                    context,
                    external_id,
                    prev_id,
                    next_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    record.id.map(NodeId::get),
                    NodeId::to_wire(record.parent_id),
                    record.node_type.as_str(),
                    record.name.as_deref(),
                    record.content.as_deref(),
                    context,
                    record.external_id,
                    NodeId::to_wire(record.prev_id),
                    NodeId::to_wire(record.next_id),
                ],
            )?;
            let raw_id = tx.last_insert_rowid();
            let id = NodeId::new(raw_id).ok_or_else(|| {
                StoreError::InvalidData(format!("sqlite assigned invalid node id `{raw_id}`"))
            })?;
            inserted.push(record.into_node(id));
        }

        tx.commit()?;
        Ok(inserted)
    }

    async fn select_where(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        let conn = self.lock()?;

        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = filter.id {
            clauses.push("id = ?");
            values.push(Value::Integer(id.get()));
        }
        for (column, link) in [
            ("parent_id = ?", filter.parent_id),
            ("prev_id = ?", filter.prev_id),
            ("next_id = ?", filter.next_id),
        ] {
            if let Some(link) = link {
                clauses.push(column);
                values.push(Value::Integer(NodeId::to_wire(link)));
            }
        }

        let mut sql = NODE_SELECT_SQL.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push(';');

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    async fn update_where(&self, id: NodeId, patch: &NodePatch) -> StoreResult<u64> {
        let conn = self.lock()?;

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (column, link) in [
            ("parent_id", patch.parent_id),
            ("prev_id", patch.prev_id),
            ("next_id", patch.next_id),
        ] {
            if let Some(link) = link {
                assignments.push(column);
                values.push(Value::Integer(NodeId::to_wire(link)));
            }
        }
        if let Some(name) = &patch.name {
            assignments.push("name");
            values.push(optional_text(name.as_deref()));
        }
        if let Some(content) = &patch.content {
            assignments.push("content");
            values.push(optional_text(content.as_deref()));
        }
        if let Some(context) = &patch.context {
            assignments.push("context");
            let encoded = context
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|err| StoreError::InvalidData(format!("context not encodable: {err}")))?;
            values.push(optional_text(encoded.as_deref()));
        }
        if let Some(external_id) = patch.external_id {
            assignments.push("external_id");
            values.push(external_id.map_or(Value::Null, Value::Integer));
        }

        if assignments.is_empty() {
            let exists = conn
                .query_row("SELECT 1 FROM nodes WHERE id = ?1;", [id.get()], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?;
            return Ok(u64::from(exists.is_some()));
        }

        let set_clause = assignments
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        values.push(Value::Integer(id.get()));
        let changed = conn.execute(
            &format!("UPDATE nodes SET {set_clause} WHERE id = ?;"),
            params_from_iter(values),
        )?;
        Ok(changed as u64)
    }

    async fn delete_where(&self, ids: &[NodeId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let changed = conn.execute(
            &format!("DELETE FROM nodes WHERE id IN ({placeholders});"),
            params_from_iter(ids.iter().map(|id| id.get())),
        )?;
        Ok(changed as u64)
    }
}

fn encode_context(record: &NewNode) -> StoreResult<Option<String>> {
    record
        .context
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| StoreError::InvalidData(format!("context not encodable: {err}")))
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn parse_node_row(row: &Row<'_>) -> StoreResult<Node> {
    let raw_id: i64 = row.get("id")?;
    let id = NodeId::new(raw_id)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid id `{raw_id}` in nodes.id")))?;

    let context = row
        .get::<_, Option<String>>("context")?
        .map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                StoreError::InvalidData(format!("invalid json in nodes.context for {id}: {err}"))
            })
        })
        .transpose()?;

    let type_text: String = row.get("type")?;
    if type_text.trim().is_empty() {
        return Err(StoreError::InvalidData(format!(
            "empty type in nodes.type for {id}"
        )));
    }

    Ok(Node {
        id,
        parent_id: NodeId::from_wire(row.get("parent_id")?),
        node_type: NodeType::new(type_text),
        name: row.get("name")?,
        content: row.get("content")?,
        context,
        external_id: row.get("external_id")?,
        prev_id: NodeId::from_wire(row.get("prev_id")?),
        next_id: NodeId::from_wire(row.get("next_id")?),
    })
}

fn ensure_nodes_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::InvalidData(format!(
            "node store requires schema version {expected_version}, got {actual_version}"
        )));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(nodes);")?;
    let mut rows = stmt.query([])?;
    let mut present = Vec::new();
    while let Some(row) = rows.next()? {
        present.push(row.get::<_, String>(1)?);
    }
    for column in REQUIRED_COLUMNS {
        if !present.iter().any(|name| name == column) {
            return Err(StoreError::InvalidData(format!(
                "node store requires column `{column}` in table `nodes`"
            )));
        }
    }
    Ok(())
}
