//! Content store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist every committed version of every item of one schema.
//! - Move the per-item current-version pointer with an optimistic guard.
//!
//! # Invariants
//! - `(schema, item, version)` rows are immutable once written; storage
//!   triggers reject updates and deletes.
//! - A version row and its pointer move commit in one transaction, so a
//!   reader never sees a pointer to a missing row.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::item::{AuditStamp, Fields, Item, ItemId, ItemStatus};
use crate::model::schema::ContentSchema;
use crate::repo::query::{build_filter, check_projection, project, push_pagination, ItemQuery};
use crate::repo::{ensure_connection_ready, ReadStore, RepoError, RepoResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::sync::Arc;
use uuid::Uuid;

const VERSION_COLUMNS: &str = "v.item_id,
    v.version,
    v.status,
    v.data,
    v.created_at,
    v.created_by,
    v.updated_at,
    v.updated_by";

const CURRENT_JOIN_SQL: &str = "FROM content_items i
INNER JOIN content_versions v
    ON v.schema_name = i.schema_name
   AND v.item_id = i.item_id
   AND v.version = i.current_version";

const REQUIRED_TABLES: &[(&str, &[&str])] = &[
    (
        "content_items",
        &["seq", "schema_name", "item_id", "current_version"],
    ),
    (
        "content_versions",
        &[
            "schema_name",
            "item_id",
            "version",
            "status",
            "data",
            "created_at",
            "created_by",
            "updated_at",
            "updated_by",
        ],
    ),
];

/// Version-history storage for one schema.
pub trait ContentRepository: ReadStore<Record = Item> {
    /// Writes version 1 of a new item together with its current pointer.
    fn insert_first_version(&self, item: &Item) -> RepoResult<()>;
    /// Loads the current version of an item, whatever its status.
    fn load_current(&self, id: ItemId) -> RepoResult<Option<Item>>;
    /// Loads one historical version.
    fn load_version(&self, id: ItemId, version: u32) -> RepoResult<Option<Item>>;
    /// Loads every version of an item, oldest first.
    fn load_history(&self, id: ItemId) -> RepoResult<Vec<Item>>;
    /// Commits `next` only if `expected_current` is still the current version.
    ///
    /// Returns `false` when another writer moved the pointer first; nothing
    /// is written in that case.
    fn append_version(&self, expected_current: u32, next: &Item) -> RepoResult<bool>;
}

/// SQLite-backed content store bound to one schema.
#[derive(Clone)]
pub struct SqliteContentStore<'conn> {
    conn: &'conn Connection,
    schema: Arc<ContentSchema>,
}

impl<'conn> SqliteContentStore<'conn> {
    /// Binds a store handle to a migrated connection.
    pub fn try_new(conn: &'conn Connection, schema: Arc<ContentSchema>) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn, schema })
    }

    fn select_current(
        &self,
        extra_clause: &str,
        extra_binds: Vec<SqlValue>,
        query: &ItemQuery,
        paginate: bool,
    ) -> RepoResult<Vec<Item>> {
        check_projection(&self.schema, query)?;
        let filter = build_filter(&self.schema, query, "i.item_id", "v.data")?;

        let mut sql = format!("SELECT {VERSION_COLUMNS} {CURRENT_JOIN_SQL} WHERE i.schema_name = ?");
        let mut binds = vec![SqlValue::Text(self.schema.name.clone())];
        sql.push_str(extra_clause);
        binds.extend(extra_binds);
        if !query.include_removed {
            sql.push_str(" AND v.status = 'visible'");
        }
        sql.push_str(&filter.clause);
        binds.extend(filter.binds);
        sql.push_str(" ORDER BY i.seq ASC");
        if paginate {
            push_pagination(&mut sql, &mut binds, query);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let mut item = parse_item_row(row)?;
            project(&mut item.fields, query);
            items.push(item);
        }
        Ok(items)
    }

    fn select_versions(&self, extra_clause: &str, binds: Vec<SqlValue>) -> RepoResult<Vec<Item>> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS}
             FROM content_versions v
             WHERE v.schema_name = ? AND v.item_id = ?{extra_clause}
             ORDER BY v.version ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn id_binds(&self, id: ItemId) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.schema.name.clone()),
            SqlValue::Text(id.to_string()),
        ]
    }
}

impl ReadStore for SqliteContentStore<'_> {
    type Record = Item;

    fn schema(&self) -> &ContentSchema {
        &self.schema
    }

    fn find(&self, query: &ItemQuery) -> RepoResult<Vec<Item>> {
        self.select_current("", Vec::new(), query, true)
    }

    fn count(&self, query: &ItemQuery) -> RepoResult<u64> {
        let filter = build_filter(&self.schema, query, "i.item_id", "v.data")?;
        let mut sql = format!("SELECT COUNT(*) {CURRENT_JOIN_SQL} WHERE i.schema_name = ?");
        let mut binds = vec![SqlValue::Text(self.schema.name.clone())];
        if !query.include_removed {
            sql.push_str(" AND v.status = 'visible'");
        }
        sql.push_str(&filter.clause);
        binds.extend(filter.binds);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }

    fn get(&self, id: ItemId, query: &ItemQuery) -> RepoResult<Option<Item>> {
        let items = self.select_current(
            " AND i.item_id = ?",
            vec![SqlValue::Text(id.to_string())],
            query,
            false,
        )?;
        Ok(items.into_iter().next())
    }
}

impl ContentRepository for SqliteContentStore<'_> {
    fn insert_first_version(&self, item: &Item) -> RepoResult<()> {
        if item.version != 1 {
            return Err(RepoError::InvalidData(format!(
                "first version of item {} must be 1, got {}",
                item.id, item.version
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO content_items (schema_name, item_id, current_version)
             VALUES (?1, ?2, 1);",
            params![self.schema.name.as_str(), item.id.to_string()],
        )?;
        insert_version_row(&tx, &self.schema.name, item)?;
        tx.commit()?;
        Ok(())
    }

    fn load_current(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} {CURRENT_JOIN_SQL}
             WHERE i.schema_name = ?1 AND i.item_id = ?2;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![self.schema.name.as_str(), id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn load_version(&self, id: ItemId, version: u32) -> RepoResult<Option<Item>> {
        let mut binds = self.id_binds(id);
        binds.push(SqlValue::Integer(i64::from(version)));
        let items = self.select_versions(" AND v.version = ?", binds)?;
        Ok(items.into_iter().next())
    }

    fn load_history(&self, id: ItemId) -> RepoResult<Vec<Item>> {
        self.select_versions("", self.id_binds(id))
    }

    fn append_version(&self, expected_current: u32, next: &Item) -> RepoResult<bool> {
        if next.version != expected_current + 1 {
            return Err(RepoError::InvalidData(format!(
                "version {} cannot follow {} for item {}",
                next.version, expected_current, next.id
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let moved = tx.execute(
            "UPDATE content_items
             SET current_version = ?1
             WHERE schema_name = ?2
               AND item_id = ?3
               AND current_version = ?4;",
            params![
                next.version,
                self.schema.name.as_str(),
                next.id.to_string(),
                expected_current,
            ],
        )?;
        if moved == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        insert_version_row(&tx, &self.schema.name, next)?;
        tx.commit()?;
        Ok(true)
    }
}

fn insert_version_row(tx: &Transaction<'_>, schema_name: &str, item: &Item) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO content_versions (
            schema_name,
            item_id,
            version,
            status,
            data,
            created_at,
            created_by,
            updated_at,
            updated_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            schema_name,
            item.id.to_string(),
            item.version,
            item.status.as_str(),
            encode_fields(&item.fields)?,
            item.created.at,
            item.created.by.as_str(),
            item.updated.at,
            item.updated.by.as_str(),
        ],
    )?;
    Ok(())
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get("item_id")?;
    let id = parse_item_id(&id_text)?;

    let status_text: String = row.get("status")?;
    let status = ItemStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in content_versions.status"
        ))
    })?;

    let data: String = row.get("data")?;
    Ok(Item {
        id,
        version: row.get("version")?,
        status,
        created: AuditStamp::new(row.get("created_at")?, row.get::<_, String>("created_by")?),
        updated: AuditStamp::new(row.get("updated_at")?, row.get::<_, String>("updated_by")?),
        fields: decode_fields(&data)?,
    })
}

pub(crate) fn parse_item_id(value: &str) -> RepoResult<ItemId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid item id `{value}` in item_id")))
}

pub(crate) fn encode_fields(fields: &Fields) -> RepoResult<String> {
    serde_json::to_string(fields)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode fields: {err}")))
}

pub(crate) fn decode_fields(data: &str) -> RepoResult<Fields> {
    serde_json::from_str(data)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON object in data column: {err}")))
}
