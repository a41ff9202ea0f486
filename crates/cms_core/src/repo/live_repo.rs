//! Live store contract and SQLite implementation.
//!
//! # Responsibility
//! - Hold the published snapshot of each item of one schema.
//!
//! # Invariants
//! - At most one snapshot per item; publishing again overwrites it in place.
//! - Snapshots reference an existing content version (foreign key).
//! - The live store never holds history.

use crate::model::item::{AuditStamp, ItemId, LiveItem};
use crate::model::schema::ContentSchema;
use crate::repo::content_repo::{decode_fields, encode_fields, parse_item_id};
use crate::repo::query::{build_filter, check_projection, project, push_pagination, ItemQuery};
use crate::repo::{ensure_connection_ready, ReadStore, RepoError, RepoResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::Arc;

const LIVE_SELECT_SQL: &str = "SELECT
    item_id,
    version,
    data,
    created_at,
    created_by,
    updated_at,
    updated_by,
    published_at,
    published_by
FROM live_items";

const REQUIRED_TABLES: &[(&str, &[&str])] = &[(
    "live_items",
    &[
        "seq",
        "schema_name",
        "item_id",
        "version",
        "data",
        "published_at",
        "published_by",
    ],
)];

/// Published-snapshot storage for one schema.
pub trait LiveRepository: ReadStore<Record = LiveItem> {
    /// Inserts or overwrites the snapshot for `snapshot.id`.
    fn upsert_snapshot(&self, snapshot: &LiveItem) -> RepoResult<()>;
    /// Deletes the snapshot; returns whether one existed.
    fn delete_snapshot(&self, id: ItemId) -> RepoResult<bool>;
    /// Returns whether a snapshot exists.
    fn contains(&self, id: ItemId) -> RepoResult<bool>;
}

/// SQLite-backed live store bound to one schema.
#[derive(Clone)]
pub struct SqliteLiveStore<'conn> {
    conn: &'conn Connection,
    schema: Arc<ContentSchema>,
}

impl<'conn> SqliteLiveStore<'conn> {
    /// Binds a store handle to a migrated connection.
    pub fn try_new(conn: &'conn Connection, schema: Arc<ContentSchema>) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn, schema })
    }

    fn select(
        &self,
        extra_clause: &str,
        extra_binds: Vec<SqlValue>,
        query: &ItemQuery,
        paginate: bool,
    ) -> RepoResult<Vec<LiveItem>> {
        check_projection(&self.schema, query)?;
        let filter = build_filter(&self.schema, query, "item_id", "data")?;

        let mut sql = format!("{LIVE_SELECT_SQL} WHERE schema_name = ?");
        let mut binds = vec![SqlValue::Text(self.schema.name.clone())];
        sql.push_str(extra_clause);
        binds.extend(extra_binds);
        sql.push_str(&filter.clause);
        binds.extend(filter.binds);
        sql.push_str(" ORDER BY seq ASC");
        if paginate {
            push_pagination(&mut sql, &mut binds, query);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            let mut snapshot = parse_live_row(row)?;
            project(&mut snapshot.fields, query);
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }
}

impl ReadStore for SqliteLiveStore<'_> {
    type Record = LiveItem;

    fn schema(&self) -> &ContentSchema {
        &self.schema
    }

    fn find(&self, query: &ItemQuery) -> RepoResult<Vec<LiveItem>> {
        self.select("", Vec::new(), query, true)
    }

    fn count(&self, query: &ItemQuery) -> RepoResult<u64> {
        let filter = build_filter(&self.schema, query, "item_id", "data")?;
        let sql = format!(
            "SELECT COUNT(*) FROM live_items WHERE schema_name = ?{}",
            filter.clause
        );
        let mut binds = vec![SqlValue::Text(self.schema.name.clone())];
        binds.extend(filter.binds);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }

    fn get(&self, id: ItemId, query: &ItemQuery) -> RepoResult<Option<LiveItem>> {
        let snapshots = self.select(
            " AND item_id = ?",
            vec![SqlValue::Text(id.to_string())],
            query,
            false,
        )?;
        Ok(snapshots.into_iter().next())
    }
}

impl LiveRepository for SqliteLiveStore<'_> {
    fn upsert_snapshot(&self, snapshot: &LiveItem) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO live_items (
                schema_name,
                item_id,
                version,
                data,
                created_at,
                created_by,
                updated_at,
                updated_by,
                published_at,
                published_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (schema_name, item_id) DO UPDATE SET
                version = excluded.version,
                data = excluded.data,
                created_at = excluded.created_at,
                created_by = excluded.created_by,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by,
                published_at = excluded.published_at,
                published_by = excluded.published_by;",
            params![
                self.schema.name.as_str(),
                snapshot.id.to_string(),
                snapshot.version,
                encode_fields(&snapshot.fields)?,
                snapshot.created.at,
                snapshot.created.by.as_str(),
                snapshot.updated.at,
                snapshot.updated.by.as_str(),
                snapshot.published.at,
                snapshot.published.by.as_str(),
            ],
        )?;
        Ok(())
    }

    fn delete_snapshot(&self, id: ItemId) -> RepoResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM live_items WHERE schema_name = ?1 AND item_id = ?2;",
            params![self.schema.name.as_str(), id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn contains(&self, id: ItemId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM live_items WHERE schema_name = ?1 AND item_id = ?2
            );",
            params![self.schema.name.as_str(), id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_live_row(row: &Row<'_>) -> RepoResult<LiveItem> {
    let id_text: String = row.get("item_id")?;
    let data: String = row.get("data")?;
    Ok(LiveItem {
        id: parse_item_id(&id_text)?,
        version: row.get("version")?,
        created: AuditStamp::new(row.get("created_at")?, row.get::<_, String>("created_by")?),
        updated: AuditStamp::new(row.get("updated_at")?, row.get::<_, String>("updated_by")?),
        published: AuditStamp::new(
            row.get("published_at")?,
            row.get::<_, String>("published_by")?,
        ),
        fields: decode_fields(&data)?,
    })
}
