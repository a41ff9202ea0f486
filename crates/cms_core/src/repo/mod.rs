//! Repository layer abstractions and SQLite store handles.
//!
//! # Responsibility
//! - Define the content-store and live-store contracts engines depend on.
//! - Isolate SQLite query details from version/publish orchestration.
//!
//! # Invariants
//! - Store handles are bound to exactly one schema; every statement filters
//!   on `schema_name`.
//! - Handles refuse connections that are not fully migrated.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::item::ItemId;
use crate::model::schema::ContentSchema;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod content_repo;
pub mod live_repo;
pub mod query;

use query::ItemQuery;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for content and live store operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Query names undeclared fields or carries non-scalar predicates.
    InvalidQuery(String),
    /// Persisted row cannot be converted back into a valid record.
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "content store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "content store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "content store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
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

/// Read contract shared by the content store (current versions) and the
/// live store (published snapshots).
pub trait ReadStore {
    type Record;

    /// Schema this store is bound to.
    fn schema(&self) -> &ContentSchema;
    /// Lists matching records in insertion order, honoring skip/limit.
    fn find(&self, query: &ItemQuery) -> RepoResult<Vec<Self::Record>>;
    /// Counts matching records; skip/limit/projection are ignored.
    fn count(&self, query: &ItemQuery) -> RepoResult<u64>;
    /// Loads one record by id, honoring the query's filter and projection.
    fn get(&self, id: ItemId, query: &ItemQuery) -> RepoResult<Option<Self::Record>>;
}

pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required: &[(&'static str, &[&'static str])],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
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

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
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
