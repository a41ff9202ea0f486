//! Equality-filter query model shared by content-side and live-side reads.
//!
//! # Invariants
//! - Predicates only address declared business fields or `_id`.
//! - Predicate values are scalar JSON; `null` matches missing or null fields.
//! - Projection keeps metadata and drops business fields not listed.

use crate::model::item::Fields;
use crate::model::schema::ContentSchema;
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use uuid::Uuid;

/// Filter, pagination and projection options for one read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    /// Field/value equality predicates, all of which must hold.
    pub filter: Fields,
    /// Number of matching records to skip.
    pub skip: u32,
    /// Maximum records to return. `None` means unbounded.
    pub limit: Option<u32>,
    /// Business fields to keep. `None` keeps all of them.
    pub projection: Option<Vec<String>>,
    /// Content side only: also match items whose current version is removed.
    pub include_removed: bool,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn including_removed(mut self) -> Self {
        self.include_removed = true;
        self
    }
}

/// SQL fragment (leading ` AND ...` clauses) plus its bind values.
pub(crate) struct FilterSql {
    pub clause: String,
    pub binds: Vec<SqlValue>,
}

/// Translates equality predicates into SQL against a JSON data column.
pub(crate) fn build_filter(
    schema: &ContentSchema,
    query: &ItemQuery,
    id_column: &str,
    data_column: &str,
) -> RepoResult<FilterSql> {
    let mut clause = String::new();
    let mut binds = Vec::new();

    for (field, value) in &query.filter {
        if field == "_id" {
            let Value::String(id) = value else {
                return Err(RepoError::InvalidQuery(
                    "`_id` predicate must be a string".to_string(),
                ));
            };
            // Non-UUID text cannot name a stored item.
            match Uuid::parse_str(id.trim()) {
                Ok(id) => {
                    clause.push_str(&format!(" AND {id_column} = ?"));
                    binds.push(SqlValue::Text(id.to_string()));
                }
                Err(_) => clause.push_str(" AND 0"),
            }
            continue;
        }

        if !schema.declares(field) {
            return Err(undeclared(schema, field));
        }
        let path = SqlValue::Text(format!("$.{field}"));

        match value {
            Value::Null => {
                clause.push_str(&format!(" AND json_extract({data_column}, ?) IS NULL"));
                binds.push(path);
            }
            Value::Bool(flag) => {
                clause.push_str(&format!(" AND json_type({data_column}, ?) = ?"));
                binds.push(path);
                binds.push(SqlValue::Text(if *flag { "true" } else { "false" }.to_string()));
            }
            Value::Number(number) => {
                let bound = match (number.as_i64(), number.as_f64()) {
                    (Some(int), _) => SqlValue::Integer(int),
                    (None, Some(real)) => SqlValue::Real(real),
                    (None, None) => {
                        return Err(RepoError::InvalidQuery(format!(
                            "number predicate on `{field}` is out of range"
                        )));
                    }
                };
                clause.push_str(&format!(" AND json_extract({data_column}, ?) = ?"));
                binds.push(path);
                binds.push(bound);
            }
            Value::String(text) => {
                clause.push_str(&format!(
                    " AND json_type({data_column}, ?) = 'text' AND json_extract({data_column}, ?) = ?"
                ));
                binds.push(path.clone());
                binds.push(path);
                binds.push(SqlValue::Text(text.clone()));
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(RepoError::InvalidQuery(format!(
                    "predicate on `{field}` must be a scalar value"
                )));
            }
        }
    }

    Ok(FilterSql { clause, binds })
}

/// Rejects projections naming fields the schema does not declare.
pub(crate) fn check_projection(schema: &ContentSchema, query: &ItemQuery) -> RepoResult<()> {
    if let Some(projection) = &query.projection {
        if let Some(field) = projection.iter().find(|field| !schema.declares(field)) {
            return Err(undeclared(schema, field));
        }
    }
    Ok(())
}

/// Drops business fields the query did not select.
pub(crate) fn project(fields: &mut Fields, query: &ItemQuery) {
    if let Some(projection) = &query.projection {
        fields.retain(|name, _| projection.iter().any(|kept| kept == name));
    }
}

/// Appends `LIMIT`/`OFFSET` following the query's pagination.
pub(crate) fn push_pagination(sql: &mut String, binds: &mut Vec<SqlValue>, query: &ItemQuery) {
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        binds.push(SqlValue::Integer(i64::from(limit)));
        if query.skip > 0 {
            sql.push_str(" OFFSET ?");
            binds.push(SqlValue::Integer(i64::from(query.skip)));
        }
    } else if query.skip > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        binds.push(SqlValue::Integer(i64::from(query.skip)));
    }
}

fn undeclared(schema: &ContentSchema, field: &str) -> RepoError {
    RepoError::InvalidQuery(format!(
        "field `{field}` is not declared by schema `{}`",
        schema.name
    ))
}
