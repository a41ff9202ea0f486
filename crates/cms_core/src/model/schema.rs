//! Content schema descriptor and business-field validation.
//!
//! # Responsibility
//! - Describe the business fields one content type declares.
//! - Validate complete field sets (create/update/restore) and partial field
//!   sets (patch) with the same type rules.
//!
//! # Invariants
//! - Schema and field names are plain identifiers, so they are safe to embed
//!   in JSON paths.
//! - Metadata names (`_id`, `version`, ...) can never be declared as fields.
//! - Validation never mutates the checked fields.

use crate::model::item::Fields;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

/// Names owned by the item metadata block.
pub const RESERVED_FIELD_NAMES: &[&str] = &["_id", "version", "status", "created", "updated"];

/// Supported business-field types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    /// 64-bit integer; floats are rejected.
    Int,
    /// Any JSON number.
    Float,
    Bool,
    Object {
        fields: BTreeMap<String, FieldDef>,
    },
    Array {
        element_type: Box<FieldType>,
    },
}

impl FieldType {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }
}

/// Descriptor of one user-declared content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSchema {
    pub name: String,
    pub fields: BTreeMap<String, FieldDef>,
}

/// Rejected schema declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidName(String),
    InvalidFieldName(String),
    ReservedField(String),
    Parse(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid schema name `{name}`"),
            Self::InvalidFieldName(name) => write!(f, "invalid field name `{name}`"),
            Self::ReservedField(name) => write!(f, "field name `{name}` is reserved for metadata"),
            Self::Parse(message) => write!(f, "invalid schema document: {message}"),
        }
    }
}

impl Error for SchemaError {}

/// Kind of one field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    Undeclared,
    NullValue,
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// One field-level validation problem, addressed by dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub path: String,
    pub kind: IssueKind,
}

impl Display for FieldIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "`{}` is required", self.path),
            IssueKind::Undeclared => write!(f, "`{}` is not declared", self.path),
            IssueKind::NullValue => write!(f, "`{}` cannot be null", self.path),
            IssueKind::TypeMismatch { expected, found } => {
                write!(f, "`{}` expected {expected}, found {found}", self.path)
            }
        }
    }
}

/// Business fields failed schema constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub schema: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed for `{}`:", self.schema)?;
        for (index, issue) in self.issues.iter().enumerate() {
            let separator = if index == 0 { " " } else { "; " };
            write!(f, "{separator}{issue}")?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Partial,
}

impl ContentSchema {
    /// Builds a schema after checking its name and every field name.
    pub fn new(
        name: impl Into<String>,
        fields: BTreeMap<String, FieldDef>,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            name: name.into(),
            fields,
        };
        schema.check_names()?;
        Ok(schema)
    }

    /// Parses a schema document such as
    /// `{"name": "people", "fields": {"name": {"type": "string", "required": true}}}`.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let schema: Self =
            serde_json::from_str(raw).map_err(|err| SchemaError::Parse(err.to_string()))?;
        schema.check_names()?;
        Ok(schema)
    }

    /// Returns whether `field` is a declared top-level business field.
    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Validates a complete field set: required fields must be present.
    pub fn validate_full(&self, fields: &Fields) -> Result<(), ValidationError> {
        self.finish(collect_issues(fields, &self.fields, "", Mode::Full))
    }

    /// Validates a field subset: only supplied fields are checked.
    pub fn validate_partial(&self, fields: &Fields) -> Result<(), ValidationError> {
        self.finish(collect_issues(fields, &self.fields, "", Mode::Partial))
    }

    fn finish(&self, issues: Vec<FieldIssue>) -> Result<(), ValidationError> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                schema: self.name.clone(),
                issues,
            })
        }
    }

    fn check_names(&self) -> Result<(), SchemaError> {
        if !IDENTIFIER_RE.is_match(&self.name) {
            return Err(SchemaError::InvalidName(self.name.clone()));
        }
        for name in self.fields.keys() {
            if RESERVED_FIELD_NAMES.contains(&name.as_str()) {
                return Err(SchemaError::ReservedField(name.clone()));
            }
        }
        check_field_names(&self.fields)
    }
}

fn check_field_names(fields: &BTreeMap<String, FieldDef>) -> Result<(), SchemaError> {
    for (name, def) in fields {
        if !IDENTIFIER_RE.is_match(name) {
            return Err(SchemaError::InvalidFieldName(name.clone()));
        }
        check_nested_names(&def.field_type)?;
    }
    Ok(())
}

fn check_nested_names(field_type: &FieldType) -> Result<(), SchemaError> {
    match field_type {
        FieldType::Object { fields } => check_field_names(fields),
        FieldType::Array { element_type } => check_nested_names(element_type),
        _ => Ok(()),
    }
}

fn collect_issues(
    obj: &Fields,
    declared: &BTreeMap<String, FieldDef>,
    prefix: &str,
    mode: Mode,
) -> Vec<FieldIssue> {
    let mut issues = Vec::new();

    for key in obj.keys() {
        if !declared.contains_key(key) {
            issues.push(FieldIssue {
                path: join_path(prefix, key),
                kind: IssueKind::Undeclared,
            });
        }
    }

    for (name, def) in declared {
        let path = join_path(prefix, name);
        match obj.get(name) {
            None if def.required && mode == Mode::Full => issues.push(FieldIssue {
                path,
                kind: IssueKind::Missing,
            }),
            None => {}
            Some(Value::Null) if def.required => issues.push(FieldIssue {
                path,
                kind: IssueKind::NullValue,
            }),
            Some(Value::Null) => {}
            // Nested objects are always checked completely.
            Some(value) => check_value(value, &def.field_type, &path, &mut issues),
        }
    }

    issues
}

fn check_value(value: &Value, expected: &FieldType, path: &str, issues: &mut Vec<FieldIssue>) {
    let matches = match expected {
        FieldType::String => value.is_string(),
        FieldType::Int => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Bool => value.is_boolean(),
        FieldType::Object { fields } => match value.as_object() {
            Some(obj) => {
                issues.extend(collect_issues(obj, fields, path, Mode::Full));
                true
            }
            None => false,
        },
        FieldType::Array { element_type } => match value.as_array() {
            Some(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    let element_path = format!("{path}[{index}]");
                    if element.is_null() {
                        issues.push(FieldIssue {
                            path: element_path,
                            kind: IssueKind::NullValue,
                        });
                    } else {
                        check_value(element, element_type, &element_path, issues);
                    }
                }
                true
            }
            None => false,
        },
    };

    if !matches {
        issues.push(FieldIssue {
            path: path.to_string(),
            kind: IssueKind::TypeMismatch {
                expected: expected.type_name(),
                found: json_type_name(value),
            },
        });
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
