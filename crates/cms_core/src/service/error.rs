//! Typed failures surfaced by content services.
//!
//! "Not found" is deliberately absent: lookups and mutate-by-id calls on
//! unknown ids resolve to `Ok(None)` instead.

use crate::auth::AuthError;
use crate::model::item::ItemId;
use crate::model::schema::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Service error for content versioning, publishing and reads.
#[derive(Debug)]
pub enum EngineError {
    /// Token absent, unknown or expired. Raised before any storage access.
    InvalidToken(AuthError),
    /// Caller omitted the item id.
    MissingId,
    /// Caller omitted the item fields.
    MissingItem,
    /// Business fields failed schema constraints.
    Validation(ValidationError),
    /// Read query addressed undeclared fields or used unsupported values.
    InvalidQuery(String),
    /// Item exists but has no version with this number.
    VersionNotFound { item_id: ItemId, version: u32 },
    /// Removed versions cannot be published.
    RemovedVersion { item_id: ItemId, version: u32 },
    /// Optimistic concurrency guard kept failing after bounded retries.
    Conflict {
        item_id: ItemId,
        expected: u32,
        attempts: u32,
    },
    /// Storage unreachable, timed out or holding invalid rows.
    Storage(RepoError),
}

impl EngineError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken(_) => "invalid_token",
            Self::MissingId => "missing_id",
            Self::MissingItem => "missing_item",
            Self::Validation(_) => "validation_failed",
            Self::InvalidQuery(_) => "invalid_query",
            Self::VersionNotFound { .. } => "version_not_found",
            Self::RemovedVersion { .. } => "removed_version",
            Self::Conflict { .. } => "version_conflict",
            Self::Storage(RepoError::Db(err)) if err.is_busy() => "storage_busy",
            Self::Storage(_) => "storage_failed",
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidToken(err) => write!(f, "invalid token: {err}"),
            Self::MissingId => write!(f, "item id is required"),
            Self::MissingItem => write!(f, "item fields are required"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidQuery(message) => write!(f, "{message}"),
            Self::VersionNotFound { item_id, version } => {
                write!(f, "item {item_id} has no version {version}")
            }
            Self::RemovedVersion { item_id, version } => {
                write!(f, "version {version} of item {item_id} is removed")
            }
            Self::Conflict {
                item_id,
                expected,
                attempts,
            } => write!(
                f,
                "conflict on item {item_id}: version {expected} was superseded, gave up after {attempts} attempts"
            ),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidToken(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AuthError> for EngineError {
    fn from(value: AuthError) -> Self {
        Self::InvalidToken(value)
    }
}

impl From<ValidationError> for EngineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidQuery(message) => Self::InvalidQuery(message),
            other => Self::Storage(other),
        }
    }
}
