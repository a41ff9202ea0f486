//! Versioned content item and live snapshot models.
//!
//! # Responsibility
//! - Define the metadata block carried by every stored item version.
//! - Derive successor versions without touching `_id` or `created`.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused.
//! - `version` starts at 1 and a successor is always `version + 1`.
//! - `created` is copied verbatim into every successor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of one content item across all of its versions.
pub type ItemId = Uuid;

/// Identifier of the user a token resolved to.
pub type UserId = String;

/// Business fields of one item, keyed by schema field name.
pub type Fields = Map<String, Value>;

/// Lifecycle marker of one stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Visible,
    /// Terminal marker written by `remove`; earlier versions stay queryable.
    Removed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Removed => "removed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "visible" => Some(Self::Visible),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Who committed something and when (epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub at: i64,
    pub by: UserId,
}

impl AuditStamp {
    pub fn new(at: i64, by: impl Into<UserId>) -> Self {
        Self { at, by: by.into() }
    }

    /// Stamps `by` with the current wall-clock time.
    pub fn now(by: impl Into<UserId>) -> Self {
        Self::new(now_epoch_ms(), by)
    }
}

/// One stored version of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: ItemId,
    pub version: u32,
    pub status: ItemStatus,
    pub created: AuditStamp,
    pub updated: AuditStamp,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    /// Builds version 1 of a brand new item.
    pub fn first_version(fields: Fields, stamp: AuditStamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 1,
            status: ItemStatus::Visible,
            created: stamp.clone(),
            updated: stamp,
            fields,
        }
    }

    /// Builds the version that follows `self`.
    pub fn successor(&self, fields: Fields, status: ItemStatus, stamp: AuditStamp) -> Self {
        Self {
            id: self.id,
            version: self.version + 1,
            status,
            created: self.created.clone(),
            updated: stamp,
            fields,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.status == ItemStatus::Removed
    }
}

/// Published snapshot of one historical item version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveItem {
    #[serde(rename = "_id")]
    pub id: ItemId,
    /// Content version this snapshot was copied from.
    pub version: u32,
    pub created: AuditStamp,
    pub updated: AuditStamp,
    pub published: AuditStamp,
    #[serde(flatten)]
    pub fields: Fields,
}

impl LiveItem {
    pub fn from_version(source: &Item, published: AuditStamp) -> Self {
        Self {
            id: source.id,
            version: source.version,
            created: source.created.clone(),
            updated: source.updated.clone(),
            published,
            fields: source.fields.clone(),
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
