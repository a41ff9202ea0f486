//! Content use-case services.
//!
//! # Responsibility
//! - Compose version, publish and read engines into one service per schema.
//! - Authenticate every operation before storage is touched.
//!
//! # Invariants
//! - Engines stay storage-agnostic and depend only on repository traits.
//! - Absence of an item is `Ok(None)`, never an error.

pub mod content_service;
pub mod error;
pub mod publish_engine;
pub mod read_facade;
pub mod version_engine;

use crate::model::item::ItemId;
use error::{EngineError, EngineResult};
use uuid::Uuid;

/// Parses a caller-supplied id.
///
/// Blank input is `MissingId`; anything that is not a UUID cannot name a
/// stored item and resolves to `None`.
pub(crate) fn resolve_id(raw: &str) -> EngineResult<Option<ItemId>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EngineError::MissingId);
    }
    Ok(Uuid::parse_str(trimmed).ok())
}
