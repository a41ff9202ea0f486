//! Content domain model.
//!
//! # Responsibility
//! - Define the versioned item shape shared by the content and live stores.
//! - Describe per-schema business fields and their validation rules.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId` across all versions.
//! - Removal is a `removed` version marker, never a hard delete.

pub mod item;
pub mod schema;
