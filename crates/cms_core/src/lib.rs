//! Versioned headless content engine.
//!
//! Every registered schema gets an append-only version history, a public
//! live store fed by publishing, and token-guarded read/write services.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use auth::{AuthError, AuthResult, StaticTokenValidator, TokenValidator};
pub use config::EngineConfig;
pub use db::{open_db, open_db_in_memory, open_db_in_memory_with, open_db_with, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::item::{AuditStamp, Fields, Item, ItemId, ItemStatus, LiveItem, UserId};
pub use model::schema::{
    ContentSchema, FieldDef, FieldIssue, FieldType, IssueKind, SchemaError, ValidationError,
};
pub use repo::content_repo::{ContentRepository, SqliteContentStore};
pub use repo::live_repo::{LiveRepository, SqliteLiveStore};
pub use repo::query::ItemQuery;
pub use repo::{ReadStore, RepoError, RepoResult};
pub use service::content_service::{
    build_sqlite_service, ContentService, ContentServices, RegistryError, SqliteContentService,
};
pub use service::error::{EngineError, EngineResult};
pub use service::read_facade::ReadFacade;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
