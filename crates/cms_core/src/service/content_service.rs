//! Per-schema content service and service factory.
//!
//! # Responsibility
//! - Expose the full content surface of one schema behind token checks.
//! - Build SQLite-backed services for many schemas over one connection.
//!
//! # Invariants
//! - Token validation runs first in every operation except `live()` reads;
//!   a rejected token never reaches storage.
//! - Argument presence (`MissingId`, `MissingItem`) is checked before
//!   storage access.

use crate::auth::{authenticate, TokenValidator};
use crate::config::EngineConfig;
use crate::model::item::{Fields, Item, LiveItem, UserId};
use crate::model::schema::ContentSchema;
use crate::repo::content_repo::{ContentRepository, SqliteContentStore};
use crate::repo::live_repo::{LiveRepository, SqliteLiveStore};
use crate::repo::query::ItemQuery;
use crate::repo::RepoError;
use crate::service::error::{EngineError, EngineResult};
use crate::service::publish_engine::PublishEngine;
use crate::service::read_facade::ReadFacade;
use crate::service::resolve_id;
use crate::service::version_engine::VersionEngine;
use log::{error, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Content service backed by the SQLite stores.
pub type SqliteContentService<'conn> =
    ContentService<SqliteContentStore<'conn>, SqliteLiveStore<'conn>>;

/// Token-guarded content surface of one schema.
pub struct ContentService<C, L>
where
    C: ContentRepository + Clone,
    L: LiveRepository + Clone,
{
    auth: Arc<dyn TokenValidator>,
    versions: VersionEngine<C>,
    publishing: PublishEngine<C, L>,
    content: ReadFacade<C>,
    live: ReadFacade<L>,
    schema_name: String,
}

impl<C, L> ContentService<C, L>
where
    C: ContentRepository + Clone,
    L: LiveRepository + Clone,
{
    /// Composes the engines over the two store handles of one schema.
    pub fn new(content: C, live: L, auth: Arc<dyn TokenValidator>, config: &EngineConfig) -> Self {
        Self {
            schema_name: content.schema().name.clone(),
            versions: VersionEngine::new(content.clone(), config.max_commit_attempts()),
            publishing: PublishEngine::new(content.clone(), live.clone()),
            content: ReadFacade::new(content),
            live: ReadFacade::new(live),
            auth,
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Public reads over published snapshots; no token required.
    pub fn live(&self) -> &ReadFacade<L> {
        &self.live
    }

    pub fn any(&self, token: Option<&str>, query: Option<&ItemQuery>) -> EngineResult<bool> {
        self.guarded("item_any", token, |_| self.content.any(query))
    }

    pub fn count(&self, token: Option<&str>, query: Option<&ItemQuery>) -> EngineResult<u64> {
        self.guarded("item_count", token, |_| self.content.count(query))
    }

    pub fn find(&self, token: Option<&str>, query: Option<&ItemQuery>) -> EngineResult<Vec<Item>> {
        self.guarded("item_find", token, |_| self.content.find(query))
    }

    pub fn get(
        &self,
        token: Option<&str>,
        id: &str,
        query: Option<&ItemQuery>,
    ) -> EngineResult<Option<Item>> {
        self.guarded("item_get", token, |_| self.content.get(id, query))
    }

    /// Stores version 1 of a new item and returns it.
    pub fn create(&self, token: Option<&str>, item: Option<&Fields>) -> EngineResult<Item> {
        self.guarded("item_create", token, |user| {
            let fields = item.ok_or(EngineError::MissingItem)?;
            self.versions.create(user, fields)
        })
    }

    /// Full replace; resolves to the version that was current before.
    pub fn update(
        &self,
        token: Option<&str>,
        id: &str,
        fields: Option<&Fields>,
    ) -> EngineResult<Option<Item>> {
        self.guarded("item_update", token, |user| {
            let id = resolve_id(id)?;
            let fields = fields.ok_or(EngineError::MissingItem)?;
            match id {
                Some(id) => self.versions.update(user, id, fields),
                None => Ok(None),
            }
        })
    }

    /// Partial merge; resolves to the version that was current before.
    pub fn patch(
        &self,
        token: Option<&str>,
        id: &str,
        fields: Option<&Fields>,
    ) -> EngineResult<Option<Item>> {
        self.guarded("item_patch", token, |user| {
            let id = resolve_id(id)?;
            let fields = fields.ok_or(EngineError::MissingItem)?;
            match id {
                Some(id) => self.versions.patch(user, id, fields),
                None => Ok(None),
            }
        })
    }

    /// Marks the item removed; resolves to the version that was current
    /// before.
    pub fn remove(&self, token: Option<&str>, id: &str) -> EngineResult<Option<Item>> {
        self.guarded("item_remove", token, |user| match resolve_id(id)? {
            Some(id) => self.versions.remove(user, id),
            None => Ok(None),
        })
    }

    pub fn history(&self, token: Option<&str>, id: &str) -> EngineResult<Vec<Item>> {
        self.guarded("item_history", token, |_| match resolve_id(id)? {
            Some(id) => self.versions.history(id),
            None => Ok(Vec::new()),
        })
    }

    pub fn preview(
        &self,
        token: Option<&str>,
        id: &str,
        version: u32,
    ) -> EngineResult<Option<Item>> {
        self.guarded("item_preview", token, |_| match resolve_id(id)? {
            Some(id) => self.versions.preview(id, version),
            None => Ok(None),
        })
    }

    /// Commits an old version's fields as the newest version; resolves to
    /// the version that was current before.
    pub fn restore(
        &self,
        token: Option<&str>,
        id: &str,
        version: u32,
    ) -> EngineResult<Option<Item>> {
        self.guarded("item_restore", token, |user| match resolve_id(id)? {
            Some(id) => self.versions.restore(user, id, version),
            None => Ok(None),
        })
    }

    /// Copies `version` (default: current) into the live store.
    pub fn publish(
        &self,
        token: Option<&str>,
        id: &str,
        version: Option<u32>,
    ) -> EngineResult<Option<LiveItem>> {
        self.guarded("item_publish", token, |user| match resolve_id(id)? {
            Some(id) => self.publishing.publish(user, id, version),
            None => Ok(None),
        })
    }

    /// Deletes the live snapshot; returns whether one existed.
    pub fn unpublish(&self, token: Option<&str>, id: &str) -> EngineResult<bool> {
        self.guarded("item_unpublish", token, |user| match resolve_id(id)? {
            Some(id) => self.publishing.unpublish(user, id),
            None => Ok(false),
        })
    }

    pub fn is_live(&self, token: Option<&str>, id: &str) -> EngineResult<bool> {
        self.guarded("item_is_live", token, |_| match resolve_id(id)? {
            Some(id) => self.publishing.is_live(id),
            None => Ok(false),
        })
    }

    fn guarded<T, F>(&self, event: &'static str, token: Option<&str>, run: F) -> EngineResult<T>
    where
        F: FnOnce(&str) -> EngineResult<T>,
    {
        let started_at = Instant::now();
        let result = self
            .authenticate(token)
            .and_then(|user| run(user.as_str()));

        if let Err(err) = &result {
            match err {
                EngineError::Storage(_) | EngineError::Conflict { .. } => error!(
                    "event={} module=service status=error schema={} duration_ms={} error_code={} error={}",
                    event,
                    self.schema_name,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                ),
                _ => warn!(
                    "event={} module=service status=rejected schema={} duration_ms={} error_code={}",
                    event,
                    self.schema_name,
                    started_at.elapsed().as_millis(),
                    err.code()
                ),
            }
        }
        result
    }

    fn authenticate(&self, token: Option<&str>) -> EngineResult<UserId> {
        Ok(authenticate(self.auth.as_ref(), token)?)
    }
}

/// Builds the SQLite-backed service for one schema.
pub fn build_sqlite_service<'conn>(
    conn: &'conn Connection,
    schema: ContentSchema,
    auth: Arc<dyn TokenValidator>,
    config: &EngineConfig,
) -> Result<SqliteContentService<'conn>, RepoError> {
    let schema = Arc::new(schema);
    let content = SqliteContentStore::try_new(conn, Arc::clone(&schema))?;
    let live = SqliteLiveStore::try_new(conn, schema)?;
    Ok(ContentService::new(content, live, auth, config))
}

/// Schema registration failures.
#[derive(Debug)]
pub enum RegistryError {
    DuplicateSchema(String),
    Repo(RepoError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSchema(name) => write!(f, "schema already registered: {name}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DuplicateSchema(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for RegistryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Services for every registered schema, sharing one connection.
pub struct ContentServices<'conn> {
    conn: &'conn Connection,
    auth: Arc<dyn TokenValidator>,
    config: EngineConfig,
    services: BTreeMap<String, SqliteContentService<'conn>>,
}

impl<'conn> ContentServices<'conn> {
    pub fn new(conn: &'conn Connection, auth: Arc<dyn TokenValidator>, config: EngineConfig) -> Self {
        Self {
            conn,
            auth,
            config,
            services: BTreeMap::new(),
        }
    }

    /// Builds and stores the service for `schema`.
    pub fn register(
        &mut self,
        schema: ContentSchema,
    ) -> Result<&SqliteContentService<'conn>, RegistryError> {
        let name = schema.name.clone();
        if self.services.contains_key(&name) {
            return Err(RegistryError::DuplicateSchema(name));
        }

        let service = build_sqlite_service(self.conn, schema, Arc::clone(&self.auth), &self.config)?;
        Ok(self.services.entry(name).or_insert(service))
    }

    pub fn get(&self, schema_name: &str) -> Option<&SqliteContentService<'conn>> {
        self.services.get(schema_name)
    }

    /// Registered schema names in sorted order.
    pub fn schema_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}
