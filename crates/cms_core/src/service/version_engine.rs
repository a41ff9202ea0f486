//! Version engine: append-only mutations over the content store.
//!
//! # Responsibility
//! - Turn create/update/patch/remove/restore into committed versions.
//! - Serve history and single-version previews.
//!
//! # Invariants
//! - Mutations return the version that was current *before* the commit.
//! - `V+1` is committed only by the writer that observed `V` as current;
//!   losers re-read and retry a bounded number of times.
//! - Every committed version passes full schema validation.

use crate::model::item::{AuditStamp, Fields, Item, ItemId, ItemStatus};
use crate::repo::content_repo::ContentRepository;
use crate::service::error::{EngineError, EngineResult};
use log::{debug, error, info, warn};

/// Version-history mutations for one schema.
pub struct VersionEngine<C: ContentRepository> {
    store: C,
    max_attempts: u32,
}

impl<C: ContentRepository> VersionEngine<C> {
    /// `max_attempts` counts the first commit attempt; values below 1 are
    /// treated as 1.
    pub fn new(store: C, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Validates and stores version 1 of a new item.
    pub fn create(&self, user: &str, fields: &Fields) -> EngineResult<Item> {
        self.store.schema().validate_full(fields)?;
        let item = Item::first_version(fields.clone(), AuditStamp::now(user));
        self.store.insert_first_version(&item)?;
        info!(
            "event=item_create module=version_engine status=ok schema={} item_id={} version=1",
            self.store.schema().name,
            item.id
        );
        Ok(item)
    }

    /// Replaces all business fields; returns the pre-update version.
    ///
    /// Unknown items resolve to `None` before the fields are validated.
    pub fn update(&self, user: &str, id: ItemId, fields: &Fields) -> EngineResult<Option<Item>> {
        let schema = self.store.schema();
        self.commit_next(user, id, "item_update", |_| {
            schema.validate_full(fields)?;
            Ok(Some((fields.clone(), ItemStatus::Visible)))
        })
    }

    /// Merges supplied fields onto the current version; returns the
    /// pre-patch version.
    pub fn patch(&self, user: &str, id: ItemId, partial: &Fields) -> EngineResult<Option<Item>> {
        let schema = self.store.schema();
        self.commit_next(user, id, "item_patch", |current| {
            schema.validate_partial(partial)?;
            let mut merged = current.fields.clone();
            for (name, value) in partial {
                merged.insert(name.clone(), value.clone());
            }
            schema.validate_full(&merged)?;
            Ok(Some((merged, ItemStatus::Visible)))
        })
    }

    /// Commits a `removed` marker; returns the pre-removal version.
    ///
    /// An item whose current version is already removed resolves to `None`
    /// and nothing is written.
    pub fn remove(&self, user: &str, id: ItemId) -> EngineResult<Option<Item>> {
        self.commit_next(user, id, "item_remove", |current| {
            if current.is_removed() {
                Ok(None)
            } else {
                Ok(Some((current.fields.clone(), ItemStatus::Removed)))
            }
        })
    }

    /// Re-commits a historical version's fields as a new version.
    ///
    /// Unknown items resolve to `None`; a known item without `version`
    /// fails with `VersionNotFound`.
    pub fn restore(&self, user: &str, id: ItemId, version: u32) -> EngineResult<Option<Item>> {
        let Some(source) = self.store.load_version(id, version)? else {
            if self.store.load_current(id)?.is_none() {
                return Ok(None);
            }
            return Err(EngineError::VersionNotFound {
                item_id: id,
                version,
            });
        };
        self.store.schema().validate_full(&source.fields)?;
        self.commit_next(user, id, "item_restore", |_| {
            Ok(Some((source.fields.clone(), ItemStatus::Visible)))
        })
    }

    /// All versions of an item, oldest first.
    pub fn history(&self, id: ItemId) -> EngineResult<Vec<Item>> {
        Ok(self.store.load_history(id)?)
    }

    /// One stored version, if it exists.
    pub fn preview(&self, id: ItemId, version: u32) -> EngineResult<Option<Item>> {
        Ok(self.store.load_version(id, version)?)
    }

    fn commit_next<F>(
        &self,
        user: &str,
        id: ItemId,
        event: &'static str,
        next_state: F,
    ) -> EngineResult<Option<Item>>
    where
        F: Fn(&Item) -> EngineResult<Option<(Fields, ItemStatus)>>,
    {
        let schema_name = &self.store.schema().name;
        let mut expected = 0;

        for attempt in 1..=self.max_attempts {
            let Some(current) = self.store.load_current(id)? else {
                return Ok(None);
            };
            let Some((fields, status)) = next_state(&current)? else {
                debug!(
                    "event={event} module=version_engine status=skipped schema={schema_name} item_id={id} version={}",
                    current.version
                );
                return Ok(None);
            };

            let next = current.successor(fields, status, AuditStamp::now(user));
            if self.store.append_version(current.version, &next)? {
                info!(
                    "event={event} module=version_engine status=ok schema={schema_name} item_id={id} version={} attempt={attempt}",
                    next.version
                );
                return Ok(Some(current));
            }

            expected = current.version;
            warn!(
                "event={event} module=version_engine status=retry schema={schema_name} item_id={id} expected_version={expected} attempt={attempt}"
            );
        }

        error!(
            "event={event} module=version_engine status=error schema={schema_name} item_id={id} error_code=version_conflict attempts={}",
            self.max_attempts
        );
        Err(EngineError::Conflict {
            item_id: id,
            expected,
            attempts: self.max_attempts,
        })
    }
}
