//! Publish engine: copies content versions into the live store.
//!
//! # Invariants
//! - Publishing reads the content store and writes only the live store.
//! - Unpublishing an item that is not live is a no-op, not an error.

use crate::model::item::{AuditStamp, ItemId, LiveItem};
use crate::repo::content_repo::ContentRepository;
use crate::repo::live_repo::LiveRepository;
use crate::service::error::{EngineError, EngineResult};
use log::info;

/// Draft-to-live transitions for one schema.
pub struct PublishEngine<C: ContentRepository, L: LiveRepository> {
    content: C,
    live: L,
}

impl<C: ContentRepository, L: LiveRepository> PublishEngine<C, L> {
    pub fn new(content: C, live: L) -> Self {
        Self { content, live }
    }

    /// Publishes `version` (default: current) of an item, replacing any
    /// earlier snapshot. Unknown items resolve to `None`.
    pub fn publish(
        &self,
        user: &str,
        id: ItemId,
        version: Option<u32>,
    ) -> EngineResult<Option<LiveItem>> {
        let source = match version {
            None => match self.content.load_current(id)? {
                Some(current) => current,
                None => return Ok(None),
            },
            Some(number) => match self.content.load_version(id, number)? {
                Some(found) => found,
                None if self.content.load_current(id)?.is_none() => return Ok(None),
                None => {
                    return Err(EngineError::VersionNotFound {
                        item_id: id,
                        version: number,
                    });
                }
            },
        };

        if source.is_removed() {
            return Err(EngineError::RemovedVersion {
                item_id: id,
                version: source.version,
            });
        }

        let snapshot = LiveItem::from_version(&source, AuditStamp::now(user));
        self.live.upsert_snapshot(&snapshot)?;
        info!(
            "event=item_publish module=publish_engine status=ok schema={} item_id={} version={}",
            self.content.schema().name,
            id,
            snapshot.version
        );
        Ok(Some(snapshot))
    }

    /// Removes the live snapshot; returns whether one existed.
    pub fn unpublish(&self, user: &str, id: ItemId) -> EngineResult<bool> {
        let removed = self.live.delete_snapshot(id)?;
        info!(
            "event=item_unpublish module=publish_engine status={} schema={} item_id={} by={}",
            if removed { "ok" } else { "noop" },
            self.content.schema().name,
            id,
            user
        );
        Ok(removed)
    }

    pub fn is_live(&self, id: ItemId) -> EngineResult<bool> {
        Ok(self.live.contains(id)?)
    }
}
