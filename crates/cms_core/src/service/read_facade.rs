//! Uniform any/count/find/get over one store.
//!
//! The same facade serves content-side reads (current versions) and the
//! public `live` reads (published snapshots).

use crate::repo::query::ItemQuery;
use crate::repo::ReadStore;
use crate::service::error::EngineResult;
use crate::service::resolve_id;

/// Read operations over one content or live store.
pub struct ReadFacade<S: ReadStore> {
    store: S,
}

impl<S: ReadStore> ReadFacade<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether at least one record matches.
    pub fn any(&self, query: Option<&ItemQuery>) -> EngineResult<bool> {
        Ok(self.count(query)? > 0)
    }

    pub fn count(&self, query: Option<&ItemQuery>) -> EngineResult<u64> {
        let default = ItemQuery::default();
        Ok(self.store.count(query.unwrap_or(&default))?)
    }

    /// Matching records in insertion order.
    pub fn find(&self, query: Option<&ItemQuery>) -> EngineResult<Vec<S::Record>> {
        let default = ItemQuery::default();
        Ok(self.store.find(query.unwrap_or(&default))?)
    }

    /// One record by id; absence resolves to `None`.
    pub fn get(&self, id: &str, query: Option<&ItemQuery>) -> EngineResult<Option<S::Record>> {
        let Some(id) = resolve_id(id)? else {
            return Ok(None);
        };
        let default = ItemQuery::default();
        Ok(self.store.get(id, query.unwrap_or(&default))?)
    }
}
