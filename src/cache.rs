//! Maintains the per-collection document map; fans out add/change/remove
//! notifications (spec §4.8). Grounded on the original's
//! `collection_manager.py`, generalized to store documents rather than
//! merely fan out events — the Design Notes in spec §9 resolve that
//! open question in favor of storing (see DESIGN.md).

use std::collections::HashMap;

use serde_json::{Map, Value};

/// A single cached document's fields.
pub type Fields = Map<String, Value>;

/// One observed cache mutation, in the exact order `CacheManager`
/// processed the inbound messages (spec §4.8's ordering invariant).
#[derive(Clone, Debug, PartialEq)]
pub enum CacheEvent {
    Added {
        collection: String,
        id: String,
        fields: Fields,
    },
    Changed {
        collection: String,
        id: String,
        fields: Fields,
        cleared: Vec<String>,
    },
    Removed {
        collection: String,
        id: String,
    },
}

/// `collection -> (docId -> fields)`.
#[derive(Default)]
pub struct CacheManager {
    collections: HashMap<String, HashMap<String, Fields>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Reads a cached document, if present. Returned as an owned copy —
    /// external observers must not be able to mutate cache state (spec
    /// §5's "the cache is owned exclusively by CacheMgr" guarantee).
    pub fn get(&self, collection: &str, id: &str) -> Option<Fields> {
        self.collections.get(collection)?.get(id).cloned()
    }

    /// All documents in a collection, as owned copies.
    pub fn collection(&self, collection: &str) -> HashMap<String, Fields> {
        self.collections.get(collection).cloned().unwrap_or_default()
    }

    /// `added{collection, id, fields?}`: replaces any existing entry
    /// wholesale.
    pub fn on_added(&mut self, collection: String, id: String, fields: Option<Fields>) -> CacheEvent {
        let fields = fields.unwrap_or_default();
        self.collections
            .entry(collection.clone())
            .or_insert_with(HashMap::new)
            .insert(id.clone(), fields.clone());
        CacheEvent::Added {
            collection,
            id,
            fields,
        }
    }

    /// `changed{collection, id, fields?, cleared?}`. A no-op (returns
    /// `None`) if the entry doesn't exist. `cleared` keys are removed
    /// first, then `fields` is merged in, overwriting; a merged-in `null`
    /// deletes the key.
    pub fn on_changed(
        &mut self,
        collection: String,
        id: String,
        fields: Option<Fields>,
        cleared: Option<Vec<String>>,
    ) -> Option<CacheEvent> {
        let entry = self.collections.get_mut(&collection)?.get_mut(&id)?;

        let cleared = cleared.unwrap_or_default();
        for key in &cleared {
            entry.remove(key);
        }
        if let Some(fields) = fields {
            for (key, value) in fields {
                if value.is_null() {
                    entry.remove(&key);
                } else {
                    entry.insert(key, value);
                }
            }
        }
        let effective_fields = entry.clone();

        Some(CacheEvent::Changed {
            collection,
            id,
            fields: effective_fields,
            cleared,
        })
    }

    /// `removed{collection, id}`. A no-op if absent.
    pub fn on_removed(&mut self, collection: String, id: String) -> Option<CacheEvent> {
        let map = self.collections.get_mut(&collection)?;
        map.remove(&id)?;
        Some(CacheEvent::Removed { collection, id })
    }
}
