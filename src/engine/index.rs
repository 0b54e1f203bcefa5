//! In-memory indices over a collection.

use crate::error::{BackingError, BackingResult};
use crate::types::{Document, RecordId};
use std::collections::{BTreeMap, HashMap};

/// Unique-value constraint over a set of document fields.
///
/// Only string values participate; missing or non-string values never
/// collide.
#[derive(Debug, Default)]
pub struct UniqueKeys {
    fields: Vec<String>,

    /// (field, value) -> owning document.
    keys: HashMap<(String, String), RecordId>,

    /// document -> its (field, value) keys, for removal without the document.
    by_id: HashMap<RecordId, Vec<(String, String)>>,
}

impl UniqueKeys {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            keys: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    fn keys_of(&self, document: &Document) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|field| {
                document
                    .get(field)
                    .and_then(|v| v.as_str())
                    .map(|value| (field.clone(), value.to_string()))
            })
            .collect()
    }

    /// Check that `document` (owned by `id`, if already stored) violates no
    /// constraint.
    pub fn check(&self, id: Option<RecordId>, document: &Document) -> BackingResult<()> {
        for key in self.keys_of(document) {
            if let Some(owner) = self.keys.get(&key) {
                if Some(*owner) != id {
                    return Err(BackingError::DuplicateKey {
                        field: key.0,
                        value: key.1,
                    });
                }
            }
        }
        Ok(())
    }

    /// Register the keys of `document` for `id`, replacing any previous ones.
    pub fn insert(&mut self, id: RecordId, document: &Document) {
        self.remove(id);
        let keys = self.keys_of(document);
        for key in &keys {
            self.keys.insert(key.clone(), id);
        }
        if !keys.is_empty() {
            self.by_id.insert(id, keys);
        }
    }

    pub fn remove(&mut self, id: RecordId) {
        if let Some(keys) = self.by_id.remove(&id) {
            for key in keys {
                self.keys.remove(&key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.by_id.clear();
    }
}

/// Index from live document identifiers to log offsets.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    /// id -> offset of the live `Put` frame.
    offsets: BTreeMap<RecordId, u64>,

    /// Unique-field constraint.
    unique: UniqueKeys,

    /// Largest identifier ever assigned (live or deleted).
    max_id: Option<RecordId>,
}

impl DocumentIndex {
    pub fn new(unique_fields: Vec<String>) -> Self {
        Self {
            offsets: BTreeMap::new(),
            unique: UniqueKeys::new(unique_fields),
            max_id: None,
        }
    }

    /// Record a live document at `offset`.
    pub fn put(&mut self, id: RecordId, offset: u64, document: &Document) {
        self.offsets.insert(id, offset);
        self.unique.insert(id, document);
        self.observe_id(id);
    }

    /// Forget a document, returning its former offset.
    pub fn remove(&mut self, id: RecordId) -> Option<u64> {
        self.unique.remove(id);
        self.offsets.remove(&id)
    }

    /// Note an identifier seen in the log so it is never handed out again.
    pub fn observe_id(&mut self, id: RecordId) {
        if self.max_id.map_or(true, |max| id > max) {
            self.max_id = Some(id);
        }
    }

    /// Largest identifier ever assigned.
    pub fn max_id(&self) -> Option<RecordId> {
        self.max_id
    }

    /// Identifier for the next inserted document.
    pub fn next_id(&self) -> RecordId {
        self.max_id.map_or(RecordId(1), RecordId::next)
    }

    pub fn check_unique(&self, id: Option<RecordId>, document: &Document) -> BackingResult<()> {
        self.unique.check(id, document)
    }

    pub fn offset(&self, id: RecordId) -> Option<u64> {
        self.offsets.get(&id).copied()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.offsets.contains_key(&id)
    }

    /// Live entries in identifier order.
    pub fn entries(&self) -> impl Iterator<Item = (RecordId, u64)> + '_ {
        self.offsets.iter().map(|(id, offset)| (*id, *offset))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Drop all live entries, keeping the identifier high-water mark.
    pub fn clear(&mut self) {
        self.offsets.clear();
        self.unique.clear();
    }
}
