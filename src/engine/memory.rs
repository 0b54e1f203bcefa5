//! Process-local collection.

use super::index::UniqueKeys;
use super::Collection;
use crate::error::{BackingError, BackingResult};
use crate::types::{Document, RecordId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

struct Inner {
    documents: BTreeMap<RecordId, Document>,
    unique: UniqueKeys,
    next_id: RecordId,
}

/// Collection held entirely in memory. Contents are lost on drop.
pub struct MemoryCollection {
    name: String,
    inner: RwLock<Inner>,
    closed: AtomicBool,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_unique_fields(name, Vec::new())
    }

    /// Create a collection enforcing unique string values on `unique_fields`.
    pub fn with_unique_fields(name: impl Into<String>, unique_fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner {
                documents: BTreeMap::new(),
                unique: UniqueKeys::new(unique_fields),
                next_id: RecordId(1),
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> BackingResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(BackingError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, document: Document) -> BackingResult<RecordId> {
        self.ensure_open()?;
        let mut inner = self.inner.write();

        inner.unique.check(None, &document)?;

        let id = inner.next_id;
        inner.next_id = id.next();
        inner.unique.insert(id, &document);
        inner.documents.insert(id, document);
        Ok(id)
    }

    fn update(&self, id: RecordId, document: Document) -> BackingResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.write();

        if !inner.documents.contains_key(&id) {
            return Err(BackingError::NotFound(id));
        }
        inner.unique.check(Some(id), &document)?;

        inner.unique.insert(id, &document);
        inner.documents.insert(id, document);
        Ok(())
    }

    fn remove_many(&self, ids: &[RecordId]) -> BackingResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.write();

        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) || !inner.documents.contains_key(id) {
                return Err(BackingError::NotFound(*id));
            }
        }

        for id in ids {
            inner.unique.remove(*id);
            inner.documents.remove(id);
        }
        Ok(())
    }

    fn get(&self, id: RecordId) -> BackingResult<Option<Document>> {
        self.ensure_open()?;
        Ok(self.inner.read().documents.get(&id).cloned())
    }

    fn find_all(&self) -> BackingResult<Vec<(RecordId, Document)>> {
        self.ensure_open()?;
        Ok(self
            .inner
            .read()
            .documents
            .iter()
            .map(|(id, doc)| (*id, doc.clone()))
            .collect())
    }

    fn count(&self) -> BackingResult<u64> {
        self.ensure_open()?;
        Ok(self.inner.read().documents.len() as u64)
    }

    fn close(&self) -> BackingResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(title: &str) -> Document {
        let mut document = Document::new();
        document.insert("title".into(), json!(title));
        document
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let collection = MemoryCollection::new("records");
        assert_eq!(collection.insert(doc("a")).unwrap(), RecordId(1));
        assert_eq!(collection.insert(doc("b")).unwrap(), RecordId(2));

        collection.remove(RecordId(2)).unwrap();
        assert_eq!(collection.insert(doc("c")).unwrap(), RecordId(3));
        assert_eq!(collection.count().unwrap(), 2);
    }

    #[test]
    fn test_update_unknown() {
        let collection = MemoryCollection::new("records");
        let result = collection.update(RecordId(9), doc("x"));
        assert!(matches!(result, Err(BackingError::NotFound(RecordId(9)))));
    }

    #[test]
    fn test_remove_many_is_all_or_nothing() {
        let collection = MemoryCollection::new("records");
        let a = collection.insert(doc("a")).unwrap();
        let b = collection.insert(doc("b")).unwrap();

        let result = collection.remove_many(&[a, RecordId(99), b]);
        assert!(matches!(result, Err(BackingError::NotFound(RecordId(99)))));
        assert_eq!(collection.count().unwrap(), 2);

        let result = collection.remove_many(&[a, a]);
        assert!(result.is_err());
        assert_eq!(collection.count().unwrap(), 2);

        collection.remove_many(&[b, a]).unwrap();
        assert_eq!(collection.count().unwrap(), 0);
    }

    #[test]
    fn test_unique_fields() {
        let collection = MemoryCollection::with_unique_fields("records", vec!["title".into()]);
        let a = collection.insert(doc("Dune")).unwrap();
        assert!(matches!(
            collection.insert(doc("Dune")),
            Err(BackingError::DuplicateKey { .. })
        ));
        let b = collection.insert(doc("Emma")).unwrap();
        assert!(collection.update(b, doc("Dune")).is_err());
        collection.update(a, doc("Dune")).unwrap();
    }

    #[test]
    fn test_closed() {
        let collection = MemoryCollection::new("records");
        collection.close().unwrap();
        assert!(collection.is_closed());
        assert!(matches!(collection.count(), Err(BackingError::Closed)));
        assert!(matches!(collection.insert(doc("a")), Err(BackingError::Closed)));
    }
}
