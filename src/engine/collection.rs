//! File-backed named collection.

use super::index::DocumentIndex;
use super::log::{DocumentLog, LogEntry};
use super::Collection;
use crate::error::{BackingError, BackingResult};
use crate::types::{Document, RecordId};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

struct State {
    /// None once the collection is closed.
    log: Option<DocumentLog>,
    index: DocumentIndex,
    /// Recently read or written documents.
    cache: LruCache<RecordId, Document>,
}

impl State {
    fn log(&mut self) -> BackingResult<&mut DocumentLog> {
        self.log.as_mut().ok_or(BackingError::Closed)
    }

    /// Load a live document through the cache.
    fn load(&mut self, id: RecordId) -> BackingResult<Option<Document>> {
        let offset = match self.index.offset(id) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        if let Some(document) = self.cache.get(&id) {
            return Ok(Some(document.clone()));
        }

        let entry = self.log()?.read_at(offset)?;
        match entry {
            LogEntry::Put {
                id: stored,
                document,
            } if stored == id => {
                self.cache.put(id, document.clone());
                Ok(Some(document))
            }
            _ => Err(BackingError::Corruption(format!(
                "Index points document {} at a foreign entry (offset {})",
                id, offset
            ))),
        }
    }
}

/// A named collection persisted in its own [`DocumentLog`].
pub struct LogCollection {
    name: String,
    state: Mutex<State>,
    closed: AtomicBool,
}

impl LogCollection {
    /// Open or create the collection log at `path`, replaying it into memory.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        unique_fields: Vec<String>,
        sync_interval: u64,
        cache_size: usize,
    ) -> BackingResult<Self> {
        let name = name.into();
        let mut log = DocumentLog::open(path, sync_interval)?;
        let mut index = DocumentIndex::new(unique_fields);

        log.replay(|offset, entry| match entry {
            LogEntry::Put { id, document } => index.put(id, offset, &document),
            LogEntry::Delete { ids } => {
                for id in ids {
                    index.remove(id);
                }
            }
            LogEntry::Watermark { max_id } => index.observe_id(max_id),
        })?;

        info!(
            collection = %name,
            documents = index.len(),
            log_bytes = log.size(),
            "opened collection"
        );

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            name,
            state: Mutex::new(State {
                log: Some(log),
                index,
                cache: LruCache::new(cache_size),
            }),
            closed: AtomicBool::new(false),
        })
    }
}

impl Collection for LogCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, document: Document) -> BackingResult<RecordId> {
        let mut state = self.state.lock();
        let state = &mut *state;

        state.log()?;
        let id = state.index.next_id();
        state.index.check_unique(None, &document)?;

        let entry = LogEntry::Put { id, document };
        let offset = state.log()?.append(&entry)?;

        if let LogEntry::Put { document, .. } = entry {
            state.index.put(id, offset, &document);
            state.cache.put(id, document);
        }

        debug!(collection = %self.name, %id, offset, "inserted document");
        Ok(id)
    }

    fn update(&self, id: RecordId, document: Document) -> BackingResult<()> {
        let mut state = self.state.lock();
        let state = &mut *state;

        if state.log.is_none() {
            return Err(BackingError::Closed);
        }
        if !state.index.contains(id) {
            return Err(BackingError::NotFound(id));
        }
        state.index.check_unique(Some(id), &document)?;

        let entry = LogEntry::Put { id, document };
        let offset = state.log()?.append(&entry)?;

        if let LogEntry::Put { document, .. } = entry {
            state.index.put(id, offset, &document);
            state.cache.put(id, document);
        }

        debug!(collection = %self.name, %id, offset, "updated document");
        Ok(())
    }

    fn remove_many(&self, ids: &[RecordId]) -> BackingResult<()> {
        let mut state = self.state.lock();

        if state.log.is_none() {
            return Err(BackingError::Closed);
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) || !state.index.contains(*id) {
                return Err(BackingError::NotFound(*id));
            }
        }

        state.log()?.append(&LogEntry::Delete { ids: ids.to_vec() })?;

        for id in ids {
            state.index.remove(*id);
            state.cache.pop(id);
        }

        debug!(collection = %self.name, count = ids.len(), "removed documents");
        Ok(())
    }

    fn get(&self, id: RecordId) -> BackingResult<Option<Document>> {
        let mut state = self.state.lock();
        state.log()?;
        state.load(id)
    }

    fn find_all(&self) -> BackingResult<Vec<(RecordId, Document)>> {
        let mut state = self.state.lock();
        state.log()?;

        let ids: Vec<RecordId> = state.index.entries().map(|(id, _)| id).collect();
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = state.load(id)? {
                documents.push((id, document));
            }
        }
        Ok(documents)
    }

    fn count(&self) -> BackingResult<u64> {
        let mut state = self.state.lock();
        state.log()?;
        Ok(state.index.len() as u64)
    }

    fn sync(&self) -> BackingResult<()> {
        self.state.lock().log()?.sync()
    }

    fn compact(&self) -> BackingResult<()> {
        let mut state = self.state.lock();
        let before = state.log()?.size();

        let ids: Vec<RecordId> = state.index.entries().map(|(id, _)| id).collect();
        let mut entries = Vec::with_capacity(ids.len() + 1);
        // Deleted ids past the last live one must stay retired after reopen
        if let Some(max_id) = state.index.max_id() {
            entries.push(LogEntry::Watermark { max_id });
        }
        for id in ids {
            if let Some(document) = state.load(id)? {
                entries.push(LogEntry::Put { id, document });
            }
        }

        let offsets = state.log()?.rewrite(&entries)?;

        state.index.clear();
        for (entry, offset) in entries.iter().zip(offsets) {
            if let LogEntry::Put { id, document } = entry {
                state.index.put(*id, offset, document);
            }
        }

        let after = state.log()?.size();
        info!(
            collection = %self.name,
            documents = state.index.len(),
            before_bytes = before,
            after_bytes = after,
            "compacted collection"
        );
        Ok(())
    }

    fn size_bytes(&self) -> u64 {
        self.state.lock().log.as_ref().map_or(0, DocumentLog::size)
    }

    fn close(&self) -> BackingResult<()> {
        let mut state = self.state.lock();
        if let Some(mut log) = state.log.take() {
            self.closed.store(true, Ordering::Release);
            state.cache.clear();
            log.sync()?;
            info!(collection = %self.name, "closed collection");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
