//! Embedded document engine backing the record store.
//!
//! A [`Collection`] is the narrow boundary the store talks to. Two engines
//! implement it:
//! - [`MemoryCollection`]: process-local, nothing written to disk
//! - [`LogCollection`]: one append-only, checksummed log file per named
//!   collection inside a [`Database`] directory

mod collection;
mod database;
mod index;
mod log;
mod memory;

pub use collection::LogCollection;
pub use database::{Database, DatabaseConfig};
pub use index::{DocumentIndex, UniqueKeys};
pub use log::{DocumentLog, LogEntry};
pub use memory::MemoryCollection;

use crate::error::BackingResult;
use crate::types::{Document, RecordId};

/// A named collection of documents keyed by engine-assigned identifiers.
pub trait Collection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Persist a new document and return its generated identifier.
    fn insert(&self, document: Document) -> BackingResult<RecordId>;

    /// Replace the document stored under `id`.
    fn update(&self, id: RecordId, document: Document) -> BackingResult<()>;

    /// Delete the document stored under `id`.
    fn remove(&self, id: RecordId) -> BackingResult<()> {
        self.remove_many(&[id])
    }

    /// Delete several documents. Either all are removed or none are.
    fn remove_many(&self, ids: &[RecordId]) -> BackingResult<()>;

    /// Fetch a single document.
    fn get(&self, id: RecordId) -> BackingResult<Option<Document>>;

    /// All live documents in identifier order.
    fn find_all(&self) -> BackingResult<Vec<(RecordId, Document)>>;

    /// Number of live documents.
    fn count(&self) -> BackingResult<u64>;

    /// Flush pending writes to durable storage.
    fn sync(&self) -> BackingResult<()> {
        Ok(())
    }

    /// Drop superseded data from storage. Identifiers are preserved.
    fn compact(&self) -> BackingResult<()> {
        Ok(())
    }

    /// Bytes occupied on disk.
    fn size_bytes(&self) -> u64 {
        0
    }

    /// Release the collection. Further calls fail with `BackingError::Closed`.
    fn close(&self) -> BackingResult<()>;

    fn is_closed(&self) -> bool;
}
