//! The record store: single point of mutation and observation for the
//! catalog records of one open database.

use crate::engine::{Collection, Database, DatabaseConfig, MemoryCollection};
use crate::error::{BackingError, Result, StoreError};
use crate::listeners::{
    ChangeEvent, ChangeType, ChannelListener, ListenerRegistry, RecordListener,
    SubscriptionHandle,
};
use crate::types::{Document, Record, RecordField, RecordId, StoreStats};
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the collection records live in unless configured otherwise.
pub const DEFAULT_COLLECTION: &str = "records";

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Backing database settings.
    pub database: DatabaseConfig,

    /// Collection holding the records.
    pub collection: String,

    /// Fields whose values must be unique across records.
    pub unique_fields: Vec<RecordField>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            unique_fields: Vec::new(),
        }
    }
}

/// Catalog record store.
///
/// Mutations (insert, update, remove, listener registration, close) are
/// serialized by one per-instance lock, which is held while listeners run.
/// The lock is re-entrant, so a listener may call back into the store from
/// the notifying thread. Reads do not take the lock.
pub struct RecordStore {
    /// Backing collection.
    collection: Arc<dyn Collection>,

    /// Owning database, when the store opened one itself.
    database: Option<Database>,

    /// Registered change listeners.
    listeners: ListenerRegistry,

    /// Lock serializing mutations and listener fan-out.
    write_lock: ReentrantMutex<()>,

    closed: AtomicBool,
}

impl RecordStore {
    /// Open (or create) a database directory and its record collection.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let database = Database::open_or_create(config.database)?;
        let unique: Vec<String> = config
            .unique_fields
            .iter()
            .map(|field| field.name().to_string())
            .collect();
        let collection = database.collection(&config.collection, &unique)?;

        info!(
            path = %database.path().display(),
            collection = %config.collection,
            "opened record store"
        );

        Ok(Self::build(collection, Some(database)))
    }

    /// A store whose records live only in memory.
    pub fn in_memory() -> Self {
        Self::with_collection(Arc::new(MemoryCollection::new(DEFAULT_COLLECTION)))
    }

    /// A store over an already opened collection.
    pub fn with_collection(collection: Arc<dyn Collection>) -> Self {
        Self::build(collection, None)
    }

    fn build(collection: Arc<dyn Collection>, database: Option<Database>) -> Self {
        Self {
            collection,
            database,
            listeners: ListenerRegistry::new(),
            write_lock: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    // --- Reads ---

    /// Number of persisted records.
    pub fn total_record_count(&self) -> Result<u64> {
        self.ensure_open()?;
        self.collection.count().map_err(Self::backing)
    }

    /// Snapshot of all persisted records, in identifier order.
    pub fn all_records(&self) -> Result<Vec<Record>> {
        self.ensure_open()?;
        self.collection
            .find_all()
            .map_err(Self::backing)?
            .into_iter()
            .map(|(id, document)| Self::decode(id, &document))
            .collect()
    }

    /// Fetch one record by identifier.
    pub fn get_record(&self, id: RecordId) -> Result<Option<Record>> {
        self.ensure_open()?;
        match self.collection.get(id).map_err(Self::backing)? {
            Some(document) => Ok(Some(Self::decode(id, &document)?)),
            None => Ok(None),
        }
    }

    // --- Mutations ---

    /// Persist a new record.
    ///
    /// The assigned identifier is written back onto `record` and also
    /// returned. Listeners receive an insert event holding the record.
    pub fn insert_record(&self, record: &mut Record) -> Result<RecordId> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;

        if let Some(id) = record.id {
            return Err(StoreError::AlreadyPersisted(id));
        }

        let document = Self::encode(record)?;
        let id = self.collection.insert(document).map_err(Self::backing)?;
        record.id = Some(id);

        debug!(%id, title = %record.title, "inserted record");
        self.notify(ChangeType::Insert, vec![record.clone()]);
        Ok(id)
    }

    /// Overwrite the persisted fields of an existing record.
    pub fn update_record(&self, record: &Record) -> Result<()> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;

        let id = record.id.ok_or(StoreError::MissingIdentifier)?;
        let document = Self::encode(record)?;
        self.collection
            .update(id, document)
            .map_err(Self::backing)?;

        debug!(%id, "updated record");
        self.notify(ChangeType::Update, vec![record.clone()]);
        Ok(())
    }

    /// Delete one record.
    pub fn remove_record(&self, record: &Record) -> Result<()> {
        self.remove_records(std::slice::from_ref(record))
    }

    /// Delete a batch of records with a single delete event.
    ///
    /// Every identifier is validated first; if any is missing, unknown or
    /// repeated, nothing is removed. An empty batch does nothing.
    pub fn remove_records(&self, records: &[Record]) -> Result<()> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;

        let ids = records
            .iter()
            .map(|record| record.id.ok_or(StoreError::MissingIdentifier))
            .collect::<Result<Vec<_>>>()?;
        if ids.is_empty() {
            return Ok(());
        }

        self.collection
            .remove_many(&ids)
            .map_err(Self::backing)?;

        debug!(count = ids.len(), "removed records");
        self.notify(ChangeType::Delete, records.to_vec());
        Ok(())
    }

    // --- Listeners ---

    /// Register a listener. Returns false if it was already registered.
    pub fn add_listener(&self, listener: Arc<dyn RecordListener>) -> Result<bool> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn RecordListener>) -> Result<bool> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;
        Ok(self.listeners.remove(listener))
    }

    /// Register a channel-backed listener with room for `buffer_size`
    /// undelivered events. It is unregistered once the buffer overflows or
    /// the handle is dropped.
    pub fn subscribe(&self, buffer_size: usize) -> Result<SubscriptionHandle> {
        let (listener, receiver) = ChannelListener::new(buffer_size);
        let listener: Arc<dyn RecordListener> = Arc::new(listener);
        self.add_listener(Arc::clone(&listener))?;
        Ok(SubscriptionHandle::new(listener, receiver))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // --- Store Operations ---

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            record_count: self.total_record_count()?,
            listener_count: self.listeners.len() as u64,
            storage_size_bytes: self.collection.size_bytes(),
        })
    }

    /// Flush pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;
        self.collection.sync().map_err(Self::backing)
    }

    /// Rewrite storage without superseded versions. Records are unchanged
    /// and no event is emitted.
    pub fn compact(&self) -> Result<()> {
        let _lock = self.write_lock.lock();
        self.ensure_open()?;
        self.collection.compact().map_err(Self::backing)
    }

    /// Release the backing storage. Closing twice is a no-op.
    ///
    /// If the backing storage fails to close, the error is returned and the
    /// store stays open with its listeners registered.
    pub fn close(&self) -> Result<()> {
        let _lock = self.write_lock.lock();
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }

        self.collection.close()?;
        if let Some(database) = &self.database {
            database.close()?;
        }
        self.closed.store(true, Ordering::Release);
        self.listeners.clear();

        info!(collection = %self.collection.name(), "closed record store");
        Ok(())
    }

    /// Whether the store or its backing collection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.collection.is_closed()
    }

    // --- Private Helpers ---

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn notify(&self, kind: ChangeType, records: Vec<Record>) {
        let event = ChangeEvent::new(kind, records);
        let delivered = self.listeners.notify(&event);
        debug!(?kind, records = event.len(), listeners = delivered, "notified listeners");
    }

    /// Map engine failures onto the store taxonomy.
    fn backing(error: BackingError) -> StoreError {
        match error {
            BackingError::NotFound(id) => StoreError::InvalidIdentifier(id),
            BackingError::Closed => StoreError::Closed,
            other => StoreError::Backing(other),
        }
    }

    fn encode(record: &Record) -> Result<Document> {
        record
            .to_document()
            .map_err(|e| StoreError::Backing(BackingError::from(e)))
    }

    fn decode(id: RecordId, document: &Document) -> Result<Record> {
        Record::from_document(id, document)
            .map_err(|e| StoreError::Backing(BackingError::Deserialization(e.to_string())))
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        // Best-effort flush on drop
        if !self.is_closed() {
            let _ = self.collection.sync();
        }
    }
}
