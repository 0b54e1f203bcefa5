//! Error handling and edge case tests.

use boomega::{
    listener_fn, BackingError, ChangeEvent, Collection, MemoryCollection, Record, RecordField,
    RecordId, RecordListener, RecordStore, StoreError,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn recording_listener() -> (Arc<Mutex<Vec<ChangeEvent>>>, Arc<dyn RecordListener>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let listener = listener_fn(move |event| sink.lock().push(event.clone()));
    (events, listener)
}

fn persisted(store: &RecordStore, title: &str) -> Record {
    let mut record = Record::book(title);
    store.insert_record(&mut record).unwrap();
    record
}

// --- Insert Errors ---

#[test]
fn test_insert_with_identifier() {
    let store = RecordStore::in_memory();
    let (events, listener) = recording_listener();
    store.add_listener(listener).unwrap();

    let mut record = Record::book("Dune");
    record.id = Some(RecordId(5));

    let result = store.insert_record(&mut record);
    assert!(matches!(result, Err(StoreError::AlreadyPersisted(RecordId(5)))));
    assert_eq!(store.total_record_count().unwrap(), 0);
    assert!(events.lock().is_empty());
}

#[test]
fn test_insert_twice() {
    let store = RecordStore::in_memory();
    let mut record = persisted(&store, "Dune");

    let result = store.insert_record(&mut record);
    assert!(matches!(result, Err(StoreError::AlreadyPersisted(_))));
    assert_eq!(store.total_record_count().unwrap(), 1);
}

// --- Update / Remove Errors ---

#[test]
fn test_update_removed_record() {
    let store = RecordStore::in_memory();
    let record = persisted(&store, "Dune");
    store.remove_record(&record).unwrap();

    let (events, listener) = recording_listener();
    store.add_listener(listener).unwrap();

    let result = store.update_record(&record);
    assert!(matches!(result, Err(StoreError::InvalidIdentifier(id)) if Some(id) == record.id));
    assert!(events.lock().is_empty());
}

#[test]
fn test_remove_transient_record() {
    let store = RecordStore::in_memory();
    let result = store.remove_record(&Record::book("Dune"));
    assert!(matches!(result, Err(StoreError::MissingIdentifier)));
}

#[test]
fn test_batch_with_unknown_id_removes_nothing() {
    let store = RecordStore::in_memory();
    let a = persisted(&store, "Dune");
    let b = persisted(&store, "Emma");

    let mut ghost = Record::book("Ghost");
    ghost.id = Some(RecordId(99));

    let (events, listener) = recording_listener();
    store.add_listener(listener).unwrap();

    let result = store.remove_records(&[a.clone(), ghost, b.clone()]);
    assert!(matches!(result, Err(StoreError::InvalidIdentifier(RecordId(99)))));
    assert_eq!(store.all_records().unwrap(), vec![a, b]);
    assert!(events.lock().is_empty());
}

#[test]
fn test_batch_with_transient_record_removes_nothing() {
    let store = RecordStore::in_memory();
    let a = persisted(&store, "Dune");

    let result = store.remove_records(&[a, Record::book("Transient")]);
    assert!(matches!(result, Err(StoreError::MissingIdentifier)));
    assert_eq!(store.total_record_count().unwrap(), 1);
}

#[test]
fn test_batch_with_repeated_record() {
    let store = RecordStore::in_memory();
    let a = persisted(&store, "Dune");

    let result = store.remove_records(&[a.clone(), a.clone()]);
    assert!(matches!(result, Err(StoreError::InvalidIdentifier(_))));
    assert_eq!(store.total_record_count().unwrap(), 1);
}

// --- Backing Errors ---

#[test]
fn test_duplicate_key_propagates() {
    let collection = Arc::new(MemoryCollection::with_unique_fields(
        "records",
        vec![RecordField::Isbn.name().to_string()],
    ));
    let store = RecordStore::with_collection(collection);
    let (events, listener) = recording_listener();
    store.add_listener(listener).unwrap();

    let mut first = Record::book("Dune").with_isbn("978-0441013593");
    store.insert_record(&mut first).unwrap();

    let mut other = Record::book("Emma").with_isbn("978-0141439587");
    store.insert_record(&mut other).unwrap();

    // Update into a taken ISBN fails and keeps the stored version
    let mut clash = other.clone();
    clash.isbn = first.isbn.clone();
    let result = store.update_record(&clash);
    match result {
        Err(StoreError::Backing(BackingError::DuplicateKey { field, value })) => {
            assert_eq!(field, "isbn");
            assert_eq!(value, "978-0441013593");
        }
        unexpected => panic!("Expected DuplicateKey, got {:?}", unexpected),
    }

    assert_eq!(store.get_record(other.id.unwrap()).unwrap(), Some(other));
    assert_eq!(events.lock().len(), 2);
}

#[test]
fn test_collection_closed_underneath() {
    let collection = Arc::new(MemoryCollection::new("records"));
    let store = RecordStore::with_collection(Arc::clone(&collection) as Arc<dyn Collection>);

    assert!(!store.is_closed());
    collection.close().unwrap();
    assert!(store.is_closed());

    let result = store.insert_record(&mut Record::book("Dune"));
    assert!(matches!(result, Err(StoreError::Closed)));
    assert!(matches!(store.all_records(), Err(StoreError::Closed)));

    // Closing the store afterwards still succeeds
    store.close().unwrap();
}

// --- Closed Store ---

#[test]
fn test_operations_after_close() {
    let store = RecordStore::in_memory();
    let mut record = persisted(&store, "Dune");
    let (events, listener) = recording_listener();
    store.add_listener(Arc::clone(&listener)).unwrap();

    assert!(!store.is_closed());
    store.close().unwrap();
    assert!(store.is_closed());

    assert!(matches!(store.total_record_count(), Err(StoreError::Closed)));
    assert!(matches!(store.all_records(), Err(StoreError::Closed)));
    assert!(matches!(store.update_record(&record), Err(StoreError::Closed)));
    assert!(matches!(store.remove_record(&record), Err(StoreError::Closed)));
    assert!(matches!(store.remove_records(&[record.clone()]), Err(StoreError::Closed)));
    assert!(matches!(store.add_listener(Arc::clone(&listener)), Err(StoreError::Closed)));
    assert!(matches!(store.remove_listener(&listener), Err(StoreError::Closed)));
    assert!(matches!(store.subscribe(4), Err(StoreError::Closed)));

    record.id = None;
    assert!(matches!(store.insert_record(&mut record), Err(StoreError::Closed)));
    assert_eq!(record.id, None);

    assert!(events.lock().is_empty());
}

#[test]
fn test_close_twice() {
    let store = RecordStore::in_memory();
    store.close().unwrap();
    store.close().unwrap();
    assert!(store.is_closed());
}

#[test]
fn test_error_messages() {
    assert_eq!(
        StoreError::AlreadyPersisted(RecordId(5)).to_string(),
        "Record already persisted with id 5"
    );
    assert_eq!(
        StoreError::InvalidIdentifier(RecordId(9)).to_string(),
        "Invalid record identifier: 9"
    );
    assert_eq!(StoreError::Closed.to_string(), "Store is closed");
}
