//! Model-based tests: the store against a plain map of live records.

use boomega::{ChangeType, DatabaseConfig, Record, RecordId, RecordStore, StoreConfig};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

#[derive(Clone, Debug)]
enum Op {
    Insert(String),
    /// Retitle the n-th live record (modulo live count).
    Update(usize, String),
    /// Remove the n-th live record.
    Remove(usize),
    /// Remove every k-th live record in one batch.
    RemoveBatch(usize),
    Compact,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[a-z]{1,8}".prop_map(Op::Insert),
        2 => (any::<usize>(), "[a-z]{1,8}").prop_map(|(n, t)| Op::Update(n, t)),
        1 => any::<usize>().prop_map(Op::Remove),
        1 => (1usize..4).prop_map(Op::RemoveBatch),
        1 => Just(Op::Compact),
    ]
}

fn nth(model: &BTreeMap<RecordId, Record>, n: usize) -> Option<Record> {
    if model.is_empty() {
        None
    } else {
        model.values().nth(n % model.len()).cloned()
    }
}

fn run(store: &RecordStore, ops: &[Op]) -> Result<BTreeMap<RecordId, Record>, TestCaseError> {
    let handle = store.subscribe(ops.len() + 1).unwrap();
    let mut model: BTreeMap<RecordId, Record> = BTreeMap::new();
    let mut expected_events = Vec::new();

    for op in ops {
        match op {
            Op::Insert(title) => {
                let mut record = Record::book(title.clone());
                let id = store.insert_record(&mut record).unwrap();
                prop_assert!(!model.contains_key(&id));
                model.insert(id, record.clone());
                expected_events.push((ChangeType::Insert, vec![record]));
            }
            Op::Update(n, title) => {
                if let Some(mut record) = nth(&model, *n) {
                    record.title = title.clone();
                    store.update_record(&record).unwrap();
                    model.insert(record.id.unwrap(), record.clone());
                    expected_events.push((ChangeType::Update, vec![record]));
                }
            }
            Op::Remove(n) => {
                if let Some(record) = nth(&model, *n) {
                    store.remove_record(&record).unwrap();
                    model.remove(&record.id.unwrap());
                    expected_events.push((ChangeType::Delete, vec![record]));
                }
            }
            Op::RemoveBatch(k) => {
                let batch: Vec<Record> = model.values().step_by(*k).cloned().collect();
                store.remove_records(&batch).unwrap();
                if !batch.is_empty() {
                    for record in &batch {
                        model.remove(&record.id.unwrap());
                    }
                    expected_events.push((ChangeType::Delete, batch));
                }
            }
            Op::Compact => store.compact().unwrap(),
        }

        prop_assert_eq!(store.total_record_count().unwrap(), model.len() as u64);
    }

    let listed = store.all_records().unwrap();
    let expected: Vec<Record> = model.values().cloned().collect();
    prop_assert_eq!(listed, expected);

    let events: Vec<(ChangeType, Vec<Record>)> = handle
        .receiver
        .try_iter()
        .map(|e| (e.kind, e.records))
        .collect();
    prop_assert_eq!(events, expected_events);

    Ok(model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn memory_store_matches_model(ops in prop::collection::vec(op(), 0..40)) {
        let store = RecordStore::in_memory();
        run(&store, &ops)?;
    }

    #[test]
    fn log_store_matches_model_across_reopen(ops in prop::collection::vec(op(), 0..30)) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            database: DatabaseConfig {
                path: dir.path().join("catalog"),
                sync_interval: 64,
                cache_size: 3,
                ..Default::default()
            },
            ..Default::default()
        };

        let model = {
            let store = RecordStore::open(config.clone()).unwrap();
            run(&store, &ops)?
        };

        let store = RecordStore::open(config).unwrap();
        let listed = store.all_records().unwrap();
        let expected: Vec<Record> = model.into_values().collect();
        prop_assert_eq!(listed, expected);
    }
}
