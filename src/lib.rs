//! # Boomega record store
//!
//! Persistence and change notification for a book and magazine catalog.
//!
//! ## Core Concepts
//!
//! - **Records**: catalog entries whose identifier is assigned on insert
//! - **Collections**: named document sets in an embedded, log-structured
//!   database (or purely in memory)
//! - **Listeners**: observers receiving one change event per mutation
//!
//! ## Example
//!
//! ```ignore
//! use boomega::{Record, RecordStore, StoreConfig, DatabaseConfig};
//!
//! let store = RecordStore::open(StoreConfig {
//!     database: DatabaseConfig {
//!         path: "./catalog".into(),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! })?;
//!
//! let handle = store.subscribe(64)?;
//!
//! let mut record = Record::book("Dune").with_authors(["Frank Herbert"]);
//! let id = store.insert_record(&mut record)?;
//! assert_eq!(record.id, Some(id));
//!
//! record.title = "Dune Messiah".into();
//! store.update_record(&record)?;
//!
//! store.remove_record(&record)?;
//! ```

pub mod engine;
pub mod error;
pub mod listeners;
pub mod store;
pub mod types;

// Re-exports
pub use engine::{Collection, Database, DatabaseConfig, LogCollection, MemoryCollection};
pub use error::{BackingError, Result, StoreError};
pub use listeners::{
    listener_fn, ChangeEvent, ChangeType, ChannelListener, ListenerRegistry, RecordListener,
    SubscriptionHandle,
};
pub use store::{RecordStore, StoreConfig, DEFAULT_COLLECTION};
pub use types::*;
