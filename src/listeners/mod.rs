//! Change notification for record mutations.
//!
//! Every successful mutation of a [`RecordStore`](crate::store::RecordStore)
//! produces exactly one [`ChangeEvent`], delivered synchronously to each
//! registered [`RecordListener`] on the mutating thread.
//!
//! Listeners can be:
//! - any type implementing [`RecordListener`]
//! - a closure wrapped with [`listener_fn`]
//! - a bounded channel, via [`RecordStore::subscribe`](crate::store::RecordStore::subscribe),
//!   which is dropped once its buffer overflows or its receiver goes away
//!
//! # Example
//!
//! ```ignore
//! let store = RecordStore::in_memory();
//! let handle = store.subscribe(64)?;
//!
//! let mut record = Record::book("Dune");
//! store.insert_record(&mut record)?;
//!
//! let event = handle.recv()?;
//! assert_eq!(event.kind, ChangeType::Insert);
//! ```

mod registry;
mod types;

pub use registry::ListenerRegistry;
pub use types::{
    listener_fn, ChangeEvent, ChangeType, ChannelListener, FnListener, RecordListener,
    SubscriptionHandle,
};
