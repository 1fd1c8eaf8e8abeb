#![forbid(unsafe_code)]

//! Change tracking.
//!
//! - [`IndexedCollection`]: keyed, optionally sorted sequence that records its
//!   mutations as [`ChangeRecord`]s
//! - [`Observable`]: buffers records and delivers each batch once per flush
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tabula_core::{KeySelector, Row};
//! use tabula_runtime::reactive::IndexedCollection;
//! use tabula_runtime::scheduler::TaskQueue;
//!
//! let queue = TaskQueue::new();
//! let rows = IndexedCollection::new("data", KeySelector::<Row>::field("id"), queue.handle());
//! let batches = Rc::new(Cell::new(0));
//! let b = Rc::clone(&batches);
//! rows.observe(move |_| {
//!     b.set(b.get() + 1);
//!     Ok(())
//! });
//!
//! rows.push(vec![Row::new().with("id", 1)]).unwrap();
//! rows.push(vec![Row::new().with("id", 2)]).unwrap();
//! queue.tick();
//! assert_eq!(batches.get(), 1);
//! ```

pub mod change;
pub mod collection;
pub mod observable;

pub use change::{ChangeKind, ChangeRecord, replay};
pub use collection::{CollectionError, IndexedCollection};
pub use observable::{
    ContextId, ErrorSink, FlushError, FlushReport, Observable, ObserverError, ObserverFn,
    ObserverId, ObserverResult,
};
