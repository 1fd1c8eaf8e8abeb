#![forbid(unsafe_code)]

//! Runtime for Tabula: the task scheduler, change records, batched
//! observables and the indexed collection.

pub mod reactive;
pub mod scheduler;

pub use reactive::{
    ChangeKind, ChangeRecord, CollectionError, FlushError, FlushReport, IndexedCollection,
    Observable, ObserverError, ObserverId,
};
pub use scheduler::{Scheduler, Task, TaskId, TaskQueue};
