#![forbid(unsafe_code)]

//! Test harness for Tabula.
//!
//! - [`fixture`]: a mounted table over an in-memory document with a
//!   deterministic task queue and an event log
//! - [`snapshot`]: markup snapshots under `tests/snapshots/`
//! - [`capture`]: collect `tracing` events emitted while a closure runs
//!
//! Run `BLESS=1 cargo test --package tabula-harness` to create/update
//! snapshots.

pub mod capture;
pub mod fixture;
pub mod snapshot;

pub use capture::{CapturedEvent, capture};
pub use fixture::{EventLog, TableFixture, people, person, person_columns};
pub use snapshot::{check_snapshot, digest};

/// Compare `actual` markup against the named snapshot.
///
/// `BLESS=1` records or rewrites the snapshot; otherwise a missing one fails.
#[macro_export]
macro_rules! assert_snapshot {
    ($name:expr, $actual:expr) => {
        if let Err(msg) = $crate::snapshot::check_snapshot($name, &$actual) {
            panic!("{}", msg);
        }
    };
}
