#![forbid(unsafe_code)]

//! Core data model for Tabula.
//!
//! Scalar [`Value`]s, record [`Key`]s, field-addressable records, path
//! resolvers, the comparator engine and name → function registries. Nothing
//! in this crate knows about collections, scheduling or trees.

pub mod compare;
pub mod key;
pub mod path;
pub mod record;
pub mod registry;
pub mod value;

pub use compare::{CompareFn, Comparator, SortDescriptor, auto_compare};
pub use key::{Key, KeyError, KeySelector};
pub use path::{Accessor, FieldPath, FnAccessor};
pub use record::{FieldAccess, Row};
pub use registry::{ComparatorRegistry, Registry};
pub use value::{Value, ValueType};
