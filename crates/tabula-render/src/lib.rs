#![forbid(unsafe_code)]

//! Tree layer for Tabula.
//!
//! - [`Tree`]: the node surface the widget renders into
//! - [`Document`]: arena-backed in-memory implementation
//! - [`merge_attributes`] / [`merge_nodes`]: in-place reconciliation

pub mod document;
pub mod reconcile;
pub mod tree;

pub use document::{Document, NodeId};
pub use reconcile::{MergeStats, merge_attributes, merge_nodes, merge_nodes_with_stats};
pub use tree::{NodeKind, Tree, TreeError};
