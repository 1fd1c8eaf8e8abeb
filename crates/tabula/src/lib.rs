#![forbid(unsafe_code)]

//! Tabula public facade.
//!
//! Re-exports the crates that make up the widget and provides a
//! [`prelude`] for the common path: build columns, create a [`Table`], mount
//! it, mutate its data, and step the [`TaskQueue`].
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tabula::prelude::*;
//!
//! let queue = TaskQueue::new();
//! let doc = Rc::new(RefCell::new(Document::new()));
//! let table = Table::new(
//!     Rc::clone(&doc),
//!     KeySelector::field("id"),
//!     vec![
//!         ColumnDef::<Row>::field("id", "Id").into_ref(),
//!         ColumnDef::<Row>::field("name", "Name").into_ref(),
//!     ],
//!     TableConfig::new().selectable(true),
//!     queue.handle(),
//! )
//! .unwrap();
//! table.mount(None).unwrap();
//!
//! table.data().push(vec![
//!     Row::new().with("id", 2).with("name", "Grace"),
//!     Row::new().with("id", 1).with("name", "Ada"),
//! ]).unwrap();
//! table.sort_by("id", true).unwrap();
//! table.select(&Key::Int(1)).unwrap();
//! queue.run_until_idle(8);
//!
//! assert_eq!(table.cid_for_key(&Key::Int(2)).as_deref(), Some("c1"));
//! assert_eq!(table.select_all_state(), SelectAllState::Indeterminate);
//! ```

pub use tabula_core;
pub use tabula_render;
pub use tabula_runtime;
pub use tabula_widgets;

pub use tabula_core::{Key, KeySelector, Row, Value};
pub use tabula_render::{Document, Tree};
pub use tabula_runtime::{IndexedCollection, TaskQueue};
pub use tabula_widgets::{ColumnDef, Table, TableConfig, TableError};

/// Everything needed to build and drive a table.
pub mod prelude {
    pub use tabula_core::{
        Comparator, ComparatorRegistry, FieldAccess, Key, KeySelector, Row, SortDescriptor, Value,
    };
    pub use tabula_render::{Document, NodeId, Tree, merge_nodes};
    pub use tabula_runtime::{ChangeRecord, IndexedCollection, Scheduler, TaskQueue};
    pub use tabula_widgets::{
        Column, ColumnDef, ColumnRef, EditorKind, SelectAllState, Table, TableConfig, TableError,
        TableEvent, standard_renderers,
    };
}
