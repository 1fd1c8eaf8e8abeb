#![forbid(unsafe_code)]

//! Widgets for Tabula.
//!
//! - [`column`]: the [`Column`] trait, [`ColumnDef`] and the renderer registry
//! - [`builder`]: row and cell construction, plus the attribute names rows carry
//! - [`events`]: the named-event bus
//! - [`config`]: [`TableConfig`]
//! - [`table`]: the [`Table`] widget and its observers
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tabula_core::{KeySelector, Row};
//! use tabula_render::{Document, Tree};
//! use tabula_runtime::TaskQueue;
//! use tabula_widgets::{ColumnDef, Table, TableConfig};
//!
//! let queue = TaskQueue::new();
//! let doc = Rc::new(RefCell::new(Document::new()));
//! let table = Table::new(
//!     Rc::clone(&doc),
//!     KeySelector::field("id"),
//!     vec![ColumnDef::<Row>::field("name", "Name").into_ref()],
//!     TableConfig::default(),
//!     queue.handle(),
//! )
//! .unwrap();
//! let root = table.mount(None).unwrap();
//!
//! table.data().push(vec![Row::new().with("id", 1).with("name", "Ada")]).unwrap();
//! queue.run_until_idle(8);
//! assert_eq!(doc.borrow().text_content(root), "NameAda");
//! ```

pub mod builder;
pub mod column;
pub mod config;
pub mod events;
pub mod table;

pub use builder::{Builder, RowSpec};
pub use column::{
    Column, ColumnDef, ColumnRef, EditorKind, RendererRegistry, TEXT_RENDERER, standard_renderers,
};
pub use config::{ConfigError, TableConfig};
pub use events::{EventBus, ListenerId};
pub use table::{Filter, SelectAllState, Table, TableError, TableEvent};
