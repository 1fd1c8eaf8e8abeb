#![forbid(unsafe_code)]

//! The synchronized table widget.
//!
//! A [`Table`] owns three indexed collections (data, columns, selection) and
//! renders them into a [`Tree`]. It never redraws on mutation: each
//! collection batches its change records, and on flush one observer per
//! collection patches the rendered tree in place.
//!
//! ```text
//! data.push(..) ──► ChangeRecord ──► Observable ──tick──► data observer ──► tbody edits
//! columns.splice(..) ─────────────────────────────tick──► columns observer ──► cell edits
//! table.select(..) ───────────────────────────────tick──► selection observer ──► classes, checkboxes
//! ```
//!
//! # Invariants
//!
//! 1. Every rendered body row carries `data-index`, `data-key` and `data-cid`;
//!    after a data flush, `data-index` equals the record's position in the
//!    data collection.
//! 2. A row keeps its correlation id for its whole life, including sorts,
//!    resets and updates that reconcile it in place.
//! 3. Rendering lags mutation by at least one scheduler tick.
//! 4. The selection only holds keys present in the data collection after
//!    each data flush (pruning is itself delivered on a later flush).
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Record targets a row that is gone or filtered out | Silently skipped |
//! | Tree edit fails during a flush | Observer returns `Err`; routed to the collection's error sink |
//! | `select` of an unknown key | `Err(TableError::UnknownKey)` |
//! | `dispatch_edit` without editable columns | `Err(TableError::EditNotBound)` |

mod columns;
mod data;
mod selection;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tabula_core::{Comparator, Key, KeySelector, SortDescriptor, Value};
use tabula_render::{Document, Tree, TreeError, merge_nodes};
use tabula_runtime::reactive::{IndexedCollection, ObserverId};
use tabula_runtime::{CollectionError, Scheduler};

use crate::builder::{
    ATTR_CID, ATTR_COLUMN, ATTR_EMPTY, ATTR_KEY, ATTR_SELECT_ALL, ATTR_SORT,
    Builder, RowSpec, SELECT_COLUMN, row_index,
};
use crate::column::ColumnRef;
use crate::config::{ConfigError, TableConfig};
use crate::events::{EventBus, ListenerId};

/// Root attribute present while edit delegation is bound.
pub const ATTR_EDIT_DELEGATE: &str = "data-edit-delegate";

// =============================================================================
// Public types
// =============================================================================

/// Row visibility predicate.
pub type Filter<T> = Rc<dyn Fn(&T) -> bool>;

/// State of the select-all control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAllState {
    Unchecked,
    Indeterminate,
    Checked,
}

impl SelectAllState {
    /// State for `selected` of `total` records.
    #[must_use]
    pub fn from_counts(selected: usize, total: usize) -> Self {
        if selected == 0 {
            Self::Unchecked
        } else if selected >= total {
            Self::Checked
        } else {
            Self::Indeterminate
        }
    }
}

/// Details of the events a [`Table`] emits.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent<N> {
    /// `dataspliced`. Removed rows are detached; those not re-added are
    /// discarded after listeners return.
    DataSpliced {
        index: usize,
        removed_keys: Vec<Key>,
        added_keys: Vec<Key>,
        removed_rows: Vec<N>,
        added_rows: Vec<N>,
    },
    /// `dataupdated`.
    DataUpdated { index: usize, key: Key, row: N },
    /// `columnsspliced`.
    ColumnsSpliced {
        index: usize,
        removed: Vec<String>,
        added: Vec<String>,
    },
    /// `columnsupdated`.
    ColumnsUpdated { index: usize, column: String },
    /// `selectionchanged`.
    SelectionChanged {
        added: Vec<Key>,
        removed: Vec<Key>,
        selected: usize,
        state: SelectAllState,
    },
}

impl<N> TableEvent<N> {
    /// Event name the details are emitted under.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataSpliced { .. } => DATA_SPLICED,
            Self::DataUpdated { .. } => DATA_UPDATED,
            Self::ColumnsSpliced { .. } => COLUMNS_SPLICED,
            Self::ColumnsUpdated { .. } => COLUMNS_UPDATED,
            Self::SelectionChanged { .. } => SELECTION_CHANGED,
        }
    }
}

pub const DATA_SPLICED: &str = "dataspliced";
pub const DATA_UPDATED: &str = "dataupdated";
pub const COLUMNS_SPLICED: &str = "columnsspliced";
pub const COLUMNS_UPDATED: &str = "columnsupdated";
pub const SELECTION_CHANGED: &str = "selectionchanged";

/// Errors returned by [`Table`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    UnknownKey(Key),
    UnknownColumn(String),
    NotMounted,
    AlreadyMounted,
    /// No editable column is present.
    EditNotBound,
    /// The column rejected the edit for this record.
    NotEditable(String),
    /// The node is not inside an editable body cell.
    NotACell,
    Collection(CollectionError),
    Tree(TreeError),
    Config(ConfigError),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(f, "no record with key '{key}'"),
            Self::UnknownColumn(id) => write!(f, "no column '{id}'"),
            Self::NotMounted => write!(f, "table is not mounted"),
            Self::AlreadyMounted => write!(f, "table is already mounted"),
            Self::EditNotBound => write!(f, "edit delegation is not bound"),
            Self::NotEditable(id) => write!(f, "column '{id}' is not editable here"),
            Self::NotACell => write!(f, "node is not inside a body cell"),
            Self::Collection(err) => write!(f, "{err}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Collection(err) => Some(err),
            Self::Tree(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CollectionError> for TableError {
    fn from(err: CollectionError) -> Self {
        Self::Collection(err)
    }
}

impl From<TreeError> for TableError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<ConfigError> for TableError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

// =============================================================================
// Shared state
// =============================================================================

/// Nodes of a mounted table.
#[derive(Debug, Clone, Copy)]
struct Mount<N> {
    root: N,
    header: Option<N>,
    tbody: N,
    footer: Option<N>,
}

struct View<T, N> {
    mount: Option<Mount<N>>,
    filter: Option<Filter<T>>,
    next_cid: u64,
    edit_bound: bool,
    observers: Vec<ObserverId>,
}

struct Inner<T, D: Tree> {
    tree: Rc<RefCell<D>>,
    data: IndexedCollection<T>,
    columns: IndexedCollection<ColumnRef<T>>,
    selection: IndexedCollection<Key>,
    config: TableConfig,
    events: EventBus<TableEvent<D::Node>>,
    view: RefCell<View<T, D::Node>>,
}

impl<T: Clone + 'static, D: Tree + 'static> Inner<T, D> {
    fn mount(&self) -> Option<Mount<D::Node>> {
        self.view.borrow().mount
    }

    fn filter(&self) -> Option<Filter<T>> {
        self.view.borrow().filter.clone()
    }

    fn next_cid(&self) -> String {
        let mut view = self.view.borrow_mut();
        view.next_cid += 1;
        format!("{}{}", self.config.cid_prefix, view.next_cid)
    }

    fn visible(&self, filter: Option<&Filter<T>>, record: &T) -> bool {
        filter.is_none_or(|f| f(record))
    }

    /// Build a body row, reusing `reuse` (and its cid) when given.
    fn render_row(
        &self,
        tree: &mut D,
        columns: &[ColumnRef<T>],
        index: usize,
        key: &Key,
        record: &T,
        reuse: Option<D::Node>,
    ) -> Result<D::Node, TreeError> {
        let cid = match reuse.and_then(|row| tree.attribute(row, ATTR_CID).map(str::to_owned)) {
            Some(cid) => cid,
            None => self.next_cid(),
        };
        let spec = RowSpec {
            index,
            key,
            cid: &cid,
            selected: self.selection.contains_key(key),
        };
        let fresh = Builder::new(columns, &self.config).body_row(tree, spec, record)?;
        let Some(old) = reuse else {
            return Ok(fresh);
        };
        let parent = tree.parent(old);
        let row = merge_nodes(tree, parent, old, fresh)?;
        if row == old {
            tree.discard(fresh);
        }
        Ok(row)
    }

    /// Rebuild the body from the current data, reusing rows by key.
    fn render_body(&self, tree: &mut D, mount: &Mount<D::Node>) -> Result<(), TreeError> {
        let columns = self.columns.to_vec();
        let filter = self.filter();
        let mut existing: AHashMap<String, D::Node> = AHashMap::new();
        for child in tree.children(mount.tbody) {
            tree.remove_child(mount.tbody, child)?;
            match tree.attribute(child, ATTR_KEY) {
                Some(key) if tree.attribute(child, ATTR_EMPTY).is_none() => {
                    existing.insert(key.to_owned(), child);
                }
                _ => tree.discard(child),
            }
        }
        let items = self.data.to_vec();
        let keys = self.data.keys();
        for (index, (record, key)) in items.iter().zip(&keys).enumerate() {
            if !self.visible(filter.as_ref(), record) {
                continue;
            }
            let reuse = existing.remove(&key.to_attribute());
            let row = self.render_row(tree, &columns, index, key, record, reuse)?;
            tree.append_child(mount.tbody, row)?;
        }
        for (_, row) in existing {
            tree.discard(row);
        }
        Ok(())
    }

    /// Add, refresh or remove the placeholder row.
    fn sync_empty_row(&self, tree: &mut D, mount: &Mount<D::Node>) -> Result<(), TreeError> {
        let children = tree.children(mount.tbody);
        let placeholder = children
            .iter()
            .copied()
            .find(|row| tree.attribute(*row, ATTR_EMPTY).is_some());
        let has_rows = children.iter().any(|row| row_index(tree, *row).is_some());
        match (&self.config.empty_text, placeholder) {
            (Some(text), _) if !has_rows => {
                let columns = self.columns.to_vec();
                let fresh = Builder::new(&columns, &self.config).empty_row(tree, text)?;
                match placeholder {
                    Some(old) => {
                        let row = merge_nodes(tree, Some(mount.tbody), old, fresh)?;
                        if row == old {
                            tree.discard(fresh);
                        }
                    }
                    None => tree.append_child(mount.tbody, fresh)?,
                }
            }
            (_, Some(old)) => {
                tree.remove_child(mount.tbody, old)?;
                tree.discard(old);
            }
            _ => {}
        }
        Ok(())
    }

    fn select_all_state(&self) -> SelectAllState {
        SelectAllState::from_counts(self.selection.len(), self.data.len())
    }

    /// Push the select-all state into the header/footer checkboxes.
    fn refresh_select_all(&self, tree: &mut D, mount: &Mount<D::Node>) {
        let state = self.select_all_state();
        for line in [mount.header, mount.footer].into_iter().flatten() {
            for input in find_all(tree, line, ATTR_SELECT_ALL, None) {
                tree.set_flag(input, "checked", state == SelectAllState::Checked);
                tree.set_flag(input, "indeterminate", state == SelectAllState::Indeterminate);
            }
        }
    }

    fn emit_all(&self, events: Vec<TableEvent<D::Node>>) {
        for event in events {
            let name = event.name();
            self.events.emit(name, event);
        }
    }
}

// =============================================================================
// Tree lookups
// =============================================================================

/// Nodes under `root` (inclusive, document order) whose attribute `name`
/// exists and, if given, equals `value`.
fn find_all<D: Tree>(tree: &D, root: D::Node, name: &str, value: Option<&str>) -> Vec<D::Node> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(found) = tree.attribute(node, name) {
            if value.is_none_or(|v| v == found) {
                out.push(node);
            }
        }
        let mut children = tree.children(node);
        children.reverse();
        stack.extend(children);
    }
    out
}

/// Body rows with their `data-index`, in tree order.
fn body_rows<D: Tree>(tree: &D, tbody: D::Node) -> Vec<(D::Node, usize)> {
    tree.children(tbody)
        .into_iter()
        .filter_map(|row| row_index(tree, row).map(|i| (row, i)))
        .collect()
}

fn row_at_index<D: Tree>(tree: &D, tbody: D::Node, index: usize) -> Option<D::Node> {
    body_rows(tree, tbody)
        .into_iter()
        .find_map(|(row, i)| (i == index).then_some(row))
}

fn row_with_key<D: Tree>(tree: &D, tbody: D::Node, key: &str) -> Option<D::Node> {
    tree.children(tbody)
        .into_iter()
        .find(|row| tree.attribute(*row, ATTR_KEY) == Some(key))
}

/// Data cells of a row (the selection cell excluded), in order.
fn data_cells<D: Tree>(tree: &D, line: D::Node) -> Vec<D::Node> {
    tree.children(line)
        .into_iter()
        .filter(|cell| {
            tree.attribute(*cell, ATTR_COLUMN)
                .is_some_and(|id| id != SELECT_COLUMN)
        })
        .collect()
}

fn selection_input<D: Tree>(tree: &D, row: D::Node) -> Option<D::Node> {
    let cell = tree
        .children(row)
        .into_iter()
        .find(|cell| tree.attribute(*cell, ATTR_COLUMN) == Some(SELECT_COLUMN))?;
    tree.children(cell).into_iter().find(|n| tree.tag(*n) == Some("input"))
}

// =============================================================================
// Table
// =============================================================================

/// Table widget rendering into a tree of type `D`.
///
/// Cloning yields another handle to the same table.
pub struct Table<T, D: Tree = Document> {
    inner: Rc<Inner<T, D>>,
}

impl<T, D: Tree> Clone for Table<T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static, D: Tree> fmt::Debug for Table<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.inner.view.borrow();
        f.debug_struct("Table")
            .field("data", &self.inner.data)
            .field("columns", &self.inner.columns.len())
            .field("selected", &self.inner.selection.len())
            .field("mounted", &view.mount.is_some())
            .finish()
    }
}

impl<T: Clone + 'static, D: Tree + 'static> Table<T, D> {
    /// Create an unmounted table over an empty data collection.
    pub fn new(
        tree: Rc<RefCell<D>>,
        key: KeySelector<T>,
        columns: Vec<ColumnRef<T>>,
        config: TableConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self, TableError> {
        config.validate()?;
        let edit_bound = columns.iter().any(|c| c.editor().is_some());
        let data = IndexedCollection::new("data", key, Rc::clone(&scheduler));
        let columns = IndexedCollection::with_items(
            "columns",
            KeySelector::new("id", |c: &ColumnRef<T>| Key::Text(c.id().to_owned())),
            Rc::clone(&scheduler),
            columns,
        )?;
        let selection = IndexedCollection::new(
            "selection",
            KeySelector::new("key", |k: &Key| k.clone()),
            scheduler,
        );
        let inner = Rc::new(Inner {
            tree,
            data,
            columns,
            selection,
            config,
            events: EventBus::new(),
            view: RefCell::new(View {
                mount: None,
                filter: None,
                next_cid: 0,
                edit_bound,
                observers: Vec::new(),
            }),
        });

        let weak = Rc::downgrade(&inner);
        let data_id = inner.data.observe(move |batch| match weak.upgrade() {
            Some(inner) => data::on_data(&inner, batch),
            None => Ok(()),
        });
        let weak = Rc::downgrade(&inner);
        let columns_id = inner.columns.observe(move |batch| match weak.upgrade() {
            Some(inner) => columns::on_columns(&inner, batch),
            None => Ok(()),
        });
        let weak = Rc::downgrade(&inner);
        let selection_id = inner.selection.observe(move |batch| match weak.upgrade() {
            Some(inner) => selection::on_selection(&inner, batch),
            None => Ok(()),
        });
        inner.view.borrow_mut().observers = vec![data_id, columns_id, selection_id];
        Ok(Self { inner })
    }

    /// Render the table, appending it to `container` when given. Pending
    /// changes are folded into the initial render.
    pub fn mount(&self, container: Option<D::Node>) -> Result<D::Node, TableError> {
        let inner = &self.inner;
        if inner.mount().is_some() {
            return Err(TableError::AlreadyMounted);
        }
        inner.data.flush_now();
        inner.columns.flush_now();
        inner.selection.flush_now();

        let columns = inner.columns.to_vec();
        let mut tree = inner.tree.borrow_mut();
        let tree = &mut *tree;
        let builder = Builder::new(&columns, &inner.config);

        let root = tree.create_element("table");
        if let Some(class) = &inner.config.table_class {
            tree.set_attribute(root, "class", class);
        }
        if inner.view.borrow().edit_bound {
            tree.set_attribute(root, ATTR_EDIT_DELEGATE, "");
        }
        let header = if inner.config.show_header {
            let thead = tree.create_element("thead");
            let row = builder.header_row(tree)?;
            tree.append_child(thead, row)?;
            tree.append_child(root, thead)?;
            Some(row)
        } else {
            None
        };
        let tbody = tree.create_element("tbody");
        tree.append_child(root, tbody)?;
        let footer = if inner.config.show_footer {
            let tfoot = tree.create_element("tfoot");
            let row = builder.footer_row(tree)?;
            tree.append_child(tfoot, row)?;
            tree.append_child(root, tfoot)?;
            Some(row)
        } else {
            None
        };
        if let Some(container) = container {
            tree.append_child(container, root)?;
        }

        let mount = Mount {
            root,
            header,
            tbody,
            footer,
        };
        inner.render_body(tree, &mount)?;
        inner.sync_empty_row(tree, &mount)?;
        inner.refresh_select_all(tree, &mount);
        inner.view.borrow_mut().mount = Some(mount);

        #[cfg(feature = "tracing")]
        tracing::debug!(rows = inner.data.len(), columns = columns.len(), "table mounted");
        Ok(root)
    }

    /// Detach observers, drop pending changes and remove the rendered table.
    /// Idempotent.
    pub fn destroy(&self) {
        let inner = &self.inner;
        let (observers, mount) = {
            let mut view = inner.view.borrow_mut();
            (std::mem::take(&mut view.observers), view.mount.take())
        };
        if let [data_id, columns_id, selection_id] = observers[..] {
            inner.data.unobserve_id(data_id);
            inner.columns.unobserve_id(columns_id);
            inner.selection.unobserve_id(selection_id);
        }
        inner.data.clear_changes();
        inner.columns.clear_changes();
        inner.selection.clear_changes();
        if let Some(mount) = mount {
            let mut tree = inner.tree.borrow_mut();
            tree.detach(mount.root);
            tree.discard(mount.root);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The data collection. Mutate it to change the table.
    #[must_use]
    pub fn data(&self) -> &IndexedCollection<T> {
        &self.inner.data
    }

    #[must_use]
    pub fn columns(&self) -> &IndexedCollection<ColumnRef<T>> {
        &self.inner.columns
    }

    /// Selected keys, in selection order.
    #[must_use]
    pub fn selection(&self) -> &IndexedCollection<Key> {
        &self.inner.selection
    }

    #[must_use]
    pub fn tree(&self) -> &Rc<RefCell<D>> {
        &self.inner.tree
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.inner.config
    }

    /// The `<table>` node, once mounted.
    #[must_use]
    pub fn root(&self) -> Option<D::Node> {
        self.inner.mount().map(|m| m.root)
    }

    /// The `<tbody>` node, once mounted.
    #[must_use]
    pub fn body(&self) -> Option<D::Node> {
        self.inner.mount().map(|m| m.tbody)
    }

    #[must_use]
    pub fn is_edit_bound(&self) -> bool {
        self.inner.view.borrow().edit_bound
    }

    /// Rendered row of `key`.
    #[must_use]
    pub fn row_for_key(&self, key: &Key) -> Option<D::Node> {
        let mount = self.inner.mount()?;
        row_with_key(&*self.inner.tree.borrow(), mount.tbody, &key.to_attribute())
    }

    /// Correlation id of the rendered row of `key`.
    #[must_use]
    pub fn cid_for_key(&self, key: &Key) -> Option<String> {
        let row = self.row_for_key(key)?;
        self.inner
            .tree
            .borrow()
            .attribute(row, ATTR_CID)
            .map(str::to_owned)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Listen for a table event (`dataspliced`, `dataupdated`,
    /// `columnsspliced`, `columnsupdated`, `selectionchanged`).
    pub fn on(&self, name: &str, handler: impl Fn(&TableEvent<D::Node>) + 'static) -> ListenerId {
        self.inner.events.on(name, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select `key`. Returns `false` if it already was.
    pub fn select(&self, key: &Key) -> Result<bool, TableError> {
        if !self.inner.data.contains_key(key) {
            return Err(TableError::UnknownKey(key.clone()));
        }
        if self.inner.selection.contains_key(key) {
            return Ok(false);
        }
        self.inner.selection.push(vec![key.clone()])?;
        Ok(true)
    }

    /// Deselect `key`. Returns `false` if it was not selected.
    pub fn deselect(&self, key: &Key) -> bool {
        self.inner.selection.remove_key(key).is_some()
    }

    /// Flip the selection of `key`. Returns the new state.
    pub fn toggle(&self, key: &Key) -> Result<bool, TableError> {
        if self.deselect(key) {
            Ok(false)
        } else {
            self.select(key)
        }
    }

    #[must_use]
    pub fn is_selected(&self, key: &Key) -> bool {
        self.inner.selection.contains_key(key)
    }

    /// Select every record. Returns how many were added.
    pub fn select_all(&self) -> Result<usize, TableError> {
        let missing: Vec<Key> = self
            .inner
            .data
            .keys()
            .into_iter()
            .filter(|k| !self.inner.selection.contains_key(k))
            .collect();
        let added = missing.len();
        if added > 0 {
            self.inner.selection.push(missing)?;
        }
        Ok(added)
    }

    /// Deselect everything. Returns how many were removed.
    pub fn clear_selection(&self) -> usize {
        self.inner.selection.clear().len()
    }

    /// Select-all state from the current collections.
    #[must_use]
    pub fn select_all_state(&self) -> SelectAllState {
        self.inner.select_all_state()
    }

    #[must_use]
    pub fn selected_keys(&self) -> Vec<Key> {
        self.inner.selection.to_vec()
    }

    // =========================================================================
    // Filtering and sorting
    // =========================================================================

    /// Show only records matching `predicate`. Re-renders the body now,
    /// after flushing pending data changes.
    pub fn set_filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Result<(), TableError> {
        self.inner.view.borrow_mut().filter = Some(Rc::new(predicate));
        self.refresh_body()
    }

    pub fn clear_filter(&self) -> Result<(), TableError> {
        self.inner.view.borrow_mut().filter = None;
        self.refresh_body()
    }

    fn refresh_body(&self) -> Result<(), TableError> {
        let inner = &self.inner;
        inner.data.flush_now();
        let Some(mount) = inner.mount() else {
            return Ok(());
        };
        let mut tree = inner.tree.borrow_mut();
        inner.render_body(&mut tree, &mount)?;
        inner.sync_empty_row(&mut tree, &mount)?;
        Ok(())
    }

    /// Sort the data by column `column_id`. Returns whether the order
    /// changed; rows move on the next flush.
    pub fn sort_by(&self, column_id: &str, ascending: bool) -> Result<bool, TableError> {
        let inner = &self.inner;
        let column = inner
            .columns
            .get_by_key(&Key::Text(column_id.to_owned()))
            .ok_or_else(|| TableError::UnknownColumn(column_id.to_owned()))?;
        let compare = column.compare_fn();
        let descriptor = SortDescriptor::new(column_id, move |record: &T| column.value(record))
            .with_compare(compare)
            .ascending(ascending);
        let changed = inner.data.sort(Comparator::by(descriptor));

        if let Some(header) = inner.mount().and_then(|m| m.header) {
            let mut tree = inner.tree.borrow_mut();
            for cell in data_cells(&*tree, header) {
                if tree.attribute(cell, ATTR_COLUMN) == Some(column_id) {
                    let dir = if ascending { "ascending" } else { "descending" };
                    tree.set_attribute(cell, ATTR_SORT, dir);
                } else {
                    tree.remove_attribute(cell, ATTR_SORT);
                }
            }
        }
        Ok(changed)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Deliver an edit from a control inside a body cell: write `value` into
    /// the record through the cell's column. The row re-renders on the next
    /// flush.
    pub fn dispatch_edit(&self, node: D::Node, value: Value) -> Result<(), TableError> {
        let inner = &self.inner;
        if !inner.view.borrow().edit_bound {
            return Err(TableError::EditNotBound);
        }
        let mount = inner.mount().ok_or(TableError::NotMounted)?;
        let (column_id, row_key) = {
            let tree = inner.tree.borrow();
            locate_cell(&*tree, mount.tbody, node).ok_or(TableError::NotACell)?
        };
        let column = inner
            .columns
            .get_by_key(&Key::Text(column_id.clone()))
            .ok_or_else(|| TableError::UnknownColumn(column_id.clone()))?;
        let index = inner
            .data
            .index_of_key(&Key::from_attribute(&row_key))
            .ok_or(TableError::NotACell)?;
        let record = inner.data.get(index).ok_or(TableError::NotACell)?;
        if !column.is_editable(&record) {
            return Err(TableError::NotEditable(column_id));
        }
        let mut edited = record;
        if !column.assign(&mut edited, value) {
            return Err(TableError::NotEditable(column_id));
        }
        inner.data.set(index, edited)?;
        Ok(())
    }
}

/// Column id and row key of the body cell containing `node`.
fn locate_cell<D: Tree>(tree: &D, tbody: D::Node, node: D::Node) -> Option<(String, String)> {
    let mut cursor = Some(node);
    let mut column = None;
    while let Some(current) = cursor {
        if column.is_none() {
            if let Some(id) = tree.attribute(current, ATTR_COLUMN) {
                if id == SELECT_COLUMN {
                    return None;
                }
                column = Some(id.to_owned());
            }
        }
        if let Some(key) = tree.attribute(current, ATTR_KEY) {
            if tree.parent(current) != Some(tbody) {
                return None;
            }
            return column.map(|c| (c, key.to_owned()));
        }
        cursor = tree.parent(current);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use proptest::prelude::*;
    use tabula_core::Row;
    use tabula_runtime::TaskQueue;

    fn mounted(queue: &TaskQueue) -> Table<Row> {
        let table = Table::new(
            Rc::new(RefCell::new(Document::new())),
            KeySelector::field("id"),
            vec![
                ColumnDef::<Row>::field("id", "Id").into_ref(),
                ColumnDef::<Row>::field("name", "Name").into_ref(),
            ],
            TableConfig::new().selectable(true),
            queue.handle(),
        )
        .unwrap();
        table.mount(None).unwrap();
        table
    }

    #[test]
    fn locate_cell_walks_to_row_and_column() {
        let queue = TaskQueue::new();
        let table = mounted(&queue);
        table
            .data()
            .push(vec![Row::new().with("id", 7).with("name", "x")])
            .unwrap();
        queue.run_until_idle(8);

        let body = table.body().unwrap();
        let doc = table.tree().borrow();
        let row = doc.children(body)[0];
        let cells = doc.children(row);
        let text = doc.children(cells[2])[0];
        assert_eq!(
            locate_cell(&*doc, body, text),
            Some(("name".to_owned(), "7".to_owned()))
        );
        assert_eq!(locate_cell(&*doc, body, cells[0]), None);
        assert_eq!(locate_cell(&*doc, body, row), None);
    }

    #[test]
    fn rows_appear_one_tick_after_push() {
        let queue = TaskQueue::new();
        let table = mounted(&queue);
        table.data().push(vec![Row::new().with("id", 1)]).unwrap();
        assert!(table.row_for_key(&Key::Int(1)).is_none());
        queue.tick();
        assert!(table.row_for_key(&Key::Int(1)).is_some());
        assert_eq!(table.cid_for_key(&Key::Int(1)).as_deref(), Some("c1"));
    }

    #[test]
    fn destroy_detaches_root_from_its_current_parent() {
        let queue = TaskQueue::new();
        let table = mounted(&queue);
        let root = table.root().unwrap();
        let host = table.tree().borrow_mut().create_element("section");
        table.tree().borrow_mut().append_child(host, root).unwrap();

        table.destroy();
        let doc = table.tree().borrow();
        assert!(doc.children(host).is_empty());
        assert!(!doc.contains(root));
    }

    proptest! {
        #[test]
        fn select_all_state_tracks_counts(total in 0usize..50, selected in 0usize..50) {
            let selected = selected.min(total);
            let state = SelectAllState::from_counts(selected, total);
            prop_assert_eq!(state == SelectAllState::Checked, total > 0 && selected == total);
            prop_assert_eq!(state == SelectAllState::Unchecked, selected == 0);
        }
    }

    #[test]
    fn select_all_state_from_counts() {
        assert_eq!(SelectAllState::from_counts(0, 3), SelectAllState::Unchecked);
        assert_eq!(SelectAllState::from_counts(1, 3), SelectAllState::Indeterminate);
        assert_eq!(SelectAllState::from_counts(3, 3), SelectAllState::Checked);
        assert_eq!(SelectAllState::from_counts(0, 0), SelectAllState::Unchecked);
    }

    #[test]
    fn event_names() {
        let event: TableEvent<u32> = TableEvent::ColumnsUpdated {
            index: 0,
            column: "a".into(),
        };
        assert_eq!(event.name(), "columnsupdated");
    }
}
