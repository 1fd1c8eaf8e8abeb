#![forbid(unsafe_code)]

//! Mounted-table fixture.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value as Json, json};
use tabula_core::{Key, KeySelector, Row};
use tabula_render::{Document, NodeId, Tree};
use tabula_runtime::TaskQueue;
use tabula_widgets::builder::{ATTR_CID, ATTR_INDEX, ATTR_KEY, ATTR_SELECT_ALL};
use tabula_widgets::table::{
    COLUMNS_SPLICED, COLUMNS_UPDATED, DATA_SPLICED, DATA_UPDATED, SELECTION_CHANGED,
};
use tabula_widgets::{ColumnDef, ColumnRef, Table, TableConfig, TableError, TableEvent};

/// Upper bound on ticks per [`TableFixture::flush`].
const MAX_TICKS: usize = 64;

/// `{id, name, age}` record.
#[must_use]
pub fn person(id: i64, name: &str, age: i64) -> Row {
    Row::new().with("id", id).with("name", name).with("age", age)
}

/// Records with ids `ids`, named `p<id>`, aged `20 + id`.
#[must_use]
pub fn people(ids: &[i64]) -> Vec<Row> {
    ids.iter()
        .map(|&id| person(id, &format!("p{id}"), 20 + id))
        .collect()
}

/// `id`, `name` and `age` columns.
#[must_use]
pub fn person_columns() -> Vec<ColumnRef<Row>> {
    vec![
        ColumnDef::<Row>::field("id", "Id").into_ref(),
        ColumnDef::<Row>::field("name", "Name").into_ref(),
        ColumnDef::<Row>::field("age", "Age").into_ref(),
    ]
}

/// Every event a table emitted, in order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<TableEvent<NodeId>>>>,
}

impl EventLog {
    /// Listen to every table event of `table`.
    pub fn attach(table: &Table<Row>) -> Self {
        let log = Self::default();
        for name in [
            DATA_SPLICED,
            DATA_UPDATED,
            COLUMNS_SPLICED,
            COLUMNS_UPDATED,
            SELECTION_CHANGED,
        ] {
            let events = Rc::clone(&log.events);
            table.on(name, move |event| events.borrow_mut().push(event.clone()));
        }
        log
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(TableEvent::name).collect()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<TableEvent<NodeId>> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Node-free JSON summary, for snapshots.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let events: Vec<Json> = self
            .events
            .borrow()
            .iter()
            .map(|event| match event {
                TableEvent::DataSpliced {
                    index,
                    removed_keys,
                    added_keys,
                    ..
                } => json!({
                    "event": event.name(),
                    "index": index,
                    "removed": key_strings(removed_keys),
                    "added": key_strings(added_keys),
                }),
                TableEvent::DataUpdated { index, key, .. } => json!({
                    "event": event.name(),
                    "index": index,
                    "key": key.to_string(),
                }),
                TableEvent::ColumnsSpliced {
                    index,
                    removed,
                    added,
                } => json!({
                    "event": event.name(),
                    "index": index,
                    "removed": removed,
                    "added": added,
                }),
                TableEvent::ColumnsUpdated { index, column } => json!({
                    "event": event.name(),
                    "index": index,
                    "column": column,
                }),
                TableEvent::SelectionChanged {
                    added,
                    removed,
                    selected,
                    state,
                } => json!({
                    "event": event.name(),
                    "added": key_strings(added),
                    "removed": key_strings(removed),
                    "selected": selected,
                    "state": format!("{state:?}"),
                }),
            })
            .collect();
        Json::Array(events)
    }
}

fn key_strings(keys: &[Key]) -> Vec<String> {
    keys.iter().map(Key::to_string).collect()
}

/// A table over [`Row`]s keyed by `id`, mounted into a `<div>`.
pub struct TableFixture {
    pub queue: TaskQueue,
    pub doc: Rc<RefCell<Document>>,
    pub container: NodeId,
    pub table: Table<Row>,
    pub root: NodeId,
    pub events: EventLog,
}

impl TableFixture {
    /// Mount a table with `columns`, `config` and initial `rows`.
    pub fn new(
        columns: Vec<ColumnRef<Row>>,
        config: TableConfig,
        rows: Vec<Row>,
    ) -> Result<Self, TableError> {
        let queue = TaskQueue::new();
        let doc = Rc::new(RefCell::new(Document::new()));
        let container = doc.borrow_mut().create_element("div");
        let table = Table::new(
            Rc::clone(&doc),
            KeySelector::field("id"),
            columns,
            config,
            queue.handle(),
        )?;
        table.data().reset(rows)?;
        let root = table.mount(Some(container))?;
        let events = EventLog::attach(&table);
        Ok(Self {
            queue,
            doc,
            container,
            table,
            root,
            events,
        })
    }

    /// [`person_columns`] with default config.
    pub fn people(ids: &[i64]) -> Result<Self, TableError> {
        Self::new(person_columns(), TableConfig::default(), people(ids))
    }

    /// Run scheduled flushes until the queue is idle. Returns ticks run.
    pub fn flush(&self) -> usize {
        self.queue.run_until_idle(MAX_TICKS)
    }

    /// Markup of the whole table.
    #[must_use]
    pub fn markup(&self) -> String {
        self.doc.borrow().markup(self.root)
    }

    /// Body rows in tree order.
    #[must_use]
    pub fn rows(&self) -> Vec<NodeId> {
        let doc = self.doc.borrow();
        let Some(tbody) = self.table.body() else {
            return Vec::new();
        };
        doc.children(tbody)
            .into_iter()
            .filter(|row| doc.attribute(*row, ATTR_INDEX).is_some())
            .collect()
    }

    fn row_attribute(&self, name: &str) -> Vec<String> {
        let rows = self.rows();
        let doc = self.doc.borrow();
        rows.into_iter()
            .map(|row| doc.attribute(row, name).unwrap_or_default().to_owned())
            .collect()
    }

    /// `data-key` of every body row.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.row_attribute(ATTR_KEY)
    }

    /// `data-index` of every body row.
    #[must_use]
    pub fn indices(&self) -> Vec<String> {
        self.row_attribute(ATTR_INDEX)
    }

    /// `data-cid` of every body row.
    #[must_use]
    pub fn cids(&self) -> Vec<String> {
        self.row_attribute(ATTR_CID)
    }

    /// Text content of every body row.
    #[must_use]
    pub fn row_texts(&self) -> Vec<String> {
        let rows = self.rows();
        let doc = self.doc.borrow();
        rows.into_iter().map(|row| doc.text_content(row)).collect()
    }

    /// `(checked, indeterminate)` of every select-all checkbox.
    #[must_use]
    pub fn select_all_flags(&self) -> Vec<(bool, bool)> {
        let doc = self.doc.borrow();
        doc.query_all(self.root, ATTR_SELECT_ALL, None)
            .into_iter()
            .map(|input| (doc.flag(input, "checked"), doc.flag(input, "indeterminate")))
            .collect()
    }

    /// Keys of the data collection in their `data-key` form.
    #[must_use]
    pub fn data_keys(&self) -> Vec<String> {
        self.table
            .data()
            .keys()
            .iter()
            .map(Key::to_attribute)
            .collect()
    }
}
