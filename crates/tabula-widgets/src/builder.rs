#![forbid(unsafe_code)]

//! Row and cell construction.
//!
//! The builder turns column metadata and records into `tr`/`th`/`td`
//! subtrees. Every row and cell it produces carries identifying attributes;
//! the table's observers find nodes again through exactly these names, so
//! both sides use the constants below.
//!
//! | Attribute | Node | Value |
//! |-----------|------|-------|
//! | [`ATTR_INDEX`] | body row | position of the record in the data collection |
//! | [`ATTR_KEY`] | body row | the record key, see [`Key::to_attribute`] |
//! | [`ATTR_CID`] | body row | row correlation id |
//! | [`ATTR_COLUMN`] | any cell | column id, or [`SELECT_COLUMN`] |

use tabula_core::{Key, Value};
use tabula_render::{Tree, TreeError};

use crate::column::{ColumnRef, EditorKind};
use crate::config::TableConfig;

pub const ATTR_INDEX: &str = "data-index";
pub const ATTR_KEY: &str = "data-key";
pub const ATTR_CID: &str = "data-cid";
pub const ATTR_COLUMN: &str = "data-column-id";
/// Column id of the selection checkbox cell.
pub const SELECT_COLUMN: &str = "$select";
/// Marks the header/footer select-all checkbox.
pub const ATTR_SELECT_ALL: &str = "data-select-all";
/// Marks the placeholder row shown while the body is empty.
pub const ATTR_EMPTY: &str = "data-empty";
/// Sort direction on header cells.
pub const ATTR_SORT: &str = "aria-sort";

/// Identity of a body row being built.
#[derive(Debug, Clone, Copy)]
pub struct RowSpec<'a> {
    pub index: usize,
    pub key: &'a Key,
    pub cid: &'a str,
    pub selected: bool,
}

/// Builds rows for one column layout.
pub struct Builder<'a, T> {
    columns: &'a [ColumnRef<T>],
    config: &'a TableConfig,
}

impl<'a, T> Builder<'a, T> {
    #[must_use]
    pub fn new(columns: &'a [ColumnRef<T>], config: &'a TableConfig) -> Self {
        Self { columns, config }
    }

    /// Number of leading cells that are not data columns.
    #[must_use]
    pub fn column_offset(&self) -> usize {
        usize::from(self.config.selectable)
    }

    fn element_with_text<D: Tree>(
        tree: &mut D,
        tag: &str,
        text: &str,
    ) -> Result<D::Node, TreeError> {
        let node = tree.create_element(tag);
        if !text.is_empty() {
            let text = tree.create_text(text);
            tree.append_child(node, text)?;
        }
        Ok(node)
    }

    fn checkbox<D: Tree>(tree: &mut D, checked: bool) -> D::Node {
        let input = tree.create_element("input");
        tree.set_attribute(input, "type", "checkbox");
        tree.set_flag(input, "checked", checked);
        input
    }

    /// Selection cell: a row checkbox, or the select-all checkbox when
    /// `select_all` is set.
    pub fn selection_cell<D: Tree>(
        &self,
        tree: &mut D,
        tag: &str,
        checked: bool,
        select_all: bool,
    ) -> Result<D::Node, TreeError> {
        let cell = tree.create_element(tag);
        tree.set_attribute(cell, ATTR_COLUMN, SELECT_COLUMN);
        let input = Self::checkbox(tree, checked);
        if select_all {
            tree.set_attribute(input, ATTR_SELECT_ALL, "");
        }
        tree.append_child(cell, input)?;
        Ok(cell)
    }

    // =========================================================================
    // Header / footer
    // =========================================================================

    pub fn header_cell<D: Tree>(
        &self,
        tree: &mut D,
        column: &ColumnRef<T>,
    ) -> Result<D::Node, TreeError> {
        let th = Self::element_with_text(tree, "th", column.title())?;
        tree.set_attribute(th, ATTR_COLUMN, column.id());
        if let Some(class) = column.class_name() {
            tree.set_attribute(th, "class", class);
        }
        Ok(th)
    }

    pub fn footer_cell<D: Tree>(
        &self,
        tree: &mut D,
        column: &ColumnRef<T>,
    ) -> Result<D::Node, TreeError> {
        let td = Self::element_with_text(tree, "td", column.footer().unwrap_or_default())?;
        tree.set_attribute(td, ATTR_COLUMN, column.id());
        if let Some(class) = column.class_name() {
            tree.set_attribute(td, "class", class);
        }
        Ok(td)
    }

    pub fn header_row<D: Tree>(&self, tree: &mut D) -> Result<D::Node, TreeError> {
        let tr = tree.create_element("tr");
        if self.config.selectable {
            let cell = self.selection_cell(tree, "th", false, true)?;
            tree.append_child(tr, cell)?;
        }
        for column in self.columns {
            let cell = self.header_cell(tree, column)?;
            tree.append_child(tr, cell)?;
        }
        Ok(tr)
    }

    pub fn footer_row<D: Tree>(&self, tree: &mut D) -> Result<D::Node, TreeError> {
        let tr = tree.create_element("tr");
        if self.config.selectable {
            let cell = self.selection_cell(tree, "td", false, true)?;
            tree.append_child(tr, cell)?;
        }
        for column in self.columns {
            let cell = self.footer_cell(tree, column)?;
            tree.append_child(tr, cell)?;
        }
        Ok(tr)
    }

    // =========================================================================
    // Body
    // =========================================================================

    /// Body cell for `record`: an editor control for editable cells, the
    /// rendered text otherwise.
    pub fn body_cell<D: Tree>(
        &self,
        tree: &mut D,
        column: &ColumnRef<T>,
        record: &T,
    ) -> Result<D::Node, TreeError> {
        let editor = column.editor().filter(|_| column.is_editable(record));
        let td = match editor {
            None => Self::element_with_text(tree, "td", &column.render(record))?,
            Some(kind) => {
                let td = tree.create_element("td");
                let control = Self::editor(tree, &kind, &column.value(record))?;
                tree.append_child(td, control)?;
                td
            }
        };
        tree.set_attribute(td, ATTR_COLUMN, column.id());
        if let Some(class) = column.class_name() {
            tree.set_attribute(td, "class", class);
        }
        Ok(td)
    }

    fn editor<D: Tree>(tree: &mut D, kind: &EditorKind, value: &Value) -> Result<D::Node, TreeError> {
        Ok(match kind {
            EditorKind::Text => {
                let input = tree.create_element("input");
                tree.set_attribute(input, "type", "text");
                tree.set_attribute(input, "value", &value.to_text());
                input
            }
            EditorKind::Checkbox => Self::checkbox(tree, value.to_bool()),
            EditorKind::Select(options) => {
                let select = tree.create_element("select");
                let current = value.to_text();
                for (option_value, label) in options {
                    let option = Self::element_with_text(tree, "option", label)?;
                    tree.set_attribute(option, "value", option_value);
                    tree.set_flag(option, "selected", *option_value == current);
                    tree.append_child(select, option)?;
                }
                select
            }
        })
    }

    /// Complete body row for `record`.
    pub fn body_row<D: Tree>(
        &self,
        tree: &mut D,
        spec: RowSpec<'_>,
        record: &T,
    ) -> Result<D::Node, TreeError> {
        let tr = tree.create_element("tr");
        tree.set_attribute(tr, ATTR_INDEX, &spec.index.to_string());
        tree.set_attribute(tr, ATTR_KEY, &spec.key.to_attribute());
        tree.set_attribute(tr, ATTR_CID, spec.cid);
        if let Some(class) = &self.config.row_class {
            tree.set_attribute(tr, "class", class);
        }
        if spec.selected {
            tree.toggle_class(tr, &self.config.selected_class, true);
        }
        if self.config.selectable {
            let cell = self.selection_cell(tree, "td", spec.selected, false)?;
            tree.append_child(tr, cell)?;
        }
        for column in self.columns {
            let cell = self.body_cell(tree, column, record)?;
            tree.append_child(tr, cell)?;
        }
        Ok(tr)
    }

    /// Placeholder row spanning every column.
    pub fn empty_row<D: Tree>(&self, tree: &mut D, text: &str) -> Result<D::Node, TreeError> {
        let tr = tree.create_element("tr");
        tree.set_attribute(tr, ATTR_EMPTY, "");
        let td = Self::element_with_text(tree, "td", text)?;
        let span = self.columns.len() + self.column_offset();
        tree.set_attribute(td, "colspan", &span.max(1).to_string());
        tree.append_child(tr, td)?;
        Ok(tr)
    }
}

/// Parse a row's `data-index`.
pub fn row_index<D: Tree>(tree: &D, row: D::Node) -> Option<usize> {
    tree.attribute(row, ATTR_INDEX)?.parse().ok()
}
