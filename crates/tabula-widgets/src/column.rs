#![forbid(unsafe_code)]

//! Column model.
//!
//! A [`Column`] tells the builder how to title, render and edit one field of
//! a record. [`ColumnDef`] is the stock implementation: an [`Accessor`] for
//! reading and writing the field, a renderer resolved from a
//! [`RendererRegistry`], and a compare function resolved from a
//! [`ComparatorRegistry`].

use std::fmt;
use std::rc::Rc;

use tabula_core::{Accessor, CompareFn, ComparatorRegistry, FieldAccess, FieldPath, Registry, Value};

/// Control rendered for an editable cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorKind {
    /// `<input type="text">`, value bound from the column.
    Text,
    /// `<input type="checkbox">`, checked bound from the column.
    Checkbox,
    /// `<select>` with `(value, label)` options.
    Select(Vec<(String, String)>),
}

/// Shared column handle, as stored in the table's column collection.
pub type ColumnRef<T> = Rc<dyn Column<T>>;

/// Column metadata consumed by the builder and the observers.
pub trait Column<T> {
    /// Stable identifier, written to `data-column-id`.
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn footer(&self) -> Option<&str> {
        None
    }
    /// Display text of the cell for `data`.
    fn render(&self, data: &T) -> String;
    /// Raw cell value, used for sorting and for bound editor state.
    fn value(&self, data: &T) -> Value;
    /// Write `value` back into `data`. Returns `false` if not writable.
    fn assign(&self, data: &mut T, value: Value) -> bool;
    fn is_editable(&self, _data: &T) -> bool {
        false
    }
    /// Editor control, when the column can be edited at all.
    fn editor(&self) -> Option<EditorKind> {
        None
    }
    fn class_name(&self) -> Option<&str> {
        None
    }
    /// Comparator used when the table sorts by this column.
    fn compare_fn(&self) -> CompareFn {
        Rc::new(tabula_core::auto_compare)
    }
}

// =============================================================================
// Renderers
// =============================================================================

/// Registry of cell renderers.
pub type RendererRegistry = Registry<dyn Fn(&Value) -> String>;

/// Name of the default renderer.
pub const TEXT_RENDERER: &str = "$text";

/// The built-in renderers: `$text` (default), `$fixed2` and `$yesno`.
#[must_use]
pub fn standard_renderers() -> RendererRegistry {
    let mut registry =
        RendererRegistry::new(TEXT_RENDERER, Rc::new(|v: &Value| v.to_text().into_owned()));
    registry
        .register(
            "$fixed2",
            Rc::new(|v: &Value| match v {
                Value::Null => String::new(),
                other => format!("{:.2}", other.to_number()),
            }),
        )
        .register(
            "$yesno",
            Rc::new(|v: &Value| if v.to_bool() { "Yes" } else { "No" }.to_owned()),
        );
    registry
}

// =============================================================================
// ColumnDef
// =============================================================================

/// Stock [`Column`] implementation.
pub struct ColumnDef<T> {
    id: String,
    title: String,
    footer: Option<String>,
    accessor: Rc<dyn Accessor<T>>,
    renderer: Rc<dyn Fn(&Value) -> String>,
    compare: CompareFn,
    editor: Option<EditorKind>,
    editable_when: Option<Rc<dyn Fn(&T) -> bool>>,
    class_name: Option<String>,
}

impl<T> fmt::Debug for ColumnDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("editor", &self.editor)
            .finish()
    }
}

impl<T: 'static> ColumnDef<T> {
    /// Column reading and writing through `accessor`, rendered as text and
    /// sorted with `$auto`.
    pub fn new(id: &str, title: &str, accessor: Rc<dyn Accessor<T>>) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            footer: None,
            accessor,
            renderer: Rc::new(|v: &Value| v.to_text().into_owned()),
            compare: Rc::new(tabula_core::auto_compare),
            editor: None,
            editable_when: None,
            class_name: None,
        }
    }

    #[must_use]
    pub fn with_footer(mut self, footer: &str) -> Self {
        self.footer = Some(footer.to_owned());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_owned());
        self
    }

    /// Render with the named renderer; unknown names use the registry default.
    #[must_use]
    pub fn with_renderer(mut self, name: &str, registry: &RendererRegistry) -> Self {
        self.renderer = registry.get(name);
        self
    }

    /// Sort with the named comparator; unknown names use the registry default.
    #[must_use]
    pub fn with_compare(mut self, name: &str, registry: &ComparatorRegistry) -> Self {
        self.compare = registry.compare_fn(name);
        self
    }

    /// Make the column editable with `editor`.
    #[must_use]
    pub fn editable(mut self, editor: EditorKind) -> Self {
        self.editor = Some(editor);
        self
    }

    /// Restrict editing to records matching `predicate`.
    #[must_use]
    pub fn editable_when(mut self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        self.editable_when = Some(Rc::new(predicate));
        self
    }

    /// Erase into a shared handle.
    #[must_use]
    pub fn into_ref(self) -> ColumnRef<T> {
        Rc::new(self)
    }
}

impl<T: FieldAccess + 'static> ColumnDef<T> {
    /// Column over the record field `id`.
    pub fn field(id: &str, title: &str) -> Self {
        Self::new(id, title, Rc::new(FieldPath::<T>::new(id)))
    }
}

impl<T> Column<T> for ColumnDef<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    fn render(&self, data: &T) -> String {
        (self.renderer)(&self.accessor.get(data))
    }

    fn value(&self, data: &T) -> Value {
        self.accessor.get(data)
    }

    fn assign(&self, data: &mut T, value: Value) -> bool {
        self.accessor.assign(data, value)
    }

    fn is_editable(&self, data: &T) -> bool {
        self.editor.is_some() && self.editable_when.as_ref().is_none_or(|when| when(data))
    }

    fn editor(&self) -> Option<EditorKind> {
        self.editor.clone()
    }

    fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    fn compare_fn(&self) -> CompareFn {
        Rc::clone(&self.compare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;
    use tabula_core::Row;

    #[test]
    fn field_column_reads_and_writes() {
        let col = ColumnDef::<Row>::field("age", "Age");
        let mut row = Row::new().with("age", 41);
        assert_eq!(col.render(&row), "41");
        assert!(col.assign(&mut row, Value::from(42)));
        assert_eq!(col.value(&row), Value::from(42));
        assert!(!col.is_editable(&row));
    }

    #[test]
    fn renderer_lookup_falls_back_to_text() {
        let registry = standard_renderers();
        let row = Row::new().with("price", 3.5);
        let fixed = ColumnDef::<Row>::field("price", "Price").with_renderer("$fixed2", &registry);
        assert_eq!(fixed.render(&row), "3.50");
        let unknown = ColumnDef::<Row>::field("price", "Price").with_renderer("$nope", &registry);
        assert_eq!(unknown.render(&row), "3.5");
    }

    #[test]
    fn editable_when_gates_editing() {
        let col = ColumnDef::<Row>::field("name", "Name")
            .editable(EditorKind::Text)
            .editable_when(|r: &Row| !r.get("locked").to_bool());
        assert!(col.is_editable(&Row::new().with("name", "a")));
        assert!(!col.is_editable(&Row::new().with("locked", true)));
    }

    #[test]
    fn compare_from_registry() {
        let registry = ComparatorRegistry::standard();
        let col = ColumnDef::<Row>::field("v", "V").with_compare("$string", &registry);
        let cmp = col.compare_fn();
        assert_eq!(cmp(&Value::from(10), &Value::from(9)), Ordering::Less);
    }
}
