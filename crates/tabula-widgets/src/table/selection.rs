#![forbid(unsafe_code)]

//! Selection observer: marks rows selected or not and keeps the select-all
//! checkbox in its tri-state.

use tabula_core::Key;
use tabula_render::Tree;
use tabula_runtime::reactive::{ChangeRecord, ObserverResult};

use super::{Inner, Mount, TableEvent, row_at_index, row_with_key, selection_input};
use crate::builder::ATTR_KEY;

pub(super) fn on_selection<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    batch: &[ChangeRecord<Key>],
) -> ObserverResult {
    let Some(mount) = inner.mount() else {
        return Ok(());
    };
    let mut added = Vec::new();
    let mut removed = Vec::new();
    {
        let mut tree = inner.tree.borrow_mut();
        let tree = &mut *tree;
        for record in batch.iter().filter(|r| r.is_splice()) {
            for key in &record.removed {
                mark(inner, tree, &mount, key, false);
                removed.push(key.clone());
            }
            for key in &record.added {
                mark(inner, tree, &mount, key, true);
                added.push(key.clone());
            }
        }
        inner.refresh_select_all(tree, &mount);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        added = added.len(),
        removed = removed.len(),
        selected = inner.selection.len(),
        "selection flushed"
    );
    inner.emit_all(vec![TableEvent::SelectionChanged {
        added,
        removed,
        selected: inner.selection.len(),
        state: inner.select_all_state(),
    }]);
    Ok(())
}

/// Rendered row of `key`: looked up through the data index, falling back to
/// a key scan when the row lags behind pending data changes.
fn locate<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &D,
    mount: &Mount<D::Node>,
    key: &Key,
) -> Option<D::Node> {
    let wanted = key.to_attribute();
    inner
        .data
        .index_of_key(key)
        .and_then(|index| row_at_index(tree, mount.tbody, index))
        .filter(|row| tree.attribute(*row, ATTR_KEY) == Some(wanted.as_str()))
        .or_else(|| row_with_key(tree, mount.tbody, &wanted))
}

fn mark<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &mut D,
    mount: &Mount<D::Node>,
    key: &Key,
    on: bool,
) {
    let Some(row) = locate(inner, tree, mount, key) else {
        return;
    };
    tree.toggle_class(row, &inner.config.selected_class, on);
    if let Some(input) = selection_input(tree, row) {
        tree.set_flag(input, "checked", on);
    }
}
