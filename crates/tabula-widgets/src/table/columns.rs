#![forbid(unsafe_code)]

//! Columns observer: splices and refreshes cells in every rendered row.

use ahash::AHashMap;
use tabula_core::Key;
use tabula_render::{Tree, TreeError, merge_nodes};
use tabula_runtime::reactive::{ChangeKind, ChangeRecord, ObserverError, ObserverResult};

use super::{ATTR_EDIT_DELEGATE, Inner, Mount, TableEvent, body_rows, data_cells};
use crate::builder::{ATTR_KEY, Builder};
use crate::column::ColumnRef;

/// One row of cells and the record it renders, if any.
enum Line<'a, T> {
    Header,
    Footer,
    Body(&'a T),
}

pub(super) fn on_columns<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    batch: &[ChangeRecord<ColumnRef<T>>],
) -> ObserverResult {
    let Some(mount) = inner.mount() else {
        return Ok(());
    };
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("columns_flush", records = batch.len()).entered();

    let columns = inner.columns.to_vec();
    let records: AHashMap<String, T> = inner.data.read_items(|items| {
        items
            .iter()
            .filter_map(|item| {
                let key = inner.data.key_of(item).ok()?;
                Some((key.to_attribute(), item.clone()))
            })
            .collect()
    });

    let mut events = Vec::with_capacity(batch.len());
    {
        let mut tree = inner.tree.borrow_mut();
        let tree = &mut *tree;
        let mut lines: Vec<(D::Node, Line<'_, T>)> = Vec::new();
        lines.extend(mount.header.map(|row| (row, Line::Header)));
        for (row, _) in body_rows(tree, mount.tbody) {
            let record = tree
                .attribute(row, ATTR_KEY)
                .and_then(|key| records.get(key));
            if let Some(record) = record {
                lines.push((row, Line::Body(record)));
            }
        }
        lines.extend(mount.footer.map(|row| (row, Line::Footer)));

        for record in batch {
            let event = match record.kind {
                ChangeKind::Splice => {
                    for (line, kind) in &lines {
                        splice_line(inner, tree, &columns, *line, kind, record)
                            .map_err(ObserverError::failed)?;
                    }
                    TableEvent::ColumnsSpliced {
                        index: record.index,
                        removed: record.removed.iter().map(|c| c.id().to_owned()).collect(),
                        added: record.added.iter().map(|c| c.id().to_owned()).collect(),
                    }
                }
                ChangeKind::Update => {
                    let Some(column) = record.added.first() else {
                        continue;
                    };
                    for (line, kind) in &lines {
                        update_line(inner, tree, &columns, *line, kind, record.index, column)
                            .map_err(ObserverError::failed)?;
                    }
                    TableEvent::ColumnsUpdated {
                        index: record.index,
                        column: column.id().to_owned(),
                    }
                }
            };
            events.push(event);
        }

        rebind_edit(inner, tree, &mount, &columns);
        inner
            .sync_empty_row(tree, &mount)
            .map_err(ObserverError::failed)?;
    }
    inner.emit_all(events);
    Ok(())
}

fn build_cell<T: Clone + 'static, D: Tree + 'static>(
    builder: &Builder<'_, T>,
    tree: &mut D,
    column: &ColumnRef<T>,
    kind: &Line<'_, T>,
) -> Result<D::Node, TreeError> {
    match kind {
        Line::Header => builder.header_cell(tree, column),
        Line::Footer => builder.footer_cell(tree, column),
        Line::Body(record) => builder.body_cell(tree, column, record),
    }
}

fn splice_line<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &mut D,
    columns: &[ColumnRef<T>],
    line: D::Node,
    kind: &Line<'_, T>,
    record: &ChangeRecord<ColumnRef<T>>,
) -> Result<(), TreeError> {
    let cells = data_cells(tree, line);
    let start = record.index.min(cells.len());
    let end = record.removed_range().end.min(cells.len());
    for &cell in &cells[start..end] {
        tree.remove_child(line, cell)?;
        tree.discard(cell);
    }
    let reference = cells.get(end).copied();
    let builder = Builder::new(columns, &inner.config);
    for column in &record.added {
        let cell = build_cell(&builder, tree, column, kind)?;
        tree.insert_before(line, cell, reference)?;
    }
    Ok(())
}

fn update_line<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &mut D,
    columns: &[ColumnRef<T>],
    line: D::Node,
    kind: &Line<'_, T>,
    index: usize,
    snapshot: &ColumnRef<T>,
) -> Result<(), TreeError> {
    let Some(old) = data_cells(tree, line).get(index).copied() else {
        return Ok(());
    };
    // Prefer the live column over the snapshot.
    let column = inner
        .columns
        .get_by_key(&Key::Text(snapshot.id().to_owned()))
        .unwrap_or_else(|| snapshot.clone());
    let builder = Builder::new(columns, &inner.config);
    let fresh = build_cell(&builder, tree, &column, kind)?;
    let cell = merge_nodes(tree, Some(line), old, fresh)?;
    if cell == old {
        tree.discard(fresh);
    }
    Ok(())
}

/// Bind or unbind edit delegation on the root to match the column set.
fn rebind_edit<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &mut D,
    mount: &Mount<D::Node>,
    columns: &[ColumnRef<T>],
) {
    let wanted = columns.iter().any(|c| c.editor().is_some());
    let mut view = inner.view.borrow_mut();
    if view.edit_bound == wanted {
        return;
    }
    view.edit_bound = wanted;
    if wanted {
        tree.set_attribute(mount.root, ATTR_EDIT_DELEGATE, "");
    } else {
        tree.remove_attribute(mount.root, ATTR_EDIT_DELEGATE);
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(bound = wanted, "edit delegation rebound");
}
