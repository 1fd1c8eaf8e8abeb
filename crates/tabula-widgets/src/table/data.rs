#![forbid(unsafe_code)]

//! Data observer: applies data change records to the body rows.
//!
//! Splice records move rows rather than rebuild them where possible. Rows in
//! the removed range are detached into a pool keyed by `data-key`; a record
//! later in the same batch that re-adds that key (a sort, a reset, a
//! remove-and-reinsert) reconciles the pooled row in place, keeping its cid.
//! Rows still pooled when the batch ends are discarded after the events.

use ahash::AHashMap;
use tabula_core::Key;
use tabula_render::{Tree, TreeError};
use tabula_runtime::reactive::{ChangeKind, ChangeRecord, ObserverError, ObserverResult};

use super::{Inner, Mount, TableEvent, body_rows, row_at_index};
use crate::builder::{ATTR_INDEX, ATTR_KEY};
use crate::column::ColumnRef;

type Pool<N> = AHashMap<String, N>;

pub(super) fn on_data<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    batch: &[ChangeRecord<T>],
) -> ObserverResult {
    let Some(mount) = inner.mount() else {
        return Ok(());
    };
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("data_flush", records = batch.len()).entered();

    let columns = inner.columns.to_vec();
    let mut pool: Pool<D::Node> = AHashMap::new();
    let mut events = Vec::with_capacity(batch.len());
    let mut removed_keys: Vec<Key> = Vec::new();
    {
        let mut tree = inner.tree.borrow_mut();
        let tree = &mut *tree;
        for record in batch {
            let event = match record.kind {
                ChangeKind::Splice => {
                    let event = splice(inner, tree, &mount, &columns, record, &mut pool)
                        .map_err(ObserverError::failed)?;
                    if let TableEvent::DataSpliced { removed_keys: keys, .. } = &event {
                        removed_keys.extend(keys.iter().cloned());
                    }
                    Some(event)
                }
                ChangeKind::Update => {
                    update(inner, tree, &mount, &columns, record).map_err(ObserverError::failed)?
                }
            };
            events.extend(event);
        }
        inner
            .sync_empty_row(tree, &mount)
            .map_err(ObserverError::failed)?;
        inner.refresh_select_all(tree, &mount);
    }

    // Removed records that did not come back leave the selection.
    let stale: Vec<Key> = removed_keys
        .into_iter()
        .filter(|k| !inner.data.contains_key(k) && inner.selection.contains_key(k))
        .collect();
    for key in &stale {
        inner.selection.remove_key(key);
    }

    inner.emit_all(events);

    if !pool.is_empty() {
        let mut tree = inner.tree.borrow_mut();
        for (_, row) in pool {
            tree.discard(row);
        }
    }
    Ok(())
}

fn splice<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &mut D,
    mount: &Mount<D::Node>,
    columns: &[ColumnRef<T>],
    record: &ChangeRecord<T>,
    pool: &mut Pool<D::Node>,
) -> Result<TableEvent<D::Node>, TreeError> {
    let tbody = mount.tbody;
    let start = record.index;
    let end = record.removed_range().end;
    let delta = record.delta();
    let rows = body_rows(tree, tbody);

    let mut removed_rows = Vec::new();
    let mut anchor = None;
    for &(row, index) in &rows {
        if (start..end).contains(&index) {
            tree.remove_child(tbody, row)?;
            if let Some(key) = tree.attribute(row, ATTR_KEY) {
                pool.insert(key.to_owned(), row);
            }
            removed_rows.push(row);
        } else if index >= end {
            let shifted = index.saturating_add_signed(delta);
            tree.set_attribute(row, ATTR_INDEX, &shifted.to_string());
        } else {
            anchor = Some(row);
        }
    }

    // Insert after the last row preceding the splice point.
    let children = tree.children(tbody);
    let reference = match anchor {
        Some(row) => children
            .iter()
            .position(|c| *c == row)
            .and_then(|pos| children.get(pos + 1).copied()),
        None => children.first().copied(),
    };

    let filter = inner.filter();
    let mut added_rows = Vec::new();
    let mut added_keys = Vec::with_capacity(record.added.len());
    for (offset, item) in record.added.iter().enumerate() {
        let Ok(key) = inner.data.key_of(item) else {
            continue;
        };
        added_keys.push(key.clone());
        if !inner.visible(filter.as_ref(), item) {
            continue;
        }
        let reuse = pool.remove(&key.to_attribute());
        let row = inner.render_row(tree, columns, start + offset, &key, item, reuse)?;
        tree.insert_before(tbody, row, reference)?;
        added_rows.push(row);
    }

    let removed_keys = record
        .removed
        .iter()
        .filter_map(|item| inner.data.key_of(item).ok())
        .collect();

    #[cfg(feature = "tracing")]
    tracing::trace!(
        index = start,
        removed = removed_rows.len(),
        added = added_rows.len(),
        "rows spliced"
    );
    Ok(TableEvent::DataSpliced {
        index: start,
        removed_keys,
        added_keys,
        removed_rows,
        added_rows,
    })
}

/// Reconcile the row at the record's index with its current data. Missing
/// rows are skipped.
fn update<T: Clone + 'static, D: Tree + 'static>(
    inner: &Inner<T, D>,
    tree: &mut D,
    mount: &Mount<D::Node>,
    columns: &[ColumnRef<T>],
    record: &ChangeRecord<T>,
) -> Result<Option<TableEvent<D::Node>>, TreeError> {
    let Some(snapshot) = record.added.first() else {
        return Ok(None);
    };
    let Some(row) = row_at_index(tree, mount.tbody, record.index) else {
        return Ok(None);
    };
    let Ok(key) = inner.data.key_of(snapshot) else {
        return Ok(None);
    };
    let current = inner
        .data
        .get_by_key(&key)
        .unwrap_or_else(|| snapshot.clone());

    if !inner.visible(inner.filter().as_ref(), &current) {
        tree.remove_child(mount.tbody, row)?;
        tree.discard(row);
        return Ok(None);
    }
    let row = inner.render_row(tree, columns, record.index, &key, &current, Some(row))?;
    Ok(Some(TableEvent::DataUpdated {
        index: record.index,
        key,
        row,
    }))
}
