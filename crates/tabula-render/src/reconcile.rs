#![forbid(unsafe_code)]

//! In-place reconciliation of one subtree into another.
//!
//! The widget builds a transient node for the current state of a row or cell
//! and folds it into the live node, so the live node keeps its identity
//! (attributes such as the row's correlation id survive, listeners bound
//! higher up keep working).
//!
//! # Invariants
//!
//! 1. [`merge_attributes`] writes only values that differ and removes only
//!    attributes absent from the source.
//! 2. [`merge_nodes`] returns the node present at the slot afterwards: `old`
//!    when the kinds match, `new` otherwise.
//! 3. In the replace branch `old` ends detached; top-level nodes are never
//!    discarded, nested nodes dropped by the merge are.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | `old` is not a child of `parent` | `Err(TreeError::NotAChild)` before any edit |
//! | Stale handle | `Err(TreeError::StaleNode)` |

use crate::tree::{NodeKind, Tree, TreeError};

/// Counts of writes performed by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub attributes_set: usize,
    pub attributes_removed: usize,
    pub styles_set: usize,
    pub styles_removed: usize,
    pub texts_set: usize,
    pub nodes_appended: usize,
    pub nodes_removed: usize,
    pub nodes_replaced: usize,
}

impl MergeStats {
    /// Total number of tree writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.attributes_set
            + self.attributes_removed
            + self.styles_set
            + self.styles_removed
            + self.texts_set
            + self.nodes_appended
            + self.nodes_removed
            + self.nodes_replaced
    }

    /// Whether nothing was written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.writes() == 0
    }

    fn absorb(&mut self, other: MergeStats) {
        self.attributes_set += other.attributes_set;
        self.attributes_removed += other.attributes_removed;
        self.styles_set += other.styles_set;
        self.styles_removed += other.styles_removed;
        self.texts_set += other.texts_set;
        self.nodes_appended += other.nodes_appended;
        self.nodes_removed += other.nodes_removed;
        self.nodes_replaced += other.nodes_replaced;
    }
}

/// Copy `new`'s attributes and inline styles onto `old`.
///
/// Values are compared as whole strings, `class` included; style properties
/// are diffed one by one.
pub fn merge_attributes<T: Tree + ?Sized>(tree: &mut T, old: T::Node, new: T::Node) -> MergeStats {
    let mut stats = MergeStats::default();

    let wanted = tree.attributes(new);
    for (name, _) in tree.attributes(old) {
        if !wanted.iter().any(|(n, _)| *n == name) {
            tree.remove_attribute(old, &name);
            stats.attributes_removed += 1;
        }
    }
    for (name, value) in &wanted {
        if tree.attribute(old, name) != Some(value.as_str()) {
            tree.set_attribute(old, name, value);
            stats.attributes_set += 1;
        }
    }

    let wanted = tree.styles(new);
    for (property, _) in tree.styles(old) {
        if !wanted.iter().any(|(p, _)| *p == property) {
            tree.remove_style(old, &property);
            stats.styles_removed += 1;
        }
    }
    for (property, value) in &wanted {
        if tree.style(old, property) != Some(value.as_str()) {
            tree.set_style(old, property, value);
            stats.styles_set += 1;
        }
    }

    stats
}

fn same_kind<T: Tree + ?Sized>(tree: &T, a: T::Node, b: T::Node) -> Result<bool, TreeError> {
    let a = tree.kind(a).ok_or(TreeError::StaleNode)?;
    let b = tree.kind(b).ok_or(TreeError::StaleNode)?;
    Ok(match (a, b) {
        (NodeKind::Element(x), NodeKind::Element(y)) => x == y,
        (NodeKind::Text, NodeKind::Text) => true,
        _ => false,
    })
}

/// Fold `new` into `old` and return the node now at `old`'s slot.
///
/// Same kind (same tag, or both text): attributes and text are merged in
/// place, children are merged pairwise, extra trailing children of `new` are
/// moved into `old` and extra trailing children of `old` are removed.
/// Different kind: `new` replaces `old` in `parent` (if given).
pub fn merge_nodes<T: Tree + ?Sized>(
    tree: &mut T,
    parent: Option<T::Node>,
    old: T::Node,
    new: T::Node,
) -> Result<T::Node, TreeError> {
    merge_nodes_with_stats(tree, parent, old, new).map(|(node, _)| node)
}

/// [`merge_nodes`], also returning what was written.
pub fn merge_nodes_with_stats<T: Tree + ?Sized>(
    tree: &mut T,
    parent: Option<T::Node>,
    old: T::Node,
    new: T::Node,
) -> Result<(T::Node, MergeStats), TreeError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("merge_nodes", ?old, ?new).entered();

    if let Some(parent) = parent {
        if tree.parent(old) != Some(parent) {
            return Err(TreeError::NotAChild);
        }
    }
    let mut stats = MergeStats::default();
    let node = merge_into(tree, parent, old, new, false, &mut stats)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(writes = stats.writes(), replaced = stats.nodes_replaced, "merged");

    Ok((node, stats))
}

fn merge_into<T: Tree + ?Sized>(
    tree: &mut T,
    parent: Option<T::Node>,
    old: T::Node,
    new: T::Node,
    nested: bool,
    stats: &mut MergeStats,
) -> Result<T::Node, TreeError> {
    if old == new {
        return Ok(old);
    }
    if !same_kind(tree, old, new)? {
        if let Some(parent) = parent {
            tree.replace_child(parent, new, old)?;
        } else {
            tree.detach(new);
        }
        stats.nodes_replaced += 1;
        if nested {
            tree.discard(old);
        }
        return Ok(new);
    }

    if let Some(text) = tree.text(new).map(str::to_owned) {
        if tree.text(old) != Some(text.as_str()) {
            tree.set_text(old, &text);
            stats.texts_set += 1;
        }
        return Ok(old);
    }

    stats.absorb(merge_attributes(tree, old, new));

    let old_children = tree.children(old);
    let new_children = tree.children(new);
    let shared = old_children.len().min(new_children.len());
    for (o, n) in old_children.iter().zip(&new_children) {
        merge_into(tree, Some(old), *o, *n, true, stats)?;
    }
    for extra in &new_children[shared..] {
        tree.append_child(old, *extra)?;
        stats.nodes_appended += 1;
    }
    for extra in &old_children[shared..] {
        tree.remove_child(old, *extra)?;
        tree.discard(*extra);
        stats.nodes_removed += 1;
    }
    Ok(old)
}
