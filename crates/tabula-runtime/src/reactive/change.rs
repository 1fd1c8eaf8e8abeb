#![forbid(unsafe_code)]

//! Structured change records.

use std::ops::Range;
use std::rc::Rc;

/// What a [`ChangeRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Items were removed and/or inserted at `index`.
    Splice,
    /// The item at `index` changed in place.
    Update,
}

impl ChangeKind {
    /// Lowercase name, as used in event payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Splice => "splice",
            Self::Update => "update",
        }
    }
}

/// One insertion/removal batch, or one in-place update.
///
/// `removed` and `added` are owned snapshots taken when the record was
/// produced. Applying a sequence of records in production order to the
/// pre-mutation state reproduces the post-mutation state; `index` is only
/// meaningful in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord<T> {
    pub kind: ChangeKind,
    pub index: usize,
    pub removed: Vec<T>,
    pub added: Vec<T>,
    /// Number of items inserted. Zero for updates.
    pub added_count: usize,
    /// Label of the collection that produced the record.
    pub source: Rc<str>,
}

impl<T> ChangeRecord<T> {
    /// A splice record.
    #[must_use]
    pub fn splice(source: &Rc<str>, index: usize, removed: Vec<T>, added: Vec<T>) -> Self {
        Self {
            kind: ChangeKind::Splice,
            index,
            added_count: added.len(),
            removed,
            added,
            source: Rc::clone(source),
        }
    }

    /// An update record carrying a snapshot of the updated item.
    #[must_use]
    pub fn update(source: &Rc<str>, index: usize, snapshot: T) -> Self {
        Self {
            kind: ChangeKind::Update,
            index,
            removed: Vec::new(),
            added: vec![snapshot],
            added_count: 0,
            source: Rc::clone(source),
        }
    }

    #[must_use]
    pub fn is_splice(&self) -> bool {
        self.kind == ChangeKind::Splice
    }

    #[must_use]
    pub fn is_update(&self) -> bool {
        self.kind == ChangeKind::Update
    }

    /// Positions (before the change) of the removed items.
    #[must_use]
    pub fn removed_range(&self) -> Range<usize> {
        self.index..self.index + self.removed.len()
    }

    /// Positions (after the change) of the inserted items.
    #[must_use]
    pub fn added_range(&self) -> Range<usize> {
        self.index..self.index + self.added_count
    }

    /// Net change in length.
    #[must_use]
    pub fn delta(&self) -> isize {
        self.added_count as isize - self.removed.len() as isize
    }
}

/// Apply `records` to `items`, in order. Used to check that a batch of
/// records replays a mutation.
pub fn replay<T: Clone>(items: &mut Vec<T>, records: &[ChangeRecord<T>]) {
    for record in records {
        match record.kind {
            ChangeKind::Splice => {
                let start = record.index.min(items.len());
                let end = (start + record.removed.len()).min(items.len());
                items.splice(start..end, record.added.iter().cloned());
            }
            ChangeKind::Update => {
                if let (Some(slot), Some(snapshot)) = (items.get_mut(record.index), record.added.first()) {
                    *slot = snapshot.clone();
                }
            }
        }
    }
}
