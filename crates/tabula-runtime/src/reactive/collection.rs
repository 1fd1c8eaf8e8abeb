#![forbid(unsafe_code)]

//! Keyed, optionally sorted collection that reports its mutations as
//! [`ChangeRecord`]s.
//!
//! # Invariants
//!
//! 1. `keys[i]` is the key of `items[i]`, and the key map sends `keys[i]` to
//!    `i`, for every position, after every public method returns.
//! 2. No two items share a key.
//! 3. With a comparator installed, items are in comparator order and equal
//!    items keep arrival order.
//! 4. Replaying the records of one mutation, in order, over the
//!    pre-mutation items yields the post-mutation items.
//! 5. Inserted items produce one record per maximal run of contiguous final
//!    positions, in ascending position order.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Duplicate key | `Err(DuplicateKey)`, collection unchanged, logged at error |
//! | Key selector fails | `Err(InvalidKey)`, collection unchanged |
//! | Splice index out of range | Clamped like an array splice |
//! | `update`/`set`/`remove` index out of range | `Err(IndexOutOfBounds)` |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use tabula_core::{Comparator, Key, KeyError, KeySelector};

use super::change::ChangeRecord;
use super::observable::{ContextId, FlushReport, Observable, ObserverFn, ObserverId, ObserverResult};
use crate::scheduler::Scheduler;

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by [`IndexedCollection`] mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// An inserted item's key is already present (or repeated in the batch).
    DuplicateKey { key: Key, source: String },
    /// The key selector rejected an item.
    InvalidKey(KeyError),
    /// Index does not address an existing item.
    IndexOutOfBounds { index: usize, len: usize },
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key, source } => {
                write!(f, "duplicate key '{key}' in collection '{source}'")
            }
            Self::InvalidKey(err) => write!(f, "invalid key: {err}"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds (len {len})")
            }
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidKey(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KeyError> for CollectionError {
    fn from(err: KeyError) -> Self {
        Self::InvalidKey(err)
    }
}

// =============================================================================
// State
// =============================================================================

struct CollectionState<T> {
    items: Vec<T>,
    keys: Vec<Key>,
    index: AHashMap<Key, usize>,
    selector: KeySelector<T>,
    comparator: Option<Comparator<T>>,
}

impl<T: 'static> CollectionState<T> {
    fn keys_for(&self, items: &[T]) -> Result<Vec<Key>, CollectionError> {
        items
            .iter()
            .map(|item| self.selector.key_of(item).map_err(CollectionError::from))
            .collect()
    }

    fn reindex_from(&mut self, from: usize) {
        for (pos, key) in self.keys.iter().enumerate().skip(from) {
            self.index.insert(key.clone(), pos);
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.reindex_from(0);
    }

    fn permute(&mut self, order: &[usize]) {
        let mut items: Vec<Option<T>> = std::mem::take(&mut self.items).into_iter().map(Some).collect();
        let mut keys: Vec<Option<Key>> = std::mem::take(&mut self.keys).into_iter().map(Some).collect();
        self.items = order.iter().filter_map(|&i| items[i].take()).collect();
        self.keys = order.iter().filter_map(|&i| keys[i].take()).collect();
        self.rebuild_index();
    }
}

fn clamp_start(index: isize, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs())
    } else {
        index.unsigned_abs().min(len)
    }
}

// =============================================================================
// IndexedCollection
// =============================================================================

/// Ordered, keyed collection with change notification.
///
/// Cloning yields another handle to the same collection.
pub struct IndexedCollection<T> {
    state: Rc<RefCell<CollectionState<T>>>,
    changes: Observable<T>,
}

impl<T> Clone for IndexedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            changes: self.changes.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for IndexedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("IndexedCollection")
            .field("source", self.changes.source())
            .field("len", &state.items.len())
            .field("sorted", &state.comparator.is_some())
            .finish()
    }
}

impl<T: Clone + 'static> IndexedCollection<T> {
    /// Empty collection labelled `label`.
    pub fn new(label: &str, selector: KeySelector<T>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            state: Rc::new(RefCell::new(CollectionState {
                items: Vec::new(),
                keys: Vec::new(),
                index: AHashMap::new(),
                selector,
                comparator: None,
            })),
            changes: Observable::new(label, scheduler),
        }
    }

    /// Collection seeded with `items`. Seeding emits no records.
    pub fn with_items(
        label: &str,
        selector: KeySelector<T>,
        scheduler: Rc<dyn Scheduler>,
        items: Vec<T>,
    ) -> Result<Self, CollectionError> {
        Self::seeded(label, selector, scheduler, items, None)
    }

    /// Collection seeded with `items` and kept sorted by `comparator`.
    pub fn with_sorted_items(
        label: &str,
        selector: KeySelector<T>,
        scheduler: Rc<dyn Scheduler>,
        items: Vec<T>,
        comparator: Comparator<T>,
    ) -> Result<Self, CollectionError> {
        Self::seeded(label, selector, scheduler, items, Some(comparator))
    }

    fn seeded(
        label: &str,
        selector: KeySelector<T>,
        scheduler: Rc<dyn Scheduler>,
        items: Vec<T>,
        comparator: Option<Comparator<T>>,
    ) -> Result<Self, CollectionError> {
        let this = Self::new(label, selector, scheduler);
        {
            let mut state = this.state.borrow_mut();
            let keys = state.keys_for(&items)?;
            this.check_batch_unique(&keys)?;
            state.items = items;
            state.keys = keys;
            if let Some(cmp) = &comparator {
                let order = cmp.sorted_order(&state.items);
                state.permute(&order);
            } else {
                state.rebuild_index();
            }
            state.comparator = comparator;
        }
        Ok(this)
    }

    /// Label stamped on this collection's records.
    #[must_use]
    pub fn label(&self) -> &str {
        self.changes.source()
    }

    fn duplicate(&self, key: &Key) -> CollectionError {
        tracing::error!(source = self.label(), key = %key, "duplicate key rejected");
        CollectionError::DuplicateKey {
            key: key.clone(),
            source: self.label().to_owned(),
        }
    }

    fn check_batch_unique(&self, keys: &[Key]) -> Result<(), CollectionError> {
        let mut seen = AHashSet::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key) {
                return Err(self.duplicate(key));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Splicing
    // =========================================================================

    /// Remove `remove_count` items at `index` and insert `items`.
    ///
    /// Negative indices count from the end; indices past either end are
    /// clamped. With a comparator installed the new items go to their sorted
    /// positions instead of `index`. Returns the removed items.
    pub fn splice(
        &self,
        index: isize,
        remove_count: usize,
        items: Vec<T>,
    ) -> Result<Vec<T>, CollectionError> {
        let (records, removed) = {
            let mut state = self.state.borrow_mut();
            let len = state.items.len();
            let start = clamp_start(index, len);
            let end = start.saturating_add(remove_count).min(len);
            if start == end && items.is_empty() {
                return Ok(Vec::new());
            }

            let new_keys = state.keys_for(&items)?;
            self.check_batch_unique(&new_keys)?;
            for key in &new_keys {
                if let Some(&pos) = state.index.get(key) {
                    if !(start..end).contains(&pos) {
                        return Err(self.duplicate(key));
                    }
                }
            }

            let removed: Vec<T> = state.items.drain(start..end).collect();
            let removed_keys: Vec<Key> = state.keys.drain(start..end).collect();
            for key in &removed_keys {
                state.index.remove(key);
            }

            let source = Rc::clone(self.changes.source());
            let records = match state.comparator.clone() {
                None => {
                    let tail = state.items.split_off(start);
                    state.items.extend(items.iter().cloned());
                    state.items.extend(tail);
                    let tail = state.keys.split_off(start);
                    state.keys.extend(new_keys);
                    state.keys.extend(tail);
                    vec![ChangeRecord::splice(&source, start, removed.clone(), items)]
                }
                Some(cmp) => {
                    let runs = insert_sorted(&mut state, &cmp, items, new_keys);
                    compact(&source, start, removed.clone(), runs)
                }
            };
            // Sorted runs may land before `start`.
            let from = records.iter().map(|r| r.index).fold(start, usize::min);
            state.reindex_from(from);
            tracing::trace!(
                source = self.label(),
                start,
                removed = removed.len(),
                records = records.len(),
                "splice"
            );
            (records, removed)
        };
        self.changes.notify(records);
        Ok(removed)
    }

    /// Append `items` (or insert them sorted).
    pub fn push(&self, items: Vec<T>) -> Result<(), CollectionError> {
        let len = self.len();
        self.splice(len as isize, 0, items).map(drop)
    }

    /// Prepend `items` (or insert them sorted).
    pub fn unshift(&self, items: Vec<T>) -> Result<(), CollectionError> {
        self.splice(0, 0, items).map(drop)
    }

    /// Remove the item at `index`.
    pub fn remove(&self, index: usize) -> Result<T, CollectionError> {
        let len = self.len();
        if index >= len {
            return Err(CollectionError::IndexOutOfBounds { index, len });
        }
        self.splice(index as isize, 1, Vec::new())?
            .into_iter()
            .next()
            .ok_or(CollectionError::IndexOutOfBounds { index, len })
    }

    /// Remove the item with `key`, if present.
    pub fn remove_key(&self, key: &Key) -> Option<T> {
        let index = self.index_of_key(key)?;
        self.remove(index).ok()
    }

    /// Remove the last item.
    pub fn pop(&self) -> Option<T> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.remove(len - 1).ok()
    }

    /// Remove the first item.
    pub fn shift(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.remove(0).ok()
    }

    /// Remove every item, emitting one removal record.
    pub fn clear(&self) -> Vec<T> {
        let len = self.len();
        self.splice(0, len, Vec::new()).unwrap_or_default()
    }

    /// Replace the whole contents.
    pub fn reset(&self, items: Vec<T>) -> Result<(), CollectionError> {
        let record = {
            let mut state = self.state.borrow_mut();
            let keys = state.keys_for(&items)?;
            self.check_batch_unique(&keys)?;
            if state.items.is_empty() && items.is_empty() {
                return Ok(());
            }
            let old = std::mem::replace(&mut state.items, items);
            state.keys = keys;
            match state.comparator.clone() {
                Some(cmp) => {
                    let order = cmp.sorted_order(&state.items);
                    state.permute(&order);
                }
                None => state.rebuild_index(),
            }
            ChangeRecord::splice(self.changes.source(), 0, old, state.items.clone())
        };
        self.changes.notify([record]);
        Ok(())
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// Install `comparator` and reorder. Returns `true` if the order changed;
    /// an unchanged order emits nothing.
    pub fn sort(&self, comparator: Comparator<T>) -> bool {
        let record = {
            let mut state = self.state.borrow_mut();
            let order = comparator.sorted_order(&state.items);
            state.comparator = Some(comparator);
            if order.iter().enumerate().all(|(pos, &orig)| pos == orig) {
                return false;
            }
            let old = state.items.clone();
            state.permute(&order);
            ChangeRecord::splice(self.changes.source(), 0, old, state.items.clone())
        };
        self.changes.notify([record]);
        true
    }

    /// Reverse the order, flipping the installed comparator.
    pub fn reverse(&self) {
        let record = {
            let mut state = self.state.borrow_mut();
            state.comparator = state.comparator.as_ref().map(Comparator::reversed);
            if state.items.len() < 2 {
                return;
            }
            let old = state.items.clone();
            state.items.reverse();
            state.keys.reverse();
            state.rebuild_index();
            ChangeRecord::splice(self.changes.source(), 0, old, state.items.clone())
        };
        self.changes.notify([record]);
    }

    /// The installed comparator.
    #[must_use]
    pub fn comparator(&self) -> Option<Comparator<T>> {
        self.state.borrow().comparator.clone()
    }

    /// Drop the comparator. Items keep their current order.
    pub fn clear_comparator(&self) {
        self.state.borrow_mut().comparator = None;
    }

    // =========================================================================
    // In-place updates
    // =========================================================================

    /// Mutate the item at `index` and emit an update record.
    ///
    /// If the item's key changes the key map follows it; a key already used by
    /// another item rolls the mutation back. Updates never reposition an item.
    pub fn update(&self, index: usize, f: impl FnOnce(&mut T)) -> Result<(), CollectionError> {
        let record = {
            let mut state = self.state.borrow_mut();
            let len = state.items.len();
            let Some(current) = state.items.get(index) else {
                return Err(CollectionError::IndexOutOfBounds { index, len });
            };
            let mut next = current.clone();
            f(&mut next);
            let key = state.selector.key_of(&next)?;
            if key != state.keys[index] {
                if state.index.contains_key(&key) {
                    return Err(self.duplicate(&key));
                }
                let old = std::mem::replace(&mut state.keys[index], key.clone());
                state.index.remove(&old);
                state.index.insert(key, index);
            }
            state.items[index] = next.clone();
            ChangeRecord::update(self.changes.source(), index, next)
        };
        self.changes.notify([record]);
        Ok(())
    }

    /// Replace the item at `index`.
    pub fn set(&self, index: usize, item: T) -> Result<(), CollectionError> {
        self.update(index, move |slot| *slot = item)
    }

    /// Emit an update record for the item at `index` without changing it.
    pub fn notify_update(&self, index: usize) -> Result<(), CollectionError> {
        let record = {
            let state = self.state.borrow();
            let len = state.items.len();
            let item = state
                .items
                .get(index)
                .ok_or(CollectionError::IndexOutOfBounds { index, len })?;
            ChangeRecord::update(self.changes.source(), index, item.clone())
        };
        self.changes.notify([record]);
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    /// Clone of the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.borrow().items.get(index).cloned()
    }

    /// Clone of the item with `key`.
    #[must_use]
    pub fn get_by_key(&self, key: &Key) -> Option<T> {
        let state = self.state.borrow();
        state.index.get(key).and_then(|&i| state.items.get(i)).cloned()
    }

    /// Current position of `key`.
    #[must_use]
    pub fn index_of_key(&self, key: &Key) -> Option<usize> {
        self.state.borrow().index.get(key).copied()
    }

    #[must_use]
    pub fn contains_key(&self, key: &Key) -> bool {
        self.state.borrow().index.contains_key(key)
    }

    /// Key the selector derives for `item`.
    pub fn key_of(&self, item: &T) -> Result<Key, KeyError> {
        self.state.borrow().selector.key_of(item)
    }

    /// Key of the item at `index`.
    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<Key> {
        self.state.borrow().keys.get(index).cloned()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    /// Keys in item order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.state.borrow().keys.clone()
    }

    /// Borrow the items for the duration of `f`.
    ///
    /// `f` must not mutate this collection.
    pub fn read_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.state.borrow().items)
    }

    /// Whether the key map agrees with the items. Used by property tests.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let state = self.state.borrow();
        state.items.len() == state.keys.len()
            && state.index.len() == state.keys.len()
            && state.items.iter().zip(&state.keys).enumerate().all(|(pos, (item, key))| {
                state.selector.key_of(item).is_ok_and(|k| &k == key)
                    && state.index.get(key) == Some(&pos)
            })
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// The underlying observable.
    #[must_use]
    pub fn observable(&self) -> &Observable<T> {
        &self.changes
    }

    pub fn observe(
        &self,
        callback: impl Fn(&[ChangeRecord<T>]) -> ObserverResult + 'static,
    ) -> ObserverId {
        self.changes.observe(callback)
    }

    pub fn observe_with(&self, callback: ObserverFn<T>, ctx: Option<ContextId>) -> ObserverId {
        self.changes.observe_with(callback, ctx)
    }

    pub fn unobserve(&self, matching: Option<(&ObserverFn<T>, Option<ContextId>)>) -> usize {
        self.changes.unobserve(matching)
    }

    pub fn unobserve_id(&self, id: ObserverId) -> bool {
        self.changes.unobserve_id(id)
    }

    /// Queue records for the next flush.
    pub fn notify(&self, changes: impl IntoIterator<Item = ChangeRecord<T>>) {
        self.changes.notify(changes);
    }

    #[must_use]
    pub fn pending_changes(&self) -> Vec<ChangeRecord<T>> {
        self.changes.pending_changes()
    }

    pub fn clear_changes(&self) -> usize {
        self.changes.clear_changes()
    }

    pub fn flush_now(&self) -> FlushReport {
        self.changes.flush_now()
    }
}

/// Insert `items` at their sorted positions. Returns the runs of contiguous
/// final positions as `(start, items)`, ascending.
fn insert_sorted<T: Clone>(
    state: &mut CollectionState<T>,
    cmp: &Comparator<T>,
    items: Vec<T>,
    keys: Vec<Key>,
) -> Vec<(usize, Vec<T>)> {
    let order = cmp.sorted_order(&items);
    let mut slots: Vec<Option<(T, Key)>> = items.into_iter().zip(keys).map(Some).collect();
    let mut runs: Vec<(usize, Vec<T>)> = Vec::new();
    for i in order {
        let Some((item, key)) = slots[i].take() else {
            continue;
        };
        // Sorted arrival makes positions strictly increasing.
        let pos = cmp.insertion_point(&state.items, &item);
        state.items.insert(pos, item.clone());
        state.keys.insert(pos, key);
        match runs.last_mut() {
            Some((start, run)) if *start + run.len() == pos => run.push(item),
            _ => runs.push((pos, vec![item])),
        }
    }
    runs
}

/// One removal record (when anything was removed) followed by one insertion
/// record per run; a run starting where the removal happened shares its record.
fn compact<T>(
    source: &Rc<str>,
    start: usize,
    removed: Vec<T>,
    runs: Vec<(usize, Vec<T>)>,
) -> Vec<ChangeRecord<T>> {
    let mut records = Vec::with_capacity(runs.len() + 1);
    let mut runs = runs.into_iter().peekable();
    if !removed.is_empty() {
        let added = match runs.peek() {
            Some((pos, _)) if *pos == start => runs.next().map(|(_, run)| run).unwrap_or_default(),
            _ => Vec::new(),
        };
        records.push(ChangeRecord::splice(source, start, removed, added));
    }
    records.extend(runs.map(|(pos, run)| ChangeRecord::splice(source, pos, Vec::new(), run)));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::change::replay;
    use crate::scheduler::TaskQueue;
    use proptest::prelude::*;
    use tabula_core::{Row, SortDescriptor, Value};

    fn row(id: i64) -> Row {
        Row::new().with("id", id)
    }

    fn ids(c: &IndexedCollection<Row>) -> Vec<i64> {
        c.to_vec()
            .iter()
            .map(|r| match r.get("id") {
                Value::Number(n) => *n as i64,
                _ => -1,
            })
            .collect()
    }

    fn by_id() -> Comparator<Row> {
        Comparator::by(SortDescriptor::new("id", |r: &Row| r.get("id").clone()))
    }

    fn data(queue: &TaskQueue, items: &[i64]) -> IndexedCollection<Row> {
        IndexedCollection::with_items(
            "data",
            KeySelector::field("id"),
            queue.handle(),
            items.iter().map(|&i| row(i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn sorting_a_mixed_value_column_keeps_the_collection_consistent() {
        let queue = TaskQueue::new();
        let rows: Vec<Row> = (0..2000i64)
            .map(|i| {
                let v: Value = if i % 3 == 0 {
                    format!("w{i}").into()
                } else {
                    ((i * 7) % 2000).into()
                };
                row(i).with("v", v)
            })
            .collect();
        let c = IndexedCollection::with_items("data", KeySelector::field("id"), queue.handle(), rows)
            .unwrap();
        c.sort(Comparator::by(SortDescriptor::new("v", |r: &Row| r.get("v").clone())));
        assert_eq!(c.len(), 2000);
        assert!(c.is_consistent());

        c.push(vec![row(5000).with("v", "w1"), row(5001).with("v", 3)])
            .unwrap();
        assert_eq!(c.len(), 2002);
        assert!(c.is_consistent());
    }

    #[test]
    fn splice_removes_and_reindexes() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2, 3]);
        let removed = c.splice(1, 1, vec![]).unwrap();
        assert_eq!(removed, vec![row(2)]);
        assert_eq!(ids(&c), [1, 3]);
        assert_eq!(c.index_of_key(&Key::Int(3)), Some(1));
        assert!(!c.contains_key(&Key::Int(2)));
        assert!(c.is_consistent());

        let pending = c.pending_changes();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].index, 1);
        assert_eq!(pending[0].removed, vec![row(2)]);
    }

    #[test]
    fn splice_clamps_indices() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2, 3]);
        c.splice(-1, 1, vec![]).unwrap();
        assert_eq!(ids(&c), [1, 2]);
        c.splice(-10, 0, vec![row(0)]).unwrap();
        c.splice(99, 5, vec![row(9)]).unwrap();
        assert_eq!(ids(&c), [0, 1, 2, 9]);
        assert!(c.is_consistent());
    }

    #[test]
    fn empty_splice_is_noop() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1]);
        assert!(c.splice(0, 0, vec![]).unwrap().is_empty());
        assert!(c.pending_changes().is_empty());
        assert!(queue.is_idle());
    }

    #[test]
    fn duplicate_key_leaves_collection_unchanged() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2]);
        let err = c.push(vec![row(3), row(2)]).unwrap_err();
        assert_eq!(
            err,
            CollectionError::DuplicateKey {
                key: Key::Int(2),
                source: "data".into()
            }
        );
        assert!(c.push(vec![row(4), row(4)]).is_err());
        assert_eq!(ids(&c), [1, 2]);
        assert!(c.pending_changes().is_empty());
    }

    #[test]
    fn replacing_a_key_in_the_same_splice_is_allowed() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2, 3]);
        c.splice(1, 1, vec![row(2)]).unwrap();
        assert_eq!(ids(&c), [1, 2, 3]);
        assert!(c.is_consistent());
    }

    #[test]
    fn sorted_push_emits_one_record_per_run() {
        let queue = TaskQueue::new();
        let c = IndexedCollection::with_sorted_items(
            "data",
            KeySelector::field("id"),
            queue.handle(),
            vec![row(10), row(1), row(5), row(2)],
            by_id(),
        )
        .unwrap();
        assert_eq!(ids(&c), [1, 2, 5, 10]);

        let before = c.to_vec();
        c.push(vec![row(11), row(6)]).unwrap();
        assert_eq!(ids(&c), [1, 2, 5, 6, 10, 11]);

        let records = c.pending_changes();
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].index, records[0].added.clone()), (3, vec![row(6)]));
        assert_eq!((records[1].index, records[1].added.clone()), (5, vec![row(11)]));

        let mut replayed = before;
        replay(&mut replayed, &records);
        assert_eq!(replayed, c.to_vec());
    }

    #[test]
    fn contiguous_sorted_inserts_share_a_record() {
        let queue = TaskQueue::new();
        let c = IndexedCollection::with_sorted_items(
            "data",
            KeySelector::field("id"),
            queue.handle(),
            vec![row(1), row(10)],
            by_id(),
        )
        .unwrap();
        c.push(vec![row(4), row(3), row(2)]).unwrap();
        let records = c.pending_changes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[0].added_count, 3);
    }

    #[test]
    fn sorted_splice_merges_removal_with_run_at_same_index() {
        let queue = TaskQueue::new();
        let c = IndexedCollection::with_sorted_items(
            "data",
            KeySelector::field("id"),
            queue.handle(),
            vec![row(1), row(2), row(3)],
            by_id(),
        )
        .unwrap();
        let before = c.to_vec();
        c.splice(1, 1, vec![row(2)]).unwrap();
        let records = c.pending_changes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].removed, vec![row(2)]);
        assert_eq!(records[0].added, vec![row(2)]);
        let mut replayed = before;
        replay(&mut replayed, &records);
        assert_eq!(replayed, c.to_vec());
    }

    #[test]
    fn sort_is_stable_and_silent_when_unchanged() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[3, 1, 2]);
        assert!(c.sort(by_id()));
        assert_eq!(ids(&c), [1, 2, 3]);
        c.clear_changes();
        assert!(!c.sort(by_id()));
        assert!(c.pending_changes().is_empty());
    }

    #[test]
    fn equal_sort_keys_keep_prior_order() {
        let queue = TaskQueue::new();
        let c = IndexedCollection::with_items(
            "data",
            KeySelector::field("id"),
            queue.handle(),
            vec![
                Row::new().with("id", 1).with("g", "b"),
                Row::new().with("id", 2).with("g", "a"),
                Row::new().with("id", 3).with("g", "b"),
                Row::new().with("id", 4).with("g", "a"),
            ],
        )
        .unwrap();
        c.sort(Comparator::by(SortDescriptor::new("g", |r: &Row| r.get("g").clone())));
        assert_eq!(ids(&c), [2, 4, 1, 3]);
    }

    #[test]
    fn reverse_flips_comparator() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2, 3]);
        c.sort(by_id());
        c.reverse();
        assert_eq!(ids(&c), [3, 2, 1]);
        c.push(vec![row(0), row(4)]).unwrap();
        assert_eq!(ids(&c), [4, 3, 2, 1, 0]);
        assert!(c.is_consistent());
    }

    #[test]
    fn reverse_of_single_item_emits_nothing() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1]);
        c.reverse();
        assert!(c.pending_changes().is_empty());
    }

    #[test]
    fn reset_replaces_contents() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2]);
        c.reset(vec![row(7), row(8), row(9)]).unwrap();
        assert_eq!(ids(&c), [7, 8, 9]);
        assert!(!c.contains_key(&Key::Int(1)));
        let records = c.pending_changes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].removed.len(), 2);
        assert_eq!(records[0].added_count, 3);

        let empty = data(&queue, &[]);
        empty.reset(vec![]).unwrap();
        assert!(empty.pending_changes().is_empty());
    }

    #[test]
    fn update_rekeys_and_rejects_collisions() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2]);
        c.update(0, |r| r.insert("id", 5)).unwrap();
        assert_eq!(c.index_of_key(&Key::Int(5)), Some(0));
        assert!(!c.contains_key(&Key::Int(1)));

        let err = c.update(0, |r| r.insert("id", 2)).unwrap_err();
        assert!(matches!(err, CollectionError::DuplicateKey { .. }));
        assert_eq!(ids(&c), [5, 2]);
        assert!(c.is_consistent());

        let records = c.pending_changes();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_update());
        assert_eq!(records[0].added, vec![row(5)]);
    }

    #[test]
    fn out_of_range_update_errors() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1]);
        assert_eq!(
            c.set(3, row(9)),
            Err(CollectionError::IndexOutOfBounds { index: 3, len: 1 })
        );
        assert!(c.notify_update(1).is_err());
        assert!(c.notify_update(0).is_ok());
    }

    #[test]
    fn remove_helpers() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1, 2, 3, 4]);
        assert_eq!(c.pop(), Some(row(4)));
        assert_eq!(c.shift(), Some(row(1)));
        assert_eq!(c.remove_key(&Key::Int(2)), Some(row(2)));
        assert_eq!(c.remove_key(&Key::Int(2)), None);
        assert_eq!(c.clear(), vec![row(3)]);
        assert_eq!(c.pop(), None);
        assert!(c.is_consistent());
    }

    #[test]
    fn null_key_is_rejected() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[]);
        let err = c.push(vec![Row::new().with("name", "x")]).unwrap_err();
        assert!(matches!(err, CollectionError::InvalidKey(_)));
        assert!(c.is_empty());
    }

    #[test]
    fn mutations_are_delivered_in_one_batch() {
        let queue = TaskQueue::new();
        let c = data(&queue, &[1]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        c.observe(move |batch| {
            s.borrow_mut().push(batch.len());
            Ok(())
        });
        c.push(vec![row(2)]).unwrap();
        c.unshift(vec![row(0)]).unwrap();
        assert!(seen.borrow().is_empty());
        queue.run_until_idle(4);
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(Vec<i64>),
        Unshift(Vec<i64>),
        Splice(isize, usize, Vec<i64>),
        Reverse,
    }

    fn op() -> impl Strategy<Value = Op> {
        let ids = || proptest::collection::vec(0i64..40, 0..4);
        prop_oneof![
            ids().prop_map(Op::Push),
            ids().prop_map(Op::Unshift),
            (-5isize..15, 0usize..4, ids()).prop_map(|(i, n, v)| Op::Splice(i, n, v)),
            Just(Op::Reverse),
        ]
    }

    proptest! {
        #[test]
        fn key_map_tracks_positions(ops in proptest::collection::vec(op(), 1..30), sorted in any::<bool>()) {
            let queue = TaskQueue::new();
            let c = data(&queue, &[]);
            if sorted {
                c.sort(by_id());
            }
            let mut mirror = c.to_vec();
            let records = Rc::new(RefCell::new(Vec::new()));
            let r = Rc::clone(&records);
            c.observe(move |batch| {
                r.borrow_mut().extend_from_slice(batch);
                Ok(())
            });
            for op in ops {
                let rows = |v: Vec<i64>| v.into_iter().map(row).collect::<Vec<_>>();
                let before = c.to_vec();
                let result = match op {
                    Op::Push(v) => c.push(rows(v)),
                    Op::Unshift(v) => c.unshift(rows(v)),
                    Op::Splice(i, n, v) => c.splice(i, n, rows(v)).map(drop),
                    Op::Reverse => {
                        c.reverse();
                        Ok(())
                    }
                };
                if result.is_err() {
                    prop_assert_eq!(&before, &c.to_vec());
                }
                prop_assert!(c.is_consistent());
                queue.run_until_idle(2);
                replay(&mut mirror, &records.borrow());
                records.borrow_mut().clear();
                prop_assert_eq!(&mirror, &c.to_vec());
            }
        }
    }
}
