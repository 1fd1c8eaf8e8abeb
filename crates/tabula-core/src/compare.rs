#![forbid(unsafe_code)]

//! Comparator engine.
//!
//! Resolves sort descriptors into a single composite comparator with a stable
//! total order.
//!
//! # Type Inference
//!
//! [`auto_compare`] picks a typed comparator by looking at both operands in
//! precision order `Number > Bool > Date > Text`: the first kind that either
//! operand has wins, and both operands are coerced to it (nil coerces to the
//! neutral value, see [`crate::value`]).
//!
//! ```
//! use std::cmp::Ordering;
//! use tabula_core::compare::auto_compare;
//! use tabula_core::Value;
//!
//! assert_eq!(auto_compare(&Value::from(1), &Value::from("1")), Ordering::Equal);
//! assert_eq!(auto_compare(&Value::from(1), &Value::from("2")), Ordering::Less);
//! ```
//!
//! # Invariants
//!
//! 1. A [`Comparator`] evaluates descriptors left to right and returns the
//!    first non-equal result, reversed for descending descriptors.
//! 2. When every descriptor reports equality, elements keep their original
//!    relative position. [`Comparator::sorted_order`] enforces this itself, so
//!    the result does not depend on the stability of the underlying sort.
//! 3. [`Comparator::insertion_point`] places a new element after every
//!    existing element that compares equal to it.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::path::Accessor;
use crate::value::{Value, ValueType};

/// Shared compare function over two values.
pub type CompareFn = Rc<dyn Fn(&Value, &Value) -> Ordering>;

// =============================================================================
// Typed comparators
// =============================================================================

/// Numeric comparison. Unordered operands (`NaN`) compare equal.
#[must_use]
pub fn compare_number(x: &Value, y: &Value) -> Ordering {
    x.to_number()
        .partial_cmp(&y.to_number())
        .unwrap_or(Ordering::Equal)
}

/// Boolean comparison, `false < true`.
#[must_use]
pub fn compare_bool(x: &Value, y: &Value) -> Ordering {
    x.to_bool().cmp(&y.to_bool())
}

/// Date comparison on epoch milliseconds.
#[must_use]
pub fn compare_date(x: &Value, y: &Value) -> Ordering {
    x.to_date().cmp(&y.to_date())
}

/// Lexicographic text comparison.
#[must_use]
pub fn compare_text(x: &Value, y: &Value) -> Ordering {
    x.to_text().cmp(&y.to_text())
}

/// Type-inferring comparison.
///
/// Returns `Equal` when the operands are identical or both nil; otherwise
/// delegates to the typed comparator of the most precise kind either operand
/// has.
#[must_use]
pub fn auto_compare(x: &Value, y: &Value) -> Ordering {
    if x == y || (x.is_null() && y.is_null()) {
        return Ordering::Equal;
    }
    let inferred = ValueType::PRECISION_ORDER
        .into_iter()
        .find(|ty| x.value_type() == Some(*ty) || y.value_type() == Some(*ty));
    match inferred {
        Some(ValueType::Number) => compare_number(x, y),
        Some(ValueType::Bool) => compare_bool(x, y),
        Some(ValueType::Date) => compare_date(x, y),
        Some(ValueType::Text) => compare_text(x, y),
        None => Ordering::Equal,
    }
}

// =============================================================================
// Sort descriptors
// =============================================================================

type Extractor<T> = dyn Fn(&T) -> Value;

/// One sort criterion: which value to extract, how to compare it, and in
/// which direction.
pub struct SortDescriptor<T> {
    field_id: Rc<str>,
    extract: Rc<Extractor<T>>,
    compare: CompareFn,
    ascending: bool,
}

impl<T> Clone for SortDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            field_id: Rc::clone(&self.field_id),
            extract: Rc::clone(&self.extract),
            compare: Rc::clone(&self.compare),
            ascending: self.ascending,
        }
    }
}

impl<T> fmt::Debug for SortDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortDescriptor")
            .field("field_id", &self.field_id)
            .field("ascending", &self.ascending)
            .finish()
    }
}

impl<T: 'static> SortDescriptor<T> {
    /// Ascending descriptor using [`auto_compare`].
    pub fn new(field_id: &str, extract: impl Fn(&T) -> Value + 'static) -> Self {
        Self {
            field_id: Rc::from(field_id),
            extract: Rc::new(extract),
            compare: Rc::new(auto_compare),
            ascending: true,
        }
    }

    /// Ascending descriptor reading values through an [`Accessor`].
    pub fn from_accessor(field_id: &str, accessor: Rc<dyn Accessor<T>>) -> Self {
        Self::new(field_id, move |record: &T| accessor.get(record))
    }

    /// Set the direction.
    #[must_use]
    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    /// Sort descending.
    #[must_use]
    pub fn descending(self) -> Self {
        self.ascending(false)
    }

    /// Replace the compare function.
    #[must_use]
    pub fn with_compare(mut self, compare: CompareFn) -> Self {
        self.compare = compare;
        self
    }
}

impl<T> SortDescriptor<T> {
    /// Identifier of the field this descriptor sorts on.
    #[must_use]
    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Whether the descriptor sorts ascending.
    #[must_use]
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Extract the sort value of `record`.
    pub fn extract(&self, record: &T) -> Value {
        (self.extract)(record)
    }

    fn compare_values(&self, a: &Value, b: &Value) -> Ordering {
        let ord = (self.compare)(a, b);
        if self.ascending { ord } else { ord.reverse() }
    }
}

// =============================================================================
// Composite comparator
// =============================================================================

/// Composite comparator chaining [`SortDescriptor`]s.
pub struct Comparator<T> {
    descriptors: Vec<SortDescriptor<T>>,
}

impl<T> Clone for Comparator<T> {
    fn clone(&self) -> Self {
        Self {
            descriptors: self.descriptors.clone(),
        }
    }
}

impl<T> fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.descriptors).finish()
    }
}

impl<T> Default for Comparator<T> {
    fn default() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }
}

impl<T> Comparator<T> {
    /// Build from descriptors, evaluated in order.
    #[must_use]
    pub fn new(descriptors: Vec<SortDescriptor<T>>) -> Self {
        Self { descriptors }
    }

    /// Single-descriptor comparator.
    #[must_use]
    pub fn by(descriptor: SortDescriptor<T>) -> Self {
        Self::new(vec![descriptor])
    }

    /// Append a tie-breaking descriptor.
    #[must_use]
    pub fn then(mut self, descriptor: SortDescriptor<T>) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// The descriptors, in evaluation order.
    #[must_use]
    pub fn descriptors(&self) -> &[SortDescriptor<T>] {
        &self.descriptors
    }

    /// Whether there is nothing to sort on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The same comparator with every direction flipped.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            descriptors: self
                .descriptors
                .iter()
                .map(|d| {
                    let mut d = d.clone();
                    d.ascending = !d.ascending;
                    d
                })
                .collect(),
        }
    }

    /// Compare two records on the descriptors alone (no positional fallback).
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for descriptor in &self.descriptors {
            let ord = descriptor.compare_values(&descriptor.extract(a), &descriptor.extract(b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn compare_extracted(&self, a: &[Value], b: &[Value]) -> Ordering {
        self.descriptors
            .iter()
            .zip(a.iter().zip(b))
            .map(|(d, (x, y))| d.compare_values(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// The permutation that sorts `items`: `order[i]` is the original index
    /// of the element that ends up at position `i`.
    ///
    /// Stable. Compare functions need not be a total order (`auto_compare`
    /// over mixed numbers and text is not); the result is then some
    /// permutation, never a panic.
    pub fn sorted_order(&self, items: &[T]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..items.len()).collect();
        if self.descriptors.is_empty() {
            return order;
        }
        let extracted: Vec<Vec<Value>> = items
            .iter()
            .map(|item| self.descriptors.iter().map(|d| d.extract(item)).collect())
            .collect();
        merge_sort_by(&mut order, |a, b| {
            self.compare_extracted(&extracted[a], &extracted[b])
        });
        order
    }

    /// Sort `items` in place. Returns `true` when the order changed.
    pub fn sort_stable(&self, items: &mut Vec<T>) -> bool {
        let order = self.sorted_order(items);
        if order.iter().enumerate().all(|(pos, &orig)| pos == orig) {
            return false;
        }
        let mut slots: Vec<Option<T>> = items.drain(..).map(Some).collect();
        items.extend(order.iter().filter_map(|&i| slots[i].take()));
        true
    }

    /// Position at which `item` must be inserted into the sorted `items` so
    /// that it lands after every element comparing equal to it.
    pub fn insertion_point(&self, items: &[T], item: &T) -> usize {
        items.partition_point(|existing| self.compare(existing, item) != Ordering::Greater)
    }
}

/// Bottom-up stable merge sort of `order`. Only ever asks whether the right
/// element is strictly less than the left one, so inconsistent answers
/// degrade the order without breaking the permutation.
fn merge_sort_by(order: &mut Vec<usize>, compare: impl Fn(usize, usize) -> Ordering) {
    let len = order.len();
    let mut scratch = order.clone();
    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right) = (start, mid);
            let mut out = start;
            while left < mid && right < end {
                if compare(order[right], order[left]) == Ordering::Less {
                    scratch[out] = order[right];
                    right += 1;
                } else {
                    scratch[out] = order[left];
                    left += 1;
                }
                out += 1;
            }
            let rest = mid - left;
            scratch[out..out + rest].copy_from_slice(&order[left..mid]);
            out += rest;
            scratch[out..end].copy_from_slice(&order[right..end]);
            start = end;
        }
        std::mem::swap(order, &mut scratch);
        width *= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        id: i64,
        team: &'static str,
        age: i64,
    }

    fn p(id: i64, team: &'static str, age: i64) -> Person {
        Person { id, team, age }
    }

    fn by_team() -> SortDescriptor<Person> {
        SortDescriptor::new("team", |p: &Person| Value::from(p.team))
    }

    fn by_age() -> SortDescriptor<Person> {
        SortDescriptor::new("age", |p: &Person| Value::from(p.age))
    }

    #[test]
    fn auto_number_vs_text() {
        assert_eq!(auto_compare(&Value::from(1), &Value::from("1")), Ordering::Equal);
        assert_eq!(auto_compare(&Value::from(1), &Value::from("2")), Ordering::Less);
        assert_eq!(auto_compare(&Value::from("10"), &Value::from(9)), Ordering::Greater);
    }

    #[test]
    fn auto_identical_and_nil() {
        assert_eq!(auto_compare(&Value::Null, &Value::Null), Ordering::Equal);
        assert_eq!(auto_compare(&Value::text("a"), &Value::text("a")), Ordering::Equal);
    }

    #[test]
    fn auto_nil_coerces_to_neutral() {
        assert_eq!(auto_compare(&Value::Null, &Value::from(1)), Ordering::Less);
        assert_eq!(auto_compare(&Value::Null, &Value::from(0)), Ordering::Equal);
        assert_eq!(auto_compare(&Value::Bool(true), &Value::Null), Ordering::Greater);
        assert_eq!(auto_compare(&Value::Null, &Value::text("")), Ordering::Equal);
    }

    #[test]
    fn auto_precision_order() {
        // Bool outranks Date and Text.
        assert_eq!(auto_compare(&Value::Bool(false), &Value::text("x")), Ordering::Less);
        // Date outranks Text.
        assert_eq!(auto_compare(&Value::Date(5), &Value::text("4")), Ordering::Greater);
        assert_eq!(auto_compare(&Value::text("b"), &Value::text("a")), Ordering::Greater);
    }

    #[test]
    fn auto_nan_is_equal() {
        assert_eq!(auto_compare(&Value::from(3), &Value::text("abc")), Ordering::Equal);
    }

    #[test]
    fn composite_uses_first_non_equal() {
        let cmp = Comparator::by(by_team()).then(by_age());
        assert_eq!(cmp.compare(&p(1, "a", 40), &p(2, "b", 1)), Ordering::Less);
        assert_eq!(cmp.compare(&p(1, "a", 40), &p(2, "a", 1)), Ordering::Greater);
    }

    #[test]
    fn descending_reverses() {
        let cmp = Comparator::by(by_age().descending());
        assert_eq!(cmp.compare(&p(1, "a", 1), &p(2, "a", 2)), Ordering::Greater);
        assert_eq!(cmp.reversed().compare(&p(1, "a", 1), &p(2, "a", 2)), Ordering::Less);
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let cmp = Comparator::by(by_team());
        let mut people = vec![p(1, "b", 0), p(2, "a", 0), p(3, "b", 0), p(4, "a", 0)];
        assert!(cmp.sort_stable(&mut people));
        let ids: Vec<_> = people.iter().map(|p| p.id).collect();
        assert_eq!(ids, [2, 4, 1, 3]);
    }

    #[test]
    fn sorting_sorted_input_reports_no_change() {
        let cmp = Comparator::by(by_age());
        let mut people = vec![p(1, "a", 1), p(2, "a", 1), p(3, "a", 5)];
        assert!(!cmp.sort_stable(&mut people));
    }

    #[test]
    fn empty_comparator_keeps_order() {
        let cmp = Comparator::<Person>::default();
        assert!(cmp.is_empty());
        assert_eq!(cmp.sorted_order(&[p(2, "a", 0), p(1, "a", 0)]), [0, 1]);
    }

    #[test]
    fn insertion_point_goes_after_equals() {
        let cmp = Comparator::by(by_age());
        let people = vec![p(1, "a", 1), p(2, "a", 5), p(3, "a", 5), p(4, "a", 9)];
        assert_eq!(cmp.insertion_point(&people, &p(9, "a", 5)), 3);
        assert_eq!(cmp.insertion_point(&people, &p(9, "a", 0)), 0);
        assert_eq!(cmp.insertion_point(&people, &p(9, "a", 10)), 4);
    }

    proptest! {
        #[test]
        fn sorted_order_matches_std_stable_sort(ages in proptest::collection::vec(0i64..5, 0..40)) {
            let people: Vec<Person> = ages
                .iter()
                .enumerate()
                .map(|(i, a)| p(i as i64, "t", *a))
                .collect();
            let cmp = Comparator::by(by_age());
            let order = cmp.sorted_order(&people);

            let mut expected: Vec<usize> = (0..people.len()).collect();
            expected.sort_by_key(|&i| people[i].age);
            prop_assert_eq!(order, expected);
        }
    }

    #[test]
    fn mixed_numbers_and_text_sort_without_panicking() {
        let values: Vec<Value> = (0..2000)
            .map(|i| {
                if i % 3 == 0 {
                    Value::from(format!("w{}", (i * 7919) % 2000))
                } else {
                    Value::from((i * 104_729) % 2000)
                }
            })
            .collect();
        let cmp = Comparator::by(SortDescriptor::new("v", |v: &Value| v.clone()));
        let mut order = cmp.sorted_order(&values);
        assert_eq!(order.len(), values.len());
        order.sort_unstable();
        assert!(order.iter().enumerate().all(|(pos, &i)| pos == i));

        let mut sorted = values.clone();
        cmp.sort_stable(&mut sorted);
        assert_eq!(sorted.len(), values.len());
    }
}
