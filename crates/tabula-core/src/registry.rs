#![forbid(unsafe_code)]

//! Name → function registries.
//!
//! Registries are plain values injected into whatever constructs comparators
//! or renderers. A registry always carries a declared default, so lookups
//! never fail: unknown names resolve to the default entry.
//!
//! # Invariants
//!
//! 1. The default entry is present for the lifetime of the registry.
//! 2. Re-registering a name replaces the previous entry (last write wins).

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::compare::{self, CompareFn};
use crate::value::Value;

/// A registry of shared functions of type `F`.
pub struct Registry<F: ?Sized> {
    entries: AHashMap<String, Rc<F>>,
    default_name: String,
    default: Rc<F>,
}

impl<F: ?Sized> Clone for Registry<F> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            default_name: self.default_name.clone(),
            default: Rc::clone(&self.default),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("default", &self.default_name)
            .field("names", &names)
            .finish()
    }
}

impl<F: ?Sized> Registry<F> {
    /// Create a registry whose default entry is `default`, registered under
    /// `default_name`.
    pub fn new(default_name: &str, default: Rc<F>) -> Self {
        let mut entries = AHashMap::new();
        entries.insert(default_name.to_owned(), Rc::clone(&default));
        Self {
            entries,
            default_name: default_name.to_owned(),
            default,
        }
    }

    /// Register `f` under `name`.
    pub fn register(&mut self, name: &str, f: Rc<F>) -> &mut Self {
        if name == self.default_name {
            self.default = Rc::clone(&f);
        }
        self.entries.insert(name.to_owned(), f);
        self
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Name of the default entry.
    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Look up `name`, falling back to the default entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Rc<F> {
        Rc::clone(self.entries.get(name).unwrap_or(&self.default))
    }

    /// The default entry.
    #[must_use]
    pub fn get_default(&self) -> Rc<F> {
        Rc::clone(&self.default)
    }
}

/// Registry of value comparators.
pub type ComparatorRegistry = Registry<dyn Fn(&Value, &Value) -> Ordering>;

/// Name of the type-inferring comparator.
pub const AUTO: &str = "$auto";

impl ComparatorRegistry {
    /// The built-in comparators: `$auto` (default), `$number`, `$boolean`,
    /// `$date` and `$string`.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new(AUTO, Rc::new(compare::auto_compare));
        registry
            .register("$number", Rc::new(compare::compare_number))
            .register("$boolean", Rc::new(compare::compare_bool))
            .register("$date", Rc::new(compare::compare_date))
            .register("$string", Rc::new(compare::compare_text));
        registry
    }

    /// Resolve a compare function by name.
    #[must_use]
    pub fn compare_fn(&self, name: &str) -> CompareFn {
        self.get(name)
    }
}
