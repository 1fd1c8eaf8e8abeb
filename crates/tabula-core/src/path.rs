#![forbid(unsafe_code)]

//! Path resolvers: read and write one value of a record.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::record::FieldAccess;
use crate::value::Value;

/// Reads and writes one value of a record.
pub trait Accessor<T> {
    /// Resolve the value. Unresolvable paths read as nil.
    fn get(&self, record: &T) -> Value;

    /// Write the value back, returning `false` when the path is read-only or
    /// the record rejects the write.
    fn assign(&self, record: &mut T, value: Value) -> bool;
}

/// Accessor for a named field of a [`FieldAccess`] record.
pub struct FieldPath<T> {
    name: Rc<str>,
    _record: PhantomData<fn(&T)>,
}

impl<T> Clone for FieldPath<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            _record: PhantomData,
        }
    }
}

impl<T> FieldPath<T> {
    /// Address the field called `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            _record: PhantomData,
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> fmt::Debug for FieldPath<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({})", self.name)
    }
}

impl<T: FieldAccess> Accessor<T> for FieldPath<T> {
    fn get(&self, record: &T) -> Value {
        record.field(&self.name).cloned().unwrap_or_default()
    }

    fn assign(&self, record: &mut T, value: Value) -> bool {
        record.set_field(&self.name, value)
    }
}

type Getter<T> = dyn Fn(&T) -> Value;
type Setter<T> = dyn Fn(&mut T, Value) -> bool;

/// Accessor built from closures, for records that are not field-addressable.
pub struct FnAccessor<T> {
    get: Rc<Getter<T>>,
    set: Option<Rc<Setter<T>>>,
}

impl<T> Clone for FnAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            set: self.set.clone(),
        }
    }
}

impl<T> fmt::Debug for FnAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAccessor")
            .field("writable", &self.set.is_some())
            .finish()
    }
}

impl<T> FnAccessor<T> {
    /// Read-only accessor.
    pub fn new(get: impl Fn(&T) -> Value + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: None,
        }
    }

    /// Add a setter.
    #[must_use]
    pub fn with_setter(mut self, set: impl Fn(&mut T, Value) -> bool + 'static) -> Self {
        self.set = Some(Rc::new(set));
        self
    }
}

impl<T> Accessor<T> for FnAccessor<T> {
    fn get(&self, record: &T) -> Value {
        (self.get)(record)
    }

    fn assign(&self, record: &mut T, value: Value) -> bool {
        match &self.set {
            Some(set) => set(record, value),
            None => false,
        }
    }
}
