#![forbid(unsafe_code)]

//! Record keys and key selectors.
//!
//! A [`Key`] is the unique, stable scalar that identifies a record inside an
//! indexed collection. A [`KeySelector`] derives it from a record, either from
//! a named field or from an arbitrary function.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Nil key | Field missing or `Value::Null` | [`KeyError::Null`] |

use std::fmt;
use std::rc::Rc;

use crate::path::{Accessor, FieldPath};
use crate::record::FieldAccess;
use crate::value::Value;

/// Unique record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Key {
    Int(i64),
    Text(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Marks a text key whose plain form would be ambiguous.
const TEXT_MARK: char = '\'';

impl Key {
    /// Attribute form of the key, distinct for distinct keys.
    ///
    /// Integer keys print as their digits. Text keys print as-is unless the
    /// text would read back as an integer or starts with `'`; those gain a
    /// leading `'`.
    #[must_use]
    pub fn to_attribute(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Text(s) if s.starts_with(TEXT_MARK) || is_canonical_int(s) => {
                format!("{TEXT_MARK}{s}")
            }
            Self::Text(s) => s.clone(),
        }
    }

    /// Inverse of [`to_attribute`](Self::to_attribute).
    #[must_use]
    pub fn from_attribute(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix(TEXT_MARK) {
            return Self::Text(rest.to_owned());
        }
        match text.parse::<i64>() {
            Ok(n) if is_canonical_int(text) => Self::Int(n),
            _ => Self::Text(text.to_owned()),
        }
    }
}

fn is_canonical_int(s: &str) -> bool {
    s.parse::<i64>().is_ok_and(|n| n.to_string() == s)
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Errors from deriving a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The selector produced nil.
    Null { selector: String },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null { selector } => write!(f, "key selector '{selector}' produced nil"),
        }
    }
}

impl std::error::Error for KeyError {}

impl TryFrom<&Value> for Key {
    type Error = KeyError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(KeyError::Null {
                selector: String::new(),
            }),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Ok(Key::Int(*n as i64)),
            Value::Date(ms) => Ok(Key::Int(*ms)),
            Value::Text(s) => Ok(Key::Text(s.clone())),
            other => Ok(Key::Text(other.to_string())),
        }
    }
}

type SelectFn<T> = dyn Fn(&T) -> Result<Key, KeyError>;

/// Derives a [`Key`] from a record.
pub struct KeySelector<T> {
    label: Rc<str>,
    select: Rc<SelectFn<T>>,
}

impl<T> Clone for KeySelector<T> {
    fn clone(&self) -> Self {
        Self {
            label: Rc::clone(&self.label),
            select: Rc::clone(&self.select),
        }
    }
}

impl<T> fmt::Debug for KeySelector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySelector")
            .field("label", &self.label)
            .finish()
    }
}

impl<T: 'static> KeySelector<T> {
    /// Select keys with an infallible function.
    pub fn new(label: &str, f: impl Fn(&T) -> Key + 'static) -> Self {
        Self {
            label: Rc::from(label),
            select: Rc::new(move |record: &T| Ok(f(record))),
        }
    }

    /// Select keys with a fallible function.
    pub fn try_new(label: &str, f: impl Fn(&T) -> Result<Key, KeyError> + 'static) -> Self {
        Self {
            label: Rc::from(label),
            select: Rc::new(f),
        }
    }

    /// Name of the selector, used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Derive the key of `record`.
    pub fn key_of(&self, record: &T) -> Result<Key, KeyError> {
        (self.select)(record)
    }
}

impl<T: FieldAccess + 'static> KeySelector<T> {
    /// Select keys from a named field.
    pub fn field(name: &str) -> Self {
        let path = FieldPath::<T>::new(name);
        let label = name.to_owned();
        Self::try_new(name, move |record: &T| {
            Key::try_from(&path.get(record)).map_err(|_| KeyError::Null {
                selector: label.clone(),
            })
        })
    }
}
