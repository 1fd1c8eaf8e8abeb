#![forbid(unsafe_code)]

//! Dynamic scalar values.
//!
//! [`Value`] is what value extractors, field paths and column models hand to
//! the comparator engine and the renderers. It deliberately mirrors the small
//! set of scalar kinds a table cell can hold.
//!
//! # Coercion
//!
//! Every value can be coerced to every scalar kind. Nil coerces to the
//! neutral value of the target kind:
//!
//! | Target | Nil | Number | Bool | Date | Text |
//! |--------|-----|--------|------|------|------|
//! | number | `0` | itself | `0`/`1` | epoch millis | parsed, `NaN` on failure |
//! | bool | `false` | `!= 0` | itself | `true` | non-empty |
//! | date | epoch | truncated | `0`/`1` | itself | parsed millis, epoch on failure |
//! | text | `""` | display | `"true"`/`"false"` | millis | itself |

use std::borrow::Cow;
use std::fmt;

/// A dynamic scalar.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Floating point number.
    Number(f64),
    /// Boolean.
    Bool(bool),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    /// Text.
    Text(String),
}

/// Scalar kinds, listed in inference precision order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Number,
    Bool,
    Date,
    Text,
}

impl ValueType {
    /// Kinds in the order the comparator engine tests them.
    pub const PRECISION_ORDER: [ValueType; 4] = [
        ValueType::Number,
        ValueType::Bool,
        ValueType::Date,
        ValueType::Text,
    ];
}

impl Value {
    /// Build a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Whether this is [`Value::Null`].
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The scalar kind, or `None` for nil.
    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null => None,
            Self::Number(_) => Some(ValueType::Number),
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Date(_) => Some(ValueType::Date),
            Self::Text(_) => Some(ValueType::Text),
        }
    }

    /// Coerce to a number.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Number(n) => *n,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Date(ms) => *ms as f64,
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
        }
    }

    /// Coerce to a boolean.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::Date(_) => true,
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Coerce to epoch milliseconds.
    #[must_use]
    pub fn to_date(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Number(n) if n.is_finite() => n.trunc() as i64,
            Self::Number(_) => 0,
            Self::Bool(b) => i64::from(*b),
            Self::Date(ms) => *ms,
            Self::Text(s) => s.trim().parse::<i64>().unwrap_or(0),
        }
    }

    /// Coerce to text.
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// Format a number the way a table cell shows it: integral values carry no
/// fractional part.
pub(crate) fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(n) => format_number(*n, f),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(ms) => write!(f, "{ms}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::from(1).to_string(), "1");
        assert_eq!(Value::from(-42.0).to_string(), "-42");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn nil_coerces_to_neutral_values() {
        let nil = Value::Null;
        assert_eq!(nil.to_number(), 0.0);
        assert!(!nil.to_bool());
        assert_eq!(nil.to_date(), 0);
        assert_eq!(nil.to_text(), "");
    }

    #[test]
    fn text_coerces_to_number() {
        assert_eq!(Value::text(" 12 ").to_number(), 12.0);
        assert_eq!(Value::text("").to_number(), 0.0);
        assert!(Value::text("abc").to_number().is_nan());
    }

    #[test]
    fn bool_coercions() {
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert!(Value::from(3).to_bool());
        assert!(!Value::Number(f64::NAN).to_bool());
        assert!(Value::text("x").to_bool());
    }

    #[test]
    fn date_coercions() {
        assert_eq!(Value::from(12.9).to_date(), 12);
        assert_eq!(Value::text("1700000000000").to_date(), 1_700_000_000_000);
        assert_eq!(Value::text("yesterday").to_date(), 0);
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::text("a"));
    }

    #[test]
    fn value_type_follows_variant() {
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::Date(5).value_type(), Some(ValueType::Date));
    }
}
