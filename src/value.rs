use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::ast::Node;

/// A plain-old-data value as it appears in configuration input.
///
/// Scalars are the leaves of every surface form: a bare scalar resolves to a
/// `literal` node, and scalar payloads fill the arguments of terminal nodes.
/// Unlike YAML, the distinction between integers and floats is preserved.
///
/// # Examples
///
/// ```
/// use sprig_lang::Scalar;
///
/// let n = Scalar::Int(42);
/// assert_eq!(n.type_name(), "int");
/// assert!(Scalar::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Absent value (YAML `null` / `~`)
    Null,

    /// Boolean (true/false)
    Bool(bool),

    /// Integer number (preserved separately from floats)
    Int(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    Str(String),

    /// Naive timestamp (no timezone)
    Timestamp(NaiveDateTime),
}

impl Scalar {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
            Scalar::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Get as string slice, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer, if this is an integer scalar.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean, if this is a boolean scalar.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Str(s) => write!(f, "'{}'", s),
            Scalar::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Float(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

/// An unresolved surface value: the input to the resolver.
///
/// Raw values come from three places and meet in one representation:
/// YAML/JSON configuration (scalars, lists, mappings), the string grammar
/// (short-form mappings plus `Name` for bare identifiers), and callers that
/// already hold a constructed [`Node`] (class-form).
///
/// # Examples
///
/// ```
/// use sprig_lang::{RawValue, Scalar};
///
/// let raw = RawValue::short_form("add", RawValue::List(vec![
///     RawValue::Scalar(Scalar::Int(1)),
///     RawValue::Scalar(Scalar::Int(2)),
/// ]));
/// assert!(raw.as_map().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A plain-old-data scalar
    Scalar(Scalar),

    /// A sequence of raw values
    List(Vec<RawValue>),

    /// A mapping with string keys
    Map(BTreeMap<String, RawValue>),

    /// An already-constructed node (class-form)
    Node(Node),

    /// A bare identifier parsed by the grammar, not yet disambiguated
    /// between a column reference and a string literal
    Name(String),
}

impl RawValue {
    /// Convenience constructor for string scalars.
    pub fn str(s: impl Into<String>) -> Self {
        RawValue::Scalar(Scalar::Str(s.into()))
    }

    /// Convenience constructor for integer scalars.
    pub fn int(n: i64) -> Self {
        RawValue::Scalar(Scalar::Int(n))
    }

    /// Build a short-form mapping `{key: payload}`.
    pub fn short_form(key: impl Into<String>, payload: RawValue) -> Self {
        let mut map = BTreeMap::new();
        map.insert(key.into(), payload);
        RawValue::Map(map)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            RawValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, RawValue>> {
        match self {
            RawValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// If this is a single-key mapping, return that key and its payload.
    pub fn single_entry(&self) -> Option<(&str, &RawValue)> {
        match self {
            RawValue::Map(m) if m.len() == 1 => {
                m.iter().next().map(|(k, v)| (k.as_str(), v))
            }
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Scalar(s) => write!(f, "{}", s),
            RawValue::Name(n) => write!(f, "{}", n),
            RawValue::Node(node) => write!(f, "{:?}", node),
            RawValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            RawValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
