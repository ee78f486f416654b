//! Resolved argument values.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use clasp_core::Segment;

/// The value of one resolved argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A mentioned user id.
    At(String),
    /// An image reference.
    Image(String),
    /// Any other rich element.
    Element(Segment),
    List(Vec<ArgValue>),
    Map(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// A short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Str(_) => "str",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Bool(_) => "bool",
            ArgValue::At(_) => "at",
            ArgValue::Image(_) => "image",
            ArgValue::Element(_) => "element",
            ArgValue::List(_) => "list",
            ArgValue::Map(_) => "map",
        }
    }

    /// Converts a rich segment into a value.
    pub fn from_segment(segment: &Segment) -> Self {
        match segment {
            Segment::Text(s) => ArgValue::Str(s.clone()),
            Segment::At(id) => ArgValue::At(id.clone()),
            Segment::Image(r) => ArgValue::Image(r.clone()),
            other => ArgValue::Element(other.clone()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => write!(f, "{s}"),
            ArgValue::Int(i) => write!(f, "{i}"),
            ArgValue::Float(x) => write!(f, "{x}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::At(id) => write!(f, "@{id}"),
            ArgValue::Image(r) => write!(f, "[Image: {r}]"),
            ArgValue::Element(seg) => write!(f, "{seg}"),
            ArgValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ArgValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Int(i)
    }
}

impl From<f64> for ArgValue {
    fn from(x: f64) -> Self {
        ArgValue::Float(x)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// Types an [`ArgValue`] can be checked against and converted into.
///
/// The conversion is the type constraint: a value that does not convert is
/// treated as unavailable by the projection extractors.
pub trait FromArgValue: Sized + Send + 'static {
    fn from_arg_value(value: &ArgValue) -> Option<Self>;
}

impl FromArgValue for ArgValue {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromArgValue for String {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromArgValue for i64 {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        value.as_int()
    }
}

/// Integers widen to floats.
impl FromArgValue for f64 {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(x) => Some(*x),
            ArgValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromArgValue for bool {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromArgValue for Segment {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::At(id) => Some(Segment::At(id.clone())),
            ArgValue::Image(r) => Some(Segment::Image(r.clone())),
            ArgValue::Element(seg) => Some(seg.clone()),
            _ => None,
        }
    }
}

impl<T: FromArgValue> FromArgValue for Vec<T> {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::List(items) => items.iter().map(T::from_arg_value).collect(),
            _ => None,
        }
    }
}

impl FromArgValue for BTreeMap<String, ArgValue> {
    fn from_arg_value(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Map(map) => Some(map.clone()),
            _ => None,
        }
    }
}
