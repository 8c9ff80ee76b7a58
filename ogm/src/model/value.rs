use std::{collections::BTreeMap, fmt};

use crate::{
    error::{Error, OgmResult},
    model::graph::Node,
};

/// A graph value, as produced in a result column or stored as a property.
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Node),
}

impl Value {
    /// Returns the name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerces this value into `T`. See [`FromValue`].
    pub fn try_into_typed<T: FromValue>(self) -> OgmResult<T> {
        T::from_value(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(inner) => fmt::Display::fmt(inner, f),
            Value::Int(inner) => fmt::Display::fmt(inner, f),
            Value::Float(inner) => fmt::Display::fmt(inner, f),
            Value::Text(inner) => fmt::Display::fmt(inner, f),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Display::fmt(item, f)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Node(node) => fmt::Display::fmt(node, f),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(inner) => fmt::Debug::fmt(inner, f),
            Value::Int(inner) => fmt::Debug::fmt(inner, f),
            Value::Float(inner) => fmt::Debug::fmt(inner, f),
            Value::Text(inner) => fmt::Debug::fmt(inner, f),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(entries) => f.debug_map().entries(entries).finish(),
            Value::Node(node) => fmt::Debug::fmt(node, f),
        }
    }
}

impl From<bool> for Value {
    fn from(inner: bool) -> Value {
        Value::Bool(inner)
    }
}

impl From<i64> for Value {
    fn from(inner: i64) -> Value {
        Value::Int(inner)
    }
}

impl From<i32> for Value {
    fn from(inner: i32) -> Value {
        Value::Int(inner.into())
    }
}

impl From<f64> for Value {
    fn from(inner: f64) -> Value {
        Value::Float(inner)
    }
}

impl From<String> for Value {
    fn from(inner: String) -> Value {
        Value::Text(inner)
    }
}

impl From<&str> for Value {
    fn from(inner: &str) -> Value {
        Value::Text(inner.to_owned())
    }
}

impl From<Node> for Value {
    fn from(inner: Node) -> Value {
        Value::Node(inner)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(inner: Option<T>) -> Value {
        inner.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(inner: Vec<T>) -> Value {
        Value::List(inner.into_iter().map(Into::into).collect())
    }
}

/// Typed coercion out of a [`Value`].
///
/// Coercion never converts between kinds, except for the `int -> float`
/// widening.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> OgmResult<Self>;
}

fn mismatch<T>(expected: &'static str, actual: &Value) -> OgmResult<T> {
    Err(Error::decoding(format!(
        "expected a value of kind `{expected}`, but got `{}`",
        actual.kind()
    )))
}

impl FromValue for Value {
    fn from_value(value: Value) -> OgmResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::Bool(inner) => Ok(inner),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::Int(inner) => Ok(inner),
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::Float(inner) => Ok(inner),
            Value::Int(inner) => Ok(inner as f64),
            other => mismatch("float", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::Text(inner) => Ok(inner),
            other => mismatch("text", &other),
        }
    }
}

impl FromValue for Node {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::Node(inner) => Ok(inner),
            other => mismatch("node", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> OgmResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => mismatch("list", &other),
        }
    }
}
