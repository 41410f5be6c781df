//! Cell value type stored by every storage backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId};
use crate::{Error, Result};

/// A single cell in a backend table.
///
/// Covers the scalars the kernel persists plus the two reference kinds:
/// - Scalars: Int, Float, String
/// - References: Node, Edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Node(NodeId),
    Edge(EdgeId),
}

/// Declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    Float,
    String,
    Node,
    Edge,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "INTEGER",
            ValueType::Float => "FLOAT",
            ValueType::String => "STRING",
            ValueType::Node => "NODE",
            ValueType::Edge => "EDGE",
        }
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            other => other.value_type().map_or("NULL", ValueType::name),
        }
    }

    /// The column type this value fits, `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::String(_) => Some(ValueType::String),
            Value::Node(_) => Some(ValueType::Node),
            Value::Edge(_) => Some(ValueType::Edge),
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Value::Edge(id) => Some(*id),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<NodeId> for Value { fn from(v: NodeId) -> Self { Value::Node(v) } }
impl From<EdgeId> for Value { fn from(v: EdgeId) -> Self { Value::Edge(v) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

/// Convert from a stored `Value` to a concrete type.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

fn type_error(expected: &str, got: &Value) -> Error {
    Error::TypeError {
        expected: expected.into(),
        got: got.type_name().into(),
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_str().map(str::to_owned).ok_or_else(|| type_error("String", val))
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| type_error("Integer", val))
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| type_error("Float", val))
    }
}

impl FromValue for NodeId {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_node().ok_or_else(|| type_error("Node", val))
    }
}

impl FromValue for EdgeId {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_edge().ok_or_else(|| type_error("Edge", val))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Node(id) => write!(f, "node({id})"),
            Value::Edge(id) => write!(f, "edge({id})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(2.5), Value::Float(2.5));
        assert_eq!(Value::from(NodeId(7)), Value::Node(NodeId(7)));
        assert_eq!(Value::from(None::<EdgeId>), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("ice").to_string(), "\"ice\"");
        assert_eq!(Value::Node(NodeId(3)).to_string(), "node(3)");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_from_value_reports_types() {
        let err = String::from_value(&Value::Int(3)).unwrap_err();
        assert!(matches!(err, Error::TypeError { ref got, .. } if got == "INTEGER"));
        assert_eq!(Option::<NodeId>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(f64::from_value(&Value::Int(2)).unwrap(), 2.0);
    }
}
