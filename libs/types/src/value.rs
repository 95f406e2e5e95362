//! Pass-by-value payloads
//!
//! A [`Value`] is data that crosses the boundary by copy. Primitive values,
//! strings, byte blobs, arrays of values and records of whitelisted
//! pass-by-value types all travel this way and never obtain a handle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Runtime type names of the built-in value kinds
pub mod type_names {
    pub const NULL: &str = "null";
    pub const BOOL: &str = "bool";
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const STRING: &str = "string";
    pub const BYTES: &str = "bytes";
    pub const ARRAY: &str = "array";

    /// All built-in value type names
    pub const ALL: [&str; 7] = [NULL, BOOL, INT, FLOAT, STRING, BYTES, ARRAY];
}

/// Data transmitted by copying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// Field-wise copy of a whitelisted pass-by-value type
    Record {
        type_name: String,
        fields: BTreeMap<String, Value>,
    },
}

/// Raised when a value is read as the wrong kind
#[derive(Debug, Error, Clone, PartialEq)]
#[error("expected {expected}, found {found}")]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: String,
}

impl Value {
    /// Runtime type name used for overload resolution and diagnostics
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => type_names::NULL,
            Value::Bool(_) => type_names::BOOL,
            Value::Int(_) => type_names::INT,
            Value::Float(_) => type_names::FLOAT,
            Value::Str(_) => type_names::STRING,
            Value::Bytes(_) => type_names::BYTES,
            Value::Array(_) => type_names::ARRAY,
            Value::Record { type_name, .. } => type_name,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Result<bool, ValueTypeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch(type_names::BOOL)),
        }
    }

    pub fn as_int(&self) -> Result<i64, ValueTypeError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch(type_names::INT)),
        }
    }

    /// Reads a float, widening integers
    pub fn as_float(&self) -> Result<f64, ValueTypeError> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(other.mismatch(type_names::FLOAT)),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueTypeError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch(type_names::STRING)),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], ValueTypeError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(other.mismatch(type_names::ARRAY)),
        }
    }

    /// Builds a record value for a whitelisted pass-by-value type
    pub fn record<I, K>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ValueTypeError {
        ValueTypeError {
            expected,
            found: self.type_name().to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record { type_name, fields } => {
                write!(f, "{} {{", type_name)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
