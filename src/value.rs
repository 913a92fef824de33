//! Typed runtime values for the schema-driven codec.
//!
//! A [`Value`] mirrors a resolved [`Type`](crate::model::Type): structs keep field
//! names, enums keep the member name and unions keep their tag. The codec turns it into
//! the positional MessagePack form and back.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    /// Any signed integer primitive.
    Int(i64),
    /// Any unsigned integer primitive.
    UInt(u64),
    Float(f32),
    Double(f64),
    Str(String),
    Bin(Vec<u8>),
    /// The untyped `array` primitive, passed through as raw MessagePack.
    Array(Vec<rmpv::Value>),
    /// Enum member by name.
    Enum(String),
    Struct(HashMap<String, Value>),
    /// Active union variant: `tag` is the member index.
    Union { tag: usize, value: Box<Value> },
    List(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Build a struct value from `(field, value)` pairs.
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::Struct(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn union(tag: usize, value: Value) -> Value {
        Value::Union {
            tag,
            value: Box::new(value),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(x) => Some(*x),
            Value::Int(x) => (*x).try_into().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::UInt(x) => (*x).try_into().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Tuple(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(x: u64) -> Self {
        Value::UInt(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
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
