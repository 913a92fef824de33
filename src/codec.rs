//! Encode/decode typed values and RPC messages against a resolved model.
//!
//! Wire rules:
//!
//! - integers, floats, bools, strings, binaries and nil map to MessagePack primitives;
//! - enums are their integer value;
//! - structs are positional arrays in field declaration order;
//! - unions are `[tag, value]` with the zero-based member index as tag;
//! - lists and tuples are arrays;
//! - calls and signals are `[messageid | nil, id, args...]`, responses are
//!   `[messageid, returnValue...]` (a tuple return type is spliced into the array).
//!
//! The MessagePack byte format itself is handled by `rmpv`.

use crate::ast::FunctionKind;
use crate::model::{FunctionDef, Model, Primitive, Type};
use crate::value::Value;
use rmpv::Value as Wire;
use std::collections::HashMap;
use std::io::Cursor;

/// Malformed or ill-typed input. Always recoverable: nothing is defaulted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },
    #[error("expected array of {expected} element(s), found {found}")]
    Length { expected: usize, found: usize },
    #[error("{value} is not a value of enum `{name}`")]
    UnknownEnumValue { name: String, value: i128 },
    #[error("tag {tag} out of range for union `{name}` with {members} member(s)")]
    UnionTag {
        name: String,
        tag: u64,
        members: usize,
    },
    #[error("integer {value} out of range for {ty}")]
    IntegerRange { value: i128, ty: &'static str },
    #[error("invalid UTF-8 in string")]
    Utf8,
    #[error("unknown {kind} id {id}")]
    UnknownFunction { kind: &'static str, id: u64 },
    #[error("`{name}` is fire-and-forget but carries message id {id}")]
    UnexpectedMessageId { name: String, id: u64 },
    #[error("`{name}` expects a response but has no message id")]
    MissingMessageId { name: String },
    #[error("malformed MessagePack: {0}")]
    Malformed(String),
    #[error("{0} trailing byte(s) after message")]
    TrailingBytes(usize),
    #[error("{field}: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    pub fn in_field(self, field: impl Into<String>) -> Self {
        DecodeError::InField {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, without field context.
    pub fn root(&self) -> &DecodeError {
        match self {
            DecodeError::InField { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A value that does not fit its declared type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("expected {expected}, found {found:?}")]
    Mismatch { expected: String, found: Value },
    #[error("struct `{name}` is missing field `{field}`")]
    MissingField { name: String, field: String },
    #[error("struct `{name}` has no field `{field}`")]
    UnknownField { name: String, field: String },
    #[error("enum `{name}` has no member `{member}`")]
    UnknownEnumMember { name: String, member: String },
    #[error("tag {tag} out of range for union `{name}` with {members} member(s)")]
    UnionTag {
        name: String,
        tag: usize,
        members: usize,
    },
    #[error("integer {value} out of range for {ty}")]
    IntegerRange { value: i128, ty: &'static str },
    #[error("`{0}` takes {1} argument(s), got {2}")]
    Arity(String, usize, usize),
    #[error("`fireandforget` has no value encoding")]
    FireAndForget,
    #[error("`{0}` expects a response and needs a message id")]
    MissingMessageId(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("{field}: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<CodecError>,
    },
    #[error("write: {0}")]
    Write(String),
}

impl CodecError {
    fn in_field(self, field: impl Into<String>) -> Self {
        CodecError::InField {
            field: field.into(),
            source: Box::new(self),
        }
    }
}

/// An incoming call or signal, arguments decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub message_id: Option<u64>,
    pub kind: FunctionKind,
    /// Method or signal id; indexes [`Model::functions`].
    pub id: u32,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct Codec<'m> {
    model: &'m Model,
}

impl<'m> Codec<'m> {
    pub fn new(model: &'m Model) -> Self {
        Codec { model }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Encode a value of a declared type by name.
    pub fn encode_named(&self, type_name: &str, value: &Value) -> Result<Wire, CodecError> {
        let ty = self
            .model
            .type_named(type_name)
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))?;
        self.encode(&ty, value)
    }

    /// Decode a value of a declared type by name.
    pub fn decode_named(&self, type_name: &str, wire: &Wire) -> Result<Value, DecodeError> {
        let ty = self.model.type_named(type_name).ok_or_else(|| DecodeError::TypeMismatch {
            expected: format!("declared type `{}`", type_name),
            found: "unknown type",
        })?;
        self.decode(&ty, wire)
    }

    pub fn encode(&self, ty: &Type, value: &Value) -> Result<Wire, CodecError> {
        let mismatch = || CodecError::Mismatch {
            expected: self.model.display_type(ty).to_string(),
            found: value.clone(),
        };
        match ty {
            Type::Primitive(p) => self.encode_primitive(*p, value).ok_or_else(mismatch)?,
            Type::Enum(id) => {
                let def = self.model.enum_def(*id);
                let Value::Enum(member) = value else {
                    return Err(mismatch());
                };
                let m = def.member_by_name(member).ok_or_else(|| CodecError::UnknownEnumMember {
                    name: def.name.clone(),
                    member: member.clone(),
                })?;
                Ok(Wire::from(m.value))
            }
            Type::Struct(id) => {
                let def = self.model.struct_def(*id);
                let Value::Struct(fields) = value else {
                    return Err(mismatch());
                };
                if let Some(extra) = fields.keys().find(|k| def.fields.iter().all(|f| &f.name != *k)) {
                    return Err(CodecError::UnknownField {
                        name: def.name.clone(),
                        field: extra.clone(),
                    });
                }
                let mut out = Vec::with_capacity(def.fields.len());
                for f in &def.fields {
                    let v = fields.get(&f.name).ok_or_else(|| CodecError::MissingField {
                        name: def.name.clone(),
                        field: f.name.clone(),
                    })?;
                    out.push(self.encode(&f.ty, v).map_err(|e| e.in_field(&f.name))?);
                }
                Ok(Wire::Array(out))
            }
            Type::Union(id) => {
                let def = self.model.union_def(*id);
                let Value::Union { tag, value: inner } = value else {
                    return Err(mismatch());
                };
                let member = def.members.get(*tag).ok_or_else(|| CodecError::UnionTag {
                    name: def.name.clone(),
                    tag: *tag,
                    members: def.members.len(),
                })?;
                let encoded = self
                    .encode(&member.ty, inner)
                    .map_err(|e| e.in_field(format!("{}[{}]", def.name, tag)))?;
                Ok(Wire::Array(vec![Wire::from(*tag as u64), encoded]))
            }
            Type::List(elem) => {
                let Value::List(items) = value else {
                    return Err(mismatch());
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.encode(elem, v).map_err(|e| e.in_field(format!("[{}]", i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Wire::Array)
            }
            Type::Tuple(types) => {
                let Value::Tuple(items) = value else {
                    return Err(mismatch());
                };
                if items.len() != types.len() {
                    return Err(mismatch());
                }
                types
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (t, v))| self.encode(t, v).map_err(|e| e.in_field(format!(".{}", i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Wire::Array)
            }
        }
    }

    /// `None` means the value has the wrong shape; range errors are reported directly.
    fn encode_primitive(&self, p: Primitive, value: &Value) -> Option<Result<Wire, CodecError>> {
        if let Some((min, max)) = p.int_range() {
            let n: i128 = match value {
                Value::UInt(x) => *x as i128,
                Value::Int(x) => *x as i128,
                _ => return None,
            };
            if n < min || n > max {
                return Some(Err(CodecError::IntegerRange { value: n, ty: p.name() }));
            }
            return Some(Ok(if n < 0 {
                Wire::from(n as i64)
            } else {
                Wire::from(n as u64)
            }));
        }
        let wire = match (p, value) {
            (Primitive::F32, Value::Float(x)) => Wire::F32(*x),
            (Primitive::F64, Value::Double(x)) => Wire::F64(*x),
            (Primitive::F64, Value::Float(x)) => Wire::F64(*x as f64),
            (Primitive::Bool, Value::Bool(b)) => Wire::Boolean(*b),
            (Primitive::Str, Value::Str(s)) => Wire::from(s.as_str()),
            (Primitive::Bin, Value::Bin(b)) => Wire::Binary(b.clone()),
            (Primitive::Array, Value::Array(items)) => Wire::Array(items.clone()),
            (Primitive::Nil, Value::Nil) => Wire::Nil,
            (Primitive::FireAndForget, _) => return Some(Err(CodecError::FireAndForget)),
            _ => return None,
        };
        Some(Ok(wire))
    }

    pub fn decode(&self, ty: &Type, wire: &Wire) -> Result<Value, DecodeError> {
        let mismatch = || DecodeError::TypeMismatch {
            expected: self.model.display_type(ty).to_string(),
            found: wire_kind(wire),
        };
        match ty {
            Type::Primitive(p) => decode_primitive(*p, wire).ok_or_else(mismatch)?,
            Type::Enum(id) => {
                let def = self.model.enum_def(*id);
                let Wire::Integer(n) = wire else {
                    return Err(mismatch());
                };
                let member = n.as_u64().and_then(|v| def.member_by_value(v));
                match member {
                    Some(m) => Ok(Value::Enum(m.name.clone())),
                    None => Err(DecodeError::UnknownEnumValue {
                        name: def.name.clone(),
                        value: integer_value(n),
                    }),
                }
            }
            Type::Struct(id) => {
                let def = self.model.struct_def(*id);
                let items = expect_array(wire, def.fields.len(), mismatch)?;
                let mut out = HashMap::with_capacity(def.fields.len());
                for (f, item) in def.fields.iter().zip(items) {
                    let v = self.decode(&f.ty, item).map_err(|e| e.in_field(&f.name))?;
                    out.insert(f.name.clone(), v);
                }
                Ok(Value::Struct(out))
            }
            Type::Union(id) => {
                let def = self.model.union_def(*id);
                let items = expect_array(wire, 2, mismatch)?;
                let tag = items[0].as_u64().ok_or_else(|| {
                    DecodeError::TypeMismatch {
                        expected: "union tag".to_string(),
                        found: wire_kind(&items[0]),
                    }
                })?;
                let member = usize::try_from(tag)
                    .ok()
                    .and_then(|t| def.members.get(t))
                    .ok_or_else(|| DecodeError::UnionTag {
                        name: def.name.clone(),
                        tag,
                        members: def.members.len(),
                    })?;
                let value = self
                    .decode(&member.ty, &items[1])
                    .map_err(|e| e.in_field(format!("{}[{}]", def.name, tag)))?;
                Ok(Value::union(tag as usize, value))
            }
            Type::List(elem) => {
                let Wire::Array(items) = wire else {
                    return Err(mismatch());
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.decode(elem, v).map_err(|e| e.in_field(format!("[{}]", i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            Type::Tuple(types) => {
                let items = expect_array(wire, types.len(), mismatch)?;
                types
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (t, v))| self.decode(t, v).map_err(|e| e.in_field(format!(".{}", i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Tuple)
            }
        }
    }

    /// Encode `[messageid | nil, id, args...]`. Fire-and-forget functions always get `nil`.
    pub fn encode_call(
        &self,
        function: &FunctionDef,
        message_id: Option<u64>,
        args: &[Value],
    ) -> Result<Wire, CodecError> {
        if args.len() != function.params.len() {
            return Err(CodecError::Arity(function.name.clone(), function.params.len(), args.len()));
        }
        let id_slot = if function.is_fire_and_forget() {
            Wire::Nil
        } else {
            Wire::from(message_id.ok_or_else(|| CodecError::MissingMessageId(function.name.clone()))?)
        };
        let mut out = Vec::with_capacity(2 + args.len());
        out.push(id_slot);
        out.push(Wire::from(function.id as u64));
        for (p, a) in function.params.iter().zip(args) {
            out.push(self.encode(&p.ty, a).map_err(|e| e.in_field(&p.name))?);
        }
        Ok(Wire::Array(out))
    }

    /// Decode an incoming call (`kind` = method) or signal (`kind` = signal).
    pub fn decode_call(&self, kind: FunctionKind, wire: &Wire) -> Result<DecodedCall, DecodeError> {
        let Wire::Array(items) = wire else {
            return Err(DecodeError::TypeMismatch {
                expected: "message array".to_string(),
                found: wire_kind(wire),
            });
        };
        if items.len() < 2 {
            return Err(DecodeError::Length {
                expected: 2,
                found: items.len(),
            });
        }
        let message_id = match &items[0] {
            Wire::Nil => None,
            other => Some(other.as_u64().ok_or_else(|| DecodeError::TypeMismatch {
                expected: "message id".to_string(),
                found: wire_kind(other),
            })?),
        };
        let id = items[1].as_u64().ok_or_else(|| DecodeError::TypeMismatch {
            expected: "function id".to_string(),
            found: wire_kind(&items[1]),
        })?;
        let function = usize::try_from(id)
            .ok()
            .and_then(|i| self.model.functions(kind).get(i))
            .ok_or(DecodeError::UnknownFunction {
                kind: kind_name(kind),
                id,
            })?;
        match (function.is_fire_and_forget(), message_id) {
            (true, Some(id)) => {
                return Err(DecodeError::UnexpectedMessageId {
                    name: function.name.clone(),
                    id,
                })
            }
            (false, None) => {
                return Err(DecodeError::MissingMessageId {
                    name: function.name.clone(),
                })
            }
            _ => {}
        }
        let args = &items[2..];
        if args.len() != function.params.len() {
            return Err(DecodeError::Length {
                expected: function.params.len() + 2,
                found: items.len(),
            });
        }
        let args = function
            .params
            .iter()
            .zip(args)
            .map(|(p, a)| self.decode(&p.ty, a).map_err(|e| e.in_field(&p.name)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DecodedCall {
            message_id,
            kind,
            id: function.id,
            args,
        })
    }

    /// Encode `[messageid, returnValue...]`.
    pub fn encode_response(
        &self,
        function: &FunctionDef,
        message_id: u64,
        value: &Value,
    ) -> Result<Wire, CodecError> {
        if function.is_fire_and_forget() {
            return Err(CodecError::FireAndForget);
        }
        let mut out = vec![Wire::from(message_id)];
        match (self.encode(&function.returns, value)?, &function.returns) {
            (Wire::Array(items), Type::Tuple(_)) => out.extend(items),
            (single, _) => out.push(single),
        }
        Ok(Wire::Array(out))
    }

    /// Decode the return value of a response; the message id has already been matched.
    pub fn decode_response(&self, function: &FunctionDef, wire: &Wire) -> Result<Value, DecodeError> {
        let Wire::Array(items) = wire else {
            return Err(DecodeError::TypeMismatch {
                expected: "response array".to_string(),
                found: wire_kind(wire),
            });
        };
        if items.is_empty() {
            return Err(DecodeError::Length {
                expected: 2,
                found: 0,
            });
        }
        let decoded = match &function.returns {
            Type::Tuple(_) => self.decode(&function.returns, &Wire::Array(items[1..].to_vec())),
            single => {
                if items.len() != 2 {
                    return Err(DecodeError::Length {
                        expected: 2,
                        found: items.len(),
                    });
                }
                self.decode(single, &items[1])
            }
        };
        decoded.map_err(|e| e.in_field(format!("{} response", function.name)))
    }
}

/// Serialize one MessagePack value.
pub fn to_bytes(wire: &Wire) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, wire).map_err(|e| CodecError::Write(e.to_string()))?;
    Ok(out)
}

/// Deserialize exactly one MessagePack value; trailing bytes are an error.
pub fn from_bytes(bytes: &[u8]) -> Result<Wire, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let wire = rmpv::decode::read_value(&mut cursor).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let rest = bytes.len() - cursor.position() as usize;
    if rest != 0 {
        return Err(DecodeError::TrailingBytes(rest));
    }
    Ok(wire)
}

pub(crate) fn kind_name(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Method => "method",
        FunctionKind::Signal => "signal",
    }
}

/// Short name of a MessagePack value's kind, for error messages.
pub fn wire_kind(wire: &Wire) -> &'static str {
    match wire {
        Wire::Nil => "nil",
        Wire::Boolean(_) => "bool",
        Wire::Integer(_) => "integer",
        Wire::F32(_) => "f32",
        Wire::F64(_) => "f64",
        Wire::String(_) => "str",
        Wire::Binary(_) => "bin",
        Wire::Array(_) => "array",
        Wire::Map(_) => "map",
        Wire::Ext(..) => "ext",
    }
}

fn integer_value(n: &rmpv::Integer) -> i128 {
    n.as_u64()
        .map(i128::from)
        .or_else(|| n.as_i64().map(i128::from))
        .unwrap_or_default()
}

fn expect_array<'w>(
    wire: &'w Wire,
    len: usize,
    mismatch: impl FnOnce() -> DecodeError,
) -> Result<&'w [Wire], DecodeError> {
    let Wire::Array(items) = wire else {
        return Err(mismatch());
    };
    if items.len() != len {
        return Err(DecodeError::Length {
            expected: len,
            found: items.len(),
        });
    }
    Ok(items)
}

fn decode_primitive(p: Primitive, wire: &Wire) -> Option<Result<Value, DecodeError>> {
    if let Some((min, max)) = p.int_range() {
        let Wire::Integer(n) = wire else {
            return None;
        };
        let v = integer_value(n);
        if v < min || v > max {
            return Some(Err(DecodeError::IntegerRange { value: v, ty: p.name() }));
        }
        return Some(Ok(if p.is_unsigned() {
            Value::UInt(v as u64)
        } else {
            Value::Int(v as i64)
        }));
    }
    let value = match (p, wire) {
        (Primitive::F32, Wire::F32(x)) => Value::Float(*x),
        (Primitive::F64, Wire::F64(x)) => Value::Double(*x),
        (Primitive::F64, Wire::F32(x)) => Value::Double(*x as f64),
        (Primitive::Bool, Wire::Boolean(b)) => Value::Bool(*b),
        (Primitive::Str, Wire::String(s)) => match s.as_str() {
            Some(s) => Value::Str(s.to_string()),
            None => return Some(Err(DecodeError::Utf8)),
        },
        (Primitive::Bin, Wire::Binary(b)) => Value::Bin(b.clone()),
        (Primitive::Array, Wire::Array(items)) => Value::Array(items.clone()),
        (Primitive::Nil, Wire::Nil) => Value::Nil,
        _ => return None,
    };
    Some(Ok(value))
}
