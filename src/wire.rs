//! Runtime support for generated Rust code.
//!
//! Generated types implement [`Wire`]; the helpers below build and take apart the
//! message arrays (`[messageid | nil, id, args...]`, `[messageid, returnValue...]`) so the
//! generated dispatch code stays small.

pub use crate::codec::{wire_kind, DecodeError};
pub use rmpv::Value;

/// Conversion between a Rust value and its MessagePack representation.
pub trait Wire: Sized {
    fn to_wire(&self) -> Value;
    fn from_wire(value: &Value) -> Result<Self, DecodeError>;
}

fn mismatch(expected: &str, found: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        expected: expected.to_string(),
        found: wire_kind(found),
    }
}

macro_rules! wire_unsigned {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            fn to_wire(&self) -> Value {
                Value::from(*self as u64)
            }

            fn from_wire(value: &Value) -> Result<Self, DecodeError> {
                let Value::Integer(n) = value else {
                    return Err(mismatch(stringify!($t), value));
                };
                n.as_u64()
                    .and_then(|v| <$t>::try_from(v).ok())
                    .ok_or_else(|| DecodeError::IntegerRange {
                        value: integer(n),
                        ty: stringify!($t),
                    })
            }
        }
    )*};
}

macro_rules! wire_signed {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            fn to_wire(&self) -> Value {
                Value::from(*self as i64)
            }

            fn from_wire(value: &Value) -> Result<Self, DecodeError> {
                let Value::Integer(n) = value else {
                    return Err(mismatch(stringify!($t), value));
                };
                n.as_i64()
                    .and_then(|v| <$t>::try_from(v).ok())
                    .ok_or_else(|| DecodeError::IntegerRange {
                        value: integer(n),
                        ty: stringify!($t),
                    })
            }
        }
    )*};
}

wire_unsigned!(u8, u16, u32, u64);
wire_signed!(i8, i16, i32, i64);

fn integer(n: &rmpv::Integer) -> i128 {
    n.as_u64()
        .map(i128::from)
        .or_else(|| n.as_i64().map(i128::from))
        .unwrap_or_default()
}

impl Wire for f32 {
    fn to_wire(&self) -> Value {
        Value::F32(*self)
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::F32(x) => Ok(*x),
            other => Err(mismatch("f32", other)),
        }
    }
}

impl Wire for f64 {
    fn to_wire(&self) -> Value {
        Value::F64(*self)
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::F64(x) => Ok(*x),
            Value::F32(x) => Ok(*x as f64),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl Wire for bool {
    fn to_wire(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Boolean(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl Wire for String {
    fn to_wire(&self) -> Value {
        Value::from(self.as_str())
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => s.as_str().map(str::to_string).ok_or(DecodeError::Utf8),
            other => Err(mismatch("str", other)),
        }
    }
}

/// The `nil` type.
impl Wire for () {
    fn to_wire(&self) -> Value {
        Value::Nil
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Nil => Ok(()),
            other => Err(mismatch("nil", other)),
        }
    }
}

/// Untyped elements of the `array` type pass through unchanged.
impl Wire for Value {
    fn to_wire(&self) -> Value {
        self.clone()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

/// The `bin` type. A newtype so that `Vec<u8>` can stay a list of integers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bin(pub Vec<u8>);

impl Wire for Bin {
    fn to_wire(&self) -> Value {
        Value::Binary(self.0.clone())
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Binary(b) => Ok(Bin(b.clone())),
            other => Err(mismatch("bin", other)),
        }
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn to_wire(&self) -> Value {
        Value::Array(self.iter().map(Wire::to_wire).collect())
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        let Value::Array(items) = value else {
            return Err(mismatch("array", value));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, v)| T::from_wire(v).map_err(|e| e.in_field(format!("[{}]", i))))
            .collect()
    }
}

macro_rules! wire_tuple {
    ($len:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: Wire),+> Wire for ($($name,)+) {
            fn to_wire(&self) -> Value {
                Value::Array(vec![$(self.$idx.to_wire()),+])
            }

            fn from_wire(value: &Value) -> Result<Self, DecodeError> {
                let items = expect_array(value, $len, "tuple")?;
                Ok(($(field::<$name>(items, $idx, concat!(".", stringify!($idx)))?,)+))
            }
        }
    };
}

wire_tuple!(1; A 0);
wire_tuple!(2; A 0, B 1);
wire_tuple!(3; A 0, B 1, C 2);
wire_tuple!(4; A 0, B 1, C 2, D 3);
wire_tuple!(5; A 0, B 1, C 2, D 3, E 4);
wire_tuple!(6; A 0, B 1, C 2, D 3, E 4, F 5);

/// Borrow the elements of an array that must have exactly `len` of them.
pub fn expect_array<'a>(value: &'a Value, len: usize, what: &str) -> Result<&'a [Value], DecodeError> {
    let Value::Array(items) = value else {
        return Err(mismatch(what, value));
    };
    if items.len() != len {
        return Err(DecodeError::Length {
            expected: len,
            found: items.len(),
        });
    }
    Ok(items)
}

/// Decode element `index` of a positional array, naming it in errors.
pub fn field<T: Wire>(items: &[Value], index: usize, name: &str) -> Result<T, DecodeError> {
    T::from_wire(&items[index]).map_err(|e| e.in_field(name))
}

/// Split `[tag, value]` and range-check the tag against the member count.
pub fn union_parts<'a>(value: &'a Value, name: &str, members: usize) -> Result<(usize, &'a Value), DecodeError> {
    let items = expect_array(value, 2, name)?;
    let tag = items[0].as_u64().ok_or_else(|| mismatch("union tag", &items[0]))?;
    match usize::try_from(tag) {
        Ok(t) if t < members => Ok((t, &items[1])),
        _ => Err(DecodeError::UnionTag {
            name: name.to_string(),
            tag,
            members,
        }),
    }
}

/// Integer of an enum, or the error for a value with no member.
pub fn enum_value(value: &Value, name: &str) -> Result<u64, DecodeError> {
    match value {
        Value::Integer(n) => n.as_u64().ok_or_else(|| DecodeError::UnknownEnumValue {
            name: name.to_string(),
            value: integer(n),
        }),
        other => Err(mismatch(name, other)),
    }
}

pub fn unknown_enum_value(name: &str, value: u64) -> DecodeError {
    DecodeError::UnknownEnumValue {
        name: name.to_string(),
        value: value.into(),
    }
}

/// `[messageid | nil, id, args...]`
pub fn call_message(message_id: Option<u64>, id: u32, args: Vec<Value>) -> Value {
    let mut out = Vec::with_capacity(args.len() + 2);
    out.push(message_id.map(Value::from).unwrap_or(Value::Nil));
    out.push(Value::from(id as u64));
    out.extend(args);
    Value::Array(out)
}

/// `[messageid, returnValue...]`
pub fn response_message(message_id: u64, values: Vec<Value>) -> Value {
    let mut out = Vec::with_capacity(values.len() + 1);
    out.push(Value::from(message_id));
    out.extend(values);
    Value::Array(out)
}

/// Header of an incoming call: message id, function id and the raw arguments.
pub fn call_parts(value: &Value) -> Result<(Option<u64>, u64, &[Value]), DecodeError> {
    let Value::Array(items) = value else {
        return Err(mismatch("message array", value));
    };
    if items.len() < 2 {
        return Err(DecodeError::Length {
            expected: 2,
            found: items.len(),
        });
    }
    let message_id = match &items[0] {
        Value::Nil => None,
        other => Some(other.as_u64().ok_or_else(|| mismatch("message id", other))?),
    };
    let id = items[1].as_u64().ok_or_else(|| mismatch("function id", &items[1]))?;
    Ok((message_id, id, &items[2..]))
}

/// Check the argument count of a call; lengths in the error count the whole message.
pub fn expect_args(args: &[Value], count: usize) -> Result<&[Value], DecodeError> {
    if args.len() != count {
        return Err(DecodeError::Length {
            expected: count + 2,
            found: args.len() + 2,
        });
    }
    Ok(args)
}

/// A call that expects a response must carry a message id.
pub fn require_message_id(message_id: Option<u64>, name: &str) -> Result<u64, DecodeError> {
    message_id.ok_or_else(|| DecodeError::MissingMessageId {
        name: name.to_string(),
    })
}

/// A fire-and-forget call must not carry a message id.
pub fn forbid_message_id(message_id: Option<u64>, name: &str) -> Result<(), DecodeError> {
    match message_id {
        None => Ok(()),
        Some(id) => Err(DecodeError::UnexpectedMessageId {
            name: name.to_string(),
            id,
        }),
    }
}

/// Split `[messageid, returnValue...]`, checking the number of return values.
pub fn response_parts(value: &Value, values: usize) -> Result<(u64, &[Value]), DecodeError> {
    let Value::Array(items) = value else {
        return Err(mismatch("response array", value));
    };
    if items.len() != values + 1 {
        return Err(DecodeError::Length {
            expected: values + 1,
            found: items.len(),
        });
    }
    let message_id = items[0].as_u64().ok_or_else(|| mismatch("message id", &items[0]))?;
    Ok((message_id, &items[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_presence() {
        assert_eq!(require_message_id(Some(3), "f"), Ok(3));
        assert!(matches!(
            require_message_id(None, "f"),
            Err(DecodeError::MissingMessageId { .. })
        ));
        assert!(matches!(
            forbid_message_id(Some(1), "g"),
            Err(DecodeError::UnexpectedMessageId { id: 1, .. })
        ));
        let resp = response_message(4, vec![Value::Nil]);
        assert_eq!(response_parts(&resp, 1).map(|(id, v)| (id, v.len())), Ok((4, 1)));
        assert!(response_parts(&resp, 2).is_err());
    }

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(u8::from_wire(&Value::from(255u64)), Ok(255));
        assert!(matches!(
            u8::from_wire(&Value::from(256u64)),
            Err(DecodeError::IntegerRange { value: 256, ty: "u8" })
        ));
        assert!(matches!(
            u32::from_wire(&Value::from(-1i64)),
            Err(DecodeError::IntegerRange { value: -1, ty: "u32" })
        ));
        assert_eq!(i16::from_wire(&(-3i16).to_wire()), Ok(-3));
    }

    #[test]
    fn tuples_and_lists() {
        let v = (1u8, String::from("a"), vec![true, false]);
        let wire = v.to_wire();
        assert_eq!(<(u8, String, Vec<bool>)>::from_wire(&wire), Ok(v));
        assert_eq!(
            <(u8, u8)>::from_wire(&Value::Array(vec![Value::from(1u64)])),
            Err(DecodeError::Length { expected: 2, found: 1 })
        );
    }

    #[test]
    fn bin_is_not_a_list() {
        let b = Bin(vec![1, 2]);
        assert_eq!(b.to_wire(), Value::Binary(vec![1, 2]));
        assert!(Vec::<u8>::from_wire(&Value::Binary(vec![1])).is_err());
    }

    #[test]
    fn union_tag_out_of_range() {
        let v = Value::Array(vec![Value::from(2u64), Value::Nil]);
        assert!(matches!(
            union_parts(&v, "U", 2),
            Err(DecodeError::UnionTag { tag: 2, members: 2, .. })
        ));
        assert_eq!(union_parts(&v, "U", 3).map(|(t, _)| t), Ok(2));
    }

    #[test]
    fn message_shapes() {
        let call = call_message(None, 3, vec![Value::from(1u64)]);
        assert_eq!(call, Value::Array(vec![Value::Nil, Value::from(3u64), Value::from(1u64)]));
        let (id, fid, args) = call_parts(&call).expect("parts");
        assert_eq!((id, fid, args.len()), (None, 3, 1));
        assert_eq!(
            response_message(7, vec![Value::Boolean(true)]),
            Value::Array(vec![Value::from(7u64), Value::Boolean(true)])
        );
    }
}
