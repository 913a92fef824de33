//! Resolved model: the type graph after every name is bound and wire ids are assigned.
//!
//! Definitions live in per-kind arenas and refer to each other through typed indices,
//! so the graph is closed and immutable once [`resolve`](crate::resolve::resolve)
//! returns.

use crate::ast::{FunctionKind, Literal, Span};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnionId(pub usize);

/// Built-in scalar and marker types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    Bin,
    /// Untyped MessagePack array.
    Array,
    Nil,
    /// Return-type-only marker: no response message exists.
    FireAndForget,
}

impl Primitive {
    /// Map an IDL type name to a primitive. `float` is an alias of `f64`.
    pub fn from_name(name: &str) -> Option<Primitive> {
        Some(match name {
            "u8" => Primitive::U8,
            "u16" => Primitive::U16,
            "u32" => Primitive::U32,
            "u64" => Primitive::U64,
            "i8" => Primitive::I8,
            "i16" => Primitive::I16,
            "i32" => Primitive::I32,
            "i64" => Primitive::I64,
            "f32" => Primitive::F32,
            "f64" | "float" => Primitive::F64,
            "bool" => Primitive::Bool,
            "str" => Primitive::Str,
            "bin" => Primitive::Bin,
            "array" => Primitive::Array,
            "nil" => Primitive::Nil,
            "fireandforget" => Primitive::FireAndForget,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::Bool => "bool",
            Primitive::Str => "str",
            Primitive::Bin => "bin",
            Primitive::Array => "array",
            Primitive::Nil => "nil",
            Primitive::FireAndForget => "fireandforget",
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64)
    }

    /// Inclusive integer range representable by an integer primitive.
    pub fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Primitive::U8 => (0, u8::MAX as i128),
            Primitive::U16 => (0, u16::MAX as i128),
            Primitive::U32 => (0, u32::MAX as i128),
            Primitive::U64 => (0, u64::MAX as i128),
            Primitive::I8 => (i8::MIN as i128, i8::MAX as i128),
            Primitive::I16 => (i16::MIN as i128, i16::MAX as i128),
            Primitive::I32 => (i32::MIN as i128, i32::MAX as i128),
            Primitive::I64 => (i64::MIN as i128, i64::MAX as i128),
            _ => return None,
        })
    }
}

/// A resolved type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    Enum(EnumId),
    Struct(StructId),
    Union(UnionId),
    List(Box<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::FireAndForget))
    }

    /// True if `fireandforget` appears anywhere inside this type.
    pub fn contains_fire_and_forget(&self) -> bool {
        match self {
            Type::Primitive(p) => *p == Primitive::FireAndForget,
            Type::List(inner) => inner.contains_fire_and_forget(),
            Type::Tuple(items) => items.iter().any(Type::contains_fire_and_forget),
            Type::Enum(_) | Type::Struct(_) | Type::Union(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstDef {
    pub name: String,
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<EnumMemberDef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMemberDef {
    pub name: String,
    pub value: i64,
    pub span: Span,
}

impl EnumDef {
    pub fn member_by_value(&self, value: u64) -> Option<&EnumMemberDef> {
        self.members
            .iter()
            .find(|m| u64::try_from(m.value).ok() == Some(value))
    }

    pub fn member_by_name(&self, name: &str) -> Option<&EnumMemberDef> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    /// Wire order.
    pub fields: Vec<FieldDef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnionDef {
    pub name: String,
    /// Member at index `i` is encoded with tag `i`.
    pub members: Vec<UnionMemberDef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnionMemberDef {
    pub ty: Type,
    pub span: Span,
}

/// A method or a signal, with its id in the matching namespace.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub kind: FunctionKind,
    pub name: String,
    pub id: u32,
    pub params: Vec<FieldDef>,
    pub returns: Type,
    pub span: Span,
}

impl FunctionDef {
    pub fn is_fire_and_forget(&self) -> bool {
        self.returns.is_fire_and_forget()
    }
}

/// What a global name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Const(usize),
    Enum(EnumId),
    Struct(StructId),
    Union(UnionId),
    Method(usize),
    Signal(usize),
}

/// Fully resolved protocol, ready for validation and code generation.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub consts: Vec<ConstDef>,
    pub enums: Vec<EnumDef>,
    pub structs: Vec<StructDef>,
    pub unions: Vec<UnionDef>,
    /// Indexed by method id.
    pub methods: Vec<FunctionDef>,
    /// Indexed by signal id.
    pub signals: Vec<FunctionDef>,
    pub symbols: HashMap<String, Symbol>,
    /// Type declarations in source order, for emitters that must declare before use.
    pub type_order: Vec<Symbol>,
}

impl Model {
    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        &self.enums[id.0]
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0]
    }

    pub fn union_def(&self, id: UnionId) -> &UnionDef {
        &self.unions[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    /// The resolved type a declared name denotes, if it is a type.
    pub fn type_named(&self, name: &str) -> Option<Type> {
        match self.lookup(name)? {
            Symbol::Enum(id) => Some(Type::Enum(id)),
            Symbol::Struct(id) => Some(Type::Struct(id)),
            Symbol::Union(id) => Some(Type::Union(id)),
            _ => None,
        }
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        match self.lookup(name)? {
            Symbol::Method(i) => self.methods.get(i),
            _ => None,
        }
    }

    pub fn signal(&self, name: &str) -> Option<&FunctionDef> {
        match self.lookup(name)? {
            Symbol::Signal(i) => self.signals.get(i),
            _ => None,
        }
    }

    /// Method or signal table for one namespace.
    pub fn functions(&self, kind: FunctionKind) -> &[FunctionDef] {
        match kind {
            FunctionKind::Method => &self.methods,
            FunctionKind::Signal => &self.signals,
        }
    }

    /// Render a type the way it is written in IDL source.
    pub fn display_type<'a>(&'a self, ty: &'a Type) -> DisplayType<'a> {
        DisplayType { model: self, ty }
    }
}

pub struct DisplayType<'a> {
    model: &'a Model,
    ty: &'a Type,
}

impl fmt::Display for DisplayType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Enum(id) => f.write_str(&self.model.enum_def(*id).name),
            Type::Struct(id) => f.write_str(&self.model.struct_def(*id).name),
            Type::Union(id) => f.write_str(&self.model.union_def(*id).name),
            Type::List(inner) => write!(f, "[{}]", self.model.display_type(inner)),
            Type::Tuple(items) => {
                f.write_str("(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.model.display_type(t))?;
                }
                f.write_str(")")
            }
        }
    }
}
