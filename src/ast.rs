//! Abstract Syntax Tree for the interface definition language.
//!
//! The AST is exactly what the source says: names are unresolved strings and
//! declarations keep their source order. [`resolve`](crate::resolve) turns it into a
//! [`Model`](crate::model::Model).

use std::fmt;

/// Source position (1-based line and column) attached to everything the resolver
/// and validator may need to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Root of a parsed IDL file: top-level declarations in source order.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    pub decls: Vec<Decl>,
}

impl Protocol {
    pub fn enums(&self) -> impl Iterator<Item = &EnumDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Enum(e) => Some(e),
            _ => None,
        })
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Struct(s) => Some(s),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Function(f) => Some(f),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Const(ConstDecl),
    Enum(EnumDecl),
    Struct(StructDecl),
    Union(UnionDecl),
    Function(FunctionDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Const(c) => &c.name,
            Decl::Enum(e) => &e.name,
            Decl::Struct(s) => &s.name,
            Decl::Union(u) => &u.name,
            Decl::Function(f) => &f.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Const(c) => c.span,
            Decl::Enum(e) => e.span,
            Decl::Struct(s) => s.span,
            Decl::Union(u) => u.span,
            Decl::Function(f) => f.span,
        }
    }

    /// Keyword that introduced the declaration, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Decl::Const(_) => "const",
            Decl::Enum(_) => "enum",
            Decl::Struct(_) => "struct",
            Decl::Union(_) => "union",
            Decl::Function(f) => match f.kind {
                FunctionKind::Method => "fn",
                FunctionKind::Signal => "signal",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    String(String),
    /// Bare word, kept verbatim (`const VERSION = beta`).
    Word(String),
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Field>,
    pub span: Span,
}

/// A named, typed slot: struct field or function parameter.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub type_expr: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnionDecl {
    pub name: String,
    pub members: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// `fn`: client to server.
    Method,
    /// `signal`: server to client.
    Signal,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub kind: FunctionKind,
    pub name: String,
    pub params: Vec<Field>,
    pub returns: TypeExpr,
    pub span: Span,
}

/// Unresolved type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// Primitive or declared type name.
    Named(String, Span),
    /// `[T]`
    List(Box<TypeExpr>, Span),
    /// `(T, U, ...)`
    Tuple(Vec<TypeExpr>, Span),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named(_, s) | TypeExpr::List(_, s) | TypeExpr::Tuple(_, s) => *s,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(n, _) => f.write_str(n),
            TypeExpr::List(inner, _) => write!(f, "[{}]", inner),
            TypeExpr::Tuple(items, _) => {
                f.write_str("(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                f.write_str(")")
            }
        }
    }
}
