//! Symbol table construction and type resolution.
//!
//! Pass one registers every declaration name in source order. Pass two binds each type
//! reference, allowing only references to declarations that appear earlier in the file
//! (or to the declaration itself, which cycle detection then judges). Method and signal
//! ids come from separate counters in declaration order, starting at 0.

use crate::ast::{self, Decl, FunctionKind, Span, TypeExpr};
use crate::model::*;
use std::collections::{HashMap, HashSet};

/// A name that cannot be bound, or a type graph that cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{span}: duplicate definition of `{name}` (first defined at {first})")]
    Duplicate { name: String, span: Span, first: Span },
    #[error("{span}: unresolved type `{name}`")]
    Unresolved { name: String, span: Span },
    #[error("{span}: `{name}` is used before its definition at {defined_at}")]
    ForwardReference {
        name: String,
        span: Span,
        defined_at: Span,
    },
    #[error("{span}: `{name}` is a {kind}, not a type")]
    NotAType {
        name: String,
        kind: &'static str,
        span: Span,
    },
    #[error("{span}: cyclic type `{}`", path.join(" -> "))]
    Cycle { path: Vec<String>, span: Span },
}

impl ResolutionError {
    pub fn span(&self) -> Span {
        match self {
            ResolutionError::Duplicate { span, .. }
            | ResolutionError::Unresolved { span, .. }
            | ResolutionError::ForwardReference { span, .. }
            | ResolutionError::NotAType { span, .. }
            | ResolutionError::Cycle { span, .. } => *span,
        }
    }
}

struct Entry {
    index: usize,
    symbol: Symbol,
    span: Span,
    kind: &'static str,
}

/// Resolve a parsed protocol into a [`Model`].
///
/// All independent errors are collected; the model is only returned when there are none.
pub fn resolve(protocol: &ast::Protocol) -> Result<Model, Vec<ResolutionError>> {
    let mut errors = Vec::new();
    let table = build_symbol_table(protocol, &mut errors);

    let mut model = Model::default();
    for (index, decl) in protocol.decls.iter().enumerate() {
        let mut resolver = TypeResolver {
            table: &table,
            current: index,
            errors: &mut errors,
        };
        // A duplicate never enters the model; its first definition already did.
        if table.get(decl.name()).map(|e| e.index) != Some(index) {
            continue;
        }
        tracing::trace!(kind = decl.kind(), name = decl.name(), "resolving declaration");
        match decl {
            Decl::Const(c) => model.consts.push(ConstDef {
                name: c.name.clone(),
                value: c.value.clone(),
                span: c.span,
            }),
            Decl::Enum(e) => {
                model.type_order.push(Symbol::Enum(EnumId(model.enums.len())));
                model.enums.push(EnumDef {
                    name: e.name.clone(),
                    members: e
                        .members
                        .iter()
                        .map(|m| EnumMemberDef {
                            name: m.name.clone(),
                            value: m.value,
                            span: m.span,
                        })
                        .collect(),
                    span: e.span,
                });
            }
            Decl::Struct(s) => {
                let fields = s.fields.iter().map(|f| resolver.field(f)).collect();
                model.type_order.push(Symbol::Struct(StructId(model.structs.len())));
                model.structs.push(StructDef {
                    name: s.name.clone(),
                    fields,
                    span: s.span,
                });
            }
            Decl::Union(u) => {
                let members = u
                    .members
                    .iter()
                    .map(|m| UnionMemberDef {
                        ty: resolver.resolve(m),
                        span: m.span(),
                    })
                    .collect();
                model.type_order.push(Symbol::Union(UnionId(model.unions.len())));
                model.unions.push(UnionDef {
                    name: u.name.clone(),
                    members,
                    span: u.span,
                });
            }
            Decl::Function(f) => {
                let params = f.params.iter().map(|p| resolver.field(p)).collect();
                let returns = resolver.resolve(&f.returns);
                let namespace = match f.kind {
                    FunctionKind::Method => &mut model.methods,
                    FunctionKind::Signal => &mut model.signals,
                };
                let id = namespace.len() as u32;
                namespace.push(FunctionDef {
                    kind: f.kind,
                    name: f.name.clone(),
                    id,
                    params,
                    returns,
                    span: f.span,
                });
            }
        }
    }
    model.symbols = table.iter().map(|(k, e)| (k.to_string(), e.symbol)).collect();

    if errors.is_empty() {
        detect_cycles(&model, &mut errors);
    }
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "resolution failed");
        return Err(errors);
    }
    tracing::debug!(
        enums = model.enums.len(),
        structs = model.structs.len(),
        unions = model.unions.len(),
        methods = model.methods.len(),
        signals = model.signals.len(),
        "resolved model"
    );
    Ok(model)
}

fn build_symbol_table<'a>(
    protocol: &'a ast::Protocol,
    errors: &mut Vec<ResolutionError>,
) -> HashMap<&'a str, Entry> {
    let mut table: HashMap<&str, Entry> = HashMap::new();
    let (mut consts, mut enums, mut structs, mut unions, mut methods, mut signals) =
        (0, 0, 0, 0, 0, 0);
    for (index, decl) in protocol.decls.iter().enumerate() {
        if let Some(first) = table.get(decl.name()) {
            errors.push(ResolutionError::Duplicate {
                name: decl.name().to_string(),
                span: decl.span(),
                first: first.span,
            });
            continue;
        }
        let symbol = match decl {
            Decl::Const(_) => next(&mut consts, Symbol::Const),
            Decl::Enum(_) => next(&mut enums, |i| Symbol::Enum(EnumId(i))),
            Decl::Struct(_) => next(&mut structs, |i| Symbol::Struct(StructId(i))),
            Decl::Union(_) => next(&mut unions, |i| Symbol::Union(UnionId(i))),
            Decl::Function(f) => match f.kind {
                FunctionKind::Method => next(&mut methods, Symbol::Method),
                FunctionKind::Signal => next(&mut signals, Symbol::Signal),
            },
        };
        table.insert(
            decl.name(),
            Entry {
                index,
                symbol,
                span: decl.span(),
                kind: decl.kind(),
            },
        );
    }
    table
}

fn next(counter: &mut usize, make: impl FnOnce(usize) -> Symbol) -> Symbol {
    let symbol = make(*counter);
    *counter += 1;
    symbol
}

struct TypeResolver<'t, 'e> {
    table: &'t HashMap<&'t str, Entry>,
    current: usize,
    errors: &'e mut Vec<ResolutionError>,
}

impl TypeResolver<'_, '_> {
    fn field(&mut self, field: &ast::Field) -> FieldDef {
        FieldDef {
            name: field.name.clone(),
            ty: self.resolve(&field.type_expr),
            span: field.span,
        }
    }

    /// Resolve a type expression. On error the problem is recorded and `nil` stands in,
    /// so the rest of the declaration can still be checked.
    fn resolve(&mut self, expr: &TypeExpr) -> Type {
        match expr {
            TypeExpr::List(inner, _) => Type::List(Box::new(self.resolve(inner))),
            TypeExpr::Tuple(items, _) => Type::Tuple(items.iter().map(|t| self.resolve(t)).collect()),
            TypeExpr::Named(name, span) => {
                if let Some(p) = Primitive::from_name(name) {
                    return Type::Primitive(p);
                }
                let placeholder = Type::Primitive(Primitive::Nil);
                let Some(entry) = self.table.get(name.as_str()) else {
                    self.errors.push(ResolutionError::Unresolved {
                        name: name.clone(),
                        span: *span,
                    });
                    return placeholder;
                };
                if entry.index > self.current {
                    self.errors.push(ResolutionError::ForwardReference {
                        name: name.clone(),
                        span: *span,
                        defined_at: entry.span,
                    });
                    return placeholder;
                }
                match entry.symbol {
                    Symbol::Enum(id) => Type::Enum(id),
                    Symbol::Struct(id) => Type::Struct(id),
                    Symbol::Union(id) => Type::Union(id),
                    Symbol::Const(_) | Symbol::Method(_) | Symbol::Signal(_) => {
                        self.errors.push(ResolutionError::NotAType {
                            name: name.clone(),
                            kind: entry.kind,
                            span: *span,
                        });
                        placeholder
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Struct(StructId),
    Union(UnionId),
}

/// Depth-first search over by-value containment. Lists are an indirection (they may be
/// empty), so an element type is not a containment edge.
fn detect_cycles(model: &Model, errors: &mut Vec<ResolutionError>) {
    let mut done: HashSet<Node> = HashSet::new();
    let roots = (0..model.structs.len())
        .map(|i| Node::Struct(StructId(i)))
        .chain((0..model.unions.len()).map(|i| Node::Union(UnionId(i))));
    for root in roots {
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        visit(model, root, &mut stack, &mut on_stack, &mut done, errors);
    }
}

fn visit(
    model: &Model,
    node: Node,
    stack: &mut Vec<Node>,
    on_stack: &mut HashSet<Node>,
    done: &mut HashSet<Node>,
    errors: &mut Vec<ResolutionError>,
) {
    if done.contains(&node) {
        return;
    }
    if on_stack.contains(&node) {
        let start = stack.iter().position(|n| *n == node).unwrap_or(0);
        let mut path: Vec<String> = stack[start..].iter().map(|n| node_name(model, *n)).collect();
        path.push(node_name(model, node));
        errors.push(ResolutionError::Cycle {
            path,
            span: node_span(model, node),
        });
        return;
    }
    stack.push(node);
    on_stack.insert(node);
    let mut children = Vec::new();
    match node {
        Node::Struct(id) => {
            for f in &model.struct_def(id).fields {
                contained(&f.ty, &mut children);
            }
        }
        Node::Union(id) => {
            for m in &model.union_def(id).members {
                contained(&m.ty, &mut children);
            }
        }
    }
    for child in children {
        visit(model, child, stack, on_stack, done, errors);
    }
    stack.pop();
    on_stack.remove(&node);
    done.insert(node);
}

fn contained(ty: &Type, out: &mut Vec<Node>) {
    match ty {
        Type::Struct(id) => out.push(Node::Struct(*id)),
        Type::Union(id) => out.push(Node::Union(*id)),
        Type::Tuple(items) => items.iter().for_each(|t| contained(t, out)),
        Type::List(_) | Type::Primitive(_) | Type::Enum(_) => {}
    }
}

fn node_name(model: &Model, node: Node) -> String {
    match node {
        Node::Struct(id) => model.struct_def(id).name.clone(),
        Node::Union(id) => model.union_def(id).name.clone(),
    }
}

fn node_span(model: &Model, node: Node) -> Span {
    match node {
        Node::Struct(id) => model.struct_def(id).span,
        Node::Union(id) => model.union_def(id).span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolve_src(src: &str) -> Result<Model, Vec<ResolutionError>> {
        resolve(&parse(src).expect("parse"))
    }

    #[test]
    fn ids_are_dense_per_namespace() {
        let m = resolve_src(
            "fn a() -> nil\nsignal s() -> nil\nfn b() -> nil\nsignal t() -> fireandforget\n",
        )
        .expect("resolve");
        let method_ids: Vec<_> = m.methods.iter().map(|f| (f.name.as_str(), f.id)).collect();
        let signal_ids: Vec<_> = m.signals.iter().map(|f| (f.name.as_str(), f.id)).collect();
        assert_eq!(method_ids, vec![("a", 0), ("b", 1)]);
        assert_eq!(signal_ids, vec![("s", 0), ("t", 1)]);
    }

    #[test]
    fn direct_self_reference_is_a_cycle() {
        let errs = resolve_src("struct Node:\n    next: Node\n").unwrap_err();
        assert!(matches!(
            &errs[0],
            ResolutionError::Cycle { path, .. } if path == &["Node".to_string(), "Node".to_string()]
        ));
    }

    #[test]
    fn self_reference_through_list_is_allowed() {
        let m = resolve_src("struct Tree:\n    value: u32\n    children: [Tree]\n").expect("resolve");
        assert_eq!(m.structs[0].fields[1].ty, Type::List(Box::new(Type::Struct(StructId(0)))));
    }

    #[test]
    fn self_reference_through_tuple_is_a_cycle() {
        let errs = resolve_src("union U = u8 | (str, U)\n").unwrap_err();
        assert!(matches!(errs[0], ResolutionError::Cycle { .. }));
    }

    #[test]
    fn duplicate_across_kinds() {
        let errs = resolve_src("enum X:\n    A = 0\nfn X() -> nil\n").unwrap_err();
        assert!(matches!(&errs[0], ResolutionError::Duplicate { name, .. } if name == "X"));
    }

    #[test]
    fn errors_are_batched() {
        let errs = resolve_src(
            "const C = 1\nstruct S:\n    a: Missing\n    b: Later\n    c: C\nstruct Later:\n    x: u8\n",
        )
        .unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(matches!(errs[0], ResolutionError::Unresolved { .. }));
        assert!(matches!(errs[1], ResolutionError::ForwardReference { .. }));
        assert!(matches!(errs[2], ResolutionError::NotAType { kind: "const", .. }));
    }
}
