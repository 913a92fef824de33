//! Rust target: one module with the declared types, their [`Wire`](crate::wire::Wire)
//! impls, id constants, client stubs, handler traits and dispatch functions.

use super::{CodeGenerator, GeneratedSource, GenerationError, GeneratorConfig, NameTable, SourceWriter};
use crate::ast::{FunctionKind, Literal, Span};
use crate::model::*;

const TARGET: &str = "rust";

/// Largest tuple the runtime implements `Wire` for.
const MAX_TUPLE: usize = 6;

/// Type names the module declares or refers to unqualified.
const RESERVED_TYPES: &[&str] = &[
    "Method", "Signal", "MethodHandler", "SignalHandler", "wire", "String", "Vec", "Option",
    "Result", "TryFrom", "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64",
    "bool",
];

const RESERVED_VALUES: &[&str] = &["dispatch_method", "dispatch_signal"];

pub struct RustGenerator {
    config: GeneratorConfig,
}

impl RustGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        RustGenerator { config }
    }
}

impl CodeGenerator for RustGenerator {
    fn generate(&mut self, model: &Model) -> Result<GeneratedSource, GenerationError> {
        check_names(model)?;
        let mut e = Emitter {
            model,
            w: SourceWriter::new(4),
        };
        e.header(&self.config.name, &self.config.runtime_crate);
        for c in &model.consts {
            e.constant(c);
        }
        for symbol in &model.type_order {
            match *symbol {
                Symbol::Enum(id) => e.enumeration(model.enum_def(id)),
                Symbol::Struct(id) => e.structure(model.struct_def(id))?,
                Symbol::Union(id) => e.union(model.union_def(id))?,
                _ => {}
            }
        }
        e.namespace(Namespace::METHOD)?;
        e.namespace(Namespace::SIGNAL)?;
        tracing::debug!(name = %self.config.name, "generated rust module");
        Ok(GeneratedSource::single(
            format!("{}.rs", self.config.name),
            e.w.finish(),
        ))
    }
}

/// Reject models whose generated items would share a name.
fn check_names(model: &Model) -> Result<(), GenerationError> {
    let mut types = NameTable::new(TARGET).reserve(RESERVED_TYPES);
    let mut values = NameTable::new(TARGET).reserve(RESERVED_VALUES);

    for c in &model.consts {
        values.claim(ident(&c.name), c.span, &format!("const `{}`", c.name))?;
    }
    for def in &model.enums {
        types.claim(ident(&def.name), def.span, &format!("enum `{}`", def.name))?;
        let mut members = NameTable::new(TARGET);
        for m in &def.members {
            members.claim(ident(&m.name), m.span, &format!("member `{}`", m.name))?;
        }
    }
    for def in &model.structs {
        types.claim(ident(&def.name), def.span, &format!("struct `{}`", def.name))?;
        check_fields(&def.fields)?;
    }
    for def in &model.unions {
        types.claim(ident(&def.name), def.span, &format!("union `{}`", def.name))?;
    }
    for ns in [Namespace::METHOD, Namespace::SIGNAL] {
        let mut handler = NameTable::new(TARGET);
        for f in model.functions(ns.kind) {
            let owner = format!("{} `{}`", ns.noun, f.name);
            values.claim(ns.id_constant(f), f.span, &owner)?;
            values.claim(ns.encoder(f), f.span, &owner)?;
            if !f.is_fire_and_forget() {
                values.claim(ns.decoder(f), f.span, &owner)?;
            }
            handler.claim(ident(&f.name), f.span, &owner)?;
            check_fields(&f.params)?;
        }
    }
    Ok(())
}

fn check_fields(fields: &[FieldDef]) -> Result<(), GenerationError> {
    let mut names = NameTable::new(TARGET);
    for f in fields {
        names.claim(ident(&f.name), f.span, &format!("`{}`", f.name))?;
    }
    Ok(())
}

/// Naming for one of the two function namespaces.
struct Namespace {
    kind: FunctionKind,
    /// Prefix of id constants.
    constant: &'static str,
    /// Name of the decoded-call enum; also prefixes the handler trait.
    type_name: &'static str,
    /// Lowercase noun for dispatch and error messages.
    noun: &'static str,
    /// Suffix of client stubs.
    stub: &'static str,
}

impl Namespace {
    const METHOD: Namespace = Namespace {
        kind: FunctionKind::Method,
        constant: "METHOD",
        type_name: "Method",
        noun: "method",
        stub: "call",
    };
    const SIGNAL: Namespace = Namespace {
        kind: FunctionKind::Signal,
        constant: "SIGNAL",
        type_name: "Signal",
        noun: "signal",
        stub: "signal",
    };

    fn id_constant(&self, f: &FunctionDef) -> String {
        format!("{}_{}", self.constant, f.name.to_uppercase())
    }

    fn encoder(&self, f: &FunctionDef) -> String {
        format!("encode_{}_{}", f.name, self.stub)
    }

    fn decoder(&self, f: &FunctionDef) -> String {
        match self.kind {
            FunctionKind::Method => format!("decode_{}_response", f.name),
            FunctionKind::Signal => format!("decode_{}_signal_response", f.name),
        }
    }
}

struct Emitter<'m> {
    model: &'m Model,
    w: SourceWriter,
}

impl Emitter<'_> {
    fn header(&mut self, name: &str, runtime: &str) {
        self.w.line(format!("// Generated by vixrpcgen from protocol `{}`. Do not edit.", name));
        self.w.blank();
        self.w.line(
            "#![allow(dead_code, unused_imports, unused_variables, non_camel_case_types, \
             non_snake_case, non_upper_case_globals, clippy::all)]",
        );
        self.w.blank();
        self.w.line(format!("use {}::wire;", runtime));
        self.w.line(format!("use {}::wire::Wire as _;", runtime));
        self.w.blank();
    }

    fn constant(&mut self, c: &ConstDef) {
        let name = ident(&c.name);
        match &c.value {
            Literal::Int(v) => self.w.line(format!("pub const {}: i64 = {};", name, v)),
            Literal::String(s) | Literal::Word(s) => {
                self.w.line(format!("pub const {}: &str = {:?};", name, s))
            }
        }
        self.w.blank();
    }

    fn enumeration(&mut self, def: &EnumDef) {
        let name = ident(&def.name);
        let w = &mut self.w;
        w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
        if !def.members.is_empty() {
            w.line("#[repr(u64)]");
        }
        w.block(format!("pub enum {} {{", name), "}", |w| {
            for m in &def.members {
                w.line(format!("{} = {},", ident(&m.name), m.value));
            }
        });
        w.blank();

        w.block(format!("impl {} {{", name), "}", |w| {
            w.block("pub fn value(self) -> u64 {", "}", |w| {
                if def.members.is_empty() {
                    w.line("match self {}");
                } else {
                    w.line("self as u64");
                }
            });
        });
        w.blank();

        w.block(format!("impl TryFrom<u64> for {} {{", name), "}", |w| {
            w.line("type Error = wire::DecodeError;");
            w.blank();
            w.block("fn try_from(value: u64) -> Result<Self, Self::Error> {", "}", |w| {
                w.block("match value {", "}", |w| {
                    for m in &def.members {
                        w.line(format!("{} => Ok({}::{}),", m.value, name, ident(&m.name)));
                    }
                    w.line(format!(
                        "other => Err(wire::unknown_enum_value({:?}, other)),",
                        def.name
                    ));
                });
            });
        });
        w.blank();

        w.block(format!("impl wire::Wire for {} {{", name), "}", |w| {
            w.block("fn to_wire(&self) -> wire::Value {", "}", |w| {
                w.line("wire::Value::from(self.value())");
            });
            w.blank();
            w.block(
                "fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {",
                "}",
                |w| w.line(format!("Self::try_from(wire::enum_value(value, {:?})?)", def.name)),
            );
        });
        w.blank();
    }

    fn structure(&mut self, def: &StructDef) -> Result<(), GenerationError> {
        let name = ident(&def.name);
        let fields = def
            .fields
            .iter()
            .map(|f| Ok((ident(&f.name), f.name.as_str(), self.rust_type(&f.ty, f.span)?)))
            .collect::<Result<Vec<_>, GenerationError>>()?;

        let w = &mut self.w;
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.block(format!("pub struct {} {{", name), "}", |w| {
            for (field, _, ty) in &fields {
                w.line(format!("pub {}: {},", field, ty));
            }
        });
        w.blank();

        w.block(format!("impl wire::Wire for {} {{", name), "}", |w| {
            w.block("fn to_wire(&self) -> wire::Value {", "}", |w| {
                let items: Vec<String> = fields
                    .iter()
                    .map(|(field, _, _)| format!("self.{}.to_wire()", field))
                    .collect();
                w.line(format!("wire::Value::Array(vec![{}])", items.join(", ")));
            });
            w.blank();
            w.block(
                "fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {",
                "}",
                |w| {
                    w.line(format!(
                        "let items = wire::expect_array(value, {}, {:?})?;",
                        fields.len(),
                        def.name
                    ));
                    w.block(format!("Ok({} {{", name), "})", |w| {
                        for (i, (field, raw, _)) in fields.iter().enumerate() {
                            w.line(format!("{}: wire::field(items, {}, {:?})?,", field, i, raw));
                        }
                    });
                },
            );
        });
        w.blank();
        Ok(())
    }

    fn union(&mut self, def: &UnionDef) -> Result<(), GenerationError> {
        let name = ident(&def.name);
        let mut used = NameTable::new(TARGET);
        let mut variants = Vec::with_capacity(def.members.len());
        for (i, m) in def.members.iter().enumerate() {
            let raw = variant_name(self.model, &m.ty);
            let mut variant = ident(&raw);
            if used.contains(&variant) {
                variant = format!("{}{}", raw, i);
            }
            used.claim(variant.clone(), m.span, &format!("member {} of `{}`", i, def.name))?;
            variants.push((variant, self.rust_type(&m.ty, m.span)?));
        }
        let count = variants.len();

        let w = &mut self.w;
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.block(format!("pub enum {} {{", name), "}", |w| {
            for (variant, ty) in &variants {
                w.line(format!("{}({}),", variant, ty));
            }
        });
        w.blank();

        w.block(format!("impl wire::Wire for {} {{", name), "}", |w| {
            w.block("fn to_wire(&self) -> wire::Value {", "}", |w| {
                w.block("let (tag, value) = match self {", "};", |w| {
                    for (tag, (variant, _)) in variants.iter().enumerate() {
                        w.line(format!("{}::{}(v) => ({}u64, v.to_wire()),", name, variant, tag));
                    }
                });
                w.line("wire::Value::Array(vec![wire::Value::from(tag), value])");
            });
            w.blank();
            w.block(
                "fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {",
                "}",
                |w| {
                    w.line(format!(
                        "let (tag, inner) = wire::union_parts(value, {:?}, {})?;",
                        def.name, count
                    ));
                    w.line(format!(
                        "let context = |e: wire::DecodeError| e.in_field(format!(\"{}[{{}}]\", tag));",
                        def.name
                    ));
                    w.block("Ok(match tag {", "})", |w| {
                        for (tag, (variant, _)) in variants.iter().enumerate() {
                            let pattern = if tag + 1 == count {
                                "_".to_string()
                            } else {
                                tag.to_string()
                            };
                            w.line(format!(
                                "{} => {}::{}(wire::Wire::from_wire(inner).map_err(context)?),",
                                pattern, name, variant
                            ));
                        }
                    });
                },
            );
        });
        w.blank();
        Ok(())
    }

    fn namespace(&mut self, ns: Namespace) -> Result<(), GenerationError> {
        let functions = self.model.functions(ns.kind);
        let mut used = NameTable::new(TARGET);
        let mut sigs = Vec::with_capacity(functions.len());
        for f in functions {
            let mut variant = ident(&camel(&f.name));
            if variant.is_empty() || used.contains(&variant) {
                variant = format!("{}{}", ns.type_name, f.id);
            }
            used.claim(variant.clone(), f.span, &format!("{} `{}`", ns.noun, f.name))?;
            let params = f
                .params
                .iter()
                .map(|p| Ok((ident(&p.name), p.name.clone(), self.rust_type(&p.ty, p.span)?)))
                .collect::<Result<Vec<_>, GenerationError>>()?;
            let returns = if f.is_fire_and_forget() {
                None
            } else {
                Some(self.rust_type(&f.returns, f.span)?)
            };
            sigs.push(Signature {
                def: f,
                variant,
                constant: ns.id_constant(f),
                params,
                returns,
            });
        }

        let w = &mut self.w;
        for s in &sigs {
            w.line(format!("pub const {}: u32 = {};", s.constant, s.def.id));
        }
        if !sigs.is_empty() {
            w.blank();
        }

        w.line(format!("/// Decoded arguments of an incoming {}.", ns.noun));
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.block(format!("pub enum {} {{", ns.type_name), "}", |w| {
            for s in &sigs {
                if s.params.is_empty() {
                    w.line(format!("{},", s.variant));
                } else {
                    let fields: Vec<String> =
                        s.params.iter().map(|(p, _, ty)| format!("{}: {}", p, ty)).collect();
                    w.line(format!("{} {{ {} }},", s.variant, fields.join(", ")));
                }
            }
        });
        w.blank();

        w.block(format!("impl {} {{", ns.type_name), "}", |w| {
            w.line(format!("/// Decode `[messageid | nil, {}id, args...]`.", ns.noun));
            w.block(
                format!(
                    "pub fn decode(message: &wire::Value) -> Result<(Option<u64>, {}), wire::DecodeError> {{",
                    ns.type_name
                ),
                "}",
                |w| {
                    w.line("let (message_id, id, args) = wire::call_parts(message)?;");
                    w.block("let call = match id {", "};", |w| {
                        for s in &sigs {
                            w.block(format!("{} => {{", s.def.id), "}", |w| decode_arm(w, &ns, s));
                        }
                        w.line(format!(
                            "other => return Err(wire::DecodeError::UnknownFunction {{ kind: {:?}, id: other }}),",
                            ns.noun
                        ));
                    });
                    w.line("Ok((message_id, call))");
                },
            );
            w.blank();
            w.block("pub fn id(&self) -> u32 {", "}", |w| {
                w.block("match *self {", "}", |w| {
                    for s in &sigs {
                        w.line(format!("{} => {},", pattern(&ns, s, true), s.constant));
                    }
                });
            });
        });
        w.blank();

        for s in &sigs {
            stubs(w, &ns, s);
        }

        w.block(format!("pub trait {}Handler {{", ns.type_name), "}", |w| {
            for s in &sigs {
                let params: Vec<String> =
                    s.params.iter().map(|(p, _, ty)| format!(", {}: {}", p, ty)).collect();
                let ret = match s.returns.as_deref() {
                    None | Some("()") => String::new(),
                    Some(ty) => format!(" -> {}", ty),
                };
                w.line(format!("fn {}(&mut self{}){};", ident(&s.def.name), params.concat(), ret));
            }
        });
        w.blank();

        w.line(format!(
            "/// Decode an incoming {}, run it on `handler` and build the response.",
            ns.noun
        ));
        w.line("/// Fire-and-forget functions produce no response.");
        w.line(format!(
            "pub fn dispatch_{}<H: {}Handler + ?Sized>(",
            ns.noun, ns.type_name
        ));
        w.indent();
        w.line("handler: &mut H,");
        w.line("message: &wire::Value,");
        w.dedent();
        w.block(") -> Result<Option<wire::Value>, wire::DecodeError> {", "}", |w| {
            w.line(format!("let (message_id, call) = {}::decode(message)?;", ns.type_name));
            w.block("match call {", "}", |w| {
                for s in &sigs {
                    w.block(format!("{} => {{", pattern(&ns, s, false)), "}", |w| dispatch_arm(w, s));
                }
            });
        });
        w.blank();
        Ok(())
    }

    fn rust_type(&self, ty: &Type, span: Span) -> Result<String, GenerationError> {
        Ok(match ty {
            Type::Primitive(p) => match p {
                Primitive::Str => "String".to_string(),
                Primitive::Bin => "wire::Bin".to_string(),
                Primitive::Array => "Vec<wire::Value>".to_string(),
                Primitive::Nil | Primitive::FireAndForget => "()".to_string(),
                other => other.name().to_string(),
            },
            Type::Enum(id) => ident(&self.model.enum_def(*id).name),
            Type::Struct(id) => ident(&self.model.struct_def(*id).name),
            Type::Union(id) => ident(&self.model.union_def(*id).name),
            Type::List(inner) => format!("Vec<{}>", self.rust_type(inner, span)?),
            Type::Tuple(items) => {
                if items.len() > MAX_TUPLE {
                    return Err(GenerationError::Unsupported {
                        target: TARGET,
                        what: format!("tuples of more than {} elements", MAX_TUPLE),
                        span,
                    });
                }
                let parts = items
                    .iter()
                    .map(|t| self.rust_type(t, span))
                    .collect::<Result<Vec<_>, _>>()?;
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
        })
    }
}

struct Signature<'m> {
    def: &'m FunctionDef,
    variant: String,
    constant: String,
    /// `(identifier, IDL name, Rust type)`
    params: Vec<(String, String, String)>,
    /// `None` for fire-and-forget.
    returns: Option<String>,
}

fn pattern(ns: &Namespace, s: &Signature, wildcard: bool) -> String {
    if s.params.is_empty() {
        format!("{}::{}", ns.type_name, s.variant)
    } else if wildcard {
        format!("{}::{} {{ .. }}", ns.type_name, s.variant)
    } else {
        let bindings: Vec<String> = s
            .params
            .iter()
            .enumerate()
            .map(|(i, (p, _, _))| format!("{}: a{}", p, i))
            .collect();
        format!("{}::{} {{ {} }}", ns.type_name, s.variant, bindings.join(", "))
    }
}

fn decode_arm(w: &mut SourceWriter, ns: &Namespace, s: &Signature) {
    if s.def.is_fire_and_forget() {
        w.line(format!("wire::forbid_message_id(message_id, {:?})?;", s.def.name));
    } else {
        w.line(format!("wire::require_message_id(message_id, {:?})?;", s.def.name));
    }
    if s.params.is_empty() {
        w.line("wire::expect_args(args, 0)?;");
        w.line(format!("{}::{}", ns.type_name, s.variant));
        return;
    }
    w.line(format!("let args = wire::expect_args(args, {})?;", s.params.len()));
    w.block(format!("{}::{} {{", ns.type_name, s.variant), "}", |w| {
        for (i, (p, raw, _)) in s.params.iter().enumerate() {
            w.line(format!("{}: wire::field(args, {}, {:?})?,", p, i, raw));
        }
    });
}

fn dispatch_arm(w: &mut SourceWriter, s: &Signature) {
    // Arguments are bound as a0, a1, ... so IDL names cannot shadow the locals.
    let args: Vec<String> = (0..s.params.len()).map(|i| format!("a{}", i)).collect();
    let call = format!("handler.{}({})", ident(&s.def.name), args.join(", "));
    if s.returns.is_none() {
        w.line(format!("{};", call));
        w.line("Ok(None)");
        return;
    }
    w.line(format!("let result = {};", call));
    w.line(format!(
        "let message_id = wire::require_message_id(message_id, {:?})?;",
        s.def.name
    ));
    w.line(format!(
        "Ok(Some(wire::response_message(message_id, {})))",
        return_values(&s.def.returns, "result")
    ));
}

/// Encoded return values; a tuple is spliced into the response.
fn return_values(ty: &Type, var: &str) -> String {
    match ty {
        Type::Tuple(items) => {
            let parts: Vec<String> = (0..items.len()).map(|i| format!("{}.{}.to_wire()", var, i)).collect();
            format!("vec![{}]", parts.join(", "))
        }
        _ => format!("vec![{}.to_wire()]", var),
    }
}

fn stubs(w: &mut SourceWriter, ns: &Namespace, s: &Signature) {
    let mut id_param = "message_id".to_string();
    while s.params.iter().any(|(p, _, _)| *p == id_param) {
        id_param.push('_');
    }
    let mut params: Vec<String> = Vec::new();
    if s.returns.is_some() {
        params.push(format!("{}: u64", id_param));
    }
    params.extend(s.params.iter().map(|(p, _, ty)| format!("{}: &{}", p, ty)));
    let args: Vec<String> = s.params.iter().map(|(p, _, _)| format!("{}.to_wire()", p)).collect();
    let id_slot = if s.returns.is_some() {
        format!("Some({})", id_param)
    } else {
        "None".to_string()
    };

    w.block(
        format!(
            "pub fn {}({}) -> wire::Value {{",
            ns.encoder(s.def),
            params.join(", ")
        ),
        "}",
        |w| {
            w.line(format!(
                "wire::call_message({}, self::{}, vec![{}])",
                id_slot,
                s.constant,
                args.join(", ")
            ))
        },
    );
    w.blank();

    let Some(ret) = &s.returns else {
        return;
    };
    let (count, value) = match &s.def.returns {
        Type::Tuple(items) => {
            let parts: Vec<String> = (0..items.len())
                .map(|i| format!("wire::field(values, {}, \".{}\")?", i, i))
                .collect();
            let tuple = if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            };
            (items.len(), tuple)
        }
        _ => (1, format!("wire::field(values, 0, \"{} response\")?", s.def.name)),
    };
    w.block(
        format!(
            "pub fn {}(message: &wire::Value) -> Result<(u64, {}), wire::DecodeError> {{",
            ns.decoder(s.def),
            ret
        ),
        "}",
        |w| {
            w.line(format!("let (message_id, values) = wire::response_parts(message, {})?;", count));
            w.line(format!("Ok((message_id, {}))", value));
        },
    );
    w.blank();
}

/// Variant name for a union member.
fn variant_name(model: &Model, ty: &Type) -> String {
    match ty {
        Type::Primitive(p) => capitalize(p.name()),
        Type::Enum(id) => model.enum_def(*id).name.clone(),
        Type::Struct(id) => model.struct_def(*id).name.clone(),
        Type::Union(id) => model.union_def(*id).name.clone(),
        Type::List(inner) => format!("{}List", variant_name(model, inner)),
        Type::Tuple(_) => "Tuple".to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `get_stat` -> `GetStat`
fn camel(s: &str) -> String {
    s.split('_').filter(|p| !p.is_empty()).map(capitalize).collect()
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe",
    "unsized", "use", "virtual", "where", "while", "yield",
];

/// An IDL name as a Rust identifier.
fn ident(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{}_", name),
        _ if KEYWORDS.contains(&name) => format!("r#{}", name),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    fn generate(src: &str) -> String {
        let model = compile(src).expect("compile");
        let out = RustGenerator::new(GeneratorConfig::new("demo"))
            .generate(&model)
            .expect("generate");
        out.file("demo.rs").expect("demo.rs").to_string()
    }

    #[test]
    fn enum_has_discriminants_and_try_from() {
        let out = generate("enum Errno:\n    ENOENT = 16\n    EIO = 0x05\n");
        assert!(out.contains("#[repr(u64)]"));
        assert!(out.contains("    ENOENT = 16,"));
        assert!(out.contains("    EIO = 5,"));
        assert!(out.contains("16 => Ok(Errno::ENOENT),"));
        assert!(out.contains("other => Err(wire::unknown_enum_value(\"Errno\", other)),"));
    }

    #[test]
    fn struct_decodes_fields_in_order() {
        let out = generate("struct P:\n    x: i32\n    type: str\n");
        assert!(out.contains("pub r#type: String,"));
        assert!(out.contains("let items = wire::expect_array(value, 2, \"P\")?;"));
        assert!(out.contains("x: wire::field(items, 0, \"x\")?,"));
        assert!(out.contains("r#type: wire::field(items, 1, \"type\")?,"));
    }

    #[test]
    fn union_variants_and_tags() {
        let out = generate("struct S:\n    a: u8\nunion U = S | [S] | nil\n");
        assert!(out.contains("S(S),"));
        assert!(out.contains("SList(Vec<S>),"));
        assert!(out.contains("Nil(()),"));
        assert!(out.contains("U::Nil(v) => (2u64, v.to_wire()),"));
        assert!(out.contains("wire::union_parts(value, \"U\", 3)?"));
    }

    #[test]
    fn fire_and_forget_has_no_response_path() {
        let out = generate("fn get_stat(path: str) -> (bool, u64)\nfn log(line: str) -> fireandforget\n");
        assert!(out.contains("pub const METHOD_GET_STAT: u32 = 0;"));
        assert!(out.contains("pub const METHOD_LOG: u32 = 1;"));
        assert!(out.contains("GetStat { path: String },"));
        assert!(out.contains("pub fn encode_log_call(line: &String) -> wire::Value {"));
        assert!(out.contains("wire::call_message(None, self::METHOD_LOG, vec![line.to_wire()])"));
        assert!(out.contains("wire::forbid_message_id(message_id, \"log\")?;"));
        assert!(!out.contains("decode_log_response"));
        assert!(out.contains("fn get_stat(&mut self, path: String) -> (bool, u64);"));
        assert!(out.contains("response_message(message_id, vec![result.0.to_wire(), result.1.to_wire()])"));
    }

    #[test]
    fn signals_get_their_own_namespace() {
        let out = generate("fn a() -> nil\nsignal changed(path: str) -> nil\n");
        assert!(out.contains("pub const SIGNAL_CHANGED: u32 = 0;"));
        assert!(out.contains("pub trait SignalHandler {"));
        assert!(out.contains("pub fn dispatch_signal<H: SignalHandler + ?Sized>("));
        assert!(out.contains("pub fn decode_changed_signal_response(message: &wire::Value)"));
    }

    #[test]
    fn dispatch_binds_arguments_to_fresh_names() {
        let out = generate("fn ping(handler: u8) -> bool\nfn pong(message_id: u32, message_id_: u8) -> bool\n");
        assert!(out.contains("Method::Ping { handler: a0 } => {"));
        assert!(out.contains("let result = handler.ping(a0);"));
        assert!(out.contains("Method::Pong { message_id: a0, message_id_: a1 } => {"));
        assert!(out.contains("let result = handler.pong(a0, a1);"));
        assert!(out.contains(
            "pub fn encode_pong_call(message_id__: u64, message_id: &u32, message_id_: &u8) -> wire::Value {"
        ));
        assert!(out.contains("wire::call_message(Some(message_id__), self::METHOD_PONG, vec![message_id.to_wire(), message_id_.to_wire()])"));
    }

    fn clash(src: &str) -> String {
        let model = compile(src).expect("compile");
        match RustGenerator::new(GeneratorConfig::new("demo")).generate(&model) {
            Err(GenerationError::NameClash { name, .. }) => name,
            other => panic!("expected a name clash, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn generated_names_must_be_unique() {
        assert_eq!(clash("struct Method:\n    a: u8\n"), "Method");
        assert_eq!(clash("enum SignalHandler:\n    A = 1\n"), "SignalHandler");
        assert_eq!(clash("const METHOD_AUTH = 1\nfn auth() -> bool\n"), "METHOD_AUTH");
        assert_eq!(clash("fn getStat() -> nil\nfn getstat() -> nil\n"), "METHOD_GETSTAT");
        assert_eq!(
            clash("fn x_signal() -> nil\nsignal x() -> nil\n"),
            "decode_x_signal_response"
        );
        assert_eq!(clash("struct S:\n    self: u8\n    self_: u8\n"), "self_");
    }

    #[test]
    fn distinct_names_with_shared_spelling_are_kept_apart() {
        let out = generate("struct Bin:\n    data: bin\nunion U = Bin | bin\nfn get_stat() -> nil\nfn getStat() -> nil\n");
        assert!(out.contains("pub data: wire::Bin,"));
        assert!(out.contains("    Bin(Bin),"));
        assert!(out.contains("    Bin1(wire::Bin),"));
        assert!(out.contains("    GetStat,"));
        assert!(out.contains("    Method1,"));
    }

    #[test]
    fn idents_escape_keywords() {
        assert_eq!(ident("type"), "r#type");
        assert_eq!(ident("self"), "self_");
        assert_eq!(ident("path"), "path");
        assert_eq!(camel("get_stat"), "GetStat");
    }
}
