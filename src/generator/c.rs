//! C target: a single header with declarations.
//!
//! Every identifier is prefixed with the protocol name. Method and signal calls are
//! represented as a message struct holding the id and a union of per-function argument
//! structs. The `<name>_read_message` / `<name>_write_message` prototypes (and their
//! signal counterparts) are declared here and implemented by the application over its
//! MessagePack library.

use super::{CodeGenerator, GeneratedSource, GenerationError, GeneratorConfig, NameTable, SourceWriter};
use crate::ast::{FunctionKind, Literal, Span};
use crate::model::*;

const TARGET: &str = "c";

const KEYWORDS: &[&str] = &[
    "auto", "bool", "break", "case", "char", "const", "continue", "default", "do", "double",
    "else", "enum", "extern", "false", "float", "for", "goto", "if", "inline", "int", "long",
    "register", "restrict", "return", "short", "signed", "sizeof", "static", "struct",
    "switch", "true", "typedef", "union", "unsigned", "void", "volatile", "while",
];

pub struct CGenerator {
    config: GeneratorConfig,
}

impl CGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        CGenerator { config }
    }
}

impl CodeGenerator for CGenerator {
    fn generate(&mut self, model: &Model) -> Result<GeneratedSource, GenerationError> {
        let name = self.config.name.as_str();
        check_names(model, name)?;
        let guard = format!("__{}_H__", name.to_uppercase());
        let mut h = Header {
            model,
            name,
            w: SourceWriter::new(4),
        };

        h.w.line(format!("/* Generated by vixrpcgen from protocol `{}`. Do not edit. */", name));
        h.w.line(format!("#ifndef {}", guard));
        h.w.line(format!("#define {}", guard));
        h.w.line("#include <stdbool.h>");
        h.w.line("#include <stddef.h>");
        h.w.line("#include <stdint.h>");
        h.w.line("#ifdef __cplusplus");
        h.w.line("extern \"C\" {");
        h.w.line("#endif");
        h.w.blank();

        for c in &model.consts {
            h.constant(c);
        }
        if !model.consts.is_empty() {
            h.w.blank();
        }
        for symbol in &model.type_order {
            match *symbol {
                Symbol::Enum(id) => h.enumeration(model.enum_def(id)),
                Symbol::Struct(id) => h.structure(model.struct_def(id))?,
                Symbol::Union(id) => h.union(model.union_def(id))?,
                _ => {}
            }
        }
        h.functions(FunctionKind::Method)?;
        h.functions(FunctionKind::Signal)?;

        h.w.line("#ifdef __cplusplus");
        h.w.line("} /* extern \"C\" */");
        h.w.line("#endif");
        h.w.line(format!("#endif /* {} */", guard));

        tracing::debug!(name, "generated c header");
        Ok(GeneratedSource::single(format!("{}.h", name), h.w.finish()))
    }
}

fn noun(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Method => "method",
        FunctionKind::Signal => "signal",
    }
}

/// Every declared identifier lives in one table: macros, enum constants, typedefs,
/// functions and tags would all collide through the preprocessor or the tag namespace.
fn check_names(model: &Model, name: &str) -> Result<(), GenerationError> {
    let mut names = NameTable::new(TARGET);
    for c in &model.consts {
        names.claim(format!("{}_{}", name, c.name), c.span, &format!("const `{}`", c.name))?;
    }
    for def in &model.enums {
        let key = format!("{}_{}", name, def.name);
        names.claim(key.clone(), def.span, &format!("enum `{}`", def.name))?;
        for m in &def.members {
            names.claim(format!("{}_{}", key, m.name), m.span, &format!("member `{}`", m.name))?;
        }
    }
    for def in &model.structs {
        names.claim(format!("{}_{}", name, def.name), def.span, &format!("struct `{}`", def.name))?;
        for f in &def.fields {
            check_keyword(&f.name, f.span)?;
        }
    }
    for def in &model.unions {
        names.claim(format!("{}_{}", name, def.name), def.span, &format!("union `{}`", def.name))?;
    }
    for kind in [FunctionKind::Method, FunctionKind::Signal] {
        let functions = model.functions(kind);
        let Some(first) = functions.first() else {
            continue;
        };
        let noun = noun(kind);
        let generated = [
            format!("{}_{}id_t", name, noun),
            format!("{}_{}_t", name, noun),
            format!("{}_read_{}", name, message_noun(kind)),
            format!("{}_write_{}", name, message_noun(kind)),
        ];
        for g in generated {
            names.claim(g, first.span, &format!("the {} declarations", noun))?;
        }
        for f in functions {
            let owner = format!("{} `{}`", noun, f.name);
            names.claim(
                format!("{}_{}_{}", name.to_uppercase(), noun.to_uppercase(), f.name.to_uppercase()),
                f.span,
                &owner,
            )?;
            names.claim(format!("{}_{}_args_t", name, f.name), f.span, &owner)?;
            for p in &f.params {
                check_keyword(&p.name, p.span)?;
            }
        }
    }
    Ok(())
}

/// Suffix of the read/write prototypes: `message` for methods, `signal` for signals.
fn message_noun(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Method => "message",
        FunctionKind::Signal => "signal",
    }
}

fn check_keyword(name: &str, span: Span) -> Result<(), GenerationError> {
    if KEYWORDS.contains(&name) {
        return Err(unsupported(&format!("the C keyword `{}` as a name", name), span));
    }
    Ok(())
}

struct Header<'a> {
    model: &'a Model,
    name: &'a str,
    w: SourceWriter,
}

impl Header<'_> {
    fn constant(&mut self, c: &ConstDef) {
        let value = match &c.value {
            Literal::Int(v) => v.to_string(),
            Literal::String(s) | Literal::Word(s) => c_string(s),
        };
        self.w.line(format!("#define {}_{} {}", self.name, c.name, value));
    }

    fn enumeration(&mut self, def: &EnumDef) {
        let key = format!("{}_{}", self.name, def.name);
        self.w.block(format!("enum {} {{", key), "};", |w| {
            for m in &def.members {
                w.line(format!("{}_{} = {},", key, m.name, m.value));
            }
        });
        self.w.blank();
    }

    fn structure(&mut self, def: &StructDef) -> Result<(), GenerationError> {
        let fields = def
            .fields
            .iter()
            .map(|f| self.declaration(&f.ty, &f.name, f.span))
            .collect::<Result<Vec<_>, _>>()?;
        self.w.block(format!("struct {}_{} {{", self.name, def.name), "};", |w| {
            if fields.iter().all(Option::is_none) {
                w.line("uint8_t unused;");
            }
            for f in fields.iter().flatten() {
                w.line(f);
            }
        });
        self.w.blank();
        Ok(())
    }

    /// Tagged union: `tag` selects the active member, `nil` members carry no payload.
    fn union(&mut self, def: &UnionDef) -> Result<(), GenerationError> {
        let members = def
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| self.declaration(&m.ty, &format!("v{}", i), m.span))
            .collect::<Result<Vec<_>, _>>()?;
        self.w.block(format!("struct {}_{} {{", self.name, def.name), "};", |w| {
            w.line("uint64_t tag;");
            if members.iter().any(Option::is_some) {
                w.block("union {", "};", |w| {
                    for m in members.iter().flatten() {
                        w.line(m);
                    }
                });
            }
        });
        self.w.blank();
        Ok(())
    }

    fn functions(&mut self, kind: FunctionKind) -> Result<(), GenerationError> {
        let functions = self.model.functions(kind);
        if functions.is_empty() {
            return Ok(());
        }
        let noun = noun(kind);
        let (name, upper) = (self.name, self.name.to_uppercase());

        self.w.block("typedef enum {", &format!("}} {}_{}id_t;", name, noun), |w| {
            for f in functions {
                w.line(format!(
                    "{}_{}_{} = {},",
                    upper,
                    noun.to_uppercase(),
                    f.name.to_uppercase(),
                    f.id
                ));
            }
        });
        self.w.blank();

        for f in functions {
            let params = f
                .params
                .iter()
                .map(|p| self.declaration(&p.ty, &p.name, p.span))
                .collect::<Result<Vec<_>, _>>()?;
            let params: Vec<String> = params.into_iter().flatten().collect();
            self.w.block("typedef struct {", &format!("}} {}_{}_args_t;", name, f.name), |w| {
                if params.is_empty() {
                    // C has no empty structs.
                    w.line("uint8_t unused;");
                }
                for p in &params {
                    w.line(p);
                }
            });
            self.w.blank();
        }

        self.w.block("typedef struct {", &format!("}} {}_{}_t;", name, noun), |w| {
            w.line("uint64_t messageid;");
            w.line("bool has_messageid;");
            w.line(format!("{}_{}id_t {}id;", name, noun, noun));
            w.block("union {", "};", |w| {
                for f in functions {
                    w.line(format!("{}_{}_args_t args_{};", name, f.name, f.name));
                }
            });
        });
        self.w.blank();

        let suffix = message_noun(kind);
        self.w.line(format!("int {}_read_{}(int, {}_{}_t*);", name, suffix, name, noun));
        self.w.line(format!("int {}_write_{}({}_{}_t*, int);", name, suffix, name, noun));
        self.w.blank();
        Ok(())
    }

    /// `type name;` for a field, or `None` for `nil`, which has no storage.
    fn declaration(&self, ty: &Type, field: &str, span: Span) -> Result<Option<String>, GenerationError> {
        if let Type::List(inner) = ty {
            let elem = self.scalar(inner, span)?.ok_or_else(|| unsupported("lists of nil", span))?;
            return Ok(Some(format!(
                "struct {{ size_t count; {}* items; }} {};",
                elem, field
            )));
        }
        Ok(self.scalar(ty, span)?.map(|t| format!("{} {};", t, field)))
    }

    fn scalar(&self, ty: &Type, span: Span) -> Result<Option<String>, GenerationError> {
        let c = match ty {
            Type::Primitive(p) => match p {
                Primitive::U8 => "uint8_t",
                Primitive::U16 => "uint16_t",
                Primitive::U32 => "uint32_t",
                Primitive::U64 => "uint64_t",
                Primitive::I8 => "int8_t",
                Primitive::I16 => "int16_t",
                Primitive::I32 => "int32_t",
                Primitive::I64 => "int64_t",
                Primitive::F32 => "float",
                Primitive::F64 => "double",
                Primitive::Bool => "bool",
                Primitive::Str | Primitive::Bin => "char*",
                Primitive::Nil | Primitive::FireAndForget => return Ok(None),
                Primitive::Array => return Err(unsupported("the untyped `array` type", span)),
            }
            .to_string(),
            Type::Enum(id) => format!("enum {}_{}", self.name, self.model.enum_def(*id).name),
            Type::Struct(id) => format!("struct {}_{}", self.name, self.model.struct_def(*id).name),
            Type::Union(id) => format!("struct {}_{}", self.name, self.model.union_def(*id).name),
            Type::List(_) => return Err(unsupported("nested lists", span)),
            Type::Tuple(_) => return Err(unsupported("tuples", span)),
        };
        Ok(Some(c))
    }
}

fn unsupported(what: &str, span: Span) -> GenerationError {
    GenerationError::Unsupported {
        target: TARGET,
        what: what.to_string(),
        span,
    }
}

fn c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
