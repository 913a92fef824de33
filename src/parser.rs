//! Parse IDL source into the AST using PEST.
//!
//! Parsing stops at the first error: the returned [`SyntaxError`] carries the line,
//! column and what the grammar expected there.

use crate::ast::*;
use pest::error::{ErrorVariant, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct IdlParser;

/// Malformed IDL text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: syntax error: expected {expected}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub expected: String,
}

impl SyntaxError {
    fn at(span: Span, expected: impl Into<String>) -> Self {
        SyntaxError {
            line: span.line,
            column: span.column,
            expected: expected.into(),
        }
    }
}

/// Parse IDL source into an AST.
pub fn parse(source: &str) -> Result<Protocol, SyntaxError> {
    let mut pairs = IdlParser::parse(Rule::file, source).map_err(from_pest)?;
    let file = pairs.next().ok_or_else(|| SyntaxError::at(Span::new(1, 1), "declaration"))?;
    let mut decls = Vec::new();
    for inner in file.into_inner() {
        match inner.as_rule() {
            Rule::const_decl => decls.push(Decl::Const(build_const(inner)?)),
            Rule::enum_decl => decls.push(Decl::Enum(build_enum(inner)?)),
            Rule::struct_decl => decls.push(Decl::Struct(build_struct(inner)?)),
            Rule::union_decl => decls.push(Decl::Union(build_union(inner)?)),
            Rule::fn_decl => decls.push(Decl::Function(build_function(inner, FunctionKind::Method)?)),
            Rule::signal_decl => {
                decls.push(Decl::Function(build_function(inner, FunctionKind::Signal)?))
            }
            _ => {}
        }
    }
    tracing::debug!(declarations = decls.len(), "parsed protocol");
    Ok(Protocol { decls })
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let (line, column) = pair.as_span().start_pos().line_col();
    Span { line, column }
}

fn from_pest(e: pest::error::Error<Rule>) -> SyntaxError {
    let (line, column) = match e.line_col {
        LineColLocation::Pos(p) => p,
        LineColLocation::Span(start, _) => start,
    };
    let expected = match &e.variant {
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let mut names: Vec<&str> = positives.iter().map(|r| describe(*r)).collect();
            names.sort_unstable();
            names.dedup();
            names.join(", ")
        }
        ErrorVariant::ParsingError { .. } => "end of input".to_string(),
        ErrorVariant::CustomError { message } => message.clone(),
    };
    SyntaxError { line, column, expected }
}

/// Human-readable name of a grammar rule.
fn describe(rule: Rule) -> &'static str {
    match rule {
        Rule::EOI => "end of input",
        Rule::kw_enum
        | Rule::kw_struct
        | Rule::kw_union
        | Rule::kw_fn
        | Rule::kw_signal
        | Rule::kw_const => "declaration (`enum`, `struct`, `union`, `fn`, `signal` or `const`)",
        Rule::ident => "name",
        Rule::int => "integer",
        Rule::string => "string",
        Rule::member_sep => "indented member line",
        Rule::enum_member => "`<Member> = <int>`",
        Rule::struct_field | Rule::param => "`<name>: <type>`",
        Rule::param_list => "parameter list",
        Rule::const_value => "constant value",
        Rule::type_expr | Rule::list_type | Rule::tuple_type => "type",
        _ => "declaration",
    }
}

fn build_const(pair: Pair<Rule>) -> Result<ConstDecl, SyntaxError> {
    let span = span_of(&pair);
    let mut name = None;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::const_value => {
                let lit = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| SyntaxError::at(span, "constant value"))?;
                value = Some(match lit.as_rule() {
                    Rule::int => Literal::Int(parse_int(&lit)?),
                    Rule::string => Literal::String(unquote(lit.as_str())),
                    _ => Literal::Word(lit.as_str().to_string()),
                });
            }
            _ => {}
        }
    }
    Ok(ConstDecl {
        name: name.ok_or_else(|| SyntaxError::at(span, "constant name"))?,
        value: value.ok_or_else(|| SyntaxError::at(span, "constant value"))?,
        span,
    })
}

fn build_enum(pair: Pair<Rule>) -> Result<EnumDecl, SyntaxError> {
    let span = span_of(&pair);
    let mut name = String::new();
    let mut members = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::enum_member => {
                let member_span = span_of(&inner);
                let mut it = inner.into_inner();
                let member_name = it
                    .next()
                    .ok_or_else(|| SyntaxError::at(member_span, "member name"))?;
                let value = it
                    .next()
                    .ok_or_else(|| SyntaxError::at(member_span, "integer"))?;
                members.push(EnumMember {
                    name: member_name.as_str().to_string(),
                    value: parse_int(&value)?,
                    span: member_span,
                });
            }
            _ => {}
        }
    }
    Ok(EnumDecl { name, members, span })
}

fn build_struct(pair: Pair<Rule>) -> Result<StructDecl, SyntaxError> {
    let span = span_of(&pair);
    let mut name = String::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::struct_field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    Ok(StructDecl { name, fields, span })
}

fn build_union(pair: Pair<Rule>) -> Result<UnionDecl, SyntaxError> {
    let span = span_of(&pair);
    let mut name = String::new();
    let mut members = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::type_expr => members.push(build_type_expr(inner)?),
            _ => {}
        }
    }
    Ok(UnionDecl { name, members, span })
}

fn build_function(pair: Pair<Rule>, kind: FunctionKind) -> Result<FunctionDecl, SyntaxError> {
    let span = span_of(&pair);
    let mut name = String::new();
    let mut params = Vec::new();
    let mut returns = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::param_list => {
                for param in inner.into_inner() {
                    if param.as_rule() == Rule::param {
                        params.push(build_field(param)?);
                    }
                }
            }
            Rule::type_expr => returns = Some(build_type_expr(inner)?),
            _ => {}
        }
    }
    Ok(FunctionDecl {
        kind,
        name,
        params,
        returns: returns.ok_or_else(|| SyntaxError::at(span, "return type"))?,
        span,
    })
}

/// `name: type`, shared by struct fields and parameters.
fn build_field(pair: Pair<Rule>) -> Result<Field, SyntaxError> {
    let span = span_of(&pair);
    let mut it = pair.into_inner();
    let name = it.next().ok_or_else(|| SyntaxError::at(span, "name"))?;
    let type_pair = it.next().ok_or_else(|| SyntaxError::at(span, "type"))?;
    Ok(Field {
        name: name.as_str().to_string(),
        type_expr: build_type_expr(type_pair)?,
        span,
    })
}

fn build_type_expr(pair: Pair<Rule>) -> Result<TypeExpr, SyntaxError> {
    let span = span_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SyntaxError::at(span, "type"))?;
    match inner.as_rule() {
        Rule::ident => Ok(TypeExpr::Named(inner.as_str().to_string(), span)),
        Rule::list_type => {
            let elem = inner
                .into_inner()
                .next()
                .ok_or_else(|| SyntaxError::at(span, "list element type"))?;
            Ok(TypeExpr::List(Box::new(build_type_expr(elem)?), span))
        }
        Rule::tuple_type => {
            let items = inner
                .into_inner()
                .map(build_type_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TypeExpr::Tuple(items, span))
        }
        _ => Err(SyntaxError::at(span, "type")),
    }
}

fn parse_int(pair: &Pair<Rule>) -> Result<i64, SyntaxError> {
    let s = pair.as_str();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        s.parse::<i64>()
    };
    parsed.map_err(|_| SyntaxError::at(span_of(pair), "integer that fits in 64 bits"))
}

fn unquote(s: &str) -> String {
    let inner = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s);
    inner.replace("\\n", "\n").replace("\\t", "\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_with_blank_and_comment_lines() {
        let src = "enum E:\n    A = 1\n\n    # note\n    B = 0x10\n";
        let p = parse(src).expect("parse");
        let e = p.enums().next().expect("enum");
        assert_eq!(e.members.len(), 2);
        assert_eq!(e.members[1].value, 16);
        assert_eq!(e.members[1].span.line, 5);
    }

    #[test]
    fn keyword_needs_word_boundary() {
        assert!(parse("enumE:\n    A = 1\n").is_err());
    }

    #[test]
    fn nested_type_expressions() {
        let p = parse("fn f(a: [(u8, [str])]) -> nil\n").expect("parse");
        let f = p.functions().next().expect("fn");
        assert_eq!(f.params[0].type_expr.to_string(), "[(u8, [str])]");
    }

    #[test]
    fn const_values() {
        let p = parse("const A = 3\nconst B = \"x\"\nconst C = word\n").expect("parse");
        let values: Vec<_> = p
            .decls
            .iter()
            .map(|d| match d {
                Decl::Const(c) => c.value.clone(),
                _ => panic!("not a const"),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                Literal::Int(3),
                Literal::String("x".into()),
                Literal::Word("word".into())
            ]
        );
    }

    #[test]
    fn error_reports_line() {
        let err = parse("struct S:\n    a: u8\nfn broken(a u8) -> nil\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(!err.expected.is_empty());
    }
}
