//! Validator for resolved models: IDL invariants the grammar cannot express.
//!
//! ## Rules
//!
//! - **FireAndForgetPlacement**: `fireandforget` only as the whole return type of a `fn`
//!   or `signal`.
//! - **DuplicateEnumMember** / **DuplicateEnumValue** / **NegativeEnumValue**.
//! - **DuplicateField**: field names unique within a struct.
//! - **DuplicateParameter**: parameter names unique within a method or signal.
//! - **DegenerateUnion**: at least two members. **DuplicateUnionMember**: no repeats.
//!
//! Every violation is reported; the walk never stops early.

use crate::ast::Span;
use crate::model::{FunctionDef, Model, Type};
use std::collections::{HashMap, HashSet};

/// Identifies which rule produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    FireAndForgetPlacement,
    DuplicateEnumMember,
    DuplicateEnumValue,
    NegativeEnumValue,
    DuplicateField,
    DuplicateParameter,
    DegenerateUnion,
    DuplicateUnionMember,
}

impl ValidationRule {
    pub fn id(self) -> &'static str {
        match self {
            ValidationRule::FireAndForgetPlacement => "fireandforget-placement",
            ValidationRule::DuplicateEnumMember => "duplicate-enum-member",
            ValidationRule::DuplicateEnumValue => "duplicate-enum-value",
            ValidationRule::NegativeEnumValue => "negative-enum-value",
            ValidationRule::DuplicateField => "duplicate-field",
            ValidationRule::DuplicateParameter => "duplicate-parameter",
            ValidationRule::DegenerateUnion => "degenerate-union",
            ValidationRule::DuplicateUnionMember => "duplicate-union-member",
        }
    }
}

/// A single violation with location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{span}: {message} [{}]", rule.id())]
pub struct ValidationError {
    pub rule: ValidationRule,
    pub span: Span,
    pub message: String,
}

/// Run all rules on a resolved model. Returns errors in source order.
pub fn validate(model: &Model) -> Vec<ValidationError> {
    let mut out = Vec::new();

    for e in &model.enums {
        let mut names = HashSet::new();
        let mut values: HashMap<i64, &str> = HashMap::new();
        for m in &e.members {
            if !names.insert(m.name.as_str()) {
                push(
                    &mut out,
                    ValidationRule::DuplicateEnumMember,
                    m.span,
                    format!("duplicate member `{}.{}`", e.name, m.name),
                );
            }
            if m.value < 0 {
                push(
                    &mut out,
                    ValidationRule::NegativeEnumValue,
                    m.span,
                    format!("`{}.{}` has negative value {}", e.name, m.name, m.value),
                );
            }
            if let Some(previous) = values.insert(m.value, m.name.as_str()) {
                push(
                    &mut out,
                    ValidationRule::DuplicateEnumValue,
                    m.span,
                    format!(
                        "`{}.{}` reuses value {} of `{}.{}`",
                        e.name, m.name, m.value, e.name, previous
                    ),
                );
            }
        }
    }

    for s in &model.structs {
        let mut names = HashSet::new();
        for f in &s.fields {
            if !names.insert(f.name.as_str()) {
                push(
                    &mut out,
                    ValidationRule::DuplicateField,
                    f.span,
                    format!("duplicate field `{}.{}`", s.name, f.name),
                );
            }
            check_value_position(&mut out, &f.ty, f.span, || format!("field `{}.{}`", s.name, f.name));
        }
    }

    for u in &model.unions {
        if u.members.len() < 2 {
            push(
                &mut out,
                ValidationRule::DegenerateUnion,
                u.span,
                format!("union `{}` needs at least two members (has {})", u.name, u.members.len()),
            );
        }
        let mut seen: Vec<&Type> = Vec::new();
        for (i, m) in u.members.iter().enumerate() {
            if seen.contains(&&m.ty) {
                push(
                    &mut out,
                    ValidationRule::DuplicateUnionMember,
                    m.span,
                    format!(
                        "union `{}` lists `{}` more than once",
                        u.name,
                        model.display_type(&m.ty)
                    ),
                );
            }
            seen.push(&m.ty);
            check_value_position(&mut out, &m.ty, m.span, || format!("member {} of union `{}`", i, u.name));
        }
    }

    for f in model.methods.iter().chain(&model.signals) {
        check_function(&mut out, f);
    }

    out.sort_by_key(|e| e.span);
    tracing::debug!(errors = out.len(), "validated model");
    out
}

fn check_function(out: &mut Vec<ValidationError>, f: &FunctionDef) {
    let mut names = HashSet::new();
    for p in &f.params {
        if !names.insert(p.name.as_str()) {
            push(
                out,
                ValidationRule::DuplicateParameter,
                p.span,
                format!("duplicate parameter `{}` of `{}`", p.name, f.name),
            );
        }
        check_value_position(out, &p.ty, p.span, || format!("parameter `{}` of `{}`", p.name, f.name));
    }
    // The whole return type may be the marker; nothing nested inside it may.
    if !f.returns.is_fire_and_forget() && f.returns.contains_fire_and_forget() {
        push(
            out,
            ValidationRule::FireAndForgetPlacement,
            f.span,
            format!("`fireandforget` must be the entire return type of `{}`", f.name),
        );
    }
}

fn check_value_position(
    out: &mut Vec<ValidationError>,
    ty: &Type,
    span: Span,
    describe: impl FnOnce() -> String,
) {
    if ty.contains_fire_and_forget() {
        push(
            out,
            ValidationRule::FireAndForgetPlacement,
            span,
            format!("`fireandforget` is only valid as a return type, not in {}", describe()),
        );
    }
}

fn push(out: &mut Vec<ValidationError>, rule: ValidationRule, span: Span, message: String) {
    out.push(ValidationError { rule, span, message });
}
