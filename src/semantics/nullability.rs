//! Null-safety rules for `??`, `?.` and access through nullable values.

use super::type_checker::are_types_compatible;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;
use crate::types::Type;

/// Strips one nullable layer for a use that needs a value, warning when it was present.
pub fn require_non_nullable(ty: &Type, span: Span, context: &str) -> (Type, Option<Diagnostic>) {
    match ty {
        Type::Nullable(inner) => (
            inner.as_ref().clone(),
            Some(
                Diagnostic::warning(
                    DiagnosticCode::PossibleNullReference,
                    format!("{} on a value of nullable type `{}`", context, ty),
                    span,
                )
                .with_help("use `?.` or `??` to handle null"),
            ),
        ),
        other => (other.clone(), None),
    }
}

/// Types `left ?? right`.
pub fn validate_null_coalesce(left: &Type, right: &Type, span: Span) -> (Type, Vec<Diagnostic>) {
    if left.is_unknown() {
        return (right.non_null().clone(), Vec::new());
    }
    if left.is_any() {
        return (Type::ANY, Vec::new());
    }
    if !left.is_nullable() {
        let warning = Diagnostic::warning(
            DiagnosticCode::RedundantNullCoalesce,
            format!("left side of `??` has non-nullable type `{}`", left),
            span,
        );
        return (left.clone(), vec![warning]);
    }

    let base = left.non_null().clone();
    let mut diags = Vec::new();
    if !are_types_compatible(&base, right.non_null()) {
        diags.push(Diagnostic::error(
            DiagnosticCode::TypeMismatch,
            format!("`??` fallback has type `{}`, expected `{}`", right, base),
            span,
        ));
    }
    let result = if right.is_nullable() {
        Type::nullable(base)
    } else {
        base
    };
    (result, diags)
}

/// Types `receiver?.member` given the member's declared type.
pub fn safe_member_type(receiver: &Type, member: Type, span: Span) -> (Type, Option<Diagnostic>) {
    if receiver.is_nullable() {
        return (Type::nullable(member), None);
    }
    if receiver.is_permissive() {
        return (member, None);
    }
    let warning = Diagnostic::warning(
        DiagnosticCode::RedundantSafeNavigation,
        format!("`?.` on non-nullable type `{}`", receiver),
        span,
    );
    (member, Some(warning))
}
