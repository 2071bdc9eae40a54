//! Assignment targets versus declared mutability.

use super::symbols::SymbolTable;
use crate::ast::{Expr, ExprKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::suggest::suggest;

fn undefined(name: &str, expr: &Expr, symbols: &SymbolTable) -> Diagnostic {
    Diagnostic::error(
        DiagnosticCode::UndefinedVariable,
        format!("undefined variable `{}`", name),
        expr.span,
    )
    .with_suggestion(suggest(name, symbols.visible_names()))
}

/// Checks that `target` names a place rooted in a mutable binding.
pub fn validate_assignment_target(target: &Expr, symbols: &SymbolTable) -> Result<(), Diagnostic> {
    match &target.node {
        ExprKind::Ident(name) => match symbols.lookup(name) {
            None => Err(undefined(name, target, symbols)),
            Some(sym) if !sym.is_mutable => Err(Diagnostic::error(
                DiagnosticCode::AssignToImmutable,
                format!("cannot assign twice to immutable binding `{}`", name),
                target.span,
            )
            .with_help(format!("declare it with `let mut {}`", name))),
            Some(_) => Ok(()),
        },
        ExprKind::Member { .. } | ExprKind::Index { .. } => {
            if target.has_safe_link() {
                return Err(Diagnostic::error(
                    DiagnosticCode::InvalidAssignmentTarget,
                    "cannot assign through `?.`",
                    target.span,
                ));
            }
            let Some(root) = target.root_ident() else {
                return Err(Diagnostic::error(
                    DiagnosticCode::InvalidAssignmentTarget,
                    "assignment target must be rooted in a variable",
                    target.span,
                ));
            };
            match symbols.lookup(root) {
                None => Err(undefined(root, target, symbols)),
                Some(sym) if !sym.is_mutable => Err(Diagnostic::error(
                    DiagnosticCode::AssignToImmutable,
                    format!("cannot assign to a part of immutable binding `{}`", root),
                    target.span,
                )
                .with_help(format!("declare it with `let mut {}`", root))),
                Some(_) => Ok(()),
            }
        }
        _ => Err(Diagnostic::error(
            DiagnosticCode::InvalidAssignmentTarget,
            "invalid assignment target",
            target.span,
        )),
    }
}

/// A `mut self` method called through a binding needs that binding to be mutable.
pub fn validate_mutating_call(receiver: &Expr, method: &str, symbols: &SymbolTable) -> Result<(), Diagnostic> {
    let Some(root) = receiver.root_ident() else {
        return Ok(());
    };
    match symbols.lookup(root) {
        Some(sym) if !sym.is_mutable => Err(Diagnostic::error(
            DiagnosticCode::AssignToImmutable,
            format!(
                "cannot call mutating method `{}` on immutable binding `{}`",
                method, root
            ),
            receiver.span,
        )),
        _ => Ok(()),
    }
}
