//! Typing rules for `|`.
//!
//! A pipe is either a command pipe (`Command | Command`, joined into one shell
//! pipeline) or a value pipe (`x | f(a)`, calling `f(x, a)`).

use super::type_checker::are_types_compatible;
use crate::ast::{Expr, ExprKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    Command,
    Value,
}

/// Right operands that take the piped value as their first argument.
pub fn is_stage(expr: &Expr) -> bool {
    matches!(expr.node, ExprKind::Call { .. } | ExprKind::StaticCall { .. })
}

/// Name used for a stage in diagnostics.
pub fn stage_name(expr: &Expr) -> String {
    match &expr.node {
        ExprKind::Call { callee, .. } => callee.clone(),
        ExprKind::StaticCall { type_name, method, .. } => format!("{}::{}", type_name, method),
        _ => "<expression>".to_string(),
    }
}

/// Command mode when the left side is a `Command`, or the right side is a
/// non-call operand typed `Command`.
pub fn classify(left: &Type, right: &Expr, right_ty: Option<&Type>) -> PipeMode {
    if left.is_command() {
        return PipeMode::Command;
    }
    match right_ty {
        Some(t) if !is_stage(right) && t.is_command() => PipeMode::Command,
        _ => PipeMode::Value,
    }
}

/// Both operands of a command pipe must be `Command`; one diagnostic per offending side.
pub fn validate_pipe_types(left: &Type, right: &Type, span: Span) -> Vec<Diagnostic> {
    [("left", left), ("right", right)]
        .into_iter()
        .filter(|(_, t)| !t.is_command() && !t.is_permissive())
        .map(|(side, t)| {
            Diagnostic::error(
                DiagnosticCode::InvalidPipeOperand,
                format!("{} side of a command pipe must be `Command`, found `{}`", side, t),
                span,
            )
        })
        .collect()
}

/// `x = x | stage()` must not change the type of `x`.
pub fn validate_type_preserved(
    binding: &str,
    original: &Type,
    stage: &str,
    stage_ret: &Type,
    span: Span,
) -> Result<(), Diagnostic> {
    if are_types_compatible(original, stage_ret) {
        return Ok(());
    }
    Err(Diagnostic::error(
        DiagnosticCode::PipeTypeNotPreserved,
        format!(
            "pipe stage `{}` must preserve type `{}` when re-assigning `{}`, but returns `{}`",
            stage, original, binding, stage_ret
        ),
        span,
    ))
}
