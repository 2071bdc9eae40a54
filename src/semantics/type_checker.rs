//! Type compatibility and operator typing.
//!
//! Every function here is pure: problems come back as diagnostics and the
//! caller decides what type to continue with (usually `Type::Unknown`).

use crate::ast::{BinaryOp, UnaryOp};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;
use crate::types::Type;

/// Whether a value of type `value` may flow into a slot of type `target`.
pub fn are_types_compatible(target: &Type, value: &Type) -> bool {
    match (target, value) {
        (Type::Unknown, _) | (_, Type::Unknown) => true,
        (t, v) if t.is_any() || v.is_any() => true,
        (t, v) if t == v => true,
        (Type::Nullable(t), Type::Nullable(v)) => are_types_compatible(t, v),
        (Type::Nullable(t), v) => are_types_compatible(t, v),
        (_, Type::Nullable(_)) => false,
        (Type::Array(a), Type::Array(b)) => are_types_compatible(a, b),
        (Type::Map(k1, v1), Type::Map(k2, v2)) => {
            are_types_compatible(k1, k2) && are_types_compatible(v1, v2)
        }
        (Type::Tuple(a), Type::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| are_types_compatible(x, y))
        }
        (
            Type::Function { params: p1, ret: r1 },
            Type::Function { params: p2, ret: r2 },
        ) => {
            p1.len() == p2.len()
                && p1.iter().zip(p2).all(|(x, y)| are_types_compatible(y, x))
                && are_types_compatible(r1, r2)
        }
        _ => false,
    }
}

pub fn is_numeric_type(ty: &Type) -> bool {
    ty.is_numeric()
}

pub fn validate_assignment(target: &Type, value: &Type, span: Span) -> Result<(), Diagnostic> {
    if are_types_compatible(target, value) {
        return Ok(());
    }
    if value.is_nullable() && !target.is_nullable() && are_types_compatible(target, value.non_null()) {
        let msg = if *value == Type::null() {
            format!("cannot assign `null` to non-nullable type `{}`", target)
        } else {
            format!(
                "cannot assign nullable value of type `{}` to non-nullable type `{}`",
                value, target
            )
        };
        return Err(Diagnostic::error(DiagnosticCode::NullAssignToNonNullable, msg, span)
            .with_help("handle the null case with `??` or declare the target nullable"));
    }
    Err(Diagnostic::error(
        DiagnosticCode::TypeMismatch,
        format!("type mismatch: expected `{}`, found `{}`", target, value),
        span,
    ))
}

pub fn validate_condition(ty: &Type, span: Span) -> Result<(), Diagnostic> {
    if *ty == Type::BOOL || ty.is_permissive() {
        return Ok(());
    }
    Err(Diagnostic::error(
        DiagnosticCode::InvalidConditionType,
        format!("condition must be `bool`, found `{}`", ty),
        span,
    ))
}

pub fn validate_return_type(expected: &Type, actual: &Type, span: Span) -> Result<(), Diagnostic> {
    if are_types_compatible(expected, actual) {
        return Ok(());
    }
    Err(Diagnostic::error(
        DiagnosticCode::InvalidReturnType,
        format!("function returns `{}`, but this value is `{}`", expected, actual),
        span,
    ))
}

fn invalid_operands(op: BinaryOp, left: &Type, right: &Type, span: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticCode::InvalidOperandType,
        format!(
            "operator `{}` cannot be applied to `{}` and `{}`",
            op.symbol(),
            left,
            right
        ),
        span,
    )
}

/// Result type of `left op right`.
pub fn binary_result_type(op: BinaryOp, left: &Type, right: &Type, span: Span) -> Result<Type, Diagnostic> {
    if op.is_arithmetic() {
        if left.is_unknown() || right.is_unknown() {
            return Ok(Type::Unknown);
        }
        if left.is_numeric() && right.is_numeric() {
            return Ok(if *left == Type::FLOAT || *right == Type::FLOAT {
                Type::FLOAT
            } else {
                Type::INT
            });
        }
        if op == BinaryOp::Add && left.is_string_like() && right.is_string_like() {
            return Ok(Type::STRING);
        }
        match (left.is_any(), right.is_any()) {
            (true, true) => return Ok(Type::ANY),
            (true, false) if right.is_numeric() => return Ok(right.clone()),
            (false, true) if left.is_numeric() => return Ok(left.clone()),
            (true, false) | (false, true)
                if op == BinaryOp::Add && (left.is_string_like() || right.is_string_like()) =>
            {
                return Ok(Type::STRING);
            }
            _ => {}
        }
        return Err(invalid_operands(op, left, right, span));
    }

    let ok = match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            are_types_compatible(left, right) || are_types_compatible(right, left)
        }
        BinaryOp::And | BinaryOp::Or => {
            (left.is_permissive() || *left == Type::BOOL) && (right.is_permissive() || *right == Type::BOOL)
        }
        _ => {
            left.is_permissive()
                || right.is_permissive()
                || (left.is_numeric() && right.is_numeric())
                || (left.is_string_like() && right.is_string_like())
        }
    };
    if ok {
        Ok(Type::BOOL)
    } else {
        Err(invalid_operands(op, left, right, span))
    }
}

pub fn unary_result_type(op: UnaryOp, operand: &Type, span: Span) -> Result<Type, Diagnostic> {
    match op {
        _ if operand.is_unknown() => Ok(Type::Unknown),
        UnaryOp::Neg if operand.is_numeric() || operand.is_any() => Ok(operand.clone()),
        UnaryOp::Not if *operand == Type::BOOL || operand.is_any() => Ok(Type::BOOL),
        UnaryOp::Neg => Err(Diagnostic::error(
            DiagnosticCode::InvalidOperandType,
            format!("cannot negate a value of type `{}`", operand),
            span,
        )),
        UnaryOp::Not => Err(Diagnostic::error(
            DiagnosticCode::InvalidOperandType,
            format!("operator `!` expects `bool`, found `{}`", operand),
            span,
        )),
    }
}

/// Checks a call site against the callee's parameter types.
pub fn check_call_arguments(
    callee: &str,
    params: &[Type],
    args: &[(Type, Span)],
    span: Span,
) -> Vec<Diagnostic> {
    if params.len() != args.len() {
        return vec![Diagnostic::error(
            DiagnosticCode::ArgumentCountMismatch,
            format!(
                "`{}` expects {} argument{}, found {}",
                callee,
                params.len(),
                if params.len() == 1 { "" } else { "s" },
                args.len()
            ),
            span,
        )];
    }
    params
        .iter()
        .zip(args)
        .enumerate()
        .filter(|(_, (param, (arg, _)))| !are_types_compatible(param, arg))
        .map(|(i, (param, (arg, arg_span)))| {
            Diagnostic::error(
                DiagnosticCode::InvalidArgumentType,
                format!(
                    "argument {} of `{}` expects `{}`, found `{}`",
                    i + 1,
                    callee,
                    param,
                    arg
                ),
                *arg_span,
            )
        })
        .collect()
}

/// Explicit conversions accepted by `expr as T`.
pub fn validate_cast(from: &Type, to: &Type, span: Span) -> Result<(), Diagnostic> {
    let ok = from.is_permissive()
        || to.is_permissive()
        || from == to
        || (from.is_numeric() && to.is_numeric())
        || (*to == Type::STRING && matches!(from, Type::Primitive(_)) && !from.is_void());
    if ok {
        return Ok(());
    }
    match (from, to) {
        (Type::Nullable(inner), _) => validate_cast(inner, to, span),
        (_, Type::Nullable(inner)) => validate_cast(from, inner, span),
        _ => Err(Diagnostic::error(
            DiagnosticCode::InvalidCast,
            format!("cannot cast `{}` to `{}`", from, to),
            span,
        )),
    }
}
