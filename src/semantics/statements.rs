//! Statement checks. Extends [`Resolver`] so expression typing and statement
//! rules share one diagnostic log per pass.

use super::resolver::{Context, Resolver};
use super::symbols::VariableSymbol;
use super::{mutability, nullability, pipes, type_checker};
use crate::ast::{AssignOp, Expr, ExprKind, FunctionDecl, Stmt, StmtKind, VarDecl, VarKind};
use crate::builtins::BuiltinFunction;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;
use crate::types::{Primitive, Type};

/// Right operands of a pipe chain, leftmost stage first.
fn pipe_stages(expr: &Expr) -> Vec<&Expr> {
    match &expr.node {
        ExprKind::Pipe { left, right } => {
            let mut stages = pipe_stages(left);
            stages.push(right);
            stages
        }
        _ => Vec::new(),
    }
}

impl Resolver<'_> {
    /// Checks a nested block in its own scope.
    pub fn check_block(&mut self, stmts: &[Stmt], ctx: &Context) {
        self.symbols.push_scope();
        for stmt in stmts {
            self.check_stmt(stmt, ctx, false);
        }
        self.symbols.pop_scope();
    }

    /// Binds parameters (and `self` for instance methods), then checks the body.
    pub fn check_function_body(&mut self, decl: &FunctionDecl, owner: Option<&str>) {
        let ret = match &decl.return_type {
            Some(t) => self.quiet_type_expr(t),
            None => Type::VOID,
        };
        self.symbols.push_scope();
        if let (Some(owner), Some(receiver)) = (owner, decl.receiver) {
            self.symbols.declare(VariableSymbol {
                name: "self".to_string(),
                ty: Type::named(owner),
                is_mutable: receiver.mutable,
                span: decl.span,
            });
        }
        for p in &decl.params {
            let ty = self.quiet_type_expr(&p.ty);
            self.symbols.declare(VariableSymbol {
                name: p.name.clone(),
                ty,
                is_mutable: p.mutable,
                span: p.span,
            });
        }
        let ctx = Context::for_function(ret, owner);
        self.check_block(&decl.body, &ctx);
        self.symbols.pop_scope();
    }

    pub fn check_stmt(&mut self, stmt: &Stmt, ctx: &Context, top_level: bool) {
        let span = stmt.span;
        match &stmt.node {
            StmtKind::Var(decl) => self.check_var(decl, span, ctx, top_level),
            StmtKind::Assign { target, op, value } => self.check_assign(target, *op, value, ctx),
            StmtKind::Function(decl) => {
                if decl.is_public && !top_level {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidVisibility,
                        "`pub` is only allowed on top-level declarations",
                        span,
                    ));
                }
                // Nested declarations are rejected by the readiness pass.
                if top_level {
                    self.check_function_body(decl, None);
                }
            }
            StmtKind::Struct(_) | StmtKind::Enum(_) | StmtKind::Impl(_) => {}
            StmtKind::Import { module, items } => {
                if items.is_empty() {
                    self.report(Diagnostic::warning(
                        DiagnosticCode::EmptyImport,
                        format!("import from `{}` names no items", module),
                        span,
                    ));
                }
            }
            StmtKind::If { cond, then_body, elifs, else_body } => {
                self.check_condition(cond, ctx);
                self.check_block(then_body, ctx);
                for elif in elifs {
                    self.check_condition(&elif.cond, ctx);
                    self.check_block(&elif.body, ctx);
                }
                if let Some(body) = else_body {
                    self.check_block(body, ctx);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond, ctx);
                self.check_block(body, &ctx.looping());
            }
            StmtKind::For { var, iterable, body } => self.check_for(var, iterable, body, span, ctx),
            StmtKind::Return(value) => self.check_return(value.as_ref(), span, ctx),
            StmtKind::Break => self.check_loop_control(true, span, ctx),
            StmtKind::Continue => self.check_loop_control(false, span, ctx),
            StmtKind::Throw(value) => {
                let t = self.resolve_expr(value, ctx);
                if !t.is_string_like() && !t.is_permissive() {
                    self.report(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("`throw` expects a `string` message, found `{}`", t),
                        value.span,
                    ));
                }
            }
            StmtKind::TryCatch { try_body, error_var, catch_body } => {
                self.check_block(try_body, ctx);
                self.symbols.push_scope();
                if let Some(name) = error_var {
                    self.bind(VariableSymbol {
                        name: name.clone(),
                        ty: Type::STRING,
                        is_mutable: false,
                        span,
                    });
                }
                self.check_block(catch_body, ctx);
                self.symbols.pop_scope();
            }
            StmtKind::Expr(e) => {
                self.resolve_expr(e, ctx);
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr, ctx: &Context) {
        let t = self.resolve_expr(cond, ctx);
        let checked = type_checker::validate_condition(&t, cond.span);
        self.accept(checked);
    }

    fn check_var(&mut self, decl: &VarDecl, span: Span, ctx: &Context, top_level: bool) {
        if decl.is_public {
            match decl.kind {
                VarKind::Let | VarKind::LetMut => self.report(Diagnostic::error(
                    DiagnosticCode::InvalidVisibility,
                    format!("`pub` is not allowed on `let` binding `{}`", decl.name),
                    span,
                )),
                VarKind::Const if !top_level => self.report(Diagnostic::error(
                    DiagnosticCode::InvalidVisibility,
                    "`pub const` is only allowed at top level",
                    span,
                )),
                VarKind::Const => {}
            }
        }

        let value_ty = self.resolve_expr(&decl.value, ctx);
        let ty = match &decl.ty {
            Some(annotation) => {
                let declared = self.resolve_type_expr(annotation, span);
                let checked = type_checker::validate_assignment(&declared, &value_ty, decl.value.span);
                self.accept(checked);
                declared
            }
            None if value_ty.is_void() => {
                self.report(Diagnostic::error(
                    DiagnosticCode::CannotInferType,
                    format!("cannot bind `{}` to an expression of type `void`", decl.name),
                    decl.value.span,
                ));
                Type::Unknown
            }
            None if value_ty == Type::null() => {
                self.report(
                    Diagnostic::error(
                        DiagnosticCode::CannotInferType,
                        format!("cannot infer a type for `{}` from `null`", decl.name),
                        decl.value.span,
                    )
                    .with_help("add a nullable type annotation"),
                );
                Type::Unknown
            }
            None => value_ty,
        };
        self.bind(VariableSymbol {
            name: decl.name.clone(),
            ty,
            is_mutable: decl.kind == VarKind::LetMut,
            span,
        });
    }

    fn check_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, ctx: &Context) {
        if let Err(d) = mutability::validate_assignment_target(target, self.symbols) {
            self.report(d);
            return;
        }
        let target_ty = self.resolve_expr(target, ctx);
        let value_ty = self.resolve_expr(value, ctx);

        if op == AssignOp::Set && self.check_pipe_rebinding(target, &target_ty, value) {
            return;
        }
        let result_ty = match op.binary_op() {
            Some(bin) => match type_checker::binary_result_type(bin, &target_ty, &value_ty, value.span) {
                Ok(t) => t,
                Err(d) => {
                    self.report(d);
                    return;
                }
            },
            None => value_ty,
        };
        let checked = type_checker::validate_assignment(&target_ty, &result_ty, value.span);
        self.accept(checked);
    }

    /// `x = x | f() | g()`: every stage must keep `x`'s type. Returns true when
    /// the assignment had that shape and was handled here.
    fn check_pipe_rebinding(&mut self, target: &Expr, target_ty: &Type, value: &Expr) -> bool {
        let ExprKind::Ident(binding) = &target.node else {
            return false;
        };
        let rebinds = matches!(&value.pipe_root().node, ExprKind::Ident(root) if root == binding);
        let stages = pipe_stages(value);
        if !rebinds || stages.is_empty() || !stages.iter().all(|s| pipes::is_stage(s)) || target_ty.is_command() {
            return false;
        }
        for stage in stages {
            let Some(ret) = self.stage_return_type(stage) else {
                continue;
            };
            let checked = pipes::validate_type_preserved(binding, target_ty, &pipes::stage_name(stage), &ret, stage.span);
            self.accept(checked);
        }
        true
    }

    fn stage_return_type(&self, stage: &Expr) -> Option<Type> {
        match &stage.node {
            ExprKind::Call { callee, .. } => {
                if let Some(sym) = self.symbols.lookup(callee) {
                    return match &sym.ty {
                        Type::Function { ret, .. } => Some(ret.as_ref().clone()),
                        _ => None,
                    };
                }
                self.symbols
                    .function(callee)
                    .map(|sig| sig.ret.clone())
                    .or_else(|| BuiltinFunction::lookup(callee).map(BuiltinFunction::return_type))
            }
            ExprKind::StaticCall { type_name, method, .. } => {
                self.symbols.method(type_name, method).map(|m| m.sig.ret.clone())
            }
            _ => None,
        }
    }

    fn check_for(&mut self, var: &str, iterable: &Expr, body: &[Stmt], span: Span, ctx: &Context) {
        let iter_ty = self.resolve_expr(iterable, ctx);
        let (base, warn) = nullability::require_non_nullable(&iter_ty, iterable.span, "iteration");
        self.report_all(warn);
        let elem = match &base {
            Type::Array(elem) => elem.as_ref().clone(),
            Type::Primitive(Primitive::Any) | Type::Unknown => base.clone(),
            other => {
                self.report(Diagnostic::error(
                    DiagnosticCode::InvalidOperandType,
                    format!("cannot iterate over a value of type `{}`", other),
                    iterable.span,
                ));
                Type::Unknown
            }
        };
        self.symbols.push_scope();
        self.bind(VariableSymbol {
            name: var.to_string(),
            ty: elem,
            is_mutable: false,
            span,
        });
        self.check_block(body, &ctx.looping());
        self.symbols.pop_scope();
    }
}
