//! Computes the static type of every expression.
//!
//! The resolver owns the diagnostic log of the pass it runs in; checkers it
//! calls are pure and hand their findings back.

use super::pipes::{self, PipeMode};
use super::symbols::{Declared, FunctionSig, SymbolTable, VariableSymbol};
use super::type_checker::{self, are_types_compatible, check_call_arguments};
use super::{mutability, nullability};
use crate::ast::{CommandArgs, CommandKind, Expr, ExprKind, FieldInit, FunctionDecl, Literal, TypeExpr};
use crate::builtins::{self, BuiltinFunction, ReceiverKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;
use crate::suggest::suggest;
use crate::types::{COMMAND_TYPE, PROCESS_TYPE, Primitive, Type};

/// Where the walk currently is. Passed down by value; nested constructs
/// derive a modified copy instead of mutating shared state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub return_type: Option<Type>,
    pub in_loop: bool,
    pub self_type: Option<String>,
}

impl Context {
    pub fn for_function(ret: Type, self_type: Option<&str>) -> Context {
        Context {
            return_type: Some(ret),
            in_loop: false,
            self_type: self_type.map(str::to_string),
        }
    }

    pub fn looping(&self) -> Context {
        Context {
            in_loop: true,
            ..self.clone()
        }
    }
}

pub fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Int(_) => Type::INT,
        Literal::Float(_) => Type::FLOAT,
        Literal::Str(_) => Type::STRING,
        Literal::Bool(_) => Type::BOOL,
        Literal::Char(_) => Type::CHAR,
        Literal::Null => Type::null(),
    }
}

fn lower_type_expr(symbols: &SymbolTable, te: &TypeExpr, span: Span, log: &mut Vec<Diagnostic>) -> Type {
    match te {
        TypeExpr::Named(name) => {
            if let Some(p) = Primitive::from_name(name) {
                return Type::Primitive(p);
            }
            if name == COMMAND_TYPE || name == PROCESS_TYPE || symbols.type_decl(name).is_some() {
                return Type::named(name.as_str());
            }
            log.push(
                Diagnostic::error(DiagnosticCode::UndefinedType, format!("undefined type `{}`", name), span)
                    .with_suggestion(suggest(name, symbols.type_names())),
            );
            Type::Unknown
        }
        TypeExpr::Array(elem) => Type::array(lower_type_expr(symbols, elem, span, log)),
        TypeExpr::Map(k, v) => Type::map(
            lower_type_expr(symbols, k, span, log),
            lower_type_expr(symbols, v, span, log),
        ),
        TypeExpr::Nullable(inner) => Type::nullable(lower_type_expr(symbols, inner, span, log)),
        TypeExpr::Tuple(items) => Type::Tuple(
            items
                .iter()
                .map(|t| lower_type_expr(symbols, t, span, log))
                .collect(),
        ),
        TypeExpr::Function { params, ret } => Type::Function {
            params: params
                .iter()
                .map(|t| lower_type_expr(symbols, t, span, log))
                .collect(),
            ret: Box::new(lower_type_expr(symbols, ret, span, log)),
        },
    }
}

pub struct Resolver<'s> {
    pub(crate) symbols: &'s mut SymbolTable,
    log: Vec<Diagnostic>,
}

impl<'s> Resolver<'s> {
    pub fn new(symbols: &'s mut SymbolTable) -> Self {
        Self {
            symbols,
            log: Vec::new(),
        }
    }

    pub fn finish(self) -> Vec<Diagnostic> {
        self.log
    }

    pub(crate) fn report(&mut self, diag: Diagnostic) {
        self.log.push(diag);
    }

    pub(crate) fn report_all(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        self.log.extend(diags);
    }

    pub(crate) fn accept(&mut self, result: Result<(), Diagnostic>) {
        if let Err(d) = result {
            self.report(d);
        }
    }

    pub fn resolve_type_expr(&mut self, te: &TypeExpr, span: Span) -> Type {
        lower_type_expr(self.symbols, te, span, &mut self.log)
    }

    /// Resolves an annotation whose problems were already reported elsewhere.
    pub fn quiet_type_expr(&self, te: &TypeExpr) -> Type {
        let mut scratch = Vec::new();
        lower_type_expr(&*self.symbols, te, Span::default(), &mut scratch)
    }

    /// Type of `expr` without recording diagnostics.
    pub fn quiet_type(&mut self, expr: &Expr, ctx: &Context) -> Type {
        Resolver::new(&mut *self.symbols).resolve_expr(expr, ctx)
    }

    /// Resolves a declared signature, reporting bad parameter lists and types.
    pub fn resolve_signature(&mut self, decl: &FunctionDecl) -> FunctionSig {
        let mut params: Vec<(String, Type)> = Vec::new();
        for p in &decl.params {
            if params.iter().any(|(n, _)| *n == p.name) {
                self.report(Diagnostic::error(
                    DiagnosticCode::DuplicateParameter,
                    format!("parameter `{}` is declared more than once in `{}`", p.name, decl.name),
                    p.span,
                ));
                continue;
            }
            let ty = self.resolve_type_expr(&p.ty, p.span);
            params.push((p.name.clone(), ty));
        }
        let ret = match &decl.return_type {
            Some(t) => self.resolve_type_expr(t, decl.span),
            None => Type::VOID,
        };
        FunctionSig {
            name: decl.name.clone(),
            params,
            ret,
            is_async: decl.is_async,
            is_public: decl.is_public,
            span: decl.span,
        }
    }

    pub fn resolve_expr(&mut self, expr: &Expr, ctx: &Context) -> Type {
        let span = expr.span;
        match &expr.node {
            ExprKind::Literal(lit) => literal_type(lit),
            ExprKind::Ident(name) => self.resolve_ident(name, span, ctx),
            ExprKind::Binary { op, left, right } => {
                let l = self.resolve_expr(left, ctx);
                let r = self.resolve_expr(right, ctx);
                match type_checker::binary_result_type(*op, &l, &r, span) {
                    Ok(t) => t,
                    Err(d) => {
                        self.report(d);
                        if op.is_arithmetic() { Type::Unknown } else { Type::BOOL }
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let t = self.resolve_expr(operand, ctx);
                type_checker::unary_result_type(*op, &t, span).unwrap_or_else(|d| {
                    self.report(d);
                    Type::Unknown
                })
            }
            ExprKind::Call { callee, args } => {
                let args = self.resolve_args(args, ctx);
                self.resolve_call(callee, args, span)
            }
            ExprKind::MethodCall { receiver, method, args } => {
                let recv_ty = self.resolve_expr(receiver, ctx);
                let args = self.resolve_args(args, ctx);
                self.resolve_method_call(receiver, recv_ty, method, args, span)
            }
            ExprKind::StaticCall { type_name, method, args } => {
                let args = self.resolve_args(args, ctx);
                self.resolve_static_call(type_name, method, args, span)
            }
            ExprKind::Member { object, field } => self.resolve_member(object, field, span, false, ctx),
            ExprKind::SafeMember { object, field } => self.resolve_member(object, field, span, true, ctx),
            ExprKind::Index { object, index } => self.resolve_index(object, index, ctx),
            ExprKind::StructLiteral { name, fields } => self.resolve_struct_literal(name, fields, span, ctx),
            ExprKind::MapLiteral(entries) => self.resolve_map_literal(entries, ctx),
            ExprKind::ArrayLiteral(items) => self.resolve_array_literal(items, ctx),
            ExprKind::TupleLiteral(items) => {
                Type::Tuple(items.iter().map(|i| self.resolve_expr(i, ctx)).collect())
            }
            ExprKind::EnumVariant { enum_name, variant } => self.resolve_enum_variant(enum_name, variant, span),
            ExprKind::Range { start, end, step, .. } => {
                let mut parts: Vec<&Expr> = vec![&**start, &**end];
                parts.extend(step.as_deref());
                for part in parts {
                    let t = self.resolve_expr(part, ctx);
                    if t != Type::INT && !t.is_permissive() {
                        self.report(Diagnostic::error(
                            DiagnosticCode::InvalidOperandType,
                            format!("range bounds must be `int`, found `{}`", t),
                            part.span,
                        ));
                    }
                }
                Type::array(Type::INT)
            }
            ExprKind::Pipe { left, right } => self.resolve_pipe(left, right, span, ctx),
            ExprKind::NullCoalesce { left, right } => {
                let l = self.resolve_expr(left, ctx);
                let r = self.resolve_expr(right, ctx);
                let (t, diags) = nullability::validate_null_coalesce(&l, &r, span);
                self.report_all(diags);
                t
            }
            ExprKind::Cast { expr: inner, ty } => {
                let from = self.resolve_expr(inner, ctx);
                let to = self.resolve_type_expr(ty, span);
                let checked = type_checker::validate_cast(&from, &to, span);
                self.accept(checked);
                to
            }
            ExprKind::Command { kind, is_async, args } => {
                self.resolve_command(*kind, *is_async, args, span, ctx)
            }
            ExprKind::Await(inner) => {
                let t = self.resolve_expr(inner, ctx);
                if !t.is_process() && !t.is_unknown() {
                    self.report(Diagnostic::error(
                        DiagnosticCode::UnsupportedFeature,
                        format!(
                            "Feature 'await on non-Process value' is not supported: expected a Process handle, found `{}`",
                            t
                        ),
                        span,
                    ));
                }
                Type::STRING
            }
            ExprKind::RawShell(_) => Type::ANY,
        }
    }

    fn resolve_args(&mut self, args: &[Expr], ctx: &Context) -> Vec<(Type, Span)> {
        args.iter().map(|a| (self.resolve_expr(a, ctx), a.span)).collect()
    }

    fn resolve_ident(&mut self, name: &str, span: Span, ctx: &Context) -> Type {
        if let Some(sym) = self.symbols.lookup(name) {
            return sym.ty.clone();
        }
        if name == "self" {
            let msg = match ctx.self_type {
                Some(_) => "`self` is not available in a static method",
                None => "`self` used outside of a method",
            };
            self.report(Diagnostic::error(DiagnosticCode::SelfOutsideMethod, msg, span));
            return Type::Unknown;
        }
        if let Some(sig) = self.symbols.function(name) {
            return sig.as_type();
        }
        let hint = suggest(name, self.symbols.visible_names());
        self.report(
            Diagnostic::error(DiagnosticCode::UndefinedVariable, format!("undefined variable `{}`", name), span)
                .with_suggestion(hint),
        );
        Type::Unknown
    }

    /// Types a call to a free function, a function-typed variable, or a builtin.
    pub(crate) fn resolve_call(&mut self, callee: &str, args: Vec<(Type, Span)>, span: Span) -> Type {
        if let Some(sym) = self.symbols.lookup(callee) {
            let ty = sym.ty.clone();
            return match ty {
                Type::Function { params, ret } => {
                    self.report_all(check_call_arguments(callee, &params, &args, span));
                    *ret
                }
                t if t.is_permissive() => t,
                other => {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidOperandType,
                        format!("`{}` has type `{}` and cannot be called", callee, other),
                        span,
                    ));
                    Type::Unknown
                }
            };
        }
        if let Some(sig) = self.symbols.function(callee) {
            let (params, ret) = (sig.param_types(), sig.ret.clone());
            self.report_all(check_call_arguments(callee, &params, &args, span));
            return ret;
        }
        if let Some(builtin) = BuiltinFunction::lookup(callee) {
            self.report_all(check_call_arguments(callee, &builtin.params(), &args, span));
            return builtin.return_type();
        }
        let mut candidates: Vec<&str> = self.symbols.function_names().collect();
        candidates.extend(BuiltinFunction::names().map(|name| -> &str { name }));
        let hint = suggest(callee, candidates);
        self.report(
            Diagnostic::error(DiagnosticCode::UndefinedFunction, format!("undefined function `{}`", callee), span)
                .with_suggestion(hint),
        );
        Type::Unknown
    }

    fn resolve_method_call(
        &mut self,
        receiver: &Expr,
        recv_ty: Type,
        method: &str,
        args: Vec<(Type, Span)>,
        span: Span,
    ) -> Type {
        if recv_ty.is_unknown() {
            return Type::Unknown;
        }
        if recv_ty.is_any() {
            return Type::ANY;
        }
        let (base, warn) = nullability::require_non_nullable(
            &recv_ty,
            receiver.span,
            &format!("method call `.{}()`", method),
        );
        self.report_all(warn);

        if let Some(kind) = ReceiverKind::of(&base) {
            return match builtins::lookup_method(kind, method) {
                Some(m) => {
                    let name = format!("{}.{}", base, method);
                    self.report_all(check_call_arguments(&name, &m.param_types(), &args, span));
                    m.ret.to_type()
                }
                None => {
                    let hint = suggest(method, builtins::method_names(kind));
                    self.report(self.no_method(&base, method, span).with_suggestion(hint));
                    Type::Unknown
                }
            };
        }

        let Some(owner) = base.named_name() else {
            self.report(self.no_method(&base, method, span));
            return Type::Unknown;
        };
        match self.symbols.method(owner, method).cloned() {
            Some(m) => {
                if m.is_static() {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidMethodCall,
                        format!(
                            "`{0}::{1}` is a static method; call it as `{0}::{1}()`",
                            owner, method
                        ),
                        span,
                    ));
                } else if m.mutates_self() {
                    let checked = mutability::validate_mutating_call(receiver, method, self.symbols);
                    self.accept(checked);
                }
                let name = format!("{}.{}", owner, method);
                self.report_all(check_call_arguments(&name, &m.sig.param_types(), &args, span));
                m.sig.ret
            }
            None => {
                let hint = suggest(method, self.symbols.method_names(owner));
                self.report(self.no_method(&base, method, span).with_suggestion(hint));
                Type::Unknown
            }
        }
    }

    fn no_method(&self, ty: &Type, method: &str, span: Span) -> Diagnostic {
        Diagnostic::error(
            DiagnosticCode::UndefinedMethod,
            format!("no method `{}` on type `{}`", method, ty),
            span,
        )
    }

    pub(crate) fn resolve_static_call(
        &mut self,
        type_name: &str,
        method: &str,
        args: Vec<(Type, Span)>,
        span: Span,
    ) -> Type {
        if self.symbols.type_decl(type_name).is_none() {
            let hint = suggest(type_name, self.symbols.type_names());
            self.report(
                Diagnostic::error(DiagnosticCode::UndefinedType, format!("undefined type `{}`", type_name), span)
                    .with_suggestion(hint),
            );
            return Type::Unknown;
        }
        let Some(m) = self.symbols.method(type_name, method).cloned() else {
            let hint = suggest(method, self.symbols.method_names(type_name));
            self.report(
                Diagnostic::error(
                    DiagnosticCode::UndefinedMethod,
                    format!("no associated function `{}` on type `{}`", method, type_name),
                    span,
                )
                .with_suggestion(hint),
            );
            return Type::Unknown;
        };
        if !m.is_static() {
            self.report(Diagnostic::error(
                DiagnosticCode::InvalidMethodCall,
                format!("`{}::{}` takes `self`; call it on a value", type_name, method),
                span,
            ));
        }
        let name = format!("{}::{}", type_name, method);
        self.report_all(check_call_arguments(&name, &m.sig.param_types(), &args, span));
        m.sig.ret
    }

    fn resolve_member(&mut self, object: &Expr, field: &str, span: Span, safe: bool, ctx: &Context) -> Type {
        let obj_ty = self.resolve_expr(object, ctx);
        if obj_ty.is_permissive() {
            return obj_ty;
        }
        if safe {
            let field_ty = self.field_type(obj_ty.non_null(), field, span);
            let (t, warn) = nullability::safe_member_type(&obj_ty, field_ty, span);
            self.report_all(warn);
            return t;
        }
        let chained = obj_ty.is_nullable() && object.has_safe_link();
        let base = if chained {
            obj_ty.non_null().clone()
        } else {
            let (b, warn) = nullability::require_non_nullable(
                &obj_ty,
                object.span,
                &format!("access to field `{}`", field),
            );
            self.report_all(warn);
            b
        };
        let field_ty = self.field_type(&base, field, span);
        if chained { Type::nullable(field_ty) } else { field_ty }
    }

    fn field_type(&mut self, base: &Type, field: &str, span: Span) -> Type {
        if base.is_permissive() {
            return base.clone();
        }
        let found = base.named_name().and_then(|n| self.symbols.struct_info(n)).map(|info| {
            (
                info.field(field).cloned(),
                suggest(field, info.fields.iter().map(|(n, _)| n.as_str())),
            )
        });
        match found {
            Some((Some(t), _)) => t,
            Some((None, hint)) => {
                self.report(
                    Diagnostic::error(
                        DiagnosticCode::UndefinedField,
                        format!("struct `{}` has no field `{}`", base, field),
                        span,
                    )
                    .with_suggestion(hint),
                );
                Type::Unknown
            }
            None => {
                self.report(Diagnostic::error(
                    DiagnosticCode::UndefinedField,
                    format!("type `{}` has no field `{}`", base, field),
                    span,
                ));
                Type::Unknown
            }
        }
    }

    fn expect_int_index(&mut self, ty: &Type, span: Span) {
        if *ty != Type::INT && !ty.is_permissive() {
            self.report(Diagnostic::error(
                DiagnosticCode::InvalidOperandType,
                format!("index must be `int`, found `{}`", ty),
                span,
            ));
        }
    }

    fn resolve_index(&mut self, object: &Expr, index: &Expr, ctx: &Context) -> Type {
        let obj_ty = self.resolve_expr(object, ctx);
        let idx_ty = self.resolve_expr(index, ctx);
        if obj_ty.is_permissive() {
            return obj_ty;
        }
        let (base, warn) = nullability::require_non_nullable(&obj_ty, object.span, "indexing");
        self.report_all(warn);
        match &base {
            Type::Array(elem) => {
                self.expect_int_index(&idx_ty, index.span);
                elem.as_ref().clone()
            }
            Type::Primitive(Primitive::String) => {
                self.expect_int_index(&idx_ty, index.span);
                Type::CHAR
            }
            Type::Map(key, value) => {
                if !are_types_compatible(key, &idx_ty) {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidOperandType,
                        format!("map key must be `{}`, found `{}`", key, idx_ty),
                        index.span,
                    ));
                }
                Type::nullable(value.as_ref().clone())
            }
            Type::Tuple(items) => match index.as_literal() {
                Some(Literal::Int(i)) if *i >= 0 && (*i as usize) < items.len() => items[*i as usize].clone(),
                _ => {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidOperandType,
                        format!("tuple index must be an integer literal below {}", items.len()),
                        index.span,
                    ));
                    Type::Unknown
                }
            },
            other => {
                self.report(Diagnostic::error(
                    DiagnosticCode::InvalidOperandType,
                    format!("type `{}` cannot be indexed", other),
                    object.span,
                ));
                Type::Unknown
            }
        }
    }

    fn resolve_struct_literal(&mut self, name: &str, fields: &[FieldInit], span: Span, ctx: &Context) -> Type {
        let values: Vec<Type> = fields.iter().map(|f| self.resolve_expr(&f.value, ctx)).collect();
        let Some(info) = self.symbols.struct_info(name).cloned() else {
            let hint = suggest(name, self.symbols.type_names());
            self.report(
                Diagnostic::error(DiagnosticCode::UndefinedType, format!("undefined struct `{}`", name), span)
                    .with_suggestion(hint),
            );
            return Type::Unknown;
        };

        let mut seen: Vec<&str> = Vec::new();
        for (init, value_ty) in fields.iter().zip(&values) {
            if seen.contains(&init.name.as_str()) {
                self.report(Diagnostic::error(
                    DiagnosticCode::DuplicateField,
                    format!("field `{}` is specified more than once", init.name),
                    init.span,
                ));
                continue;
            }
            seen.push(&init.name);
            match info.field(&init.name) {
                Some(field_ty) => {
                    let checked = type_checker::validate_assignment(field_ty, value_ty, init.value.span);
                    self.accept(checked);
                }
                None => {
                    let hint = suggest(&init.name, info.fields.iter().map(|(n, _)| n.as_str()));
                    self.report(
                        Diagnostic::error(
                            DiagnosticCode::UnknownField,
                            format!("struct `{}` has no field `{}`", name, init.name),
                            init.span,
                        )
                        .with_suggestion(hint),
                    );
                }
            }
        }

        let missing: Vec<String> = info
            .fields
            .iter()
            .filter(|(n, _)| !seen.contains(&n.as_str()))
            .map(|(n, _)| format!("`{}`", n))
            .collect();
        if !missing.is_empty() {
            self.report(Diagnostic::error(
                DiagnosticCode::MissingField,
                format!("missing field{} {} in `{}` literal", if missing.len() == 1 { "" } else { "s" }, missing.join(", "), name),
                span,
            ));
        }
        Type::named(name)
    }

    /// Joins element types: `null` entries make the element nullable.
    fn join_element(&mut self, acc: Option<Type>, t: Type, span: Span, what: &str) -> Type {
        let Some(acc) = acc else {
            return t;
        };
        if t == Type::null() {
            Type::nullable(acc)
        } else if acc == Type::null() {
            Type::nullable(t)
        } else if are_types_compatible(&acc, &t) {
            acc
        } else if are_types_compatible(&t, &acc) {
            t
        } else {
            self.report(Diagnostic::error(
                DiagnosticCode::TypeMismatch,
                format!("{} must share one type: expected `{}`, found `{}`", what, acc, t),
                span,
            ));
            acc
        }
    }

    fn resolve_array_literal(&mut self, items: &[Expr], ctx: &Context) -> Type {
        let mut elem = None;
        for item in items {
            let t = self.resolve_expr(item, ctx);
            elem = Some(self.join_element(elem, t, item.span, "array elements"));
        }
        Type::array(elem.unwrap_or(Type::ANY))
    }

    fn resolve_map_literal(&mut self, entries: &[(Expr, Expr)], ctx: &Context) -> Type {
        let (mut key, mut value) = (None, None);
        for (k, v) in entries {
            let kt = self.resolve_expr(k, ctx);
            let vt = self.resolve_expr(v, ctx);
            key = Some(self.join_element(key, kt, k.span, "map keys"));
            value = Some(self.join_element(value, vt, v.span, "map values"));
        }
        Type::map(key.unwrap_or(Type::ANY), value.unwrap_or(Type::ANY))
    }

    fn resolve_enum_variant(&mut self, enum_name: &str, variant: &str, span: Span) -> Type {
        let Some(info) = self.symbols.enum_info(enum_name).cloned() else {
            let hint = suggest(enum_name, self.symbols.type_names());
            self.report(
                Diagnostic::error(DiagnosticCode::UndefinedType, format!("undefined enum `{}`", enum_name), span)
                    .with_suggestion(hint),
            );
            return Type::Unknown;
        };
        if !info.variants.iter().any(|v| v == variant) {
            let hint = suggest(variant, info.variants.iter().map(String::as_str));
            self.report(
                Diagnostic::error(
                    DiagnosticCode::UndefinedVariant,
                    format!("enum `{}` has no variant `{}`", enum_name, variant),
                    span,
                )
                .with_suggestion(hint),
            );
        }
        Type::named(enum_name)
    }

    fn resolve_pipe(&mut self, left: &Expr, right: &Expr, span: Span, ctx: &Context) -> Type {
        let left_ty = self.resolve_expr(left, ctx);
        if pipes::is_stage(right) && !left_ty.is_command() {
            return self.resolve_stage(right, (left_ty, left.span), ctx);
        }
        let right_ty = self.resolve_expr(right, ctx);
        match pipes::classify(&left_ty, right, Some(&right_ty)) {
            PipeMode::Command => {
                self.report_all(pipes::validate_pipe_types(&left_ty, &right_ty, span));
                Type::command()
            }
            PipeMode::Value => {
                if !right_ty.is_permissive() {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidPipeStage,
                        format!(
                            "right side of `|` must be a function call or a command, found `{}`",
                            right_ty
                        ),
                        right.span,
                    ));
                }
                Type::Unknown
            }
        }
    }

    /// Types a value-pipe stage, with the piped value as the first argument.
    fn resolve_stage(&mut self, stage: &Expr, piped: (Type, Span), ctx: &Context) -> Type {
        match &stage.node {
            ExprKind::Call { callee, args } => {
                let mut all = vec![piped];
                all.extend(self.resolve_args(args, ctx));
                self.resolve_call(callee, all, stage.span)
            }
            ExprKind::StaticCall { type_name, method, args } => {
                let mut all = vec![piped];
                all.extend(self.resolve_args(args, ctx));
                self.resolve_static_call(type_name, method, all, stage.span)
            }
            _ => Type::Unknown,
        }
    }

    /// Scalar types that can become a single command word.
    fn is_word_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Primitive(p) => *p != Primitive::Void,
            Type::Unknown => true,
            Type::Named(n) => self.symbols.enum_info(n).is_some(),
            _ => false,
        }
    }

    fn resolve_command(
        &mut self,
        kind: CommandKind,
        is_async: bool,
        args: &CommandArgs,
        span: Span,
        ctx: &Context,
    ) -> Type {
        if is_async && kind == CommandKind::Cmd {
            self.report(Diagnostic::error(
                DiagnosticCode::InvalidOperandType,
                "`async` applies to `exec` and `spawn`, not `cmd`",
                span,
            ));
        }
        match args {
            CommandArgs::Raw(text) => {
                let t = self.resolve_expr(text, ctx);
                if !t.is_string_like() && !t.is_permissive() {
                    self.report(Diagnostic::error(
                        DiagnosticCode::InvalidArgumentType,
                        format!("raw command text must be `string`, found `{}`", t),
                        text.span,
                    ));
                }
            }
            CommandArgs::Argv(list) => {
                if list.is_empty() {
                    self.report(Diagnostic::error(
                        DiagnosticCode::ArgumentCountMismatch,
                        format!("`{}` needs at least one argument", kind.keyword()),
                        span,
                    ));
                }
                let types: Vec<Type> = list.iter().map(|a| self.resolve_expr(a, ctx)).collect();
                let runs_value = kind != CommandKind::Cmd && types.len() == 1 && types[0].is_command();
                if !runs_value {
                    for (arg, t) in list.iter().zip(&types) {
                        if self.is_word_type(t) {
                            continue;
                        }
                        let msg = if t.is_command() && kind == CommandKind::Cmd {
                            "`cmd` cannot wrap a `Command` value".to_string()
                        } else if t.is_command() {
                            format!("a `Command` must be the only argument of `{}`", kind.keyword())
                        } else {
                            format!("command arguments must be scalar values, found `{}`", t)
                        };
                        self.report(Diagnostic::error(DiagnosticCode::InvalidArgumentType, msg, arg.span));
                    }
                }
            }
        }
        match kind {
            CommandKind::Cmd => Type::command(),
            CommandKind::Exec if is_async => Type::VOID,
            CommandKind::Exec => Type::STRING,
            CommandKind::Spawn => Type::process(),
        }
    }

    /// `return` placement and value against the enclosing function's type.
    pub fn check_return(&mut self, value: Option<&Expr>, span: Span, ctx: &Context) {
        let actual = value.map(|v| (self.resolve_expr(v, ctx), v.span));
        let Some(expected) = &ctx.return_type else {
            self.report(Diagnostic::error(
                DiagnosticCode::ReturnOutsideFunction,
                "`return` outside of a function",
                span,
            ));
            return;
        };
        match actual {
            Some((_, at)) if expected.is_void() => self.report(Diagnostic::error(
                DiagnosticCode::InvalidReturnType,
                "function returning `void` cannot return a value",
                at,
            )),
            Some((t, at)) => {
                let checked = type_checker::validate_return_type(expected, &t, at);
                self.accept(checked);
            }
            None if !expected.is_void() && !expected.is_permissive() => self.report(Diagnostic::error(
                DiagnosticCode::InvalidReturnType,
                format!("missing return value: function returns `{}`", expected),
                span,
            )),
            None => {}
        }
    }

    pub fn check_loop_control(&mut self, is_break: bool, span: Span, ctx: &Context) {
        if ctx.in_loop {
            return;
        }
        let (code, keyword) = if is_break {
            (DiagnosticCode::BreakOutsideLoop, "break")
        } else {
            (DiagnosticCode::ContinueOutsideLoop, "continue")
        };
        self.report(Diagnostic::error(code, format!("`{}` outside of a loop", keyword), span));
    }

    /// Declares a binding in the current scope, reporting duplicates and shadowing.
    pub fn bind(&mut self, symbol: VariableSymbol) {
        let (name, span) = (symbol.name.clone(), symbol.span);
        match self.symbols.declare(symbol) {
            Declared::Fresh => {}
            Declared::Shadows(_) => self.report(Diagnostic::warning(
                DiagnosticCode::ShadowedVariable,
                format!("`{}` shadows an earlier binding", name),
                span,
            )),
            Declared::Duplicate(_) => self.report(Diagnostic::error(
                DiagnosticCode::DuplicateDeclaration,
                format!("`{}` is already declared in this scope", name),
                span,
            )),
        }
    }
}
