//! Semantic analysis: three passes over the program plus the readiness gate.
//!
//! 1. declarations: types, struct fields, free-function signatures
//! 2. impl blocks: method registration, then method bodies
//! 3. top-level statements and function bodies, in source order
//!
//! Each pass returns its own log; [`analyze`] merges them into one bag.

pub mod mutability;
pub mod nullability;
pub mod pipes;
pub mod readiness;
pub mod resolver;
pub mod statements;
pub mod symbols;
pub mod type_checker;

use crate::ast::{EnumDecl, Program, StmtKind, StructDecl};
use crate::builtins;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
use crate::span::Span;
use crate::types::{COMMAND_TYPE, PROCESS_TYPE, Primitive, Type};
use resolver::{Context, Resolver};
use symbols::{EnumInfo, FunctionSig, MethodSig, StructInfo, SymbolTable, TypeDecl};
use tracing::debug;

/// Result of analysis. The symbol table keeps every declaration for the generator.
#[derive(Debug)]
pub struct Analysis {
    pub diagnostics: DiagnosticBag,
    pub symbols: SymbolTable,
}

pub fn analyze(program: &Program) -> Analysis {
    let mut symbols = SymbolTable::new();
    let mut diagnostics = DiagnosticBag::new();

    let declared = collect_declarations(program, &mut symbols);
    debug!(diagnostics = declared.len(), "declaration pass done");
    diagnostics.extend(declared);

    let impls = analyze_impls(program, &mut symbols);
    debug!(diagnostics = impls.len(), "impl pass done");
    diagnostics.extend(impls);

    let stmts = analyze_statements(program, &mut symbols);
    debug!(diagnostics = stmts.len(), "statement pass done");
    diagnostics.extend(stmts);

    let gate = readiness::check_program(program);
    debug!(diagnostics = gate.len(), "readiness check done");
    diagnostics.extend(gate);

    Analysis { diagnostics, symbols }
}

fn is_builtin_type_name(name: &str) -> bool {
    Primitive::from_name(name).is_some() || name == COMMAND_TYPE || name == PROCESS_TYPE
}

fn duplicate(what: &str, name: &str, span: Span, first: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticCode::DuplicateDeclaration,
        format!("{} `{}` is already declared", what, name),
        span,
    )
    .with_help(format!("first declared at {}", first))
}

fn register_type(r: &mut Resolver<'_>, name: &str, decl: TypeDecl, span: Span) {
    if is_builtin_type_name(name) {
        r.report(Diagnostic::error(
            DiagnosticCode::ReservedName,
            format!("`{}` is a built-in type name", name),
            span,
        ));
        return;
    }
    if let Err(prev) = r.symbols.define_type(name, decl) {
        r.report(duplicate("type", name, span, prev.span()));
    }
}

fn enum_info(r: &mut Resolver<'_>, e: &EnumDecl, span: Span) -> EnumInfo {
    let mut variants: Vec<String> = Vec::new();
    for v in &e.variants {
        if variants.contains(&v.name) {
            r.report(Diagnostic::error(
                DiagnosticCode::DuplicateVariant,
                format!("variant `{}` is declared more than once in enum `{}`", v.name, e.name),
                v.span,
            ));
            continue;
        }
        variants.push(v.name.clone());
    }
    EnumInfo {
        name: e.name.clone(),
        variants,
        span,
    }
}

fn struct_info(r: &mut Resolver<'_>, s: &StructDecl, span: Span) -> StructInfo {
    let mut fields: Vec<(String, Type)> = Vec::new();
    for f in &s.fields {
        if fields.iter().any(|(n, _)| *n == f.name) {
            r.report(Diagnostic::error(
                DiagnosticCode::DuplicateField,
                format!("field `{}` is declared more than once in struct `{}`", f.name, s.name),
                f.span,
            ));
            continue;
        }
        let ty = r.resolve_type_expr(&f.ty, f.span);
        fields.push((f.name.clone(), ty));
    }
    StructInfo {
        name: s.name.clone(),
        fields,
        span,
    }
}

/// `main` takes nothing or `string[]`, and returns `int` or `void`.
fn check_main(sig: &FunctionSig) -> Option<Diagnostic> {
    let params_ok = match sig.params.as_slice() {
        [] => true,
        [(_, ty)] => *ty == Type::array(Type::STRING),
        _ => false,
    };
    let ret_ok = sig.ret == Type::INT || sig.ret.is_void();
    if params_ok && ret_ok {
        return None;
    }
    Some(
        Diagnostic::error(
            DiagnosticCode::InvalidMainSignature,
            format!("invalid signature for `main`: {}", sig.as_type()),
            sig.span,
        )
        .with_help("`main` must be `fn main()` or `fn main(args: string[])` returning `int` or `void`"),
    )
}

fn collect_declarations(program: &Program, symbols: &mut SymbolTable) -> Vec<Diagnostic> {
    let mut r = Resolver::new(symbols);

    // Names first, so struct fields may reference any declared type.
    for item in &program.items {
        match &item.node {
            StmtKind::Struct(s) => {
                let placeholder = StructInfo {
                    name: s.name.clone(),
                    fields: Vec::new(),
                    span: item.span,
                };
                register_type(&mut r, &s.name, TypeDecl::Struct(placeholder), item.span);
            }
            StmtKind::Enum(e) => {
                let info = enum_info(&mut r, e, item.span);
                register_type(&mut r, &e.name, TypeDecl::Enum(info), item.span);
            }
            _ => {}
        }
    }

    for item in &program.items {
        let StmtKind::Struct(s) = &item.node else {
            continue;
        };
        let owns_name = r.symbols.type_decl(&s.name).map(TypeDecl::span) == Some(item.span);
        if owns_name {
            let info = struct_info(&mut r, s, item.span);
            r.symbols.update_type(&s.name, TypeDecl::Struct(info));
        }
    }

    for item in &program.items {
        let StmtKind::Function(f) = &item.node else {
            continue;
        };
        if builtins::is_reserved(&f.name) {
            r.report(Diagnostic::error(
                DiagnosticCode::ReservedName,
                format!("`{}` is a builtin function and cannot be redeclared", f.name),
                f.span,
            ));
            continue;
        }
        let sig = r.resolve_signature(f);
        if sig.name == "main" {
            r.report_all(check_main(&sig));
        }
        if let Err(prev) = r.symbols.define_function(sig) {
            r.report(duplicate("function", &f.name, f.span, prev.span));
        }
    }
    r.finish()
}

fn analyze_impls(program: &Program, symbols: &mut SymbolTable) -> Vec<Diagnostic> {
    let mut r = Resolver::new(symbols);
    let mut known = Vec::new();

    for item in &program.items {
        let StmtKind::Impl(block) = &item.node else {
            continue;
        };
        if r.symbols.type_decl(&block.type_name).is_none() {
            r.report(Diagnostic::error(
                DiagnosticCode::UndefinedType,
                format!("cannot implement methods for undefined type `{}`", block.type_name),
                item.span,
            ));
            continue;
        }
        for m in &block.methods {
            let method = MethodSig {
                owner: block.type_name.clone(),
                sig: r.resolve_signature(m),
                receiver: m.receiver,
            };
            if r.symbols.define_method(method).is_err() {
                r.report(Diagnostic::error(
                    DiagnosticCode::DuplicateMethod,
                    format!("method `{}` is already defined for `{}`", m.name, block.type_name),
                    m.span,
                ));
            }
        }
        known.push(block);
    }

    for block in known {
        for m in &block.methods {
            r.check_function_body(m, Some(&block.type_name));
        }
    }
    r.finish()
}

fn analyze_statements(program: &Program, symbols: &mut SymbolTable) -> Vec<Diagnostic> {
    let mut r = Resolver::new(symbols);
    let ctx = Context::default();
    for item in &program.items {
        r.check_stmt(item, &ctx, true);
    }
    r.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn sp(line: u32) -> Span {
        Span::new(line, 1)
    }

    fn e(node: ExprKind, line: u32) -> Expr {
        Spanned::new(node, sp(line))
    }

    fn int(v: i64, line: u32) -> Expr {
        e(ExprKind::Literal(Literal::Int(v)), line)
    }

    fn let_(name: &str, kind: VarKind, value: Expr, line: u32) -> Stmt {
        Spanned::new(
            StmtKind::Var(VarDecl { name: name.into(), kind, ty: None, value, is_public: false }),
            sp(line),
        )
    }

    fn func(name: &str, params: Vec<Param>, ret: Option<&str>, body: Vec<Stmt>, line: u32) -> Stmt {
        Spanned::new(
            StmtKind::Function(FunctionDecl {
                name: name.into(),
                params,
                return_type: ret.map(|r| TypeExpr::Named(r.into())),
                body,
                is_public: false,
                is_async: false,
                receiver: None,
                span: sp(line),
            }),
            sp(line),
        )
    }

    fn codes(program: &Program) -> Vec<DiagnosticCode> {
        analyze(program).diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let program = Program {
            items: vec![
                let_("x", VarKind::LetMut, int(1, 1), 1),
                Spanned::new(
                    StmtKind::Assign {
                        target: e(ExprKind::Ident("x".into()), 2),
                        op: AssignOp::Add,
                        value: int(2, 2),
                    },
                    sp(2),
                ),
            ],
        };
        assert!(analyze(&program).diagnostics.is_empty());
    }

    #[test]
    fn reserved_function_names_are_rejected() {
        let program = Program { items: vec![func("println", vec![], None, vec![], 1)] };
        assert_eq!(codes(&program), vec![DiagnosticCode::ReservedName]);
    }

    #[test]
    fn main_signature_is_checked() {
        let bad = Param { name: "n".into(), ty: TypeExpr::Named("int".into()), mutable: false, span: sp(1) };
        let program = Program { items: vec![func("main", vec![bad], Some("int"), vec![], 1)] };
        assert_eq!(codes(&program), vec![DiagnosticCode::InvalidMainSignature]);

        let args = Param {
            name: "args".into(),
            ty: TypeExpr::Array(Box::new(TypeExpr::Named("string".into()))),
            mutable: false,
            span: sp(1),
        };
        let ret = Spanned::new(StmtKind::Return(Some(int(0, 2))), sp(2));
        let program = Program { items: vec![func("main", vec![args], Some("int"), vec![ret], 1)] };
        assert!(codes(&program).is_empty());
    }

    #[test]
    fn functions_are_visible_before_their_declaration() {
        let call = e(ExprKind::Call { callee: "later".into(), args: vec![] }, 1);
        let program = Program {
            items: vec![
                Spanned::new(StmtKind::Expr(call), sp(1)),
                func("later", vec![], None, vec![], 2),
            ],
        };
        assert!(codes(&program).is_empty());
    }

    #[test]
    fn shadowing_warns_and_redeclaring_errors() {
        let inner = let_("x", VarKind::Let, int(2, 3), 3);
        let program = Program {
            items: vec![
                let_("x", VarKind::Let, int(1, 1), 1),
                Spanned::new(
                    StmtKind::While { cond: e(ExprKind::Literal(Literal::Bool(false)), 2), body: vec![inner] },
                    sp(2),
                ),
                let_("x", VarKind::Let, int(3, 4), 4),
            ],
        };
        assert_eq!(
            codes(&program),
            vec![DiagnosticCode::ShadowedVariable, DiagnosticCode::DuplicateDeclaration]
        );
    }

    #[test]
    fn pub_let_is_invalid_visibility() {
        let mut stmt = let_("x", VarKind::Let, int(1, 1), 1);
        if let StmtKind::Var(decl) = &mut stmt.node {
            decl.is_public = true;
        }
        assert_eq!(codes(&Program { items: vec![stmt] }), vec![DiagnosticCode::InvalidVisibility]);
    }

    #[test]
    fn impl_for_unknown_type_is_reported() {
        let block = ImplBlock { type_name: "Ghost".into(), methods: vec![] };
        let program = Program { items: vec![Spanned::new(StmtKind::Impl(block), sp(1))] };
        assert_eq!(codes(&program), vec![DiagnosticCode::UndefinedType]);
    }
}
