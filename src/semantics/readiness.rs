//! Structural gate for constructs that type-check but have no shell lowering.

use crate::ast::{CommandArgs, Expr, ExprKind, FunctionDecl, Program, Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;

pub fn unsupported(feature: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticCode::UnsupportedFeature,
        format!("Feature '{}' is not supported", feature),
        span,
    )
}

/// Walks the whole program once; never mutates it.
pub fn check_program(program: &Program) -> Vec<Diagnostic> {
    let mut walker = Walker { log: Vec::new() };
    for item in &program.items {
        walker.stmt(item, true);
    }
    walker.log
}

struct Walker {
    log: Vec<Diagnostic>,
}

impl Walker {
    fn flag(&mut self, feature: &str, span: Span) {
        self.log.push(unsupported(feature, span));
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.stmt(s, false);
        }
    }

    fn function(&mut self, f: &FunctionDecl) {
        if f.is_async {
            self.flag("async function", f.span);
        }
        self.block(&f.body);
    }

    fn stmt(&mut self, stmt: &Stmt, top_level: bool) {
        match &stmt.node {
            StmtKind::Function(f) => {
                if !top_level {
                    self.flag("nested declaration", stmt.span);
                }
                self.function(f);
            }
            StmtKind::Impl(block) => {
                if !top_level {
                    self.flag("nested declaration", stmt.span);
                }
                for m in &block.methods {
                    self.function(m);
                }
            }
            StmtKind::Struct(_) | StmtKind::Enum(_) => {
                if !top_level {
                    self.flag("nested declaration", stmt.span);
                }
            }
            StmtKind::Var(decl) => self.expr(&decl.value),
            StmtKind::Assign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            StmtKind::Import { .. } | StmtKind::Break | StmtKind::Continue => {}
            StmtKind::If { cond, then_body, elifs, else_body } => {
                self.expr(cond);
                self.block(then_body);
                for elif in elifs {
                    self.expr(&elif.cond);
                    self.block(&elif.body);
                }
                if let Some(body) = else_body {
                    self.block(body);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
            }
            StmtKind::For { iterable, body, .. } => {
                match &iterable.node {
                    ExprKind::Range { start, end, step, .. } => {
                        self.expr(start);
                        self.expr(end);
                        if let Some(step) = step {
                            self.expr(step);
                        }
                    }
                    _ => self.expr(iterable),
                }
                self.block(body);
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.expr(v);
                }
            }
            StmtKind::Throw(e) => self.expr(e),
            StmtKind::TryCatch { try_body, catch_body, .. } => {
                self.block(try_body);
                self.block(catch_body);
            }
            StmtKind::Expr(e) => match &e.node {
                ExprKind::RawShell(_) => {}
                _ => self.expr(e),
            },
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for e in exprs {
            self.expr(e);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.node {
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::EnumVariant { .. } => {}
            ExprKind::RawShell(_) => self.flag("raw shell expression", expr.span),
            ExprKind::MapLiteral(entries) => {
                self.flag("map literal", expr.span);
                for (k, v) in entries {
                    self.expr(k);
                    self.expr(v);
                }
            }
            ExprKind::Range { start, end, step, .. } => {
                self.flag("range expression", expr.span);
                self.expr(start);
                self.expr(end);
                if let Some(step) = step {
                    self.expr(step);
                }
            }
            ExprKind::Binary { left, right, .. }
            | ExprKind::Pipe { left, right }
            | ExprKind::NullCoalesce { left, right } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Member { object, .. } | ExprKind::SafeMember { object, .. } => self.expr(object),
            ExprKind::Cast { expr: inner, .. } | ExprKind::Await(inner) => self.expr(inner),
            ExprKind::Call { args, .. } | ExprKind::StaticCall { args, .. } => self.exprs(args),
            ExprKind::MethodCall { receiver, args, .. } => {
                self.expr(receiver);
                self.exprs(args);
            }
            ExprKind::StructLiteral { fields, .. } => {
                for f in fields {
                    self.expr(&f.value);
                }
            }
            ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => self.exprs(items),
            ExprKind::Command { args, .. } => match args {
                CommandArgs::Argv(list) => self.exprs(list),
                CommandArgs::Raw(text) => self.expr(text),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, Spanned};

    fn e(node: ExprKind) -> Expr {
        Spanned::new(node, Span::new(1, 1))
    }

    fn s(node: StmtKind) -> Stmt {
        Spanned::new(node, Span::new(1, 1))
    }

    fn int(v: i64) -> Box<Expr> {
        Box::new(e(ExprKind::Literal(Literal::Int(v))))
    }

    #[test]
    fn raw_shell_only_as_statement() {
        let ok = Program { items: vec![s(StmtKind::Expr(e(ExprKind::RawShell("ls".into()))))] };
        assert!(check_program(&ok).is_empty());

        let call = e(ExprKind::Call {
            callee: "println".into(),
            args: vec![e(ExprKind::RawShell("ls".into()))],
        });
        let bad = Program { items: vec![s(StmtKind::Expr(call))] };
        let diags = check_program(&bad);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Feature 'raw shell expression' is not supported");
    }

    #[test]
    fn range_is_only_a_loop_iterable() {
        let range = e(ExprKind::Range { start: int(0), end: int(3), inclusive: false, step: None });
        let looped = Program {
            items: vec![s(StmtKind::For { var: "i".into(), iterable: range.clone(), body: vec![] })],
        };
        assert!(check_program(&looped).is_empty());

        let bound = Program {
            items: vec![s(StmtKind::Expr(e(ExprKind::ArrayLiteral(vec![range]))))],
        };
        assert_eq!(check_program(&bound).len(), 1);
    }

    #[test]
    fn map_literals_are_rejected() {
        let map = e(ExprKind::MapLiteral(vec![(
            e(ExprKind::Literal(Literal::Str("a".into()))),
            *int(1),
        )]));
        let diags = check_program(&Program { items: vec![s(StmtKind::Expr(map))] });
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("map literal"));
    }
}
