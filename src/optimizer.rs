//! AST-level constant propagation and folding.
//!
//! One bottom-up walk: children are rewritten first, identifiers are replaced
//! by their literal binding, then the node itself is folded. A single run
//! reaches a fixpoint.

use crate::ast::{
    BinaryOp, CommandArgs, ElseIf, Expr, ExprKind, FieldInit, FunctionDecl, ImplBlock, Literal,
    Program, Stmt, StmtKind, TypeExpr, UnaryOp, VarDecl, float_as_printed,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerOptions {
    pub constant_propagation: bool,
    pub constant_folding: bool,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            constant_propagation: true,
            constant_folding: true,
        }
    }
}

pub fn optimize(program: &Program, options: OptimizerOptions) -> Program {
    let mut assigned = HashSet::new();
    collect_assigned(&program.items, &mut assigned);
    let mut opt = Optimizer {
        options,
        assigned,
        scopes: vec![HashMap::new()],
    };
    Program {
        items: program.items.iter().map(|s| opt.stmt(s)).collect(),
    }
}

/// Roots of every assignment target, anywhere in the program.
fn collect_assigned(stmts: &[Stmt], out: &mut HashSet<String>) {
    for stmt in stmts {
        match &stmt.node {
            StmtKind::Assign { target, .. } => {
                if let Some(root) = target.root_ident() {
                    out.insert(root.to_string());
                }
            }
            StmtKind::Function(f) => collect_assigned(&f.body, out),
            StmtKind::Impl(block) => {
                for m in &block.methods {
                    collect_assigned(&m.body, out);
                }
            }
            StmtKind::If { then_body, elifs, else_body, .. } => {
                collect_assigned(then_body, out);
                for elif in elifs {
                    collect_assigned(&elif.body, out);
                }
                if let Some(body) = else_body {
                    collect_assigned(body, out);
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => collect_assigned(body, out),
            StmtKind::TryCatch { try_body, catch_body, .. } => {
                collect_assigned(try_body, out);
                collect_assigned(catch_body, out);
            }
            _ => {}
        }
    }
}

fn literal_type_name(lit: &Literal) -> Option<&'static str> {
    Some(match lit {
        Literal::Int(_) => "int",
        Literal::Float(_) => "float",
        Literal::Str(_) => "string",
        Literal::Bool(_) => "bool",
        Literal::Char(_) => "char",
        Literal::Null => return None,
    })
}

struct Optimizer {
    options: OptimizerOptions,
    assigned: HashSet<String>,
    /// `None` marks a binding that shadows an outer constant.
    scopes: Vec<HashMap<String, Option<Literal>>>,
}

impl Optimizer {
    fn bind(&mut self, name: &str, value: Option<Literal>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn constant(&self, name: &str) -> Option<&Literal> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .and_then(Option::as_ref)
    }

    fn block(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        self.scopes.push(HashMap::new());
        let out = stmts.iter().map(|s| self.stmt(s)).collect();
        self.scopes.pop();
        out
    }

    fn function(&mut self, f: &FunctionDecl) -> FunctionDecl {
        self.scopes.push(HashMap::new());
        if f.receiver.is_some() {
            self.bind("self", None);
        }
        for p in &f.params {
            self.bind(&p.name, None);
        }
        let body = self.block(&f.body);
        self.scopes.pop();
        FunctionDecl { body, ..f.clone() }
    }

    /// Literal a declaration contributes to propagation, if any.
    fn propagatable(&self, decl: &VarDecl, value: &Expr) -> Option<Literal> {
        if self.assigned.contains(&decl.name) {
            return None;
        }
        let lit = value.as_literal()?;
        let own = literal_type_name(lit)?;
        match &decl.ty {
            None => Some(lit.clone()),
            Some(TypeExpr::Named(n)) if n == own => Some(lit.clone()),
            Some(_) => None,
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Stmt {
        let node = match &stmt.node {
            StmtKind::Var(decl) => {
                let value = self.expr(&decl.value);
                let constant = self.propagatable(decl, &value);
                self.bind(&decl.name, constant);
                StmtKind::Var(VarDecl { value, ..decl.clone() })
            }
            StmtKind::Assign { target, op, value } => StmtKind::Assign {
                target: self.expr(target),
                op: *op,
                value: self.expr(value),
            },
            StmtKind::Function(f) => StmtKind::Function(self.function(f)),
            StmtKind::Impl(block) => StmtKind::Impl(ImplBlock {
                type_name: block.type_name.clone(),
                methods: block.methods.iter().map(|m| self.function(m)).collect(),
            }),
            StmtKind::If { cond, then_body, elifs, else_body } => StmtKind::If {
                cond: self.expr(cond),
                then_body: self.block(then_body),
                elifs: elifs
                    .iter()
                    .map(|e| ElseIf {
                        cond: self.expr(&e.cond),
                        body: self.block(&e.body),
                    })
                    .collect(),
                else_body: else_body.as_ref().map(|b| self.block(b)),
            },
            StmtKind::While { cond, body } => StmtKind::While {
                cond: self.expr(cond),
                body: self.block(body),
            },
            StmtKind::For { var, iterable, body } => {
                let iterable = self.expr(iterable);
                self.scopes.push(HashMap::new());
                self.bind(var, None);
                let body = self.block(body);
                self.scopes.pop();
                StmtKind::For { var: var.clone(), iterable, body }
            }
            StmtKind::Return(value) => StmtKind::Return(value.as_ref().map(|v| self.expr(v))),
            StmtKind::Throw(value) => StmtKind::Throw(self.expr(value)),
            StmtKind::TryCatch { try_body, error_var, catch_body } => {
                let try_body = self.block(try_body);
                self.scopes.push(HashMap::new());
                if let Some(name) = error_var {
                    self.bind(name, None);
                }
                let catch_body = self.block(catch_body);
                self.scopes.pop();
                StmtKind::TryCatch {
                    try_body,
                    error_var: error_var.clone(),
                    catch_body,
                }
            }
            StmtKind::Expr(e) => StmtKind::Expr(self.expr(e)),
            other @ (StmtKind::Struct(_)
            | StmtKind::Enum(_)
            | StmtKind::Import { .. }
            | StmtKind::Break
            | StmtKind::Continue) => other.clone(),
        };
        Stmt::new(node, stmt.span)
    }

    fn boxed(&mut self, expr: &Expr) -> Box<Expr> {
        Box::new(self.expr(expr))
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Vec<Expr> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, expr: &Expr) -> Expr {
        let node = match &expr.node {
            ExprKind::Ident(name) => {
                let constant = if self.options.constant_propagation && !self.assigned.contains(name) {
                    self.constant(name).cloned()
                } else {
                    None
                };
                match constant {
                    Some(lit) => ExprKind::Literal(lit),
                    None => ExprKind::Ident(name.clone()),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.expr(left);
                let right = self.expr(right);
                let folded = if self.options.constant_folding {
                    left.as_literal()
                        .zip(right.as_literal())
                        .and_then(|(l, r)| fold_binary(*op, l, r))
                } else {
                    None
                };
                match folded {
                    Some(lit) => ExprKind::Literal(lit),
                    None => ExprKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.expr(operand);
                let folded = if self.options.constant_folding {
                    operand.as_literal().and_then(|l| fold_unary(*op, l))
                } else {
                    None
                };
                match folded {
                    Some(lit) => ExprKind::Literal(lit),
                    None => ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                }
            }
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: callee.clone(),
                args: self.exprs(args),
            },
            ExprKind::MethodCall { receiver, method, args } => ExprKind::MethodCall {
                receiver: self.boxed(receiver),
                method: method.clone(),
                args: self.exprs(args),
            },
            ExprKind::StaticCall { type_name, method, args } => ExprKind::StaticCall {
                type_name: type_name.clone(),
                method: method.clone(),
                args: self.exprs(args),
            },
            ExprKind::Member { object, field } => ExprKind::Member {
                object: self.boxed(object),
                field: field.clone(),
            },
            ExprKind::SafeMember { object, field } => ExprKind::SafeMember {
                object: self.boxed(object),
                field: field.clone(),
            },
            ExprKind::Index { object, index } => ExprKind::Index {
                object: self.boxed(object),
                index: self.boxed(index),
            },
            ExprKind::StructLiteral { name, fields } => ExprKind::StructLiteral {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|f| FieldInit {
                        name: f.name.clone(),
                        value: self.expr(&f.value),
                        span: f.span,
                    })
                    .collect(),
            },
            ExprKind::MapLiteral(entries) => ExprKind::MapLiteral(
                entries
                    .iter()
                    .map(|(k, v)| (self.expr(k), self.expr(v)))
                    .collect(),
            ),
            ExprKind::ArrayLiteral(items) => ExprKind::ArrayLiteral(self.exprs(items)),
            ExprKind::TupleLiteral(items) => ExprKind::TupleLiteral(self.exprs(items)),
            ExprKind::Range { start, end, inclusive, step } => ExprKind::Range {
                start: self.boxed(start),
                end: self.boxed(end),
                inclusive: *inclusive,
                step: step.as_ref().map(|s| self.boxed(s)),
            },
            ExprKind::Pipe { left, right } => ExprKind::Pipe {
                left: self.boxed(left),
                right: self.boxed(right),
            },
            ExprKind::NullCoalesce { left, right } => ExprKind::NullCoalesce {
                left: self.boxed(left),
                right: self.boxed(right),
            },
            ExprKind::Cast { expr: inner, ty } => ExprKind::Cast {
                expr: self.boxed(inner),
                ty: ty.clone(),
            },
            ExprKind::Command { kind, is_async, args } => ExprKind::Command {
                kind: *kind,
                is_async: *is_async,
                args: match args {
                    CommandArgs::Argv(list) => CommandArgs::Argv(self.exprs(list)),
                    CommandArgs::Raw(text) => CommandArgs::Raw(self.boxed(text)),
                },
            },
            ExprKind::Await(inner) => ExprKind::Await(self.boxed(inner)),
            other @ (ExprKind::Literal(_) | ExprKind::EnumVariant { .. } | ExprKind::RawShell(_)) => {
                other.clone()
            }
        };
        Expr::new(node, expr.span)
    }
}

fn fold_binary(op: BinaryOp, left: &Literal, right: &Literal) -> Option<Literal> {
    use Literal::*;
    match (left, right) {
        (Int(a), Int(b)) => fold_int(op, *a, *b),
        (Int(a), Float(b)) => fold_float(op, *a as f64, *b),
        (Float(a), Int(b)) => fold_float(op, *a, *b as f64),
        (Float(a), Float(b)) => fold_float(op, *a, *b),
        (Str(_) | Char(_), Str(_) | Char(_)) => fold_text(op, left, right),
        (Bool(a), Bool(b)) => match op {
            BinaryOp::And => Some(Bool(*a && *b)),
            BinaryOp::Or => Some(Bool(*a || *b)),
            BinaryOp::Eq => Some(Bool(a == b)),
            BinaryOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn fold_int(op: BinaryOp, a: i64, b: i64) -> Option<Literal> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b)?,
        BinaryOp::Sub => a.checked_sub(b)?,
        BinaryOp::Mul => a.checked_mul(b)?,
        BinaryOp::Div => a.checked_div(b)?,
        BinaryOp::Mod => a.checked_rem(b)?,
        _ => return compare(op, a.cmp(&b)).map(Literal::Bool),
    };
    Some(Literal::Int(value))
}

/// Float math as the runtime does it: operands and result pass through
/// their printed text.
fn fold_float(op: BinaryOp, a: f64, b: f64) -> Option<Literal> {
    let (a, b) = (float_as_printed(a), float_as_printed(b));
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b != 0.0 => a / b,
        BinaryOp::Div | BinaryOp::Mod => return None,
        _ => return compare(op, a.partial_cmp(&b)?).map(Literal::Bool),
    };
    value.is_finite().then(|| Literal::Float(float_as_printed(value)))
}

fn text(lit: &Literal) -> Option<String> {
    match lit {
        Literal::Str(s) => Some(s.clone()),
        Literal::Char(c) => Some(c.to_string()),
        _ => None,
    }
}

fn fold_text(op: BinaryOp, left: &Literal, right: &Literal) -> Option<Literal> {
    let (a, b) = (text(left)?, text(right)?);
    match op {
        BinaryOp::Add => Some(Literal::Str(a + &b)),
        // Char and string never compare equal as typed values.
        BinaryOp::Eq | BinaryOp::Ne if std::mem::discriminant(left) != std::mem::discriminant(right) => None,
        BinaryOp::Eq => Some(Literal::Bool(a == b)),
        BinaryOp::Ne => Some(Literal::Bool(a != b)),
        _ => None,
    }
}

fn compare(op: BinaryOp, ord: std::cmp::Ordering) -> Option<bool> {
    use std::cmp::Ordering::*;
    Some(match op {
        BinaryOp::Eq => ord == Equal,
        BinaryOp::Ne => ord != Equal,
        BinaryOp::Lt => ord == Less,
        BinaryOp::Le => ord != Greater,
        BinaryOp::Gt => ord == Greater,
        BinaryOp::Ge => ord != Less,
        _ => return None,
    })
}

fn fold_unary(op: UnaryOp, operand: &Literal) -> Option<Literal> {
    match (op, operand) {
        (UnaryOp::Neg, Literal::Int(v)) => v.checked_neg().map(Literal::Int),
        (UnaryOp::Neg, Literal::Float(v)) => Some(Literal::Float(-float_as_printed(*v))),
        (UnaryOp::Not, Literal::Bool(b)) => Some(Literal::Bool(!b)),
        _ => None,
    }
}
