#![allow(dead_code)]

use std::fs;
use std::process::{Command, Stdio};
use std::io::Write;
use typesh::ast::*;
use typesh::codegen::{self, CodegenOptions, Generated};
use typesh::diagnostics::DiagnosticBag;
use typesh::optimizer::{self, OptimizerOptions};
use typesh::semantics;
use typesh::span::Span;
use typesh::target::TargetShell;

// ---- tree builders ----

pub fn at<T>(node: T) -> Spanned<T> {
    Spanned::new(node, Span::new(1, 1))
}

/// Restamps a statement onto `line` so diagnostics can be told apart.
pub fn on_line(mut stmt: Stmt, line: u32) -> Stmt {
    stmt.span = Span::new(line, 1);
    stmt
}

pub fn expr_on_line(mut e: Expr, line: u32) -> Expr {
    e.span = Span::new(line, 1);
    e
}

pub fn int(v: i64) -> Expr {
    at(ExprKind::Literal(Literal::Int(v)))
}

pub fn float(v: f64) -> Expr {
    at(ExprKind::Literal(Literal::Float(v)))
}

pub fn text(v: &str) -> Expr {
    at(ExprKind::Literal(Literal::Str(v.to_string())))
}

pub fn boolean(v: bool) -> Expr {
    at(ExprKind::Literal(Literal::Bool(v)))
}

pub fn null() -> Expr {
    at(ExprKind::Literal(Literal::Null))
}

pub fn ident(name: &str) -> Expr {
    at(ExprKind::Ident(name.to_string()))
}

pub fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    at(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) })
}

pub fn not(operand: Expr) -> Expr {
    at(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) })
}

pub fn call(callee: &str, args: Vec<Expr>) -> Expr {
    at(ExprKind::Call { callee: callee.to_string(), args })
}

pub fn method(receiver: Expr, name: &str, args: Vec<Expr>) -> Expr {
    at(ExprKind::MethodCall { receiver: Box::new(receiver), method: name.to_string(), args })
}

pub fn static_call(type_name: &str, name: &str, args: Vec<Expr>) -> Expr {
    at(ExprKind::StaticCall { type_name: type_name.to_string(), method: name.to_string(), args })
}

pub fn member(object: Expr, field: &str) -> Expr {
    at(ExprKind::Member { object: Box::new(object), field: field.to_string() })
}

pub fn safe_member(object: Expr, field: &str) -> Expr {
    at(ExprKind::SafeMember { object: Box::new(object), field: field.to_string() })
}

pub fn index(object: Expr, i: Expr) -> Expr {
    at(ExprKind::Index { object: Box::new(object), index: Box::new(i) })
}

pub fn array(items: Vec<Expr>) -> Expr {
    at(ExprKind::ArrayLiteral(items))
}

pub fn struct_lit(name: &str, fields: Vec<(&str, Expr)>) -> Expr {
    at(ExprKind::StructLiteral {
        name: name.to_string(),
        fields: fields
            .into_iter()
            .map(|(n, value)| FieldInit { name: n.to_string(), value, span: Span::new(1, 1) })
            .collect(),
    })
}

pub fn pipe(left: Expr, right: Expr) -> Expr {
    at(ExprKind::Pipe { left: Box::new(left), right: Box::new(right) })
}

pub fn coalesce(left: Expr, right: Expr) -> Expr {
    at(ExprKind::NullCoalesce { left: Box::new(left), right: Box::new(right) })
}

pub fn range(start: Expr, end: Expr, inclusive: bool, step: Option<Expr>) -> Expr {
    at(ExprKind::Range {
        start: Box::new(start),
        end: Box::new(end),
        inclusive,
        step: step.map(Box::new),
    })
}

pub fn command(kind: CommandKind, is_async: bool, args: Vec<Expr>) -> Expr {
    at(ExprKind::Command { kind, is_async, args: CommandArgs::Argv(args) })
}

pub fn cmd(args: Vec<Expr>) -> Expr {
    command(CommandKind::Cmd, false, args)
}

pub fn exec(args: Vec<Expr>) -> Expr {
    command(CommandKind::Exec, false, args)
}

pub fn spawn(args: Vec<Expr>) -> Expr {
    command(CommandKind::Spawn, true, args)
}

/// `spawn` without `async`.
pub fn spawn_sync(args: Vec<Expr>) -> Expr {
    command(CommandKind::Spawn, false, args)
}

pub fn async_exec(args: Vec<Expr>) -> Expr {
    command(CommandKind::Exec, true, args)
}

pub fn await_(handle: Expr) -> Expr {
    at(ExprKind::Await(Box::new(handle)))
}

pub fn ty(name: &str) -> TypeExpr {
    TypeExpr::Named(name.to_string())
}

pub fn nullable(inner: TypeExpr) -> TypeExpr {
    TypeExpr::Nullable(Box::new(inner))
}

pub fn array_of(inner: TypeExpr) -> TypeExpr {
    TypeExpr::Array(Box::new(inner))
}

fn var(name: &str, kind: VarKind, annotation: Option<TypeExpr>, value: Expr) -> Stmt {
    at(StmtKind::Var(VarDecl {
        name: name.to_string(),
        kind,
        ty: annotation,
        value,
        is_public: false,
    }))
}

pub fn let_(name: &str, value: Expr) -> Stmt {
    var(name, VarKind::Let, None, value)
}

pub fn let_mut(name: &str, value: Expr) -> Stmt {
    var(name, VarKind::LetMut, None, value)
}

pub fn let_typed(name: &str, annotation: TypeExpr, value: Expr) -> Stmt {
    var(name, VarKind::Let, Some(annotation), value)
}

pub fn let_mut_typed(name: &str, annotation: TypeExpr, value: Expr) -> Stmt {
    var(name, VarKind::LetMut, Some(annotation), value)
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    at(StmtKind::Assign { target, op: AssignOp::Set, value })
}

pub fn compound(target: Expr, op: AssignOp, value: Expr) -> Stmt {
    at(StmtKind::Assign { target, op, value })
}

pub fn expr(e: Expr) -> Stmt {
    at(StmtKind::Expr(e))
}

pub fn println(e: Expr) -> Stmt {
    expr(call("println", vec![e]))
}

pub fn ret(value: Option<Expr>) -> Stmt {
    at(StmtKind::Return(value))
}

pub fn if_(cond: Expr, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Stmt {
    at(StmtKind::If { cond, then_body, elifs: vec![], else_body })
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    at(StmtKind::While { cond, body })
}

pub fn for_(var: &str, iterable: Expr, body: Vec<Stmt>) -> Stmt {
    at(StmtKind::For { var: var.to_string(), iterable, body })
}

pub fn throw(message: Expr) -> Stmt {
    at(StmtKind::Throw(message))
}

pub fn try_catch(try_body: Vec<Stmt>, error_var: Option<&str>, catch_body: Vec<Stmt>) -> Stmt {
    at(StmtKind::TryCatch {
        try_body,
        error_var: error_var.map(str::to_string),
        catch_body,
    })
}

pub fn param(name: &str, t: TypeExpr) -> Param {
    Param { name: name.to_string(), ty: t, mutable: false, span: Span::new(1, 1) }
}

pub fn func_decl(name: &str, params: Vec<Param>, ret_ty: Option<TypeExpr>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params,
        return_type: ret_ty,
        body,
        is_public: false,
        is_async: false,
        receiver: None,
        span: Span::new(1, 1),
    }
}

pub fn func(name: &str, params: Vec<Param>, ret_ty: Option<TypeExpr>, body: Vec<Stmt>) -> Stmt {
    at(StmtKind::Function(func_decl(name, params, ret_ty, body)))
}

/// `fn <name>(x: int): int return x <op> <k>`
pub fn int_stage(name: &str, op: BinaryOp, k: i64) -> Stmt {
    func(
        name,
        vec![param("x", ty("int"))],
        Some(ty("int")),
        vec![ret(Some(bin(op, ident("x"), int(k))))],
    )
}

pub fn struct_decl(name: &str, fields: Vec<(&str, TypeExpr)>) -> Stmt {
    at(StmtKind::Struct(StructDecl {
        name: name.to_string(),
        fields: fields
            .into_iter()
            .map(|(n, t)| FieldDecl { name: n.to_string(), ty: t, span: Span::new(1, 1) })
            .collect(),
        is_public: false,
    }))
}

/// Instance method; `mutable` selects a `mut self` receiver.
pub fn method_decl(name: &str, mutable: bool, params: Vec<Param>, ret_ty: Option<TypeExpr>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        receiver: Some(Receiver { mutable }),
        ..func_decl(name, params, ret_ty, body)
    }
}

pub fn impl_block(type_name: &str, methods: Vec<FunctionDecl>) -> Stmt {
    at(StmtKind::Impl(ImplBlock { type_name: type_name.to_string(), methods }))
}

pub fn program(items: Vec<Stmt>) -> Program {
    Program { items }
}

// ---- pipeline helpers ----

pub fn diagnostics(items: Vec<Stmt>) -> DiagnosticBag {
    semantics::analyze(&program(items)).diagnostics
}

pub fn generate(items: Vec<Stmt>, target: TargetShell) -> Generated {
    generate_with(items, target, OptimizerOptions::default())
}

pub fn generate_with(items: Vec<Stmt>, target: TargetShell, optimizer: OptimizerOptions) -> Generated {
    let program = program(items);
    let analysis = semantics::analyze(&program);
    assert!(
        !analysis.diagnostics.has_errors(),
        "unexpected diagnostics:\n{}",
        analysis.diagnostics.render(None)
    );
    let optimized = optimizer::optimize(&program, optimizer);
    codegen::generate(&optimized, &analysis.symbols, CodegenOptions { target }).expect("codegen failed")
}

/// Full pipeline; panics unless the program lowers completely.
pub fn compile(items: Vec<Stmt>, target: TargetShell) -> String {
    compile_with(items, target, OptimizerOptions::default())
}

pub fn compile_with(items: Vec<Stmt>, target: TargetShell, optimizer: OptimizerOptions) -> String {
    let generated = generate_with(items, target, optimizer);
    assert!(generated.unsupported.is_empty(), "unsupported: {:?}", generated.unsupported);
    generated.text
}

pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
    /// Files still in the script's `TMPDIR` after it exited.
    pub leftover_temp_files: Vec<String>,
}

/// Runs a script with `shell` inside a scratch directory whose `tmp/` is the
/// script's `TMPDIR`.
pub fn run_script(script: &str, shell: &str, stdin: &str) -> RunResult {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let script_path = dir.path().join("script.sh");
    fs::write(&script_path, script).expect("Failed to write temp script");
    let tmp = dir.path().join("tmp");
    fs::create_dir(&tmp).expect("Failed to create TMPDIR");

    let mut child = Command::new(shell)
        .current_dir(dir.path())
        .env("TMPDIR", &tmp)
        .arg(&script_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to execute {}: {}", shell, e));
    if let Some(mut input) = child.stdin.take() {
        input.write_all(stdin.as_bytes()).expect("Failed to write stdin");
    }
    let output = child.wait_with_output().expect("Failed to wait for script");
    let leftover_temp_files = fs::read_dir(&tmp)
        .expect("Failed to list TMPDIR")
        .map(|entry| entry.expect("TMPDIR entry").file_name().to_string_lossy().into_owned())
        .collect();

    RunResult {
        stdout: String::from_utf8_lossy(&output.stdout).replace("\r\n", "\n"),
        stderr: String::from_utf8_lossy(&output.stderr).replace("\r\n", "\n"),
        status: output.status.code().unwrap_or(-1),
        leftover_temp_files,
    }
}

/// Compiles for POSIX sh and runs the result under `sh`.
pub fn run(items: Vec<Stmt>) -> RunResult {
    let script = compile(items, TargetShell::Posix);
    run_script(&script, "sh", "")
}

pub fn run_bash(items: Vec<Stmt>) -> RunResult {
    let script = compile(items, TargetShell::Bash);
    run_script(&script, "bash", "")
}
