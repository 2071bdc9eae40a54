//! Lowering of an analyzed program to shell text.
//!
//! The generator walks the AST directly. Expression lowering produces a shell
//! *word* and may first emit setup lines; statements append lines to the
//! current buffer. Runtime helpers are marked as they are referenced and only
//! the marked set is prepended to the script.

mod expr;
pub mod postprocess;
pub mod runtime;
mod structs;

use crate::ast::{
    CommandKind, ElseIf, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind, TypeExpr, VarDecl,
};
use crate::error::CompileError;
use crate::names;
use crate::semantics::resolver::{Context, Resolver};
use crate::semantics::symbols::{SymbolTable, VariableSymbol};
use crate::span::Span;
use crate::target::TargetShell;
use crate::types::Type;
use runtime::{Helper, HelperUsage};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use structs::{Dest, StructSrc};
use tracing::debug;

type Gen<T> = Result<T, CompileError>;

#[derive(Clone, Debug, Copy, Default)]
pub struct CodegenOptions {
    pub target: TargetShell,
}

/// A construct the generator met but cannot lower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unsupported {
    pub feature: String,
    pub span: Span,
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: unsupported: {}", self.span, self.feature)
    }
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub unsupported: Vec<Unsupported>,
}

pub fn generate(program: &Program, symbols: &SymbolTable, options: CodegenOptions) -> Result<Generated, CompileError> {
    let mut g = Generator::new(symbols.clone());
    g.program(program)?;
    debug!(helpers = ?g.helpers.closure(), unsupported = g.unsupported.len(), "generated program");

    let mut text = String::new();
    text.push_str(options.target.shebang());
    text.push_str("\n\n");
    text.push_str(&runtime::emit_helpers(&g.helpers));
    text.push('\n');
    for line in &g.out {
        text.push_str(line);
        text.push('\n');
    }
    Ok(Generated {
        text: postprocess::normalize(&text),
        unsupported: g.unsupported,
    })
}

/// Quotes `s` as a single shell word.
pub fn sh_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// `"$name"`
fn var_word(name: &str) -> String {
    format!("\"${}\"", name)
}

fn internal(message: impl Into<String>, span: Span) -> CompileError {
    CompileError::new(message).with_location(span)
}

#[derive(Default)]
struct CodegenContext {
    uid_counter: usize,
}

impl CodegenContext {
    fn next_id(&mut self) -> usize {
        self.uid_counter += 1;
        self.uid_counter
    }
}

/// How a binding's value lives in the shell.
#[derive(Debug, Clone, PartialEq)]
enum Storage {
    /// One variable holding the value (or a struct reference).
    Scalar,
    /// Flattened struct: the binding's shell name is the field prefix.
    Struct(String),
}

#[derive(Debug, Clone)]
struct Binding {
    shell: String,
    storage: Storage,
}

struct FnFrame {
    shell: String,
    ret: Type,
    locals: Vec<String>,
}

enum Place {
    Var(String),
    Field { object: String, field: String },
}

struct Generator {
    /// Mirror of the analysis scopes so expressions can be re-typed.
    symbols: SymbolTable,
    helpers: HelperUsage,
    unsupported: Vec<Unsupported>,
    ctx: CodegenContext,
    scopes: Vec<HashMap<String, Binding>>,
    func: Option<FnFrame>,
    try_depth: usize,
    /// `try_depth` at each enclosing loop.
    loops: Vec<usize>,
    out: Vec<String>,
    indent: usize,
}

impl Generator {
    fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            helpers: HelperUsage::default(),
            unsupported: Vec::new(),
            ctx: CodegenContext::default(),
            scopes: vec![HashMap::new()],
            func: None,
            try_depth: 0,
            loops: Vec::new(),
            out: Vec::new(),
            indent: 0,
        }
    }

    // ---- emission plumbing ----

    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push(format!("{}{}", "  ".repeat(self.indent), text.as_ref()));
    }

    fn assign(&mut self, var: &str, word: &str) {
        self.line(format!("{}={}", var, word));
    }

    fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Gen<R>) -> Gen<R> {
        self.indent += 1;
        let result = f(self);
        self.indent -= 1;
        result
    }

    /// Runs `f` with a fresh line buffer and hands back what it emitted.
    fn capture<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> (Vec<String>, R) {
        let saved = std::mem::take(&mut self.out);
        let result = f(self);
        let captured = std::mem::replace(&mut self.out, saved);
        (captured, result)
    }

    fn use_helper(&mut self, helper: Helper) -> &'static str {
        self.helpers.mark(helper);
        helper.name()
    }

    fn null_word(&mut self) -> String {
        var_word(self.use_helper(Helper::Null))
    }

    /// Records an unsupported construct and returns a placeholder word.
    fn unsupported(&mut self, feature: impl Into<String>, span: Span) -> String {
        self.unsupported.push(Unsupported { feature: feature.into(), span });
        "''".to_string()
    }

    /// Adds a variable to the enclosing function's `local` line.
    fn own(&mut self, var: &str) {
        if let Some(frame) = self.func.as_mut() {
            if !frame.locals.iter().any(|l| l == var) {
                frame.locals.push(var.to_string());
            }
        }
    }

    fn temp(&mut self) -> String {
        let name = names::temp(self.ctx.next_id());
        self.own(&name);
        name
    }

    /// Stores `word` in a fresh temp and returns a word reading it back.
    fn hoist(&mut self, word: &str) -> String {
        let t = self.temp();
        self.assign(&t, word);
        var_word(&t)
    }

    // ---- scopes and typing ----

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
        self.symbols.push_scope();
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
        self.symbols.pop_scope();
    }

    fn type_of(&mut self, expr: &Expr) -> Type {
        Resolver::new(&mut self.symbols).resolve_expr(expr, &Context::default())
    }

    fn lower_type(&mut self, te: &TypeExpr) -> Type {
        Resolver::new(&mut self.symbols).quiet_type_expr(te)
    }

    /// Name of the struct a non-nullable type refers to.
    fn struct_of(&self, ty: &Type) -> Option<String> {
        let name = ty.named_name()?;
        self.symbols.struct_info(name).map(|info| info.name.clone())
    }

    fn holds_struct(&self, ty: &Type) -> bool {
        self.struct_of(ty.non_null()).is_some() || self.container_of_structs(ty).is_some()
    }

    /// Containers of structs have no flat layout.
    fn container_of_structs(&self, ty: &Type) -> Option<&'static str> {
        match ty.non_null() {
            Type::Array(elem) if self.holds_struct(elem) => Some("array of structs"),
            Type::Tuple(items) if items.iter().any(|t| self.holds_struct(t)) => Some("tuple of structs"),
            Type::Map(_, value) if self.holds_struct(value) => Some("map of structs"),
            _ => None,
        }
    }

    /// Binding introduced by generated code so far.
    fn scoped(&self, name: &str) -> Option<Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name)).cloned()
    }

    fn binding(&self, name: &str) -> Option<Binding> {
        if let Some(found) = self.scoped(name) {
            return Some(found);
        }
        // Globals the analysis left in its outermost frame.
        let sym = self.symbols.lookup(name)?;
        let storage = match self.struct_of(&sym.ty) {
            Some(t) => Storage::Struct(t),
            None => Storage::Scalar,
        };
        Some(Binding { shell: names::var(name), storage })
    }

    fn shell_in_use(&self, shell: &str) -> bool {
        self.scopes.iter().any(|s| s.values().any(|b| b.shell == shell))
    }

    /// Introduces a binding; non-nullable structs get flattened storage.
    fn declare(&mut self, name: &str, ty: Type, span: Span) -> Binding {
        let storage = match self.struct_of(&ty) {
            Some(t) => Storage::Struct(t),
            None => Storage::Scalar,
        };
        self.declare_as(name, ty, storage, span)
    }

    fn declare_as(&mut self, name: &str, ty: Type, storage: Storage, span: Span) -> Binding {
        let base = names::var(name);
        // Locals are dynamically scoped: one named like a global would leak
        // into callees that read that global. Top-level code only avoids its
        // own enclosing blocks.
        let outer = match self.func {
            Some(_) => self.binding(name).map(|b| b.shell),
            None => self.scoped(name).map(|b| b.shell),
        };
        let mut shell = base.clone();
        let mut n = 1;
        while self.shell_in_use(&shell) || outer.as_deref() == Some(shell.as_str()) {
            n += 1;
            shell = format!("{}__{}", base, n);
        }
        self.own(&shell);
        if let Storage::Struct(_) = storage {
            self.own(&names::type_sentinel(&shell));
        }
        let binding = Binding { shell, storage };
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding.clone());
        }
        self.symbols.declare(VariableSymbol {
            name: name.to_string(),
            ty,
            is_mutable: true,
            span,
        });
        binding
    }

    // ---- program structure ----

    fn program(&mut self, program: &Program) -> Gen<()> {
        // Definitions come first so top-level code may call functions
        // declared further down.
        for item in &program.items {
            match &item.node {
                StmtKind::Function(f) => self.function(f, None)?,
                StmtKind::Impl(block) => {
                    for m in &block.methods {
                        self.function(m, Some(&block.type_name))?;
                    }
                }
                _ => {}
            }
        }
        for item in &program.items {
            if !matches!(item.node, StmtKind::Function(_) | StmtKind::Impl(_)) {
                self.stmt(item)?;
            }
        }
        if let Some(main) = self.symbols.function("main") {
            let returns_int = main.ret == Type::INT;
            self.line(format!("{} \"$@\"", names::function("main")));
            if returns_int {
                self.line("exit \"${__rt_ret:-0}\"");
            }
        }
        Ok(())
    }

    fn function(&mut self, decl: &FunctionDecl, owner: Option<&str>) -> Gen<()> {
        if decl.is_async {
            self.unsupported("async function", decl.span);
            return Ok(());
        }
        let shell = match owner {
            Some(t) => names::method(t, &decl.name),
            None => names::function(&decl.name),
        };
        let ret = match &decl.return_type {
            Some(t) => self.lower_type(t),
            None => Type::VOID,
        };
        let outer = self.func.replace(FnFrame { shell: shell.clone(), ret, locals: Vec::new() });
        let outer_try = std::mem::replace(&mut self.try_depth, 0);
        let outer_loops = std::mem::take(&mut self.loops);

        self.push_scope();
        let mut params = Vec::new();
        if let (Some(t), Some(_)) = (owner, decl.receiver) {
            params.push(self.declare_as("self", Type::named(t), Storage::Scalar, decl.span).shell);
        }
        for p in &decl.params {
            let ty = self.lower_type(&p.ty);
            if let Some(feature) = self.container_of_structs(&ty) {
                self.unsupported(feature, p.span);
            }
            params.push(self.declare_as(&p.name, ty, Storage::Scalar, p.span).shell);
        }
        let takes_argv = owner.is_none() && decl.name == "main" && params.len() == 1;
        let (body, result) = self.capture(|g| {
            g.nested(|g| {
                if takes_argv {
                    let array = g.use_helper(Helper::ArrayNew);
                    g.assign(&params[0], &format!("\"$({} \"$@\")\"", array));
                } else {
                    for (i, p) in params.iter().enumerate() {
                        g.assign(p, &format!("\"${{{}}}\"", i + 1));
                    }
                }
                for stmt in &decl.body {
                    g.stmt(stmt)?;
                }
                Ok(())
            })
        });
        self.pop_scope();
        let frame = std::mem::replace(&mut self.func, outer);
        self.try_depth = outer_try;
        self.loops = outer_loops;
        result?;

        self.line(format!("{}() {{", shell));
        if let Some(frame) = frame {
            if !frame.locals.is_empty() {
                self.line(format!("  local {}", frame.locals.join(" ")));
            }
        }
        if body.is_empty() {
            self.line("  :");
        }
        self.out.extend(body);
        self.line("}");
        self.out.push(String::new());
        Ok(())
    }

    // ---- statements ----

    fn stmt(&mut self, stmt: &Stmt) -> Gen<()> {
        let (lines_before, unsupported_before) = (self.out.len(), self.unsupported.len());
        self.stmt_inner(stmt)?;
        // A statement that hit an unsupported construct leaves no partial code.
        if self.unsupported.len() > unsupported_before {
            self.out.truncate(lines_before);
        }
        Ok(())
    }

    fn stmt_inner(&mut self, stmt: &Stmt) -> Gen<()> {
        let span = stmt.span;
        match &stmt.node {
            StmtKind::Var(decl) => self.let_binding(decl, span),
            StmtKind::Assign { target, op, value } => {
                let compound;
                let rhs = match op.binary_op() {
                    Some(bin) => {
                        compound = Expr::new(
                            ExprKind::Binary {
                                op: bin,
                                left: Box::new(target.clone()),
                                right: Box::new(value.clone()),
                            },
                            value.span,
                        );
                        &compound
                    }
                    None => value,
                };
                self.assign_stmt(target, rhs, span)
            }
            StmtKind::Function(_) | StmtKind::Impl(_) => {
                self.unsupported("nested declaration", span);
                Ok(())
            }
            StmtKind::Struct(_) | StmtKind::Enum(_) | StmtKind::Import { .. } => Ok(()),
            StmtKind::If { cond, then_body, elifs, else_body } => {
                let c = self.cond(cond)?;
                self.line(format!("if {}; then", c));
                self.block(then_body)?;
                self.else_chain(elifs, else_body.as_deref())?;
                self.line("fi");
                Ok(())
            }
            StmtKind::While { cond, body } => self.while_loop(cond, body),
            StmtKind::For { var, iterable, body } => match &iterable.node {
                ExprKind::Range { start, end, inclusive, step } => {
                    self.range_loop(var, start, end, *inclusive, step.as_deref(), body, span)
                }
                _ => self.array_loop(var, iterable, body, span),
            },
            StmtKind::Return(value) => self.return_stmt(value.as_ref(), span),
            StmtKind::Break => self.loop_control("break", span),
            StmtKind::Continue => self.loop_control("continue", span),
            StmtKind::Throw(value) => {
                let w = self.value(value)?;
                self.line(format!("printf '%s\\n' {} >&2", w));
                self.line("exit 1");
                Ok(())
            }
            StmtKind::TryCatch { try_body, error_var, catch_body } => {
                self.try_catch(try_body, error_var.as_deref(), catch_body, span)
            }
            StmtKind::Expr(e) => self.expr_stmt(e),
        }
    }

    /// Nested block in its own scope; never empty, since `then fi` is not valid sh.
    fn block(&mut self, stmts: &[Stmt]) -> Gen<()> {
        self.push_scope();
        let result = self.nested(|g| {
            let start = g.out.len();
            for stmt in stmts {
                g.stmt(stmt)?;
            }
            if g.out.len() == start {
                g.line(":");
            }
            Ok(())
        });
        self.pop_scope();
        result
    }

    fn else_chain(&mut self, elifs: &[ElseIf], else_body: Option<&[Stmt]>) -> Gen<()> {
        let Some((first, rest)) = elifs.split_first() else {
            if let Some(body) = else_body {
                self.line("else");
                self.block(body)?;
            }
            return Ok(());
        };
        let (setup, c) = self.capture(|g| g.nested(|g| g.cond(&first.cond)));
        let c = c?;
        if setup.is_empty() {
            self.line(format!("elif {}; then", c));
            self.block(&first.body)?;
            return self.else_chain(rest, else_body);
        }
        // The condition needs setup lines, so the branch nests.
        self.line("else");
        self.out.extend(setup);
        self.nested(|g| {
            g.line(format!("if {}; then", c));
            g.block(&first.body)?;
            g.else_chain(rest, else_body)?;
            g.line("fi");
            Ok(())
        })
    }

    fn while_loop(&mut self, cond: &Expr, body: &[Stmt]) -> Gen<()> {
        let (setup, c) = self.capture(|g| g.nested(|g| g.cond(cond)));
        let c = c?;
        self.loops.push(self.try_depth);
        if setup.is_empty() {
            self.line(format!("while {}; do", c));
        } else {
            self.line("while :; do");
            self.out.extend(setup);
            self.nested(|g| {
                g.line(format!("if {}; then break; fi", expr::negate(&c)));
                Ok(())
            })?;
        }
        let result = self.block(body);
        self.loops.pop();
        result?;
        self.line("done");
        Ok(())
    }

    /// Arithmetic text for a loop bound, evaluated exactly once.
    fn stable_int(&mut self, e: &Expr) -> Gen<String> {
        if let Some(Literal::Int(v)) = e.as_literal() {
            return Ok(v.to_string());
        }
        let w = self.value(e)?;
        let t = self.temp();
        self.assign(&t, &w);
        Ok(format!("${}", t))
    }

    #[allow(clippy::too_many_arguments)]
    fn range_loop(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        inclusive: bool,
        step: Option<&Expr>,
        body: &[Stmt],
        span: Span,
    ) -> Gen<()> {
        let lo = self.stable_int(start)?;
        let hi = self.stable_int(end)?;
        let literal = |e: &Expr| match e.as_literal() {
            Some(Literal::Int(v)) => Some(*v),
            _ => None,
        };
        let (step_text, ascending) = match step {
            Some(s) => {
                let text = self.stable_int(s)?;
                (text, literal(s).filter(|v| *v != 0).map(|v| v > 0))
            }
            None => match (literal(start), literal(end)) {
                (Some(a), Some(b)) if a > b => ("-1".to_string(), Some(false)),
                (Some(_), Some(_)) => ("1".to_string(), Some(true)),
                _ => {
                    let t = self.temp();
                    self.assign(&t, "1");
                    self.line(format!("if [ \"{}\" -gt \"{}\" ]; then {}=-1; fi", lo, hi, t));
                    (format!("${}", t), None)
                }
            },
        };

        self.push_scope();
        let i = self.declare_as(var, Type::INT, Storage::Scalar, span).shell;
        let (up, down) = if inclusive { ("-le", "-ge") } else { ("-lt", "-gt") };
        let test = match ascending {
            Some(true) => format!("[ \"${}\" {} \"{}\" ]", i, up, hi),
            Some(false) => format!("[ \"${}\" {} \"{}\" ]", i, down, hi),
            None => format!(
                "{{ [ \"{s}\" -gt 0 ] && [ \"${i}\" {up} \"{hi}\" ]; }} || {{ [ \"{s}\" -lt 0 ] && [ \"${i}\" {down} \"{hi}\" ]; }}",
                s = step_text,
                i = i,
                up = up,
                down = down,
                hi = hi
            ),
        };
        self.assign(&i, &format!("$(( {} - ({}) ))", lo, step_text));
        self.line(format!("while {i}=$(( ${i} + ({s}) )); {test}; do", i = i, s = step_text, test = test));
        self.loops.push(self.try_depth);
        let result = self.block(body);
        self.loops.pop();
        self.pop_scope();
        result?;
        self.line("done");
        Ok(())
    }

    fn array_loop(&mut self, var: &str, iterable: &Expr, body: &[Stmt], span: Span) -> Gen<()> {
        let ty = self.type_of(iterable);
        let elem = match ty.non_null() {
            Type::Array(elem) => elem.as_ref().clone(),
            other => other.clone(),
        };
        if self.holds_struct(&elem) {
            self.unsupported("array of structs", iterable.span);
            return Ok(());
        }
        let items = self.value(iterable)?;
        let arr = self.temp();
        self.assign(&arr, &items);
        let len = self.temp();
        let len_fn = self.use_helper(Helper::ArrayLen);
        self.assign(&len, &format!("\"$({} \"${}\")\"", len_fn, arr));
        let idx = self.temp();
        self.assign(&idx, "-1");
        self.line(format!(
            "while {i}=$(( ${i} + 1 )); [ \"${i}\" -lt \"${n}\" ]; do",
            i = idx,
            n = len
        ));

        self.push_scope();
        let item = self.declare_as(var, elem, Storage::Scalar, span).shell;
        let get = self.use_helper(Helper::ArrayGet);
        self.nested(|g| {
            g.assign(&item, &format!("\"$({} \"${}\" \"${}\")\"", get, arr, idx));
            Ok(())
        })?;
        self.loops.push(self.try_depth);
        let result = self.block(body);
        self.loops.pop();
        self.pop_scope();
        result?;
        self.line("done");
        Ok(())
    }

    fn loop_control(&mut self, keyword: &str, span: Span) -> Gen<()> {
        if self.loops.last() != Some(&self.try_depth) {
            self.unsupported(format!("`{}` across a try boundary", keyword), span);
            return Ok(());
        }
        self.line(keyword);
        Ok(())
    }

    fn return_stmt(&mut self, value: Option<&Expr>, span: Span) -> Gen<()> {
        let Some((shell, ret)) = self.func.as_ref().map(|f| (f.shell.clone(), f.ret.clone())) else {
            return Err(internal("`return` outside of a function", span));
        };
        if self.try_depth > 0 {
            self.unsupported("`return` across a try boundary", span);
            return Ok(());
        }
        if let Some(v) = value {
            match self.struct_of(&ret) {
                Some(t) => {
                    let slot = names::return_slot(&shell);
                    let dest = Dest::Static { prefix: slot.clone(), fresh: false };
                    self.store_struct(&dest, v, &t)?;
                    self.assign("__rt_ret", &slot);
                }
                None => {
                    let w = self.value(v)?;
                    self.assign("__rt_ret", &w);
                }
            }
        }
        self.line("return 0");
        Ok(())
    }

    fn try_catch(&mut self, try_body: &[Stmt], error_var: Option<&str>, catch_body: &[Stmt], span: Span) -> Gen<()> {
        let tmpfile = self.use_helper(Helper::Tmpfile);
        self.line(tmpfile);
        let capture = self.temp();
        self.assign(&capture, "\"$__rt_tmp\"");
        self.line("if (");
        // The subshell drops the parent's EXIT trap; files it creates are its own.
        self.nested(|g| {
            g.line("__rt_tmpfiles=\"\"");
            g.line("trap __rt_cleanup EXIT");
            Ok(())
        })?;
        self.try_depth += 1;
        let result = self.block(try_body);
        self.try_depth -= 1;
        result?;
        self.line(format!(") 2>\"${}\"; then", capture));
        self.nested(|g| {
            g.line(format!("rm -f \"${}\"", capture));
            Ok(())
        })?;
        self.line("else");
        self.push_scope();
        let result = self.nested(|g| {
            if let Some(name) = error_var {
                let err = g.declare_as(name, Type::STRING, Storage::Scalar, span).shell;
                g.assign(&err, &format!("\"$(cat \"${}\")\"", capture));
            }
            g.line(format!("rm -f \"${}\"", capture));
            Ok(())
        });
        let result = result.and_then(|_| self.block(catch_body));
        self.pop_scope();
        result?;
        self.line("fi");
        Ok(())
    }

    fn expr_stmt(&mut self, e: &Expr) -> Gen<()> {
        match &e.node {
            ExprKind::RawShell(text) => {
                for l in text.lines() {
                    self.line(l);
                }
                Ok(())
            }
            ExprKind::Command { kind: CommandKind::Exec, is_async: false, args } => {
                let run = self.runnable(args)?;
                self.line(format!("{} || exit \"$?\"", run));
                Ok(())
            }
            ExprKind::Await(inner) => {
                let w = self.value(inner)?;
                let await_fn = self.use_helper(Helper::Await);
                self.line(format!("{} {}", await_fn, w));
                Ok(())
            }
            ExprKind::Call { callee, args } => self.call(callee, args, e.span, None, true).map(drop),
            ExprKind::MethodCall { receiver, method, args } => {
                self.method_call(receiver, method, args, e.span, true).map(drop)
            }
            ExprKind::StaticCall { type_name, method, args } => {
                self.static_call(type_name, method, args, e.span, None, true).map(drop)
            }
            _ => self.value(e).map(drop),
        }
    }

    fn let_binding(&mut self, decl: &VarDecl, span: Span) -> Gen<()> {
        let ty = match &decl.ty {
            Some(t) => self.lower_type(t),
            None => self.type_of(&decl.value),
        };
        if let Some(feature) = self.container_of_structs(&ty) {
            self.unsupported(feature, span);
            return Ok(());
        }
        match self.struct_of(&ty) {
            Some(t) => {
                // Evaluate before declaring: the initializer may read a
                // shadowed binding of the same name.
                let src = match &decl.value.node {
                    ExprKind::StructLiteral { .. } => None,
                    _ => Some(self.struct_source(&decl.value)?),
                };
                let binding = self.declare(&decl.name, ty, span);
                let dest = Dest::Static { prefix: binding.shell, fresh: true };
                match (src, &decl.value.node) {
                    (Some(src), _) => self.copy_struct(&dest, &src, &t, span),
                    (None, ExprKind::StructLiteral { name, fields }) => self.init_struct(&dest, name, fields, span),
                    (None, _) => Err(internal("struct binding without a source", span)),
                }
            }
            None => {
                let w = self.value(&decl.value)?;
                let binding = self.declare(&decl.name, ty, span);
                self.assign(&binding.shell, &w);
                Ok(())
            }
        }
    }

    fn assign_stmt(&mut self, target: &Expr, rhs: &Expr, span: Span) -> Gen<()> {
        if let ExprKind::Index { object, index } = &target.node {
            return self.index_assign(object, index, rhs, span);
        }
        let target_ty = self.type_of(target);
        if let Some(t) = self.struct_of(&target_ty) {
            let dest = match &target.node {
                ExprKind::Ident(name) => {
                    let binding = self
                        .binding(name)
                        .ok_or_else(|| internal(format!("unresolved name `{}`", name), span))?;
                    match binding.storage {
                        Storage::Struct(_) => Dest::Static { prefix: binding.shell, fresh: false },
                        Storage::Scalar => {
                            // Reference-held structs (parameters, `self`) rebind.
                            let w = self.value(rhs)?;
                            self.assign(&binding.shell, &w);
                            return Ok(());
                        }
                    }
                }
                _ => match self.place(target)? {
                    Place::Var(prefix) => Dest::Static { prefix, fresh: false },
                    Place::Field { object, field } => Dest::Dynamic(self.field_get(&object, &field)),
                },
            };
            return self.store_struct(&dest, rhs, &t);
        }
        let w = self.value(rhs)?;
        let place = self.place(target)?;
        self.write(&place, &w);
        Ok(())
    }

    fn index_assign(&mut self, object: &Expr, index: &Expr, rhs: &Expr, span: Span) -> Gen<()> {
        let ty = self.type_of(object);
        let w = self.value(rhs)?;
        let i = self.value(index)?;
        match ty.non_null() {
            Type::Map(..) => {
                let m = self.value(object)?;
                let set = self.use_helper(Helper::MapSet);
                self.line(format!("{} {} {} {}", set, m, i, w));
            }
            Type::Array(_) => {
                let place = self.place(object)?;
                let current = self.read(&place);
                let set = self.use_helper(Helper::ArraySet);
                self.write(&place, &format!("\"$({} {} {} {})\"", set, current, i, w));
            }
            _ => {
                self.unsupported("index assignment on a dynamic value", span);
            }
        }
        Ok(())
    }

    fn place(&mut self, target: &Expr) -> Gen<Place> {
        match &target.node {
            ExprKind::Ident(name) => match self.binding(name) {
                Some(b) => Ok(Place::Var(b.shell)),
                None => Err(internal(format!("unresolved name `{}`", name), target.span)),
            },
            ExprKind::Member { object, field } => {
                if let Some((prefix, _)) = self.static_path(object) {
                    return Ok(Place::Var(names::field(&prefix, field)));
                }
                let object = self.value(object)?;
                Ok(Place::Field { object, field: field.clone() })
            }
            _ => Err(internal("invalid assignment target", target.span)),
        }
    }

    fn read(&mut self, place: &Place) -> String {
        match place {
            Place::Var(v) => var_word(v),
            Place::Field { object, field } => self.field_get(object, field),
        }
    }

    fn write(&mut self, place: &Place, word: &str) {
        match place {
            Place::Var(v) => self.assign(v, word),
            Place::Field { object, field } => {
                let set = self.use_helper(Helper::FieldSet);
                self.line(format!("{} {} {} {}", set, object, field, word));
            }
        }
    }

    fn field_get(&mut self, object: &str, field: &str) -> String {
        let get = self.use_helper(Helper::FieldGet);
        format!("\"$({} {} {})\"", get, object, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, CommandArgs, FieldDecl, Param, Spanned, StructDecl};
    use crate::semantics::analyze;

    fn e(node: ExprKind) -> Expr {
        Spanned::new(node, Span::new(1, 1))
    }

    fn s(node: StmtKind) -> Stmt {
        Spanned::new(node, Span::new(1, 1))
    }

    fn int(v: i64) -> Expr {
        e(ExprKind::Literal(Literal::Int(v)))
    }

    fn text(v: &str) -> Expr {
        e(ExprKind::Literal(Literal::Str(v.into())))
    }

    fn ident(n: &str) -> Expr {
        e(ExprKind::Ident(n.into()))
    }

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        e(ExprKind::Call { callee: name.into(), args })
    }

    fn let_(name: &str, value: Expr) -> Stmt {
        s(StmtKind::Var(VarDecl {
            name: name.into(),
            kind: crate::ast::VarKind::Let,
            ty: None,
            value,
            is_public: false,
        }))
    }

    fn compile(items: Vec<Stmt>, target: TargetShell) -> Generated {
        let program = Program { items };
        let analysis = analyze(&program);
        assert!(!analysis.diagnostics.has_errors(), "{:?}", analysis.diagnostics);
        generate(&program, &analysis.symbols, CodegenOptions { target }).unwrap()
    }

    fn inc_fn() -> Stmt {
        s(StmtKind::Function(FunctionDecl {
            name: "inc".into(),
            params: vec![Param {
                name: "x".into(),
                ty: TypeExpr::Named("int".into()),
                mutable: false,
                span: Span::new(1, 1),
            }],
            return_type: Some(TypeExpr::Named("int".into())),
            body: vec![s(StmtKind::Return(Some(e(ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(ident("x")),
                right: Box::new(int(1)),
            }))))],
            is_public: false,
            is_async: false,
            receiver: None,
            span: Span::new(1, 1),
        }))
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(sh_single_quote("it's"), "'it'\\''s'");
        assert_eq!(sh_single_quote(""), "''");
    }

    #[test]
    fn posix_functions_keep_a_local_frame() {
        let out = compile(vec![inc_fn(), let_("value", call("inc", vec![int(41)]))], TargetShell::Posix);
        assert!(out.text.starts_with("#!/bin/sh\n"));
        assert!(out.text.contains("inc() {\n  local x\n  x=\"${1}\"\n"), "{}", out.text);
        assert!(out.text.contains("__rt_ret=\"$(( ($x + 1) ))\""), "{}", out.text);
        assert!(out.text.contains("\nvalue=\"$__rt_t1\"\n"), "{}", out.text);
    }

    #[test]
    fn bash_functions_declare_locals() {
        let out = compile(vec![inc_fn()], TargetShell::Bash);
        assert!(out.text.starts_with("#!/usr/bin/env bash\n"));
        assert!(out.text.contains("  local x\n  x=\"${1}\"\n"), "{}", out.text);
    }

    #[test]
    fn only_referenced_helpers_are_emitted() {
        let out = compile(vec![s(StmtKind::Expr(call("println", vec![text("hi")])))], TargetShell::Posix);
        assert!(out.text.contains("printf '%s\\n' 'hi'"));
        assert!(!out.text.contains("__rt_"), "{}", out.text);
        assert!(out.unsupported.is_empty());
    }

    #[test]
    fn structs_flatten_into_prefixed_variables() {
        let point = s(StmtKind::Struct(StructDecl {
            name: "Point".into(),
            fields: ["x", "y"]
                .iter()
                .map(|f| FieldDecl { name: f.to_string(), ty: TypeExpr::Named("int".into()), span: Span::new(1, 1) })
                .collect(),
            is_public: false,
        }));
        let literal = e(ExprKind::StructLiteral {
            name: "Point".into(),
            fields: vec![
                crate::ast::FieldInit { name: "x".into(), value: int(1), span: Span::new(1, 1) },
                crate::ast::FieldInit { name: "y".into(), value: int(2), span: Span::new(1, 1) },
            ],
        });
        let read = e(ExprKind::Member { object: Box::new(ident("p")), field: "y".into() });
        let out = compile(
            vec![point, let_("p", literal), s(StmtKind::Expr(call("println", vec![read])))],
            TargetShell::Posix,
        );
        assert!(out.text.contains("p_x=1\np_y=2\np__type='Point'\np=p\n"), "{}", out.text);
        assert!(out.text.contains("printf '%s\\n' \"$p_y\""));
        assert!(!out.text.contains("__rt_field_get"));
    }

    #[test]
    fn exec_failures_are_fatal() {
        let exec = e(ExprKind::Command {
            kind: CommandKind::Exec,
            is_async: false,
            args: CommandArgs::Argv(vec![text("false")]),
        });
        let out = compile(vec![s(StmtKind::Expr(exec))], TargetShell::Posix);
        assert!(out.text.contains("'false' || exit \"$?\""), "{}", out.text);
    }

    #[test]
    fn empty_blocks_get_a_no_op() {
        let stmt = s(StmtKind::While { cond: e(ExprKind::Literal(Literal::Bool(false))), body: vec![] });
        let out = compile(vec![stmt], TargetShell::Posix);
        assert!(out.text.contains("while false; do\n  :\ndone"), "{}", out.text);
    }

    #[test]
    fn context_ids_are_unique() {
        let mut ctx = CodegenContext::default();
        assert_eq!(ctx.next_id(), 1);
        assert_eq!(ctx.next_id(), 2);
    }
}
