//! Expression lowering: every expression becomes one shell word, with any
//! setup it needs emitted as lines ahead of the use site.

use super::structs::Dest;
use super::{Gen, Generator, internal, sh_single_quote, var_word};
use crate::ast::{BinaryOp, CommandArgs, CommandKind, Expr, ExprKind, Literal, TypeExpr, UnaryOp, float_text};
use crate::builtins::{self, BuiltinFunction, ReceiverKind};
use crate::codegen::runtime::Helper;
use crate::names;
use crate::semantics::pipes;
use crate::span::Span;
use crate::types::Type;

/// Wraps a compound condition so it can be negated or chained.
fn group(cond: &str) -> String {
    if cond.contains("&&") || cond.contains("||") {
        format!("{{ {}; }}", cond)
    } else {
        cond.to_string()
    }
}

pub(super) fn negate(cond: &str) -> String {
    match cond {
        "true" => "false".to_string(),
        "false" => "true".to_string(),
        _ => match cond.strip_prefix("! ") {
            Some(inner) if !inner.contains("&&") && !inner.contains("||") => inner.to_string(),
            _ => format!("! {}", group(cond)),
        },
    }
}

/// `"$name"` loses its quotes inside `$(( ))`; anything else needs a temp.
fn simple_var(word: &str) -> Option<&str> {
    let inner = word.strip_prefix("\"$")?.strip_suffix('"')?;
    let ok = !inner.is_empty() && inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    ok.then_some(inner)
}

fn or_empty(word: Option<String>) -> String {
    word.unwrap_or_else(|| "''".to_string())
}

impl Generator {
    pub(super) fn value(&mut self, expr: &Expr) -> Gen<String> {
        let span = expr.span;
        match &expr.node {
            ExprKind::Literal(lit) => Ok(self.literal(lit)),
            ExprKind::Ident(name) => match self.binding(name) {
                Some(b) => Ok(var_word(&b.shell)),
                None if self.symbols.function(name).is_some() => Ok(self.unsupported("function value", span)),
                None => Err(internal(format!("unresolved name `{}`", name), span)),
            },
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, expr),
            ExprKind::Unary { op: UnaryOp::Neg, operand } => {
                if self.type_of(operand) == Type::FLOAT {
                    let w = self.value(operand)?;
                    Ok(self.float_math("0", BinaryOp::Sub, &w))
                } else {
                    Ok(format!("\"$(( {} ))\"", self.arith(expr)?))
                }
            }
            ExprKind::Unary { op: UnaryOp::Not, .. } => self.bool_value(expr),
            ExprKind::Call { callee, args } => self.call(callee, args, span, None, false).map(or_empty),
            ExprKind::MethodCall { receiver, method, args } => {
                self.method_call(receiver, method, args, span, false).map(or_empty)
            }
            ExprKind::StaticCall { type_name, method, args } => {
                self.static_call(type_name, method, args, span, None, false).map(or_empty)
            }
            ExprKind::Member { object, field } => self.member(object, field, false),
            ExprKind::SafeMember { object, field } => self.member(object, field, true),
            ExprKind::Index { object, index } => self.index(object, index, span),
            ExprKind::StructLiteral { name, fields } => {
                let prefix = self.temp();
                let dest = Dest::Static { prefix: prefix.clone(), fresh: true };
                self.init_struct(&dest, name, fields, span)?;
                Ok(var_word(&prefix))
            }
            ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => self.sequence(expr, items),
            ExprKind::EnumVariant { variant, .. } => Ok(sh_single_quote(variant)),
            ExprKind::MapLiteral(_) => Ok(self.unsupported("map literal", span)),
            ExprKind::Range { .. } => Ok(self.unsupported("range expression", span)),
            ExprKind::RawShell(_) => Ok(self.unsupported("raw shell expression", span)),
            ExprKind::Pipe { left, right } => self.pipe(left, right),
            ExprKind::NullCoalesce { left, right } => self.coalesce(left, right),
            ExprKind::Cast { expr: inner, ty } => self.cast(inner, ty),
            ExprKind::Command { kind, is_async, args } => self.command(*kind, *is_async, args),
            ExprKind::Await(inner) => {
                let w = self.value(inner)?;
                let await_fn = self.use_helper(Helper::Await);
                self.line(format!("{} {}", await_fn, w));
                Ok(self.hoist("\"$__rt_ret\""))
            }
        }
    }

    fn literal(&mut self, lit: &Literal) -> String {
        match lit {
            Literal::Int(v) => v.to_string(),
            Literal::Float(v) => float_text(*v),
            Literal::Str(s) => self.string_word(s),
            Literal::Char(c) => self.string_word(&c.to_string()),
            Literal::Bool(b) => b.to_string(),
            Literal::Null => self.null_word(),
        }
    }

    /// Quoted text. Line breaks are spliced in from variables so no emitted
    /// line ever continues a quoted string.
    fn string_word(&mut self, s: &str) -> String {
        if !s.contains(['\n', '\r']) {
            return sh_single_quote(s);
        }
        self.use_helper(Helper::Eol);
        let mut word = String::new();
        let mut chunk = String::new();
        for c in s.chars() {
            let var = match c {
                '\n' => "\"$__RT_NL\"",
                '\r' => "\"$__RT_CR\"",
                _ => {
                    chunk.push(c);
                    continue;
                }
            };
            if !chunk.is_empty() {
                word.push_str(&sh_single_quote(&chunk));
                chunk.clear();
            }
            word.push_str(var);
        }
        if !chunk.is_empty() {
            word.push_str(&sh_single_quote(&chunk));
        }
        word
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, whole: &Expr) -> Gen<String> {
        if !op.is_arithmetic() {
            return self.bool_value(whole);
        }
        let ty = self.type_of(whole);
        if ty == Type::INT {
            return Ok(format!("\"$(( {} ))\"", self.arith(whole)?));
        }
        let l = self.value(left)?;
        let r = self.value(right)?;
        if ty == Type::FLOAT {
            return Ok(self.float_math(&l, op, &r));
        }
        // string + string
        Ok(format!("{}{}", l, r))
    }

    fn float_math(&mut self, l: &str, op: BinaryOp, r: &str) -> String {
        let fmath = self.use_helper(Helper::FloatMath);
        format!("\"$({} {} '{}' {})\"", fmath, l, op.symbol(), r)
    }

    /// Integer expression text for use inside `$(( ))`.
    fn arith(&mut self, expr: &Expr) -> Gen<String> {
        match &expr.node {
            ExprKind::Literal(Literal::Int(v)) if *v < 0 => Ok(format!("({})", v)),
            ExprKind::Literal(Literal::Int(v)) => Ok(v.to_string()),
            ExprKind::Binary { op, left, right } if op.is_arithmetic() => {
                let l = self.arith(left)?;
                let r = self.arith(right)?;
                Ok(format!("({} {} {})", l, op.symbol(), r))
            }
            ExprKind::Unary { op: UnaryOp::Neg, operand } => Ok(format!("(0 - {})", self.arith(operand)?)),
            _ => {
                let w = self.value(expr)?;
                if let Some(name) = simple_var(&w) {
                    return Ok(format!("${}", name));
                }
                if w.parse::<i64>().is_ok() {
                    return Ok(w);
                }
                let t = self.temp();
                self.assign(&t, &w);
                Ok(format!("${}", t))
            }
        }
    }

    /// Condition text usable after `if`/`while`.
    pub(super) fn cond(&mut self, expr: &Expr) -> Gen<String> {
        match &expr.node {
            ExprKind::Literal(Literal::Bool(b)) => Ok(b.to_string()),
            ExprKind::Unary { op: UnaryOp::Not, operand } => Ok(negate(&self.cond(operand)?)),
            ExprKind::Binary { op: op @ (BinaryOp::And | BinaryOp::Or), left, right } => {
                self.logical(*op, left, right)
            }
            ExprKind::Binary { op, left, right } if !op.is_arithmetic() => self.compare(*op, left, right, expr.span),
            _ => {
                let w = self.value(expr)?;
                Ok(format!("[ {} = true ]", w))
            }
        }
    }

    fn compare(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> Gen<String> {
        let lt = self.type_of(left);
        let rt = self.type_of(right);
        if self.struct_of(&lt).is_some() && self.struct_of(&rt).is_some() {
            self.unsupported("struct equality", span);
            return Ok("false".to_string());
        }
        let l = self.value(left)?;
        let r = self.value(right)?;
        let ints = lt == Type::INT && rt == Type::INT;
        let numeric = lt.is_numeric() && rt.is_numeric();
        if ints {
            let flag = match op {
                BinaryOp::Eq => "-eq",
                BinaryOp::Ne => "-ne",
                BinaryOp::Lt => "-lt",
                BinaryOp::Le => "-le",
                BinaryOp::Gt => "-gt",
                _ => "-ge",
            };
            return Ok(format!("[ {} {} {} ]", l, flag, r));
        }
        if numeric {
            let fcmp = self.use_helper(Helper::FloatCmp);
            return Ok(format!("{} {} '{}' {}", fcmp, l, op.symbol(), r));
        }
        match op {
            BinaryOp::Eq => Ok(format!("[ {} = {} ]", l, r)),
            BinaryOp::Ne => Ok(format!("[ {} != {} ]", l, r)),
            _ => {
                let strcmp = self.use_helper(Helper::StrCmp);
                Ok(format!("{} {} '{}' {}", strcmp, l, op.symbol(), r))
            }
        }
    }

    fn logical(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Gen<String> {
        let l = self.cond(left)?;
        let (setup, r) = self.capture(|g| g.nested(|g| g.cond(right)));
        let r = r?;
        let is_and = op == BinaryOp::And;
        if setup.is_empty() {
            let joiner = if is_and { "&&" } else { "||" };
            return Ok(format!("{} {} {}", group(&l), joiner, group(&r)));
        }
        // The right operand may only run when the left one did not decide.
        let t = self.temp();
        let (initial, gate, flip, flipped) = if is_and {
            ("false", l, r, "true")
        } else {
            ("true", negate(&l), negate(&r), "false")
        };
        self.assign(&t, initial);
        self.line(format!("if {}; then", gate));
        self.out.extend(setup);
        self.nested(|g| {
            g.line(format!("if {}; then {}={}; fi", flip, t, flipped));
            Ok(())
        })?;
        self.line("fi");
        Ok(format!("[ \"${}\" = true ]", t))
    }

    /// `true`/`false` word for a condition.
    fn bool_value(&mut self, expr: &Expr) -> Gen<String> {
        let c = self.cond(expr)?;
        if c == "true" || c == "false" {
            return Ok(c);
        }
        let t = self.temp();
        self.line(format!("if {c}; then {t}=true; else {t}=false; fi", c = c, t = t));
        Ok(var_word(&t))
    }

    fn member(&mut self, object: &Expr, field: &str, safe: bool) -> Gen<String> {
        let chained = safe || object.has_safe_link();
        if !chained {
            if let Some((prefix, _)) = self.static_path(object) {
                return Ok(var_word(&names::field(&prefix, field)));
            }
        }
        let r = self.value(object)?;
        if chained {
            let safe_get = self.use_helper(Helper::SafeField);
            return Ok(format!("\"$({} {} {})\"", safe_get, r, field));
        }
        Ok(self.field_get(&r, field))
    }

    fn index(&mut self, object: &Expr, index: &Expr, span: Span) -> Gen<String> {
        let ty = self.type_of(object);
        let helper = match ty.non_null() {
            Type::Array(_) | Type::Tuple(_) => Helper::ArrayGet,
            Type::Map(..) => Helper::MapGet,
            t if t.is_string_like() => Helper::CharAt,
            _ => return Ok(self.unsupported("index on a dynamic value", span)),
        };
        let o = self.value(object)?;
        let i = self.value(index)?;
        let get = self.use_helper(helper);
        Ok(format!("\"$({} {} {})\"", get, o, i))
    }

    fn sequence(&mut self, whole: &Expr, items: &[Expr]) -> Gen<String> {
        let ty = self.type_of(whole);
        if let Some(feature) = self.container_of_structs(&ty) {
            return Ok(self.unsupported(feature, whole.span));
        }
        if items.is_empty() {
            return Ok("''".to_string());
        }
        let mut words = Vec::with_capacity(items.len());
        for item in items {
            words.push(self.value(item)?);
        }
        let array = self.use_helper(Helper::ArrayNew);
        Ok(format!("\"$({} {})\"", array, words.join(" ")))
    }

    fn pipe(&mut self, left: &Expr, right: &Expr) -> Gen<String> {
        let left_ty = self.type_of(left);
        if pipes::is_stage(right) && !left_ty.is_command() {
            let piped = self.value(left)?;
            return match &right.node {
                ExprKind::Call { callee, args } => self.call(callee, args, right.span, Some(piped), false).map(or_empty),
                ExprKind::StaticCall { type_name, method, args } => self
                    .static_call(type_name, method, args, right.span, Some(piped), false)
                    .map(or_empty),
                _ => Err(internal("pipe stage is not a call", right.span)),
            };
        }
        let l = self.value(left)?;
        let r = self.value(right)?;
        Ok(format!("{}' | '{}", l, r))
    }

    fn coalesce(&mut self, left: &Expr, right: &Expr) -> Gen<String> {
        let l = self.value(left)?;
        let (setup, r) = self.capture(|g| g.nested(|g| g.value(right)));
        let r = r?;
        if setup.is_empty() {
            let coalesce = self.use_helper(Helper::Coalesce);
            return Ok(format!("\"$({} {} {})\"", coalesce, l, r));
        }
        // The fallback has side effects: evaluate it only on null.
        let t = self.temp();
        self.assign(&t, &l);
        let null = self.null_word();
        self.line(format!("if [ \"${}\" = {} ]; then", t, null));
        self.out.extend(setup);
        self.nested(|g| {
            g.assign(&t, &r);
            Ok(())
        })?;
        self.line("fi");
        Ok(var_word(&t))
    }

    fn cast(&mut self, inner: &Expr, ty: &TypeExpr) -> Gen<String> {
        let from = self.type_of(inner);
        let to = self.lower_type(ty);
        let w = self.value(inner)?;
        if from == Type::FLOAT && to == Type::INT {
            let ftoi = self.use_helper(Helper::FloatToInt);
            return Ok(format!("\"$({} {})\"", ftoi, w));
        }
        Ok(w)
    }

    // ---- process interaction ----

    fn words(&mut self, list: &[Expr]) -> Gen<Vec<String>> {
        list.iter().map(|a| self.value(a)).collect()
    }

    /// Shell text that runs the command. Command values and raw text go
    /// through `eval`; argv words run directly.
    pub(super) fn runnable(&mut self, args: &CommandArgs) -> Gen<String> {
        match args {
            CommandArgs::Raw(text) => Ok(format!("eval {}", self.value(text)?)),
            CommandArgs::Argv(list) => {
                if let [single] = list.as_slice() {
                    if self.type_of(single).is_command() {
                        return Ok(format!("eval {}", self.value(single)?));
                    }
                }
                Ok(self.words(list)?.join(" "))
            }
        }
    }

    /// A word holding the command line as quoted shell text.
    fn command_text(&mut self, args: &CommandArgs) -> Gen<String> {
        match args {
            CommandArgs::Raw(text) => self.value(text),
            CommandArgs::Argv(list) => {
                if let [single] = list.as_slice() {
                    if self.type_of(single).is_command() {
                        return self.value(single);
                    }
                }
                let words = self.words(list)?;
                let cmd = self.use_helper(Helper::Cmd);
                self.line(format!("{} {}", cmd, words.join(" ")));
                Ok("\"$__rt_ret\"".to_string())
            }
        }
    }

    fn command(&mut self, kind: CommandKind, is_async: bool, args: &CommandArgs) -> Gen<String> {
        match kind {
            CommandKind::Cmd => {
                let text = self.command_text(args)?;
                Ok(self.hoist(&text))
            }
            CommandKind::Exec if is_async => {
                let run = self.runnable(args)?;
                self.line(format!("{} >/dev/null &", run));
                Ok("''".to_string())
            }
            CommandKind::Exec => {
                let run = self.runnable(args)?;
                let t = self.temp();
                self.line(format!("{}=\"$({})\" || exit \"$?\"", t, run));
                Ok(var_word(&t))
            }
            CommandKind::Spawn => {
                let text = self.command_text(args)?;
                let spawn = self.use_helper(Helper::Spawn);
                self.line(format!("{} {}", spawn, text));
                Ok(self.hoist("\"$__rt_ret\""))
            }
        }
    }

    // ---- calls ----

    /// Free function call. `piped` is the left side of a value pipe and
    /// becomes the first argument. Returns the result word unless discarded.
    pub(super) fn call(
        &mut self,
        callee: &str,
        args: &[Expr],
        span: Span,
        piped: Option<String>,
        discard: bool,
    ) -> Gen<Option<String>> {
        if self.binding(callee).is_some() {
            return Ok(Some(self.unsupported("function value", span)));
        }
        let mut words: Vec<String> = piped.into_iter().collect();
        words.extend(self.words(args)?);
        if let Some(sig) = self.symbols.function(callee) {
            let ret = sig.ret.clone();
            let shell = names::function(callee);
            self.line(call_line(&shell, &words));
            return self.call_result(&shell, &ret, discard, span);
        }
        match BuiltinFunction::lookup(callee) {
            Some(builtin) => Ok(self.builtin_call(builtin, &words, discard)),
            None => Err(internal(format!("unresolved function `{}`", callee), span)),
        }
    }

    fn builtin_call(&mut self, builtin: BuiltinFunction, words: &[String], discard: bool) -> Option<String> {
        let arg = words.first().cloned().unwrap_or_else(|| "''".to_string());
        match builtin {
            BuiltinFunction::Print => {
                self.line(format!("printf '%s' {}", arg));
                None
            }
            BuiltinFunction::Println => {
                self.line(format!("printf '%s\\n' {}", arg));
                None
            }
            BuiltinFunction::Panic => {
                self.line(format!("printf '%s\\n' {} >&2", arg));
                self.line("exit 1");
                None
            }
            BuiltinFunction::Readln => {
                let t = self.temp();
                self.line(format!("IFS= read -r {} || true", t));
                (!discard).then(|| var_word(&t))
            }
            BuiltinFunction::MapNew => {
                let map_new = self.use_helper(Helper::MapNew);
                self.line(map_new);
                (!discard).then(|| self.hoist("\"$__rt_ret\""))
            }
        }
    }

    /// Picks up a user function's result from `__rt_ret` (or its struct slot).
    fn call_result(&mut self, shell_fn: &str, ret: &Type, discard: bool, span: Span) -> Gen<Option<String>> {
        if discard || ret.is_void() {
            return Ok(None);
        }
        if let Some(t) = self.struct_of(ret) {
            // Copy out at once: a later call to the same function reuses the slot.
            let prefix = self.temp();
            let dest = Dest::Static { prefix: prefix.clone(), fresh: true };
            let src = super::StructSrc::Static(names::return_slot(shell_fn));
            self.copy_struct(&dest, &src, &t, span)?;
            return Ok(Some(var_word(&prefix)));
        }
        Ok(Some(self.hoist("\"$__rt_ret\"")))
    }

    pub(super) fn method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        span: Span,
        discard: bool,
    ) -> Gen<Option<String>> {
        let recv_ty = self.type_of(receiver);
        let base = recv_ty.non_null().clone();
        if let Some(kind) = ReceiverKind::of(&base) {
            let builtin = builtins::lookup_method(kind, method)
                .ok_or_else(|| internal(format!("unresolved method `{}`", method), span))?;
            let mut parts = vec![self.use_helper(builtin.helper).to_string(), self.value(receiver)?];
            parts.extend(self.words(args)?);
            return Ok(Some(format!("\"$({})\"", parts.join(" "))));
        }

        let r = self.value(receiver)?;
        let mut words = vec![r];
        words.extend(self.words(args)?);
        if base.is_permissive() {
            // The receiver's type is only known at run time.
            let dispatch = self.use_helper(Helper::Dispatch);
            words.insert(1, method.to_string());
            self.line(call_line(dispatch, &words));
            return Ok((!discard).then(|| self.hoist("\"$__rt_ret\"")));
        }
        let owner = base
            .named_name()
            .ok_or_else(|| internal(format!("method `{}` on `{}`", method, base), span))?
            .to_string();
        let ret = self
            .symbols
            .method(&owner, method)
            .map(|m| m.sig.ret.clone())
            .ok_or_else(|| internal(format!("unresolved method `{}::{}`", owner, method), span))?;
        let shell = names::method(&owner, method);
        self.line(call_line(&shell, &words));
        self.call_result(&shell, &ret, discard, span)
    }

    pub(super) fn static_call(
        &mut self,
        type_name: &str,
        method: &str,
        args: &[Expr],
        span: Span,
        piped: Option<String>,
        discard: bool,
    ) -> Gen<Option<String>> {
        let ret = self
            .symbols
            .method(type_name, method)
            .map(|m| m.sig.ret.clone())
            .ok_or_else(|| internal(format!("unresolved method `{}::{}`", type_name, method), span))?;
        let mut words: Vec<String> = piped.into_iter().collect();
        words.extend(self.words(args)?);
        let shell = names::method(type_name, method);
        self.line(call_line(&shell, &words));
        self.call_result(&shell, &ret, discard, span)
    }
}

fn call_line(function: &str, words: &[String]) -> String {
    if words.is_empty() {
        function.to_string()
    } else {
        format!("{} {}", function, words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_avoids_double_bang() {
        assert_eq!(negate("[ \"$x\" -lt 3 ]"), "! [ \"$x\" -lt 3 ]");
        assert_eq!(negate("! [ \"$x\" -lt 3 ]"), "[ \"$x\" -lt 3 ]");
        assert_eq!(negate("a && b"), "! { a && b; }");
        assert_eq!(negate("true"), "false");
    }

    #[test]
    fn only_plain_variables_unquote_in_arithmetic() {
        assert_eq!(simple_var("\"$count\""), Some("count"));
        assert_eq!(simple_var("\"$(f)\""), None);
        assert_eq!(simple_var("'3'"), None);
    }
}
