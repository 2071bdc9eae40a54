//! Struct flattening.
//!
//! A struct value lives in one shell variable per field, named
//! `<prefix>_<field>`, plus `<prefix>__type` naming its type. The prefix
//! variable itself holds the prefix, so `"$p"` is a reference that runtime
//! helpers can dereference. Nested non-nullable struct fields extend the
//! prefix; nullable ones hold a reference or the null sentinel.

use super::{Gen, Generator, Storage, internal, sh_single_quote, var_word};
use crate::ast::{Expr, ExprKind, FieldInit};
use crate::codegen::runtime::Helper;
use crate::names;
use crate::span::Span;

/// Where a struct value is written.
pub(super) enum Dest {
    /// Known prefix. `fresh` prefixes are new variables owned by the
    /// current function.
    Static { prefix: String, fresh: bool },
    /// A reference word only known at run time.
    Dynamic(String),
}

/// Where a struct value is read from.
pub(super) enum StructSrc {
    Static(String),
    Dynamic(String),
}

impl Generator {
    /// Prefix and type of an expression whose storage is known statically:
    /// a flattened binding or a non-nullable struct field of one.
    pub(super) fn static_path(&self, expr: &Expr) -> Option<(String, String)> {
        match &expr.node {
            ExprKind::Ident(name) => match self.binding(name)? {
                super::Binding { shell, storage: Storage::Struct(t) } => Some((shell, t)),
                _ => None,
            },
            ExprKind::Member { object, field } => {
                let (prefix, owner) = self.static_path(object)?;
                let field_ty = self.symbols.struct_info(&owner)?.field(field)?.clone();
                let nested = self.struct_of(&field_ty)?;
                Some((names::field(&prefix, field), nested))
            }
            _ => None,
        }
    }

    pub(super) fn struct_source(&mut self, expr: &Expr) -> Gen<StructSrc> {
        if let Some((prefix, _)) = self.static_path(expr) {
            return Ok(StructSrc::Static(prefix));
        }
        if let ExprKind::StructLiteral { name, fields } = &expr.node {
            let prefix = self.temp();
            let dest = Dest::Static { prefix: prefix.clone(), fresh: true };
            self.init_struct(&dest, name, fields, expr.span)?;
            return Ok(StructSrc::Static(prefix));
        }
        Ok(StructSrc::Dynamic(self.value(expr)?))
    }

    /// Writes `value` (a struct of type `type_name`) into `dest` by copy.
    pub(super) fn store_struct(&mut self, dest: &Dest, value: &Expr, type_name: &str) -> Gen<()> {
        match &value.node {
            ExprKind::StructLiteral { name, fields } => self.init_struct(dest, name, fields, value.span),
            _ => {
                let src = self.struct_source(value)?;
                self.copy_struct(dest, &src, type_name, value.span)
            }
        }
    }

    pub(super) fn init_struct(&mut self, dest: &Dest, type_name: &str, fields: &[FieldInit], span: Span) -> Gen<()> {
        let info = self
            .symbols
            .struct_info(type_name)
            .cloned()
            .ok_or_else(|| internal(format!("unresolved struct `{}`", type_name), span))?;
        for init in fields {
            let field_ty = info
                .field(&init.name)
                .cloned()
                .ok_or_else(|| internal(format!("unknown field `{}.{}`", type_name, init.name), init.span))?;
            match self.struct_of(&field_ty) {
                Some(nested) => {
                    let sub = self.dest_field(dest, &init.name);
                    self.store_struct(&sub, &init.value, &nested)?;
                }
                None => {
                    let w = self.value(&init.value)?;
                    self.write_field(dest, &init.name, &w);
                }
            }
        }
        self.finish_struct(dest, type_name);
        Ok(())
    }

    pub(super) fn copy_struct(&mut self, dest: &Dest, src: &StructSrc, type_name: &str, span: Span) -> Gen<()> {
        let info = self
            .symbols
            .struct_info(type_name)
            .cloned()
            .ok_or_else(|| internal(format!("unresolved struct `{}`", type_name), span))?;
        for (name, field_ty) in &info.fields {
            match self.struct_of(field_ty) {
                Some(nested) => {
                    let sub_dest = self.dest_field(dest, name);
                    let sub_src = self.src_field(src, name);
                    self.copy_struct(&sub_dest, &sub_src, &nested, span)?;
                }
                None => {
                    let w = match src {
                        StructSrc::Static(prefix) => var_word(&names::field(prefix, name)),
                        StructSrc::Dynamic(r) => self.field_get(r, name),
                    };
                    self.write_field(dest, name, &w);
                }
            }
        }
        self.finish_struct(dest, type_name);
        Ok(())
    }

    fn dest_field(&mut self, dest: &Dest, field: &str) -> Dest {
        match dest {
            Dest::Static { prefix, fresh } => Dest::Static { prefix: names::field(prefix, field), fresh: *fresh },
            Dest::Dynamic(r) => Dest::Dynamic(self.field_get(r, field)),
        }
    }

    fn src_field(&mut self, src: &StructSrc, field: &str) -> StructSrc {
        match src {
            StructSrc::Static(prefix) => StructSrc::Static(names::field(prefix, field)),
            StructSrc::Dynamic(r) => StructSrc::Dynamic(self.field_get(r, field)),
        }
    }

    fn write_field(&mut self, dest: &Dest, field: &str, word: &str) {
        match dest {
            Dest::Static { prefix, fresh } => {
                let var = names::field(prefix, field);
                if *fresh {
                    self.own(&var);
                }
                self.assign(&var, word);
            }
            Dest::Dynamic(r) => {
                let set = self.use_helper(Helper::FieldSet);
                self.line(format!("{} {} {} {}", set, r, field, word));
            }
        }
    }

    /// Type sentinel and self-reference; dynamic targets already carry both.
    fn finish_struct(&mut self, dest: &Dest, type_name: &str) {
        if let Dest::Static { prefix, fresh } = dest {
            let sentinel = names::type_sentinel(prefix);
            if *fresh {
                self.own(&sentinel);
                self.own(prefix);
            }
            self.assign(&sentinel, &sh_single_quote(type_name));
            self.assign(prefix, prefix);
        }
    }
}
