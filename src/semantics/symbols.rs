//! Scoped symbol table for variables plus program-wide declaration maps.

use crate::ast::Receiver;
use crate::span::Span;
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSymbol {
    pub name: String,
    pub ty: Type,
    pub is_mutable: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub is_async: bool,
    pub is_public: bool,
    pub span: Span,
}

impl FunctionSig {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn as_type(&self) -> Type {
        Type::Function {
            params: self.param_types(),
            ret: Box::new(self.ret.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub owner: String,
    pub sig: FunctionSig,
    pub receiver: Option<Receiver>,
}

impl MethodSig {
    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }

    pub fn mutates_self(&self) -> bool {
        self.receiver.is_some_and(|r| r.mutable)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub span: Span,
}

impl StructInfo {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumInfo {
    pub name: String,
    pub variants: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDecl {
    Struct(StructInfo),
    Enum(EnumInfo),
}

impl TypeDecl {
    pub fn span(&self) -> Span {
        match self {
            TypeDecl::Struct(s) => s.span,
            TypeDecl::Enum(e) => e.span,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    vars: HashMap<String, VariableSymbol>,
}

/// Outcome of declaring a variable in the current scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Declared {
    Fresh,
    /// An enclosing scope already binds the name.
    Shadows(VariableSymbol),
    /// The current scope already binds the name; the new binding is rejected.
    Duplicate(VariableSymbol),
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    functions: HashMap<String, FunctionSig>,
    types: HashMap<String, TypeDecl>,
    methods: HashMap<String, Vec<MethodSig>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            functions: HashMap::new(),
            types: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pops the innermost scope. The global frame is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// 1 at module top level.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn declare(&mut self, symbol: VariableSymbol) -> Declared {
        let outer = self.lookup(&symbol.name).cloned();
        let Some(scope) = self.scopes.last_mut() else {
            return Declared::Fresh;
        };
        if let Some(existing) = scope.vars.get(&symbol.name) {
            return Declared::Duplicate(existing.clone());
        }
        scope.vars.insert(symbol.name.clone(), symbol);
        match outer {
            Some(prev) => Declared::Shadows(prev),
            None => Declared::Fresh,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&VariableSymbol> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name))
    }

    /// Names visible from the current scope, for suggestions.
    pub fn visible_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().flat_map(|s| s.vars.keys().map(String::as_str))
    }

    /// Registers a function; returns the earlier declaration on conflict.
    pub fn define_function(&mut self, sig: FunctionSig) -> Result<(), FunctionSig> {
        if let Some(existing) = self.functions.get(&sig.name) {
            return Err(existing.clone());
        }
        self.functions.insert(sig.name.clone(), sig);
        Ok(())
    }

    pub fn update_function(&mut self, sig: FunctionSig) {
        self.functions.insert(sig.name.clone(), sig);
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn define_type(&mut self, name: &str, decl: TypeDecl) -> Result<(), TypeDecl> {
        if let Some(existing) = self.types.get(name) {
            return Err(existing.clone());
        }
        self.types.insert(name.to_string(), decl);
        Ok(())
    }

    pub fn update_type(&mut self, name: &str, decl: TypeDecl) {
        self.types.insert(name.to_string(), decl);
    }

    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    pub fn struct_info(&self, name: &str) -> Option<&StructInfo> {
        match self.types.get(name) {
            Some(TypeDecl::Struct(s)) => Some(s),
            _ => None,
        }
    }

    pub fn enum_info(&self, name: &str) -> Option<&EnumInfo> {
        match self.types.get(name) {
            Some(TypeDecl::Enum(e)) => Some(e),
            _ => None,
        }
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn define_method(&mut self, method: MethodSig) -> Result<(), MethodSig> {
        let list = self.methods.entry(method.owner.clone()).or_default();
        if let Some(existing) = list.iter().find(|m| m.sig.name == method.sig.name) {
            return Err(existing.clone());
        }
        list.push(method);
        Ok(())
    }

    pub fn method(&self, owner: &str, name: &str) -> Option<&MethodSig> {
        self.methods.get(owner)?.iter().find(|m| m.sig.name == name)
    }

    pub fn method_names(&self, owner: &str) -> impl Iterator<Item = &str> {
        self.methods
            .get(owner)
            .into_iter()
            .flat_map(|list| list.iter().map(|m| m.sig.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: Type, is_mutable: bool) -> VariableSymbol {
        VariableSymbol { name: name.into(), ty, is_mutable, span: Span::new(1, 1) }
    }

    #[test]
    fn lookup_prefers_innermost_scope() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare(var("x", Type::INT, false)), Declared::Fresh);
        table.push_scope();
        assert!(matches!(table.declare(var("x", Type::STRING, true)), Declared::Shadows(_)));
        assert_eq!(table.lookup("x").map(|s| s.ty.clone()), Some(Type::STRING));
        table.pop_scope();
        assert_eq!(table.lookup("x").map(|s| s.ty.clone()), Some(Type::INT));
    }

    #[test]
    fn same_scope_redeclaration_is_duplicate() {
        let mut table = SymbolTable::new();
        table.declare(var("x", Type::INT, false));
        assert!(matches!(table.declare(var("x", Type::INT, false)), Declared::Duplicate(_)));
        assert_eq!(table.lookup("x").map(|s| s.is_mutable), Some(false));
    }

    #[test]
    fn global_frame_survives_extra_pops() {
        let mut table = SymbolTable::new();
        table.declare(var("g", Type::BOOL, false));
        table.pop_scope();
        table.pop_scope();
        assert_eq!(table.depth(), 1);
        assert!(table.lookup("g").is_some());
    }

    #[test]
    fn methods_are_registered_per_type() {
        let mut table = SymbolTable::new();
        let sig = FunctionSig {
            name: "area".into(),
            params: vec![],
            ret: Type::FLOAT,
            is_async: false,
            is_public: false,
            span: Span::new(2, 1),
        };
        let m = MethodSig { owner: "Circle".into(), sig, receiver: Some(Receiver { mutable: false }) };
        assert!(table.define_method(m.clone()).is_ok());
        assert!(table.define_method(m).is_err());
        assert!(table.method("Circle", "area").is_some());
        assert!(table.method("Square", "area").is_none());
    }
}
