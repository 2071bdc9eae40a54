//! Registry of builtin functions and builtin methods.
//!
//! Both the resolver (for typing) and the generator (for lowering) consult the
//! tables here, so a builtin only exists once.

use crate::codegen::runtime::Helper;
use crate::types::Type;

/// Builtin free functions that user code may not redeclare.
pub const RESERVED_FUNCTIONS: &[&str] = &["print", "println", "readln", "panic"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_FUNCTIONS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunction {
    Print,
    Println,
    Readln,
    Panic,
    MapNew,
}

impl BuiltinFunction {
    pub fn lookup(name: &str) -> Option<BuiltinFunction> {
        Some(match name {
            "print" => BuiltinFunction::Print,
            "println" => BuiltinFunction::Println,
            "readln" => BuiltinFunction::Readln,
            "panic" => BuiltinFunction::Panic,
            "map_new" => BuiltinFunction::MapNew,
            _ => return None,
        })
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        RESERVED_FUNCTIONS.iter().copied().chain(std::iter::once("map_new"))
    }

    pub fn params(self) -> Vec<Type> {
        match self {
            BuiltinFunction::Print | BuiltinFunction::Println => vec![Type::ANY],
            BuiltinFunction::Panic => vec![Type::STRING],
            BuiltinFunction::Readln | BuiltinFunction::MapNew => vec![],
        }
    }

    pub fn return_type(self) -> Type {
        match self {
            BuiltinFunction::Print | BuiltinFunction::Println | BuiltinFunction::Panic => Type::VOID,
            BuiltinFunction::Readln => Type::STRING,
            BuiltinFunction::MapNew => Type::map(Type::ANY, Type::ANY),
        }
    }
}

/// Kinds of receivers that carry builtin methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverKind {
    Str,
    Array,
}

impl ReceiverKind {
    pub fn of(ty: &Type) -> Option<ReceiverKind> {
        match ty {
            t if t.is_string_like() => Some(ReceiverKind::Str),
            Type::Array(_) => Some(ReceiverKind::Array),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Bool,
    Char,
    Str,
    StrArray,
}

impl ValueKind {
    pub fn to_type(self) -> Type {
        match self {
            ValueKind::Int => Type::INT,
            ValueKind::Bool => Type::BOOL,
            ValueKind::Char => Type::CHAR,
            ValueKind::Str => Type::STRING,
            ValueKind::StrArray => Type::array(Type::STRING),
        }
    }
}

#[derive(Debug)]
pub struct BuiltinMethod {
    pub receiver: ReceiverKind,
    pub name: &'static str,
    pub params: &'static [ValueKind],
    pub ret: ValueKind,
    /// Runtime helper called as `helper <receiver> <args...>`.
    pub helper: Helper,
}

impl BuiltinMethod {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.to_type()).collect()
    }
}

const fn method(
    receiver: ReceiverKind,
    name: &'static str,
    params: &'static [ValueKind],
    ret: ValueKind,
    helper: Helper,
) -> BuiltinMethod {
    BuiltinMethod { receiver, name, params, ret, helper }
}

use ReceiverKind::{Array, Str};
use ValueKind as V;

pub static METHODS: &[BuiltinMethod] = &[
    method(Str, "len", &[], V::Int, Helper::StrLen),
    method(Str, "upper", &[], V::Str, Helper::StrUpper),
    method(Str, "lower", &[], V::Str, Helper::StrLower),
    method(Str, "trim", &[], V::Str, Helper::StrTrim),
    method(Str, "contains", &[V::Str], V::Bool, Helper::StrContains),
    method(Str, "starts_with", &[V::Str], V::Bool, Helper::StrStartsWith),
    method(Str, "ends_with", &[V::Str], V::Bool, Helper::StrEndsWith),
    method(Str, "replace", &[V::Str, V::Str], V::Str, Helper::StrReplace),
    method(Str, "split", &[V::Str], V::StrArray, Helper::StrSplit),
    method(Str, "char_at", &[V::Int], V::Char, Helper::CharAt),
    method(Array, "len", &[], V::Int, Helper::ArrayLen),
    method(Array, "join", &[V::Str], V::Str, Helper::ArrayJoin),
];

pub fn lookup_method(receiver: ReceiverKind, name: &str) -> Option<&'static BuiltinMethod> {
    METHODS.iter().find(|m| m.receiver == receiver && m.name == name)
}

pub fn method_names(receiver: ReceiverKind) -> impl Iterator<Item = &'static str> {
    METHODS.iter().filter(move |m| m.receiver == receiver).map(|m| m.name)
}
