//! Static type representations used by the analyzer and the generator.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    String,
    Bool,
    Char,
    Any,
    Void,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::String => "string",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::Any => "any",
            Primitive::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Primitive> {
        Some(match name {
            "int" => Primitive::Int,
            "float" => Primitive::Float,
            "string" => Primitive::String,
            "bool" => Primitive::Bool,
            "char" => Primitive::Char,
            "any" => Primitive::Any,
            "void" => Primitive::Void,
            _ => return None,
        })
    }
}

pub const COMMAND_TYPE: &str = "Command";
pub const PROCESS_TYPE: &str = "Process";

/// Closed set of types. `Nullable` never nests: build it through `Type::nullable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Nullable(Box<Type>),
    Tuple(Vec<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    Named(String),
    Unknown,
}

impl Type {
    pub const INT: Type = Type::Primitive(Primitive::Int);
    pub const FLOAT: Type = Type::Primitive(Primitive::Float);
    pub const STRING: Type = Type::Primitive(Primitive::String);
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    pub const CHAR: Type = Type::Primitive(Primitive::Char);
    pub const ANY: Type = Type::Primitive(Primitive::Any);
    pub const VOID: Type = Type::Primitive(Primitive::Void);

    pub fn nullable(inner: Type) -> Type {
        match inner {
            Type::Nullable(_) | Type::Unknown => inner,
            other => Type::Nullable(Box::new(other)),
        }
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn named(name: impl Into<String>) -> Type {
        Type::Named(name.into())
    }

    pub fn command() -> Type {
        Type::named(COMMAND_TYPE)
    }

    pub fn process() -> Type {
        Type::named(PROCESS_TYPE)
    }

    /// Type of the `null` literal before it meets a context.
    pub fn null() -> Type {
        Type::nullable(Type::ANY)
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// Strips one `Nullable` layer, if present.
    pub fn non_null(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Any))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Int | Primitive::Float))
    }

    /// String or char: the operands `+` concatenates.
    pub fn is_string_like(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::String | Primitive::Char))
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Type::Named(n) if n == COMMAND_TYPE)
    }

    pub fn is_process(&self) -> bool {
        matches!(self, Type::Named(n) if n == PROCESS_TYPE)
    }

    /// Suppresses follow-up diagnostics on operands already reported.
    pub fn is_permissive(&self) -> bool {
        self.is_unknown() || self.is_any()
    }

    pub fn named_name(&self) -> Option<&str> {
        match self {
            Type::Named(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Array(elem) => match elem.as_ref() {
                Type::Nullable(_) | Type::Function { .. } => write!(f, "({})[]", elem),
                _ => write!(f, "{}[]", elem),
            },
            Type::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            Type::Nullable(inner) => match inner.as_ref() {
                Type::Function { .. } => write!(f, "({})?", inner),
                _ => write!(f, "{}?", inner),
            },
            Type::Tuple(items) => {
                f.write_str("(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                f.write_str(")")
            }
            Type::Function { params, ret } => {
                f.write_str("fn(")?;
                for (i, t) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Named(name) => f.write_str(name),
            Type::Unknown => f.write_str("<unknown>"),
        }
    }
}
