pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod names;
pub mod optimizer;
pub mod semantics;
pub mod span;
pub mod suggest;
pub mod target;
pub mod types;
