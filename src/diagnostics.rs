//! User-facing diagnostics and the bag that collects them across passes.

use crate::span::Span;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Type,
    Symbol,
    Mutability,
    Function,
    ControlFlow,
    Nullability,
    Struct,
    Readiness,
}

impl Category {
    fn prefix(self) -> &'static str {
        match self {
            Category::Type => "TYP",
            Category::Symbol => "SYM",
            Category::Mutability => "MUT",
            Category::Function => "FUN",
            Category::ControlFlow => "CTL",
            Category::Nullability => "NUL",
            Category::Struct => "STR",
            Category::Readiness => "RDY",
        }
    }
}

macro_rules! diagnostic_codes {
    ($($cat:ident { $($code:ident = $num:literal),* $(,)? })*) => {
        /// Stable diagnostic identifiers. Numbers never change once assigned.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DiagnosticCode {
            $($($code,)*)*
        }

        impl DiagnosticCode {
            pub fn category(self) -> Category {
                match self {
                    $($(DiagnosticCode::$code => Category::$cat,)*)*
                }
            }

            fn number(self) -> u16 {
                match self {
                    $($(DiagnosticCode::$code => $num,)*)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($(DiagnosticCode::$code => stringify!($code),)*)*
                }
            }
        }
    };
}

diagnostic_codes! {
    Type {
        TypeMismatch = 1,
        UndefinedType = 2,
        InvalidOperandType = 3,
        InvalidArgumentType = 4,
        InvalidReturnType = 5,
        CannotInferType = 6,
        InvalidCast = 7,
        InvalidPipeOperand = 8,
    }
    Symbol {
        UndefinedVariable = 1,
        UndefinedFunction = 2,
        UndefinedMethod = 3,
        UndefinedField = 4,
        UndefinedVariant = 5,
        DuplicateDeclaration = 6,
        DuplicateParameter = 7,
        DuplicateField = 8,
        DuplicateVariant = 9,
        DuplicateMethod = 10,
        ReservedName = 11,
        ShadowedVariable = 12,
        EmptyImport = 13,
    }
    Mutability {
        AssignToImmutable = 1,
        InvalidAssignmentTarget = 2,
    }
    Function {
        ArgumentCountMismatch = 1,
        InvalidMainSignature = 2,
        SelfOutsideMethod = 3,
        InvalidMethodCall = 4,
        InvalidPipeStage = 5,
        PipeTypeNotPreserved = 6,
        InvalidVisibility = 7,
    }
    ControlFlow {
        BreakOutsideLoop = 1,
        ContinueOutsideLoop = 2,
        ReturnOutsideFunction = 3,
        InvalidConditionType = 4,
    }
    Nullability {
        PossibleNullReference = 1,
        NullAssignToNonNullable = 2,
        RedundantNullCoalesce = 3,
        RedundantSafeNavigation = 4,
    }
    Struct {
        MissingField = 1,
        UnknownField = 2,
    }
    Readiness {
        UnsupportedFeature = 1,
    }
}

impl DiagnosticCode {
    /// Short identifier such as `TYP001`.
    pub fn id(self) -> String {
        format!("{}{:03}", self.category().prefix(), self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, span)
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attaches a "did you mean" hint when one is available.
    pub fn with_suggestion(self, suggestion: Option<String>) -> Self {
        match suggestion {
            Some(s) => self.with_help(format!("did you mean `{}`?", s)),
            None => self,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders `file:line:col: error[TYP001]: message` plus an optional help line.
    pub fn format(&self, file: Option<&str>) -> String {
        let loc = match file {
            Some(file) => format!("{}:{}", file, self.span),
            None => self.span.to_string(),
        };
        let main = format!(
            "{}: {}[{}]: {}",
            loc,
            self.severity.label(),
            self.code.id(),
            self.message
        );
        match &self.help {
            Some(help) => format!("{}\nhelp: {}", main, help),
            None => main,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(None))
    }
}

/// Accumulates diagnostics from every pass, kept sorted by source position.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        let at = self.items.partition_point(|d| d.span <= diag.span);
        self.items.insert(at, diag);
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diags);
        self.items.sort_by_key(|d| d.span);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn render(&self, file: Option<&str>) -> String {
        self.items
            .iter()
            .map(|d| d.format(file))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a DiagnosticBag {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DiagnosticCode::*;

    #[test]
    fn ids_are_grouped_by_category() {
        assert_eq!(TypeMismatch.id(), "TYP001");
        assert_eq!(AssignToImmutable.id(), "MUT001");
        assert_eq!(RedundantNullCoalesce.id(), "NUL003");
        assert_eq!(UnsupportedFeature.id(), "RDY001");
        assert_eq!(EmptyImport.category(), Category::Symbol);
    }

    #[test]
    fn bag_keeps_position_order_and_is_stable_on_ties() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::error(TypeMismatch, "third", Span::new(5, 1)));
        bag.push(Diagnostic::warning(ShadowedVariable, "first", Span::new(1, 4)));
        bag.extend(vec![
            Diagnostic::error(UndefinedVariable, "second", Span::new(2, 2)),
            Diagnostic::error(UndefinedFunction, "fourth", Span::new(5, 1)),
        ]);
        let order: Vec<_> = bag.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, ["first", "second", "third", "fourth"]);
    }

    #[test]
    fn warnings_do_not_gate() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::warning(RedundantNullCoalesce, "redundant", Span::new(1, 1)));
        assert!(!bag.has_errors());
        bag.push(Diagnostic::error(TypeMismatch, "boom", Span::new(1, 1)));
        assert!(bag.has_errors());
        assert_eq!(bag.errors().count(), 1);
        assert_eq!(bag.warnings().count(), 1);
    }

    #[test]
    fn format_includes_code_and_help() {
        let d = Diagnostic::error(UndefinedVariable, "undefined variable `cont`", Span::new(3, 9))
            .with_suggestion(Some("count".into()));
        assert_eq!(
            d.format(Some("main.tsh")),
            "main.tsh:3:9: error[SYM001]: undefined variable `cont`\nhelp: did you mean `count`?"
        );
    }
}
