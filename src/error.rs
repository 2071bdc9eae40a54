use crate::span::Span;
use thiserror::Error;

/// Failures that abort a compile outright. User mistakes are reported as
/// diagnostics instead; these signal broken internal invariants.
#[derive(Debug, Clone, Error)]
#[error("compile error: {message}{}", location_suffix(.location))]
pub struct CompileError {
    pub message: String,
    pub location: Option<Span>,
}

fn location_suffix(location: &Option<Span>) -> String {
    match location {
        Some(span) => format!(" at {}", span),
        None => String::new(),
    }
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, span: Span) -> Self {
        self.location = Some(span);
        self
    }
}
