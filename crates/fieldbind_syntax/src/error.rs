//! Syntax diagnostics.

use crate::span::Span;
use miette::Diagnostic;
use thiserror::Error;

/// A syntax error found while parsing operation text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(fieldbind::syntax))]
pub struct SyntaxError {
    /// Human-readable description.
    pub message: String,
    /// Location of the offending token.
    #[label("here")]
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Formats the error with its line and column in `source`.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line, column) = self.span.line_col(source);
        format!("{} at {}:{}", self.message, line, column)
    }
}
