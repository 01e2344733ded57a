use std::fmt;

pub use quire_types::Span;

/// Errors raised while compiling or evaluating an expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("Lexer error at {span:?}: {message}")]
    Lex { span: Span, message: String },

    #[error("Parser error at {span:?}: {message}")]
    Parse { span: Span, message: String },

    #[error("name '{name}' is not defined")]
    Unbound { name: String },

    #[error("Type error: {message}")]
    Type { message: String },

    #[error("{name}() takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Index error: {message}")]
    Index { message: String },

    #[error("division by zero")]
    ZeroDivision,

    #[error("{name}(): {message}")]
    Call { name: String, message: String },
}

impl ExprError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        ExprError::Type {
            message: message.into(),
        }
    }

    pub(crate) fn call(name: &str, message: impl Into<String>) -> Self {
        ExprError::Call {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Span of the error in the source, for compile-time errors
    pub fn span(&self) -> Option<Span> {
        match self {
            ExprError::Lex { span, .. } | ExprError::Parse { span, .. } => Some(*span),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExprError>;

/// Renders a compile error with a caret under the offending span
pub struct ErrorContext<'a> {
    pub source: &'a str,
    pub error: &'a ExprError,
}

impl<'a> ErrorContext<'a> {
    pub fn new(source: &'a str, error: &'a ExprError) -> Self {
        Self { source, error }
    }
}

impl fmt::Display for ErrorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;
        if let Some(span) = self.error.span() {
            writeln!(f, "  {}", self.source)?;
            let start = span.start.min(self.source.len());
            let width = span.len().max(1);
            writeln!(f, "  {}{}", " ".repeat(start), "^".repeat(width))?;
        }
        Ok(())
    }
}
