use thiserror::Error;

use crate::diagnostic::{Diagnostic, Label, Span};
use super::parser::ParseError;
use crate::io::IoError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpreterError {
    #[error("Undefined variable '{name}'")]
    NameError { name: String, span: Span },

    #[error("Access to deleted variable '{name}'")]
    DeletedAccess { name: String, span: Span },

    /// `context` names the operation (`'+' operation`, `'while' condition`),
    /// `detail` the offending operand types.
    #[error("Type mismatch in {context}: {detail}")]
    TypeMismatch {
        context: String,
        detail: String,
        span: Span,
    },

    #[error("Division by zero")]
    DivisionByZero { span: Span },

    #[error("'{name}' expects {expected} argument(s) but got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("Value of type {type_name} is not callable")]
    NotCallable { type_name: String, span: Span },

    #[error("'{type_name}' has no field '{field}'")]
    FieldNotFound {
        type_name: String,
        field: String,
        span: Span,
    },

    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize, span: Span },

    #[error("Input exhausted: no more lines to read")]
    InputExhausted { span: Span },

    #[error("Arithmetic error: {message}")]
    Arithmetic { message: String, span: Span },

    #[error("Maximum recursion depth exceeded ({limit})")]
    RecursionLimit { limit: usize, span: Span },

    #[error("I/O error: {message}")]
    Io { message: String, span: Span },
}

impl InterpreterError {
    // Span-less constructors; the evaluator attaches a location with `at`.
    pub fn name_error(name: impl Into<String>) -> Self {
        Self::NameError {
            name: name.into(),
            span: Span::dummy(),
        }
    }

    pub fn deleted_access(name: impl Into<String>) -> Self {
        Self::DeletedAccess {
            name: name.into(),
            span: Span::dummy(),
        }
    }

    // With span constructors
    pub fn type_mismatch_at(context: impl Into<String>, detail: impl Into<String>, span: Span) -> Self {
        Self::TypeMismatch {
            context: context.into(),
            detail: detail.into(),
            span,
        }
    }

    /// Mismatch for a binary operator: "Type mismatch in '+' operation: String and Int".
    pub fn operand_mismatch_at(op: &str, left: &str, right: &str, span: Span) -> Self {
        Self::type_mismatch_at(format!("'{}' operation", op), format!("{} and {}", left, right), span)
    }

    /// A condition or operand that must be Bool.
    pub fn expected_bool_at(context: impl Into<String>, found: &str, span: Span) -> Self {
        Self::type_mismatch_at(context, format!("expected Bool, found {}", found), span)
    }

    pub fn division_by_zero_at(span: Span) -> Self {
        Self::DivisionByZero { span }
    }

    pub fn arity_at(name: impl Into<String>, expected: usize, found: usize, span: Span) -> Self {
        Self::Arity {
            name: name.into(),
            expected,
            found,
            span,
        }
    }

    pub fn not_callable_at(type_name: impl Into<String>, span: Span) -> Self {
        Self::NotCallable {
            type_name: type_name.into(),
            span,
        }
    }

    pub fn field_not_found_at(type_name: impl Into<String>, field: impl Into<String>, span: Span) -> Self {
        Self::FieldNotFound {
            type_name: type_name.into(),
            field: field.into(),
            span,
        }
    }

    pub fn index_out_of_bounds_at(index: i64, length: usize, span: Span) -> Self {
        Self::IndexOutOfBounds { index, length, span }
    }

    pub fn input_exhausted_at(span: Span) -> Self {
        Self::InputExhausted { span }
    }

    pub fn overflow_at(op: &str, span: Span) -> Self {
        Self::Arithmetic {
            message: format!("integer overflow in '{}'", op),
            span,
        }
    }

    pub fn recursion_limit_at(limit: usize, span: Span) -> Self {
        Self::RecursionLimit { limit, span }
    }

    /// Fills in the location if the error does not carry one yet.
    pub fn at(mut self, location: Span) -> Self {
        let span = self.span_mut();
        if span.is_dummy() {
            *span = location;
        }
        self
    }

    fn span_mut(&mut self) -> &mut Span {
        match self {
            Self::NameError { span, .. }
            | Self::DeletedAccess { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::DivisionByZero { span }
            | Self::Arity { span, .. }
            | Self::NotCallable { span, .. }
            | Self::FieldNotFound { span, .. }
            | Self::IndexOutOfBounds { span, .. }
            | Self::InputExhausted { span }
            | Self::Arithmetic { span, .. }
            | Self::RecursionLimit { span, .. }
            | Self::Io { span, .. } => span,
        }
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Span {
        match self {
            Self::NameError { span, .. }
            | Self::DeletedAccess { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::DivisionByZero { span }
            | Self::Arity { span, .. }
            | Self::NotCallable { span, .. }
            | Self::FieldNotFound { span, .. }
            | Self::IndexOutOfBounds { span, .. }
            | Self::InputExhausted { span }
            | Self::Arithmetic { span, .. }
            | Self::RecursionLimit { span, .. }
            | Self::Io { span, .. } => *span,
        }
    }

    /// Convert to a diagnostic for pretty printing
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = self.to_string();
        match self {
            Self::NameError { span, .. } => Diagnostic::error(message)
                .with_code("E0201")
                .with_label(Label::primary(*span, "not found in this scope")),
            Self::DeletedAccess { name, span } => Diagnostic::error(message)
                .with_code("E0202")
                .with_label(Label::primary(*span, "used after delete"))
                .with_help(format!("declare `{}` again with `let` before using it", name)),
            Self::TypeMismatch { span, .. } => Diagnostic::error(message)
                .with_code("E0203")
                .with_label(Label::primary(*span, "")),
            Self::DivisionByZero { span } => Diagnostic::error(message)
                .with_code("E0204")
                .with_label(Label::primary(*span, "divisor is zero")),
            Self::Arity { expected, span, .. } => Diagnostic::error(message)
                .with_code("E0205")
                .with_label(Label::primary(*span, format!("expected {} argument(s)", expected))),
            Self::NotCallable { span, .. } => Diagnostic::error(message)
                .with_code("E0206")
                .with_label(Label::primary(*span, "called here")),
            Self::FieldNotFound { span, .. } => Diagnostic::error(message)
                .with_code("E0207")
                .with_label(Label::primary(*span, "unknown field")),
            Self::IndexOutOfBounds { index, span, .. } => Diagnostic::error(message)
                .with_code("E0208")
                .with_label(Label::primary(*span, format!("index {} is out of bounds", index))),
            Self::InputExhausted { span } => Diagnostic::error(message)
                .with_code("E0209")
                .with_label(Label::primary(*span, "input requested here")),
            Self::Arithmetic { span, .. } => Diagnostic::error(message)
                .with_code("E0210")
                .with_label(Label::primary(*span, "")),
            Self::RecursionLimit { limit, span } => Diagnostic::error(message)
                .with_code("E0211")
                .with_label(Label::primary(*span, "call made here"))
                .with_note(format!("calls may nest at most {} deep", limit))
                .with_help("check that the recursion has a reachable base case"),
            Self::Io { span, .. } => Diagnostic::error(message)
                .with_code("E0212")
                .with_label(Label::primary(*span, "")),
        }
    }
}

/// Any failure from source text to the end of evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToyError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] InterpreterError),
}

impl ToyError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ToyError::Parse(err) => err.to_diagnostic(),
            ToyError::Runtime(err) => err.to_diagnostic(),
        }
    }
}

impl From<IoError> for InterpreterError {
    fn from(error: IoError) -> Self {
        Self::Io {
            message: error.to_string(),
            span: Span::dummy(),
        }
    }
}
