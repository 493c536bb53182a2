//! Error types for the claw-filter crate.

use thiserror::Error;

/// Errors raised while compiling or evaluating a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The expression text is malformed.
    #[error("syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset in the source where the problem was found.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// A regular expression could not be compiled.
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// The reason given by the regex engine.
        reason: String,
    },

    /// The expression refers to a variable the context does not know.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// An operator was applied to values of the wrong type.
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        /// The operator symbol.
        op: &'static str,
        /// Type of the left operand.
        left: &'static str,
        /// Type of the right operand.
        right: &'static str,
    },

    /// A boolean was required but something else was produced.
    #[error("expected a boolean, got {0}")]
    NotBoolean(&'static str),
}

impl FilterError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Returns true if the expression text itself is malformed.
    #[must_use]
    pub const fn is_syntax_error(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
