//! Error type shared by the parser and the expression engine.

use thiserror::Error;

use crate::token::SourceLocation;

/// Result type alias for folding operations
pub type Result<T> = std::result::Result<T, FoldError>;

/// Errors that can occur while parsing or folding a header
#[derive(Debug, Error)]
pub enum FoldError {
    /// Malformed preprocessor directive (missing keyword, identifier or file name)
    #[error("{location}: malformed directive: {message}")]
    MalformedDirective {
        /// Location of the offending token
        location: SourceLocation,
        /// What was expected
        message: String,
    },

    /// Syntax error in an `#if`/`#elif` condition
    #[error("{}: {message} (found {}) in expression `{expression}`",
        describe_location(.location), describe_found(.found))]
    Expression {
        /// What went wrong
        message: String,
        /// Location of the offending token, `None` at end of input
        location: Option<SourceLocation>,
        /// Spelling of the offending token, `None` at end of input
        found: Option<String>,
        /// The full token span that was being parsed
        expression: String,
    },

    /// I/O error (e.g., file reading/writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_location(location: &Option<SourceLocation>) -> String {
    location.map_or_else(|| "<end of expression>".to_string(), |l| l.to_string())
}

fn describe_found(found: &Option<String>) -> &str {
    found.as_deref().unwrap_or("end of input")
}

impl FoldError {
    /// Create a malformed directive error at `location`
    pub fn malformed_directive<S: Into<String>>(location: SourceLocation, message: S) -> Self {
        FoldError::MalformedDirective {
            location,
            message: message.into(),
        }
    }

    /// Location of the error in the source, if known
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            FoldError::MalformedDirective { location, .. } => Some(*location),
            FoldError::Expression { location, .. } => *location,
            FoldError::Io(_) => None,
        }
    }
}
