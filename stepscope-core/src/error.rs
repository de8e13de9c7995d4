//! ABOUTME: Error types and handling for stepscope
//! ABOUTME: Provides the StepscopeError enum and Result type alias

use thiserror::Error;

/// Error enum covering every stepscope operation.
///
/// Failures caused by the *user's* program (syntax errors, runtime throws,
/// tracer-reported errors) are not represented here; they travel inside a
/// [`crate::TraceDocument`] so the HTTP layer can return them with a 200.
/// This enum is for failures of the service itself.
#[derive(Debug, Error)]
pub enum StepscopeError {
    /// Source could not be parsed for instrumentation.
    #[error("instrumentation error: {message}")]
    Instrumentation { message: String },

    /// The embedded evaluator could not be set up.
    #[error("evaluation error: {message}")]
    Evaluation { message: String },

    /// The external tracer could not be coordinated.
    #[error("tracer error: {message}")]
    Tracer { message: String },

    /// A debug session operation failed.
    #[error("session error: {message}")]
    Session { message: String },

    /// Configuration is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected I/O failure unrelated to user code.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that should never happen.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl StepscopeError {
    /// Shorthand for an instrumentation failure.
    pub fn instrumentation(message: impl Into<String>) -> Self {
        Self::Instrumentation {
            message: message.into(),
        }
    }

    /// Shorthand for an internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, StepscopeError>;
