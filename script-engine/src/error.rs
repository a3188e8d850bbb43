use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed source text. Always recoverable; positions are 1-based so the
/// caller can point at the offending text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// A failure while executing a compiled script: undefined name, unknown
/// builtin, invalid builtin argument, mismatched series lengths, or a scalar
/// division producing a non-finite result. Carries the best-effort source
/// line of the failing statement.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("execution error: {message}")]
pub struct ExecutionError {
    pub message: String,
    pub line: Option<usize>,
}

impl ExecutionError {
    pub fn at(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }
}

/// Any failure of the parse -> generate -> execute pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ScriptError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
