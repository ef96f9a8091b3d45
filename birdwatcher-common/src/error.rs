use thiserror::Error;

/// Common error type for birdwatcher components.
///
/// Every parse variant carries the 1-based number of the raw input line that
/// triggered it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: protocol header has {tokens} fields, expected at least 4")]
    ShortHeader { line: usize, tokens: usize },

    #[error("line {line}: invalid integer {value:?} in {field}")]
    InvalidInteger {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: malformed {field} line: {reason}")]
    MalformedLine {
        line: usize,
        field: &'static str,
        reason: String,
    },

    #[error("line {line}: route change counters for {instance:?} appear before the stats header")]
    MissingSchema { line: usize, instance: String },

    #[error("line {line}: {columns} route change counters but the stats header names {expected}")]
    ColumnMismatch {
        line: usize,
        columns: usize,
        expected: usize,
    },
}

impl Error {
    /// Input line the error refers to, if it is a parse error.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::ShortHeader { line, .. }
            | Error::InvalidInteger { line, .. }
            | Error::MalformedLine { line, .. }
            | Error::MissingSchema { line, .. }
            | Error::ColumnMismatch { line, .. } => Some(*line),
            Error::Config(_) | Error::Io(_) => None,
        }
    }

    /// Whether this error was caused by unexpected input rather than I/O or configuration.
    pub fn is_malformed_input(&self) -> bool {
        self.line().is_some()
    }
}

/// Result type alias using birdwatcher's Error.
pub type Result<T> = std::result::Result<T, Error>;
