//! Error type shared by the reader, the query engine and the script runner.

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SummaryError>;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Version mismatch: expected {expected}, found '{found}'")]
    VersionMismatch { expected: f64, found: String },

    #[error("Header has {names} column names but {types} type tags")]
    ColumnCountMismatch { names: usize, types: usize },

    #[error("Unknown type '{tag}' for column '{column}'")]
    UnknownType { tag: String, column: String },

    #[error("Malformed row at line {line}, column '{column}': {reason}")]
    MalformedRow {
        line: usize,
        column: String,
        reason: String,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Filter needs a column on one side, got '{left}' and '{right}'")]
    NoColumnOperand { left: String, right: String },

    #[error("Column '{0}' is not in the current projection")]
    ProjectedOut(String),

    #[error("Invalid format config: {0}")]
    InvalidConfig(String),

    #[error("Header truncated: expected {expected} lines, found {found}")]
    TruncatedHeader { expected: usize, found: usize },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("No summary has been read yet")]
    NotLoaded,

    #[error("Script error at line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SummaryError {
    /// Shorthand for a row decode failure.
    pub fn malformed(line: usize, column: &str, reason: impl Into<String>) -> Self {
        SummaryError::MalformedRow {
            line,
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_version_mismatch() {
        let err = SummaryError::VersionMismatch {
            expected: 2.0,
            found: "1.5".to_string(),
        };
        assert_eq!(err.to_string(), "Version mismatch: expected 2, found '1.5'");
    }

    #[test]
    fn test_malformed_helper() {
        let err = SummaryError::malformed(7, "mobility", "not a float");
        match err {
            SummaryError::MalformedRow {
                line,
                column,
                reason,
            } => {
                assert_eq!(line, 7);
                assert_eq!(column, "mobility");
                assert_eq!(reason, "not a float");
            }
            other => panic!("Expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: SummaryError = io_err.into();
        assert!(matches!(err, SummaryError::Io(_)));
    }
}
