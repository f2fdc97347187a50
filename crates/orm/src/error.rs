//! Errors

use thiserror::Error;

use crate::key::Key;

/// Boxed cause carried by wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Persistence error taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    // --- Caller errors ---
    /// Mapping directives are missing or inconsistent.
    #[error("configuration: {0}")]
    Configuration(String),

    /// A value was rejected by a builder method.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// An operation was attempted in the wrong state.
    #[error("invalid state: {0}")]
    State(String),

    /// Placeholder and value counts disagree.
    #[error("placeholder mismatch for SQL [{sql}]: expected {expected} values but found {found}")]
    Arity { sql: String, expected: usize, found: usize },

    /// A key column was requested that the key does not contain.
    #[error("key column '{name}' not found in {key}")]
    KeyNotFound { name: String, key: Key },

    // --- Data errors ---
    /// A result row could not be turned into an entity.
    #[error("failed to map row {row} into {entity}: {message}")]
    Mapping {
        row: usize,
        entity: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The database schema does not match one or more mappings.
    #[error("schema validation failed: {}", failures.join("; "))]
    Schema { failures: Vec<String> },

    // --- Executor errors ---
    /// The executor failed while running a statement.
    #[error("{operation} failed for {entity} ({key})")]
    Execution {
        operation: &'static str,
        entity: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn mapping(row: usize, entity: &'static str, message: impl Into<String>) -> Self {
        Self::Mapping {
            row,
            entity,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn execution(
        operation: &'static str, entity: &'static str, key: impl ToString, err: anyhow::Error,
    ) -> Self {
        Self::Execution {
            operation,
            entity,
            key: key.to_string(),
            source: err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn arity_display() {
        let err = Error::Arity {
            sql: "a = ? AND b = ?".to_string(),
            expected: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "placeholder mismatch for SQL [a = ? AND b = ?]: expected 2 values but found 1"
        );
    }

    #[test]
    fn execution_keeps_cause() {
        let err = Error::execution(
            "insert",
            "Contractor",
            Key::none(),
            anyhow!("disk full").context("failed to execute statement"),
        );

        assert_eq!(err.to_string(), "insert failed for Contractor (Key(s))");
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "failed to execute statement");
    }

    #[test]
    fn schema_lists_failures() {
        let err = Error::Schema {
            failures: vec!["table 'x' not found".to_string(), "column 'y' missing".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "schema validation failed: table 'x' not found; column 'y' missing"
        );
    }
}
