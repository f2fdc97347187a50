//! Placeholder and schema checks.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::meta::{Mapping, MemberKind};

/// Counts `?` placeholders outside quoted literals.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;

    for ch in sql.chars() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '?') => count += 1,
            (None, _) => {}
        }
    }
    count
}

/// Checks that `sql` has exactly `found` placeholders.
///
/// # Errors
///
/// Returns [`Error::Arity`] on mismatch.
pub fn assert_placeholder_count(sql: &str, found: usize) -> Result<()> {
    let expected = count_placeholders(sql);
    if expected == found {
        return Ok(());
    }
    Err(Error::Arity {
        sql: sql.to_string(),
        expected,
        found,
    })
}

/// Table and column metadata of a live database.
pub trait SchemaSource {
    /// Actual name of the table called `name`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    fn find_table(&self, name: &str) -> anyhow::Result<Option<String>>;

    /// Column names of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    fn columns(&self, table: &str) -> anyhow::Result<Vec<String>>;
}

/// Validates mappings against a [`SchemaSource`].
#[derive(Debug)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Checks that every mapping's table exists and has every column the
    /// mapping reads or writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] listing every problem found, or
    /// [`Error::Execution`] if the schema cannot be read.
    pub fn assert_mappings(source: &dyn SchemaSource, mappings: &[&Mapping]) -> Result<()> {
        let mut failures = Vec::new();
        for mapping in mappings {
            Self::validate(source, mapping, &mut failures)?;
        }

        if failures.is_empty() {
            return Ok(());
        }
        tracing::warn!(failures = failures.len(), "schema validation failed");
        Err(Error::Schema { failures })
    }

    fn validate(source: &dyn SchemaSource, mapping: &Mapping, failures: &mut Vec<String>) -> Result<()> {
        let configured = mapping.table();
        let read_failed =
            |err| Error::execution("validate schema", mapping.entity(), configured, err);

        let mut table = None;
        for candidate in [configured.to_string(), configured.to_uppercase(), configured.to_lowercase()] {
            table = source.find_table(&candidate).map_err(read_failed)?;
            if table.is_some() {
                break;
            }
        }
        let Some(table) = table else {
            failures.push(format!("table '{configured}' for {} not found", mapping.entity()));
            return Ok(());
        };

        let columns: HashSet<String> = source
            .columns(&table)
            .map_err(read_failed)?
            .iter()
            .map(|column| column.to_uppercase())
            .collect();
        if columns.is_empty() {
            failures.push(format!(
                "no column metadata available for {} (table '{table}')",
                mapping.entity()
            ));
            return Ok(());
        }

        for column in expected_columns(mapping) {
            if !columns.contains(&column.to_uppercase()) {
                failures.push(format!(
                    "column '{column}' required by {} is missing in table '{table}'",
                    mapping.entity()
                ));
            }
        }
        Ok(())
    }
}

/// Columns a mapping reads or writes, primary key last.
fn expected_columns(mapping: &Mapping) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut push = |column: &str| {
        if !column.trim().is_empty() && !columns.iter().any(|seen| seen == column) {
            columns.push(column.to_string());
        }
    };

    for member in mapping.persisted() {
        match member.kind() {
            MemberKind::Labeled => {
                if let Ok((value, _)) = member.labeled_columns(mapping.entity()) {
                    push(value);
                }
            }
            MemberKind::Reference(_) => {
                if let Some(column) = member.column_override().or_else(|| member.target_primary_key()) {
                    push(column);
                }
            }
            MemberKind::Scalar => {
                // the column name of a scalar is infallible
                if let Ok(column) = member.column_name(mapping.entity()) {
                    push(&column);
                }
            }
        }
    }
    if let Some(primary_key) = mapping.primary_key() {
        push(primary_key);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_outside_literals() {
        assert_eq!(count_placeholders(""), 0);
        assert_eq!(count_placeholders("a = ? AND b = ?"), 2);
        assert_eq!(count_placeholders("a = '?' AND b = ?"), 1);
        assert_eq!(count_placeholders("note as \"what?\" WHERE id = ?"), 1);
        assert_eq!(count_placeholders("name = 'it''s?' AND id = ?"), 1);
    }

    #[test]
    fn arity_mismatch_message() {
        let err = assert_placeholder_count("SELECT * FROM t WHERE a = ? AND b = ?", 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "placeholder mismatch for SQL [SELECT * FROM t WHERE a = ? AND b = ?]: expected 2 values but found 1"
        );
        assert_placeholder_count("a = ?", 1).unwrap();
    }
}
