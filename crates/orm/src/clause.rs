//! SQL clause derivation from mapping metadata.

use sea_query::Value;

use crate::entity::Persistable;
use crate::error::{Error, Result};
use crate::meta::Mapping;

/// A SQL fragment and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlClause {
    clause: String,
    values: Vec<Value>,
}

impl SqlClause {
    /// Creates a clause.
    #[must_use]
    pub fn new(clause: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            clause: clause.into(),
            values,
        }
    }

    /// SQL text with `?` placeholders.
    #[must_use]
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// Parameters in placeholder order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Splits into clause text and parameters.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.clause, self.values)
    }
}

/// Columns and values bound for an entity, in member-name order.
fn bindings<E: Persistable>(entity: &E) -> Result<Vec<(String, Value)>> {
    let mapping = E::mapping();
    let mut bound = Vec::new();

    for member in mapping.persisted() {
        let value = entity.read(member.name()).map_err(|err| {
            Error::Configuration(format!(
                "failed to read {}.{}: {err:#}",
                mapping.entity(),
                member.name()
            ))
        })?;

        // unset references are omitted
        if let Some(value) = value {
            bound.push((member.column_name(mapping.entity())?, value));
        }
    }
    Ok(bound)
}

/// Derives `(c1,c2) VALUES (?,?)` for an INSERT.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if nothing can be bound or a labeled
/// member is incompletely declared.
pub fn insert_clause<E: Persistable>(entity: &E) -> Result<SqlClause> {
    let mapping = E::mapping();
    let bound = bindings(entity)?;
    if bound.is_empty() {
        return Err(Error::Configuration(format!("nothing to insert for {}", mapping.entity())));
    }

    let (columns, values): (Vec<_>, Vec<_>) = bound.into_iter().unzip();
    let placeholders = vec!["?"; columns.len()].join(",");
    let clause = format!("({}) VALUES ({placeholders})", columns.join(","));

    tracing::debug!(
        entity = mapping.entity(),
        sql = %clause,
        param_count = values.len(),
        "derived insert clause"
    );

    Ok(SqlClause::new(clause, values))
}

/// Derives `SET c1=?,c2=? WHERE pk=?` for an UPDATE. The primary-key value
/// is the last parameter.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the entity's key has no primary entry,
/// nothing can be bound or a labeled member is incompletely declared.
pub fn update_clause<E: Persistable>(entity: &E) -> Result<SqlClause> {
    let mapping = E::mapping();
    let Some(primary) = entity.key().primary() else {
        return Err(Error::Configuration(format!(
            "cannot update {}: key has no primary entry",
            mapping.entity()
        )));
    };

    let bound = bindings(entity)?;
    if bound.is_empty() {
        return Err(Error::Configuration(format!("nothing to update for {}", mapping.entity())));
    }

    let (columns, mut values): (Vec<_>, Vec<_>) = bound.into_iter().unzip();
    let assignments = columns.iter().map(|column| format!("{column}=?")).collect::<Vec<_>>();
    let clause = format!("SET {} WHERE {}=?", assignments.join(","), primary.name());
    values.push(Value::from(primary.value()));

    tracing::debug!(
        entity = mapping.entity(),
        sql = %clause,
        param_count = values.len(),
        "derived update clause"
    );

    Ok(SqlClause::new(clause, values))
}

/// Derives a SELECT column list: `custom` columns first, then each persisted
/// member's select expression.
#[must_use]
pub fn select_clause<E: Persistable>(custom: &[&str]) -> String {
    select_list(E::mapping(), custom)
}

/// [`select_clause`] over a mapping.
#[must_use]
pub fn select_list(mapping: &Mapping, custom: &[&str]) -> String {
    let columns = custom
        .iter()
        .map(ToString::to_string)
        .chain(mapping.persisted().filter_map(crate::meta::Member::select_expr))
        .collect::<Vec<_>>()
        .join(",");

    tracing::debug!(entity = mapping.entity(), sql = %columns, "derived select clause");
    columns
}
