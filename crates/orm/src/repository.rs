//! Repository facade over an injected executor.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use sea_query::Value;

use crate::clause::{insert_clause, select_clause, update_clause};
use crate::entity::{Persistable, values_to_datatypes};
use crate::error::{Error, Result};
use crate::key::{Key, Pair};
use crate::mapper::{PersistableRowMapper, RowMapper};
use crate::query::SqlQuery;
use crate::types::{DataType, Row, RowAccess};
use crate::validation::assert_placeholder_count;

/// Runs SQL statements for a repository.
pub trait Executor: Send + Sync {
    /// Runs a query and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    fn query(&self, sql: &str, params: &[DataType]) -> AnyResult<Vec<Row>>;

    /// Runs a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    fn exec(&self, sql: &str, params: &[DataType]) -> AnyResult<u64>;

    /// Runs an INSERT and returns the generated primary key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    fn exec_with_key(&self, sql: &str, params: &[DataType]) -> AnyResult<Option<i64>>;

    /// Runs a query and visits each row in turn. Errors returned by `visit`
    /// stop the iteration and are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement or `visit` fails.
    fn query_each(
        &self, sql: &str, params: &[DataType],
        visit: &mut dyn FnMut(&dyn RowAccess) -> AnyResult<()>,
    ) -> AnyResult<()> {
        for row in self.query(sql, params)? {
            visit(&row)?;
        }
        Ok(())
    }
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn query(&self, sql: &str, params: &[DataType]) -> AnyResult<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn exec(&self, sql: &str, params: &[DataType]) -> AnyResult<u64> {
        (**self).exec(sql, params)
    }

    fn exec_with_key(&self, sql: &str, params: &[DataType]) -> AnyResult<Option<i64>> {
        (**self).exec_with_key(sql, params)
    }

    fn query_each(
        &self, sql: &str, params: &[DataType],
        visit: &mut dyn FnMut(&dyn RowAccess) -> AnyResult<()>,
    ) -> AnyResult<()> {
        (**self).query_each(sql, params, visit)
    }
}

/// Save, load, delete and query entities of one type.
///
/// ```ignore
/// let repo = BaseRepository::<Contractor, _>::new(SqliteExecutor::connect()?);
/// let key = repo.save(&mut contractor)?;
/// let loaded = repo.get(&key.unwrap())?;
/// ```
#[derive(Debug)]
pub struct BaseRepository<E, X> {
    executor: X,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Persistable, X: Executor> BaseRepository<E, X> {
    /// A repository running its statements on `executor`.
    pub const fn new(executor: X) -> Self {
        Self {
            executor,
            _marker: PhantomData,
        }
    }

    /// The underlying executor.
    pub const fn executor(&self) -> &X {
        &self.executor
    }

    fn entity() -> &'static str {
        E::mapping().entity()
    }

    /// Inserts a new entity or updates a persisted one.
    ///
    /// # Errors
    ///
    /// As [`BaseRepository::insert`] and [`BaseRepository::update`].
    pub fn save(&self, entity: &mut E) -> Result<Option<Key>> {
        if entity.is_new() { self.insert(entity) } else { self.update(entity).map(Some) }
    }

    /// Inserts the entity. A generated key is stored on the entity when the
    /// type declares a primary key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the entity cannot be bound,
    /// [`Error::Arity`] or [`Error::Execution`] if the statement fails.
    pub fn insert(&self, entity: &mut E) -> Result<Option<Key>> {
        let mapping = E::mapping();
        let (clause, values) = insert_clause(entity)?.into_parts();
        let sql = format!("INSERT INTO {} {clause}", mapping.table());
        let params = Self::prepare("insert", entity.key(), &sql, values)?;

        if let Some(primary_key) = mapping.primary_key() {
            let generated = self
                .executor
                .exec_with_key(&sql, &params)
                .map_err(|err| Self::failed("insert", entity.key(), &sql, err))?;
            if let Some(id) = generated {
                entity.set_key(Key::of(primary_key, id));
            }
        } else {
            self.executor
                .exec(&sql, &params)
                .map_err(|err| Self::failed("insert", entity.key(), &sql, err))?;
        }

        let key = entity.key();
        Ok((!key.is_empty()).then(|| key.clone()))
    }

    /// Updates a persisted entity by its primary key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the entity has no primary key or
    /// cannot be bound, [`Error::Arity`] or [`Error::Execution`] if the
    /// statement fails.
    pub fn update(&self, entity: &E) -> Result<Key> {
        let (clause, values) = update_clause(entity)?.into_parts();
        let sql = format!("UPDATE {} {clause}", E::mapping().table());
        let params = Self::prepare("update", entity.key(), &sql, values)?;

        self.executor
            .exec(&sql, &params)
            .map_err(|err| Self::failed("update", entity.key(), &sql, err))?;
        Ok(entity.key().clone())
    }

    /// Deletes the entity's row and returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the entity has no primary key,
    /// [`Error::Execution`] if the statement fails.
    pub fn delete(&self, entity: &E) -> Result<u64> {
        let primary = Self::primary(entity.key(), "delete")?;
        let sql = format!("DELETE FROM {} WHERE {} = ?", E::mapping().table(), primary.name());
        let values = vec![Value::from(primary.value())];
        let params = Self::prepare("delete", entity.key(), &sql, values)?;

        self.executor
            .exec(&sql, &params)
            .map_err(|err| Self::failed("delete", entity.key(), &sql, err))
    }

    /// Loads the entity with the given key's primary entry. The result
    /// carries `key` itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `key` is empty, [`Error::Mapping`]
    /// or [`Error::Execution`] if loading fails.
    pub fn get(&self, key: &Key) -> Result<Option<E>> {
        let primary = Self::primary(key, "get")?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            select_clause::<E>(&[primary.name()]),
            E::mapping().table(),
            primary.name()
        );

        let mapper = PersistableRowMapper::<E>::of()?;
        let rows = self.fetch("get", key, &sql, vec![Value::from(primary.value())], &*mapper)?;

        Ok(rows.into_iter().next().map(|mut entity| {
            entity.set_key(key.clone());
            entity
        }))
    }

    /// Loads every entity matched by `query`, which supplies the tail of
    /// `SELECT <columns> FROM <table> ..`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] if the query's placeholders and values
    /// disagree, [`Error::Mapping`] or [`Error::Execution`] if loading fails.
    pub fn query_entity(&self, query: &SqlQuery) -> Result<Vec<E>> {
        query.assert_arity()?;
        let mapping = E::mapping();
        let custom: Vec<&str> =
            mapping.primary_key().or_else(|| query.primary_key_name()).into_iter().collect();
        let sql = format!(
            "SELECT {} FROM {} {}",
            select_clause::<E>(&custom),
            mapping.table(),
            query.sql()
        );

        let mapper = PersistableRowMapper::<E>::of()?;
        self.fetch("query_entity", &Key::none(), sql.trim(), query.values(), &*mapper)
    }

    /// Runs `query` verbatim and maps each row with `mapper`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] if the query's placeholders and values
    /// disagree, the mapper's error, or [`Error::Execution`] if the
    /// statement fails.
    pub fn query<T, M>(&self, query: &SqlQuery, mapper: &M) -> Result<Vec<T>>
    where
        M: RowMapper<T> + ?Sized,
    {
        query.assert_arity()?;
        self.fetch("query", &Key::none(), &query.sql(), query.values(), mapper)
    }

    fn primary<'k>(key: &'k Key, operation: &str) -> Result<&'k Pair> {
        key.primary().ok_or_else(|| {
            Error::Configuration(format!(
                "cannot {operation} {}: key has no primary entry",
                Self::entity()
            ))
        })
    }

    fn prepare(
        operation: &str, key: &Key, sql: &str, values: Vec<Value>,
    ) -> Result<Vec<DataType>> {
        assert_placeholder_count(sql, values.len())?;
        let params = values_to_datatypes(values).map_err(|err| {
            Error::Argument(format!("{operation} parameters for {}: {err:#}", Self::entity()))
        })?;

        tracing::debug!(
            entity = Self::entity(),
            operation,
            key = %key,
            sql = %sql,
            params = ?params,
            "executing statement"
        );
        Ok(params)
    }

    fn fetch<T, M>(
        &self, operation: &'static str, key: &Key, sql: &str, values: Vec<Value>, mapper: &M,
    ) -> Result<Vec<T>>
    where
        M: RowMapper<T> + ?Sized,
    {
        let params = Self::prepare(operation, key, sql, values)?;

        let mut mapped = Vec::new();
        self.executor
            .query_each(sql, &params, &mut |row| {
                let value = mapper.map_row(row, mapped.len())?;
                mapped.push(value);
                Ok(())
            })
            .map_err(|err| Self::failed(operation, key, sql, err))?;

        Ok(mapped)
    }

    fn failed(operation: &'static str, key: &Key, sql: &str, err: anyhow::Error) -> Error {
        match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => {
                tracing::error!(
                    entity = Self::entity(),
                    operation,
                    key = %key,
                    sql = %sql,
                    error = %format!("{err:#}"),
                    "statement failed"
                );
                Error::execution(operation, Self::entity(), key, err)
            }
        }
    }
}
