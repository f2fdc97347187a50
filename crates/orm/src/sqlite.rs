//! `SQLite` executor.
//!
//! A single connection guarded by a mutex. Suitable for development, tests
//! and embedded use.

#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_wrap)]

use std::sync::Arc;

use anyhow::{Context, Result};
use fromenv::FromEnv;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::instrument;

use crate::repository::Executor;
use crate::types::{DataType, Field, Row, RowAccess};
use crate::validation::SchemaSource;

/// Options used to connect to the `SQLite` database.
///
/// Loaded from environment variables by [`SqliteExecutor::connect`].
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    #[env(from = "SQL_DATABASE", default = "file::memory:?cache=shared")]
    pub database: String,
}

/// [`Executor`] backed by `rusqlite`.
///
/// Statements are serialized on the connection mutex, which is held while
/// [`Executor::query_each`] visits rows: a visitor must not run statements
/// on the same executor.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    // rusqlite::Connection isn't `Sync`
    conn: Arc<parking_lot::Mutex<Connection>>,
}

impl SqliteExecutor {
    /// Connects using [`ConnectOptions`] read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be loaded or the database
    /// cannot be opened.
    pub fn connect() -> Result<Self> {
        let options =
            ConnectOptions::from_env().finalize().context("issue loading connection options")?;
        Self::connect_with(options)
    }

    /// Connects with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    #[instrument]
    pub fn connect_with(options: ConnectOptions) -> Result<Self> {
        tracing::debug!("initializing SQLite connection to: {}", options.database);

        let conn = Connection::open(&options.database).context("failed to open SQLite database")?;
        Ok(Self {
            conn: Arc::new(parking_lot::Mutex::new(conn)),
        })
    }

    /// Runs one or more `;`-separated statements without parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing batch: {}", sql);
        self.conn.lock().execute_batch(sql).context("failed to execute batch")
    }
}

impl Executor for SqliteExecutor {
    fn query(&self, sql: &str, params: &[DataType]) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        self.query_each(sql, params, &mut |row| {
            let fields = (0..row.column_count())
                .map(|index| {
                    Ok(Field {
                        name: row.column_label(index).unwrap_or_default().to_string(),
                        value: row.value(index)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row { fields });
            Ok(())
        })?;
        Ok(rows)
    }

    fn exec(&self, sql: &str, params: &[DataType]) -> Result<u64> {
        tracing::debug!("executing statement: {}", sql);
        let conn = self.conn.lock();
        let rows_affected = execute(&conn, sql, params)?;
        Ok(rows_affected as u64)
    }

    fn exec_with_key(&self, sql: &str, params: &[DataType]) -> Result<Option<i64>> {
        tracing::debug!("executing insert: {}", sql);
        let conn = self.conn.lock();
        let rows_affected = execute(&conn, sql, params)?;
        Ok((rows_affected > 0).then(|| conn.last_insert_rowid()))
    }

    fn query_each(
        &self, sql: &str, params: &[DataType],
        visit: &mut dyn FnMut(&dyn RowAccess) -> Result<()>,
    ) -> Result<()> {
        tracing::debug!("executing query: {}", sql);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).context("failed to prepare statement")?;

        let sqlite_params: Vec<_> = params.iter().map(datatype_to_rusqlite_value).collect();
        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();

        let mut rows =
            stmt.query(params_from_iter(sqlite_params.iter())).context("failed to execute query")?;
        while let Some(row) = rows.next().context("failed to fetch row")? {
            visit(&Cursor {
                row,
                columns: &columns,
            })?;
        }
        Ok(())
    }
}

impl SchemaSource for SqliteExecutor {
    fn find_table(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )
        .optional()
        .context("failed to look up table")
    }

    fn columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .context("failed to prepare column lookup")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .context("failed to read columns")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read column name")?;
        Ok(columns)
    }
}

/// The current row of an open statement.
struct Cursor<'r, 's> {
    row: &'r rusqlite::Row<'s>,
    columns: &'r [String],
}

impl RowAccess for Cursor<'_, '_> {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_label(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn value(&self, index: usize) -> Result<DataType> {
        let value = self.row.get_ref(index).context("failed to get column value")?;
        rusqlite_value_to_datatype(value)
    }
}

fn execute(conn: &Connection, sql: &str, params: &[DataType]) -> Result<usize> {
    let mut stmt = conn.prepare(sql).context("failed to prepare statement")?;
    let sqlite_params: Vec<_> = params.iter().map(datatype_to_rusqlite_value).collect();

    stmt.execute(params_from_iter(sqlite_params.iter())).context("failed to execute statement")
}

fn datatype_to_rusqlite_value(dt: &DataType) -> rusqlite::types::Value {
    match dt {
        DataType::Boolean(Some(b)) => rusqlite::types::Value::Integer(i64::from(*b)),
        DataType::Int32(Some(i)) => rusqlite::types::Value::Integer(i64::from(*i)),
        DataType::Int64(Some(i)) => rusqlite::types::Value::Integer(*i),
        DataType::Uint32(Some(u)) => rusqlite::types::Value::Integer(i64::from(*u)),
        DataType::Uint64(Some(u)) => rusqlite::types::Value::Integer(*u as i64),
        DataType::Float(Some(f)) => rusqlite::types::Value::Real(f64::from(*f)),
        DataType::Double(Some(f)) => rusqlite::types::Value::Real(*f),
        DataType::Str(Some(s))
        | DataType::Date(Some(s))
        | DataType::Time(Some(s))
        | DataType::Timestamp(Some(s)) => rusqlite::types::Value::Text(s.clone()),
        DataType::Binary(Some(b)) => rusqlite::types::Value::Blob(b.clone()),
        // All None variants map to NULL
        _ => rusqlite::types::Value::Null,
    }
}

fn rusqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Str(None)),
        ValueRef::Integer(i) => Ok(DataType::Int64(Some(i))),
        ValueRef::Real(f) => Ok(DataType::Double(Some(f))),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(Some(s.to_string())))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(Some(b.to_vec()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> SqliteExecutor {
        SqliteExecutor::connect_with(ConnectOptions {
            database: ":memory:".to_string(),
        })
        .expect("connect")
    }

    #[test]
    fn sqlite_operations() {
        let db = executor();
        db.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .expect("create table");

        let id = db
            .exec_with_key(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[DataType::Str(Some("Alice".to_string())), DataType::Int32(Some(30))],
            )
            .expect("insert");
        assert_eq!(id, Some(1));

        let rows_affected = db
            .exec(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[DataType::Str(Some("Bob".to_string())), DataType::Int32(None)],
            )
            .expect("insert");
        assert_eq!(rows_affected, 1);

        let rows = db.query("SELECT id, name, age FROM users ORDER BY name", &[]).expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields[1].name, "name");
        assert_eq!(rows[0].fields[1].value, DataType::Str(Some("Alice".to_string())));
        assert!(rows[1].fields[2].value.is_null());
    }

    #[test]
    fn schema_lookup() {
        let db = executor();
        db.execute_batch("CREATE TABLE Contractor (sc_key INTEGER PRIMARY KEY, sc_name TEXT)")
            .expect("create table");

        assert_eq!(db.find_table("contractor").unwrap().as_deref(), Some("Contractor"));
        assert_eq!(db.find_table("missing").unwrap(), None);
        assert_eq!(db.columns("Contractor").unwrap(), ["sc_key", "sc_name"]);
    }

    #[test]
    fn failed_statement_has_context() {
        let db = executor();
        let err = db.exec("INSERT INTO nowhere VALUES (?)", &[DataType::Int32(Some(1))]).unwrap_err();
        assert_eq!(err.to_string(), "failed to prepare statement");
    }
}
