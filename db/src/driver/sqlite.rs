//! SQLite driver backed by `rusqlite`.
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text and booleans as
//! integers, the representations SQLite's date functions and affinity
//! rules expect.

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use sqlmill_core::bind::compile;
use sqlmill_core::{
    Bindings, Database, Driver, DriverError, DriverErrorKind, PlaceholderStyle, RowSet,
    TIMESTAMP_FORMAT, Transaction, Value,
};
use tracing::debug;

/// A SQLite connection.
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Opens (creating if needed) the database at `path`. `:memory:` opens a
    /// private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(driver_error)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, DriverError> {
        Self::open(":memory:")
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying `rusqlite` connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Database for SqliteDatabase {
    fn driver(&self) -> Driver {
        Driver::Sqlite3
    }

    fn execute(&mut self, sql: &str, bindings: &Bindings) -> Result<u64, DriverError> {
        execute_on(&self.conn, sql, bindings)
    }

    fn query(&mut self, sql: &str, bindings: &Bindings) -> Result<RowSet, DriverError> {
        let compiled = compile(sql, bindings, PlaceholderStyle::Question)?;
        debug!(statement = %compiled.sql, params = compiled.values.len(), "sqlite query");

        let mut stmt = self.conn.prepare(&compiled.sql).map_err(driver_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut result = RowSet::new(columns);

        let mut rows = stmt
            .query(params_from_iter(compiled.values.iter().map(to_sqlite)))
            .map_err(driver_error)?;
        while let Some(row) = rows.next().map_err(driver_error)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sqlite(row.get_ref(i).map_err(driver_error)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }

    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, DriverError> {
        let tx = self.conn.transaction().map_err(driver_error)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl Transaction for SqliteTransaction<'_> {
    fn execute(&mut self, sql: &str, bindings: &Bindings) -> Result<u64, DriverError> {
        execute_on(&self.tx, sql, bindings)
    }

    fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.commit().map_err(driver_error)
    }

    fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.rollback().map_err(driver_error)
    }
}

/// Batch statements (no bindings) report zero affected rows.
fn execute_on(conn: &Connection, sql: &str, bindings: &Bindings) -> Result<u64, DriverError> {
    if bindings.is_empty() {
        debug!(statement = %sql, "sqlite batch");
        conn.execute_batch(sql).map_err(driver_error)?;
        return Ok(0);
    }

    let compiled = compile(sql, bindings, PlaceholderStyle::Question)?;
    debug!(statement = %compiled.sql, params = compiled.values.len(), "sqlite execute");
    let affected = conn
        .execute(
            &compiled.sql,
            params_from_iter(compiled.values.iter().map(to_sqlite)),
        )
        .map_err(driver_error)?;
    Ok(affected as u64)
}

fn to_sqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

fn driver_error(err: rusqlite::Error) -> DriverError {
    let kind = match &err {
        rusqlite::Error::QueryReturnedNoRows => DriverErrorKind::NoRows,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains("no such table") => {
            DriverErrorKind::UndefinedTable
        }
        _ => DriverErrorKind::Other,
    };
    DriverError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use sqlmill_core::Params;

    use super::*;

    fn named(pairs: &[(&str, Value)]) -> Bindings {
        Bindings::Named(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<Params>(),
        )
    }

    #[test]
    fn test_batch_and_query() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        db.execute(
            "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT);\nINSERT INTO users VALUES (1, 'ada');",
            &Bindings::none(),
        )
        .unwrap();

        let rows = db
            .query("SELECT id, name FROM users", &Bindings::none())
            .unwrap();
        assert_eq!(rows.columns, vec!["id", "name"]);
        assert_eq!(rows.rows, vec![vec![Value::Int(1), Value::from("ada")]]);
    }

    #[test]
    fn test_named_bindings() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        db.execute("CREATE TABLE t(a INTEGER, b TEXT)", &Bindings::none())
            .unwrap();
        let affected = db
            .execute(
                "INSERT INTO t VALUES (:a, :b)",
                &named(&[("a", Value::Int(5)), ("b", Value::from("x"))]),
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = db
            .query("SELECT b FROM t WHERE a = :a", &named(&[("a", Value::Int(5))]))
            .unwrap();
        assert_eq!(rows.get(0, "b"), Some(&Value::from("x")));
    }

    #[test]
    fn test_missing_table_is_classified() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        let err = db
            .query("SELECT * FROM missing", &Bindings::none())
            .unwrap_err();
        assert!(err.is_undefined_table());
    }

    #[test]
    fn test_timestamps_round_trip_as_text() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        db.execute("CREATE TABLE t(at TIMESTAMP)", &Bindings::none())
            .unwrap();
        let now = chrono::DateTime::parse_from_rfc3339("2006-01-02T15:04:05Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        db.execute("INSERT INTO t VALUES (:at)", &named(&[("at", Value::Timestamp(now))]))
            .unwrap();
        let rows = db.query("SELECT at FROM t", &Bindings::none()).unwrap();
        assert_eq!(rows.rows[0][0], Value::from("2006-01-02 15:04:05"));
        assert_eq!(rows.rows[0][0].as_timestamp(), Some(now));
    }

    #[test]
    fn test_rollback_discards_changes() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        db.execute("CREATE TABLE t(a INTEGER)", &Bindings::none())
            .unwrap();

        let mut tx = db.transaction().unwrap();
        tx.execute("INSERT INTO t VALUES (1)", &Bindings::none())
            .unwrap();
        tx.rollback().unwrap();

        let rows = db.query("SELECT * FROM t", &Bindings::none()).unwrap();
        assert!(rows.is_empty());
    }
}
