//! Reading table definitions from a live database.
//!
//! One [`Introspector`] per dialect answers catalog questions and builds a
//! uniform [`Schema`]. [`introspector`] picks the implementation for a
//! connection and [`load`] runs the usual "which schema, which tables"
//! selection on top of it.

mod mysql;
mod postgres;
mod sqlite;

use sqlmill_core::{Database, Driver, Query, RowSet, Value};
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::model::Schema;

pub use mysql::MysqlIntrospector;
pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;

/// Dialect-specific catalog access.
pub trait Introspector {
    /// The schema used when none is given.
    fn default_schema(&mut self) -> Result<String>;

    /// Base table names in `schema`, sorted.
    fn tables(&mut self, schema: &str) -> Result<Vec<String>>;

    /// Reads the named tables of `schema`, in the order given.
    fn schema(&mut self, schema: &str, names: &[String]) -> Result<Schema>;
}

/// The introspector for the connection's dialect.
pub fn introspector<'a>(db: &'a mut dyn Database) -> Box<dyn Introspector + 'a> {
    match db.driver() {
        Driver::Sqlite3 => Box::new(SqliteIntrospector::new(db)),
        Driver::Postgres => Box::new(PostgresIntrospector::new(db)),
        Driver::Mysql => Box::new(MysqlIntrospector::new(db)),
    }
}

/// Which part of the database to read.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Schema to read; the dialect's default when `None`.
    pub schema_name: Option<String>,
    /// Tables to read; every table when empty.
    pub table_names: Vec<String>,
}

/// Reads the selected schema.
pub fn load(db: &mut dyn Database, selection: &Selection) -> Result<Schema> {
    let mut introspector = introspector(db);
    let schema = match &selection.schema_name {
        Some(name) => name.clone(),
        None => introspector.default_schema()?,
    };
    let names = if selection.table_names.is_empty() {
        introspector.tables(&schema)?
    } else {
        selection.table_names.clone()
    };
    debug!(schema = %schema, tables = names.len(), "introspecting");
    introspector.schema(&schema, &names)
}

/// Runs a catalog query written with `?` placeholders.
fn catalog(db: &mut dyn Database, sql: &str, args: &[&str]) -> Result<RowSet> {
    let args = args.iter().map(|arg| Value::from(*arg)).collect();
    let prepared = Query::sql(sql, args).prepare();
    Ok(db.query(&prepared.sql, &prepared.bindings)?)
}

/// Text of `column` in `row`; NULL reads as empty.
fn text(rows: &RowSet, row: usize, column: &str) -> Result<String> {
    match rows.get(row, column) {
        Some(Value::Null) => Ok(String::new()),
        Some(value) => Ok(value.to_string()),
        None => Err(SchemaError::Catalog(format!("missing column '{column}'"))),
    }
}

/// Integer in `column` of `row`; NULL reads as `None`.
fn number(rows: &RowSet, row: usize, column: &str) -> Option<i64> {
    rows.get(row, column).and_then(Value::as_i64)
}

/// First column of every row.
fn names(rows: &RowSet) -> Vec<String> {
    rows.rows
        .iter()
        .filter_map(|row| row.first())
        .map(Value::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_helpers() {
        let mut rows = RowSet::new(vec!["name".into(), "size".into()]);
        rows.rows.push(vec![Value::from("id"), Value::Null]);
        rows.rows.push(vec![Value::from("title"), Value::from("255")]);

        assert_eq!(names(&rows), vec!["id", "title"]);
        assert_eq!(text(&rows, 1, "name").unwrap(), "title");
        assert_eq!(number(&rows, 0, "size"), None);
        assert_eq!(number(&rows, 1, "size"), Some(255));
        assert!(matches!(text(&rows, 0, "kind"), Err(SchemaError::Catalog(_))));
    }
}
