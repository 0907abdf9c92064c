//! The database port.
//!
//! Everything in sqlmill that talks to a database does so through the
//! [`Database`] and [`Transaction`] traits. Concrete drivers live in the
//! `sqlmill-db` crate; tests substitute their own implementations.
//!
//! Drivers receive SQL together with [`Bindings`] and are responsible for
//! turning `:name` markers into their native placeholder style, normally by
//! calling [`compile`](crate::bind::compile).

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::value::{Params, RowSet, Value};

/// The SQL dialects sqlmill understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Driver {
    Sqlite3,
    Postgres,
    Mysql,
}

impl Driver {
    pub const ALL: [Driver; 3] = [Driver::Sqlite3, Driver::Postgres, Driver::Mysql];

    /// The name used in URLs and migration filenames.
    pub fn name(self) -> &'static str {
        match self {
            Driver::Sqlite3 => "sqlite3",
            Driver::Postgres => "postgres",
            Driver::Mysql => "mysql",
        }
    }

    /// Native bind-parameter style of the dialect.
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Driver::Postgres => PlaceholderStyle::Dollar,
            Driver::Sqlite3 | Driver::Mysql => PlaceholderStyle::Question,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Driver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Returned when a driver name is not one of [`Driver::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported driver '{0}'")]
pub struct UnknownDriver(pub String);

impl FromStr for Driver {
    type Err = UnknownDriver;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite3" | "sqlite" => Ok(Driver::Sqlite3),
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" => Ok(Driver::Mysql),
            other => Err(UnknownDriver(other.to_string())),
        }
    }
}

/// How a dialect spells bind parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every parameter (SQLite, MySQL).
    Question,
    /// `$1`, `$2`, ... (PostgreSQL).
    Dollar,
}

/// Parameters accompanying a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Bindings {
    /// Values keyed by name; the SQL uses `:name` markers.
    Named(Params),
    /// Values bound in order to the driver's own placeholders.
    Positional(Vec<Value>),
}

impl Bindings {
    /// No parameters at all. Statements executed this way may contain
    /// several SQL statements.
    pub fn none() -> Self {
        Bindings::Positional(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Bindings::Named(params) => params.is_empty(),
            Bindings::Positional(values) => values.is_empty(),
        }
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Bindings::none()
    }
}

/// Broad classification of driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The statement referenced a table that does not exist.
    UndefinedTable,
    /// A statement expected to touch a row touched none.
    NoRows,
    Other,
}

/// An error reported by a database driver.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Other, message)
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn is_undefined_table(&self) -> bool {
        self.kind == DriverErrorKind::UndefinedTable
    }

    pub fn is_no_rows(&self) -> bool {
        self.kind == DriverErrorKind::NoRows
    }
}

/// A connection to one database.
pub trait Database {
    /// Dialect of the connection.
    fn driver(&self) -> Driver;

    /// Executes a statement and returns the number of affected rows.
    ///
    /// With empty bindings the SQL may hold several statements.
    fn execute(&mut self, sql: &str, bindings: &Bindings) -> Result<u64, DriverError>;

    /// Runs a statement and collects every row it returns.
    fn query(&mut self, sql: &str, bindings: &Bindings) -> Result<RowSet, DriverError>;

    /// Opens a transaction that lives until committed or rolled back.
    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, DriverError>;
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait Transaction {
    fn execute(&mut self, sql: &str, bindings: &Bindings) -> Result<u64, DriverError>;

    fn commit(self: Box<Self>) -> Result<(), DriverError>;

    fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_round_trips_through_name() {
        for driver in Driver::ALL {
            assert_eq!(driver.name().parse::<Driver>(), Ok(driver));
        }
    }

    #[test]
    fn test_unknown_driver_is_rejected() {
        let err = "oracle".parse::<Driver>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported driver 'oracle'");
    }

    #[test]
    fn test_placeholder_styles() {
        assert_eq!(Driver::Postgres.placeholder_style(), PlaceholderStyle::Dollar);
        assert_eq!(Driver::Mysql.placeholder_style(), PlaceholderStyle::Question);
    }
}
