//! Database connections and project configuration for sqlmill.
//!
//! This crate turns a `<driver>://<dsn>` URL into a live
//! [`Database`](sqlmill_core::Database) and loads the optional
//! `sqlmill.yml` project file.
//!
//! # Quick start
//!
//! ```
//! use sqlmill_core::{Bindings, Database};
//!
//! let mut db = sqlmill_db::connect("sqlite3://:memory:").unwrap();
//! db.execute("CREATE TABLE t(id INTEGER)", &Bindings::none()).unwrap();
//! let rows = db.query("SELECT count(*) AS n FROM t", &Bindings::none()).unwrap();
//! assert_eq!(rows.columns, vec!["n"]);
//! ```
//!
//! # Feature flags
//!
//! - **`postgres`**: PostgreSQL support through the `postgres` crate.
//! - **`mysql`**: MySQL support through the `mysql` crate.

mod config;
pub mod driver;
mod error;
mod url;

use sqlmill_core::{Database, Driver};
use tracing::info;

pub use config::{CONFIG_FILE, Config, DATABASE_URL_ENV, ModelConfig};
pub use driver::sqlite::SqliteDatabase;
pub use error::{DbError, Result};
pub use url::DatabaseUrl;

#[cfg(feature = "mysql")]
pub use driver::mysql::MysqlDatabase;
#[cfg(feature = "postgres")]
pub use driver::postgres::PostgresDatabase;

/// Opens a connection for a `<driver>://<dsn>` URL.
///
/// # Errors
///
/// Fails when the URL does not parse, when the driver was not compiled in,
/// or when the driver cannot connect.
pub fn connect(url: &str) -> Result<Box<dyn Database>> {
    open(&DatabaseUrl::parse(url)?)
}

/// Opens a connection for an already parsed URL.
pub fn open(url: &DatabaseUrl) -> Result<Box<dyn Database>> {
    info!(driver = %url.driver, "opening database connection");
    match url.driver {
        Driver::Sqlite3 => Ok(Box::new(SqliteDatabase::open(&url.dsn)?)),
        #[cfg(feature = "postgres")]
        Driver::Postgres => Ok(Box::new(PostgresDatabase::connect(&url.dsn)?)),
        #[cfg(feature = "mysql")]
        Driver::Mysql => Ok(Box::new(MysqlDatabase::connect(&url.dsn)?)),
        #[allow(unreachable_patterns)]
        driver => Err(DbError::DriverNotEnabled(driver)),
    }
}
