//! Database URLs.
//!
//! A URL has the form `<driver>://<dsn>`. What each driver receives:
//!
//! | Driver     | Example                              | Passed to the driver        |
//! |------------|--------------------------------------|-----------------------------|
//! | `sqlite3`  | `sqlite3://app.db`                   | `app.db`                    |
//! | `postgres` | `postgres://u:p@localhost/app`       | the whole URL               |
//! | `mysql`    | `mysql://u:p@localhost:3306/app`     | the whole URL               |

use std::fmt;

use sqlmill_core::Driver;

use crate::error::{DbError, Result};

/// A parsed `<driver>://<dsn>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUrl {
    pub driver: Driver,
    /// Connection string in the form the driver expects.
    pub dsn: String,
}

impl DatabaseUrl {
    /// Parses a database URL.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidUrl`] when `url` has no `://` separator or
    /// an empty DSN, and [`DbError::UnknownDriver`] for an unsupported
    /// scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlmill_core::Driver;
    /// use sqlmill_db::DatabaseUrl;
    ///
    /// let url = DatabaseUrl::parse("sqlite3://:memory:").unwrap();
    /// assert_eq!(url.driver, Driver::Sqlite3);
    /// assert_eq!(url.dsn, ":memory:");
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| DbError::InvalidUrl(url.to_string()))?;
        if rest.is_empty() {
            return Err(DbError::InvalidUrl(url.to_string()));
        }

        let driver: Driver = scheme.parse()?;
        let dsn = match driver {
            Driver::Sqlite3 => rest.to_string(),
            Driver::Postgres | Driver::Mysql => url.to_string(),
        };
        Ok(Self { driver, dsn })
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.driver {
            Driver::Sqlite3 => write!(f, "{}://{}", self.driver, self.dsn),
            Driver::Postgres | Driver::Mysql => f.write_str(&self.dsn),
        }
    }
}
