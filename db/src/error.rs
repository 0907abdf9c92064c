//! Error types for connecting to databases and loading project configuration.

use sqlmill_core::{Driver, DriverError, UnknownDriver};
use thiserror::Error;

/// Errors that can occur while opening a connection or reading configuration.
#[derive(Debug, Error)]
pub enum DbError {
    /// File I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The project configuration file is not valid YAML for [`Config`](crate::Config).
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// The database URL lacks the `<driver>://` prefix.
    #[error("invalid database url '{0}'")]
    InvalidUrl(String),

    /// The URL names a driver sqlmill does not know.
    #[error(transparent)]
    UnknownDriver(#[from] UnknownDriver),

    /// The driver is known but was not compiled into this build.
    #[error("driver '{0}' is not enabled in this build")]
    DriverNotEnabled(Driver),

    /// The driver refused the connection.
    #[error(transparent)]
    Connect(#[from] DriverError),
}

/// Convenience alias for results with [`DbError`].
pub type Result<T> = std::result::Result<T, DbError>;
