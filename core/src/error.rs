//! Error types for routine loading, statement preparation, and execution.

use thiserror::Error;

use crate::database::DriverError;

/// Errors that can occur while loading or running named routines.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Filesystem failure, surfaced as reported by the operating system.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Two routines share a name across the loaded files.
    #[error("query '{0}' already exists")]
    DuplicateRoutine(String),

    /// No routine with the requested name was loaded.
    #[error("routine '{0}' not found")]
    RoutineNotFound(String),

    /// A record could not be mapped to named parameters.
    #[error("cannot bind parameters: {0}")]
    Binding(String),

    /// Failure reported by the database driver.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Convenience alias for results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
