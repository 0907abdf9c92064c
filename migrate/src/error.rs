//! Error types for migration discovery, reconciliation, and execution.

use sqlmill_core::{CoreError, DriverError};
use thiserror::Error;

/// Errors that can occur while managing migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Filesystem failure, surfaced as reported by the operating system.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Routine loading failed while reading a migration file.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Failure reported by the database driver outside a migration body.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A migration file name does not follow `<id>_<description>[_<driver>].sql`.
    #[error("migration '{0}' has an invalid file name")]
    InvalidFileName(String),

    /// `create` was given a name with nothing usable in it.
    #[error("migration name '{0}' is invalid")]
    InvalidName(String),

    /// A migration with the same id is already on disk.
    #[error("migration '{0}' already exists")]
    AlreadyExists(String),

    /// The ledger and the migration files disagree.
    #[error("mismatched migration {field}. Expected: '{expected}' but has '{actual}'")]
    Mismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// A ledger row holds a value that cannot be read back.
    #[error("migration '{id}' has an unreadable {column} in the ledger")]
    Ledger { id: String, column: &'static str },

    /// No file of the migration defines the requested routine.
    #[error("routine '{routine}' not found for migration '{id}'")]
    RoutineNotFound { routine: &'static str, id: String },

    /// A statement failed; the transaction was rolled back.
    #[error("{source}\nstatement: {statement}")]
    Statement {
        statement: String,
        #[source]
        source: DriverError,
    },
}

/// Convenience alias for results with [`MigrationError`].
pub type Result<T> = std::result::Result<T, MigrationError>;

/// A batch run or revert that stopped early.
///
/// `completed` migrations were applied (or reverted) and recorded before
/// `source` occurred.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct Interrupted {
    pub completed: usize,
    #[source]
    pub source: MigrationError,
}

impl Interrupted {
    pub fn new(completed: usize, source: impl Into<MigrationError>) -> Self {
        Self {
            completed,
            source: source.into(),
        }
    }
}
