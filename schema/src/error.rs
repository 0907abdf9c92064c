//! Error types for introspection and code generation.

use sqlmill_core::DriverError;
use thiserror::Error;

/// Errors that can occur while reading a schema or generating code from it.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Filesystem failure while writing generated files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catalog query failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A catalog query returned something that cannot be interpreted.
    #[error("unexpected catalog result: {0}")]
    Catalog(String),

    /// A requested table does not exist in the schema.
    #[error("table '{table}' not found in schema '{schema}'")]
    TableNotFound { schema: String, table: String },

    /// `orm_type` names no known tag set.
    #[error("unsupported orm type '{0}'")]
    UnknownOrmType(String),

    /// A configured tag names no known builder.
    #[error("unsupported tag '{0}'")]
    UnknownTag(String),

    /// The generated model source failed to parse.
    #[error("generated code does not parse: {0}")]
    Syntax(String),
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
