//! Named SQL routines and the database port shared by every sqlmill crate.
//!
//! This crate holds the pieces that work on text and a prepared connection:
//!
//! - [`fs`]: rooted filesystem access ([`DirFs`], [`MemFs`]).
//! - [`scanner`]: parsing of `-- name:` tagged SQL and `GO` splitting.
//! - [`Provider`]: a repository of routines loaded from a directory tree.
//! - [`Query`]: a routine body bound to positional, named, or raw
//!   parameters, ready to [`prepare`](Query::prepare).
//! - [`Runner`]: resolves and runs a routine by name.
//! - [`Database`]: the connection port concrete drivers implement, with
//!   [`bind::compile`] translating `:name` markers for each dialect.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use sqlmill_core::fs::{FileSystem, MemFs, FILE_MODE};
//! use sqlmill_core::{Provider, Value};
//!
//! let fs = MemFs::new();
//! fs.write_file(
//!     Path::new("users.sql"),
//!     b"-- name: find-user\nSELECT * FROM users WHERE id = ?\n",
//!     FILE_MODE,
//! )
//! .unwrap();
//!
//! let provider = Provider::new();
//! assert_eq!(provider.read_dir(&fs).unwrap(), 1);
//!
//! let prepared = provider.query("find-user", vec![Value::from(1)]).unwrap().prepare();
//! assert_eq!(prepared.sql, "SELECT * FROM users WHERE id = :arg0");
//! ```

pub mod bind;
mod database;
mod error;
pub mod fs;
pub mod params;
mod provider;
mod runner;
pub mod scanner;
mod statement;
mod value;

pub use database::{
    Bindings, Database, Driver, DriverError, DriverErrorKind, PlaceholderStyle, Transaction,
    UnknownDriver,
};
pub use error::{CoreError, Result};
pub use fs::{DirFs, FileSystem, MemFs};
pub use provider::Provider;
pub use runner::{Runner, print};
pub use statement::{Prepared, Query};
pub use value::{Params, RowSet, TIMESTAMP_FORMAT, Value};
