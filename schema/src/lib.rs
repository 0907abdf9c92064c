//! Schema introspection and code generation.
//!
//! [`introspect::load`] reads tables from a live connection into a
//! [`Schema`] tree. Two generators consume it: [`codegen`] emits Rust
//! record types and [`query`] emits named CRUD routines in tagged SQL.
//!
//! # Example
//!
//! ```
//! use sqlmill_core::Database;
//! use sqlmill_core::Bindings;
//! use sqlmill_db::SqliteDatabase;
//! use sqlmill_schema::introspect::{self, Selection};
//! use sqlmill_schema::query::{self, QueryOptions};
//!
//! let mut db = SqliteDatabase::in_memory().unwrap();
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &Bindings::none())
//!     .unwrap();
//!
//! let schema = introspect::load(&mut db, &Selection::default()).unwrap();
//! assert_eq!(schema.tables[0].model.type_name, "User");
//!
//! let sql = query::generate(&schema, &QueryOptions::default());
//! assert!(sql.contains("-- name: select-user-by-pk"));
//! ```

pub mod codegen;
mod error;
pub mod inflect;
pub mod introspect;
mod model;
pub mod query;
pub mod tags;
pub mod types;

pub use error::{Result, SchemaError};
pub use model::{Column, ColumnModel, ColumnType, Schema, Table, TableModel};
pub use tags::{OrmType, Tag};
