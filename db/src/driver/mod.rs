//! Concrete [`Database`](sqlmill_core::Database) implementations.
//!
//! SQLite is always available. PostgreSQL and MySQL are compiled in with
//! the `postgres` and `mysql` cargo features.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;
