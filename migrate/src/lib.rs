//! Versioned SQL migrations tracked in a `migrations` ledger table.
//!
//! A migration is a set of `.sql` files sharing a timestamp id, each with
//! an `up` and a `down` routine in the tagged-SQL format of
//! [`sqlmill_core::scanner`]. The [`Executor`] reconciles the files with the
//! ledger through the [`Provider`], then applies or reverts them one
//! transaction at a time with the [`Runner`].
//!
//! # Example
//!
//! ```
//! use sqlmill_core::MemFs;
//! use sqlmill_db::SqliteDatabase;
//! use sqlmill_migrate::Executor;
//!
//! let fs = MemFs::new();
//! let mut db = SqliteDatabase::in_memory().unwrap();
//! let mut executor = Executor::new(&fs, &mut db);
//!
//! executor.setup().unwrap();
//! assert_eq!(executor.run(-1).unwrap(), 1);
//!
//! let status = executor.status().unwrap();
//! assert_eq!((status.applied, status.pending), (1, 0));
//! ```

mod error;
mod executor;
mod migration;
mod provider;
mod runner;
pub mod template;

pub use error::{Interrupted, MigrationError, Result};
pub use executor::{Executor, Status};
pub use migration::{ANY_DRIVER, ID_FORMAT, Migration, merge};
pub use provider::Provider;
pub use runner::Runner;
