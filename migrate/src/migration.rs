//! The migration record and its file name grammar.
//!
//! Migration files are named `<id>_<description>[_<driver>].sql`:
//!
//! - `id` is a UTC timestamp `YYYYMMDDHHMMSS` and fixes the apply order.
//! - `description` is a snake_case label.
//! - `driver`, when present, is one of `sqlite3`, `postgres`, `mysql` and
//!   restricts the file to that dialect. Without it the file applies to
//!   every dialect.
//!
//! Several files may share one id (for example a portable file plus a
//! dialect-specific one); they form a single logical migration.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use sqlmill_migrate::Migration;
//!
//! let m = Migration::parse(Path::new("20060102150405_create_users_postgres.sql")).unwrap();
//! assert_eq!(m.id, "20060102150405");
//! assert_eq!(m.description, "create_users");
//! assert!(m.drivers.contains("postgres"));
//! assert_eq!(m.filenames(), vec!["20060102150405_create_users_postgres.sql"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use sqlmill_core::Driver;

use crate::error::{MigrationError, Result};

/// Driver tag meaning "every dialect".
pub const ANY_DRIVER: &str = "sql";

/// Layout of a migration id.
pub const ID_FORMAT: &str = "%Y%m%d%H%M%S";

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{14}$").expect("static regex must compile"));

/// One logical migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: String,
    pub description: String,
    /// Dialect tags of the files making up this migration.
    pub drivers: BTreeSet<String>,
    /// When the migration was applied; `None` while pending.
    pub created_at: Option<DateTime<Utc>>,
}

impl Migration {
    /// A pending migration that applies to every dialect.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            drivers: BTreeSet::from([ANY_DRIVER.to_string()]),
            created_at: None,
        }
    }

    /// Parses a migration file name.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidFileName`] when the name does not
    /// follow `<id>_<description>[_<driver>].sql` or the id is not a valid
    /// timestamp.
    pub fn parse(path: &Path) -> Result<Self> {
        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let invalid = || MigrationError::InvalidFileName(basename.clone());

        let stem = basename.strip_suffix(".sql").ok_or_else(invalid)?;
        let (id, rest) = stem.split_once('_').ok_or_else(invalid)?;
        if !ID_RE.is_match(id) || NaiveDateTime::parse_from_str(id, ID_FORMAT).is_err() {
            return Err(invalid());
        }

        let (description, driver) = match rest.rsplit_once('_') {
            Some((description, driver)) if Driver::ALL.iter().any(|d| d.name() == driver) => {
                (description, driver)
            }
            _ => (rest, ANY_DRIVER),
        };
        if description.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            id: id.to_string(),
            description: description.to_string(),
            drivers: BTreeSet::from([driver.to_string()]),
            created_at: None,
        })
    }

    /// File name of the portable variant, `<id>_<description>.sql`.
    pub fn filename(&self) -> String {
        format!("{}_{}.sql", self.id, self.description)
    }

    /// One file name per driver tag, sorted.
    ///
    /// The portable file sorts before dialect-specific ones.
    pub fn filenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .drivers
            .iter()
            .map(|driver| {
                if driver == ANY_DRIVER {
                    self.filename()
                } else {
                    format!("{}_{}_{}.sql", self.id, self.description, driver)
                }
            })
            .collect();
        names.sort();
        names
    }

    /// Returns `true` if some file of this migration targets `driver`.
    pub fn supports(&self, driver: Driver) -> bool {
        self.drivers.contains(ANY_DRIVER) || self.drivers.contains(driver.name())
    }

    pub fn is_pending(&self) -> bool {
        self.created_at.is_none()
    }

    pub fn is_applied(&self) -> bool {
        self.created_at.is_some()
    }
}

/// Merges migrations sharing an id and sorts the result by id.
///
/// # Errors
///
/// Two files with the same id but different descriptions make the later
/// file's name invalid.
pub fn merge(migrations: impl IntoIterator<Item = Migration>) -> Result<Vec<Migration>> {
    let mut by_id: BTreeMap<String, Migration> = BTreeMap::new();
    for migration in migrations {
        match by_id.get_mut(&migration.id) {
            Some(existing) => {
                if existing.description != migration.description {
                    let name = migration.filenames().into_iter().next().unwrap_or_default();
                    return Err(MigrationError::InvalidFileName(name));
                }
                existing.drivers.extend(migration.drivers);
            }
            None => {
                by_id.insert(migration.id.clone(), migration);
            }
        }
    }
    Ok(by_id.into_values().collect())
}
