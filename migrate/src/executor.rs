//! Orchestration of setup, create, run and revert.
//!
//! Each migration moves `pending -> applied` on [`Executor::run`] and back
//! on [`Executor::revert`]. Apply order is ascending by id, revert order
//! descending. The statements of one migration run in a single
//! transaction; the ledger row is written after that transaction commits.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlmill_core::fs::{FILE_MODE, OpenFlags};
use sqlmill_core::{Database, FileSystem};
use tracing::{debug, info};

use crate::error::{Interrupted, MigrationError, Result};
use crate::migration::{ID_FORMAT, Migration};
use crate::provider::Provider;
use crate::runner::Runner;
use crate::template::{self, SETUP_DESCRIPTION, SETUP_ID};

/// Drives migrations in a directory against one connection.
pub struct Executor<'a> {
    fs: &'a dyn FileSystem,
    db: &'a mut dyn Database,
}

/// Snapshot of the migration directory and the ledger.
#[derive(Debug, Clone)]
pub struct Status {
    /// Every migration on disk for this driver, ascending by id.
    pub migrations: Vec<Migration>,
    /// Number of applied migrations.
    pub applied: usize,
    /// Number of pending migrations.
    pub pending: usize,
}

impl<'a> Executor<'a> {
    pub fn new(fs: &'a dyn FileSystem, db: &'a mut dyn Database) -> Self {
        Self { fs, db }
    }

    /// Writes `00010101000000_setup.sql` unless it already exists.
    ///
    /// Returns `true` when the file was written. The migration is not
    /// applied; [`run`](Self::run) picks it up like any other.
    pub fn setup(&self) -> Result<bool> {
        let migration = Migration::new(SETUP_ID, SETUP_DESCRIPTION);
        let written = self.write_new(&migration, &template::setup(Utc::now()))?;
        if !written {
            debug!(migration = %migration.id, "setup migration already exists");
        }
        Ok(written)
    }

    /// Creates a skeleton migration named after `name`.
    ///
    /// # Errors
    ///
    /// [`MigrationError::InvalidName`] when `name` has no usable characters,
    /// [`MigrationError::AlreadyExists`] when a migration with the new id is
    /// already on disk.
    pub fn create(&self, name: &str) -> Result<Migration> {
        let description = template::slugify(name);
        if description.is_empty() {
            return Err(MigrationError::InvalidName(name.to_string()));
        }

        let now = Utc::now();
        let migration = Migration::new(now.format(ID_FORMAT).to_string(), description);
        if self.id_taken(&migration.id)? {
            return Err(MigrationError::AlreadyExists(migration.id));
        }
        if !self.write_new(&migration, &template::skeleton(now))? {
            return Err(MigrationError::AlreadyExists(migration.filename()));
        }

        info!(migration = %migration.id, file = %migration.filename(), "created migration");
        Ok(migration)
    }

    /// Applies up to `step` pending migrations in ascending id order; a
    /// negative `step` applies all of them.
    ///
    /// Returns the number applied. On failure the error carries how many
    /// were applied before it.
    pub fn run(&mut self, step: i64) -> std::result::Result<usize, Interrupted> {
        let migrations = self.migrations().map_err(|err| Interrupted::new(0, err))?;
        let provider = Provider::new(self.fs);
        let runner = Runner::new(self.fs);

        let mut applied = 0;
        for mut migration in migrations
            .into_iter()
            .filter(Migration::is_pending)
            .take(limit(step))
        {
            info!(migration = %migration.id, description = %migration.description, "applying");
            runner
                .run(self.db, &migration)
                .and_then(|()| provider.insert(self.db, &mut migration))
                .map_err(|err| Interrupted::new(applied, err))?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Reverts up to `step` applied migrations in descending id order; a
    /// negative `step` reverts all of them.
    pub fn revert(&mut self, step: i64) -> std::result::Result<usize, Interrupted> {
        let migrations = self.migrations().map_err(|err| Interrupted::new(0, err))?;
        let provider = Provider::new(self.fs);
        let runner = Runner::new(self.fs);

        let mut reverted = 0;
        for migration in migrations
            .into_iter()
            .rev()
            .filter(Migration::is_applied)
            .take(limit(step))
        {
            info!(migration = %migration.id, description = %migration.description, "reverting");
            runner
                .revert(self.db, &migration)
                .and_then(|()| forget(&provider, self.db, &migration))
                .map_err(|err| Interrupted::new(reverted, err))?;
            reverted += 1;
        }
        Ok(reverted)
    }

    /// Every migration on disk, merged with the ledger.
    pub fn migrations(&mut self) -> Result<Vec<Migration>> {
        Provider::new(self.fs).migrations(self.db)
    }

    /// Counts of applied and pending migrations.
    pub fn status(&mut self) -> Result<Status> {
        let migrations = self.migrations()?;
        let applied = migrations.iter().filter(|m| m.is_applied()).count();
        Ok(Status {
            pending: migrations.len() - applied,
            applied,
            migrations,
        })
    }

    fn id_taken(&self, id: &str) -> Result<bool> {
        let prefix = format!("{id}_");
        let mut taken = false;
        self.fs.walk(Path::new(""), &mut |path, info| {
            let top_level = path.parent().is_some_and(|p| p.as_os_str().is_empty());
            if top_level && info.is_file() && info.name.starts_with(&prefix) {
                taken = true;
            }
            Ok(())
        })?;
        Ok(taken)
    }

    /// Returns `false` when the file is already there.
    fn write_new(&self, migration: &Migration, body: &str) -> Result<bool> {
        let path = PathBuf::from(migration.filename());
        let mut file = match self.fs.open_file(&path, OpenFlags::create_new(), FILE_MODE) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        file.write_all(body.as_bytes())?;
        file.flush()?;
        Ok(true)
    }
}

fn limit(step: i64) -> usize {
    usize::try_from(step).unwrap_or(usize::MAX)
}

/// Deletes the ledger row; a row or table that is already gone counts as
/// success, since reverting setup drops the ledger itself.
fn forget(provider: &Provider<'_>, db: &mut dyn Database, migration: &Migration) -> Result<()> {
    match provider.delete(db, migration) {
        Err(MigrationError::Driver(err)) if err.is_no_rows() || err.is_undefined_table() => {
            debug!(migration = %migration.id, "ledger row already gone");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use sqlmill_core::MemFs;
    use sqlmill_db::SqliteDatabase;

    use super::*;

    #[test]
    fn test_limit() {
        assert_eq!(limit(-1), usize::MAX);
        assert_eq!(limit(0), 0);
        assert_eq!(limit(3), 3);
    }

    #[test]
    fn test_setup_is_idempotent() {
        let fs = MemFs::new();
        let mut db = SqliteDatabase::in_memory().unwrap();
        let executor = Executor::new(&fs, &mut db);

        assert!(executor.setup().unwrap());
        assert!(!executor.setup().unwrap());
        assert_eq!(fs.files(), vec![Path::new("00010101000000_setup.sql")]);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let fs = MemFs::new();
        let mut db = SqliteDatabase::in_memory().unwrap();
        let err = Executor::new(&fs, &mut db).create("--").unwrap_err();
        assert_eq!(err.to_string(), "migration name '--' is invalid");
    }

    #[test]
    fn test_create_writes_skeleton() {
        let fs = MemFs::new();
        let mut db = SqliteDatabase::in_memory().unwrap();
        let migration = Executor::new(&fs, &mut db).create("Add Users").unwrap();

        assert_eq!(migration.description, "add_users");
        let body = fs.read_to_string(Path::new(&migration.filename())).unwrap();
        assert!(body.contains("-- name: up\n"));
        assert!(body.contains("-- name: down\n"));
    }

    #[test]
    fn test_revert_with_nothing_applied() {
        let fs = MemFs::new();
        let mut db = SqliteDatabase::in_memory().unwrap();
        let mut executor = Executor::new(&fs, &mut db);
        executor.setup().unwrap();
        assert_eq!(executor.revert(-1).unwrap(), 0);
    }
}
