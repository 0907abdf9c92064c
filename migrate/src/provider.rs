//! Reconciling migration files with the ledger table.
//!
//! The files are the source of truth for which migrations exist; the
//! ledger only says which of them have been applied and when. Both views
//! are sorted by id and walked in lock-step: any disagreement on id or
//! description up to the ledger's length is a drift error, and files past
//! the end of the ledger are pending.

use std::path::{Path, PathBuf};

use chrono::{SubsecRound, Utc};
use sqlmill_core::{Database, FileSystem, Query, RowSet, Value};
use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::migration::{self, Migration};
use crate::template::LEDGER_TABLE;

/// Reads migrations from a directory and from the ledger.
pub struct Provider<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> Provider<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Migrations on disk that apply to the connection's driver, sorted by id.
    ///
    /// Only `.sql` files at the top of the directory are considered.
    pub fn from_files(&self, db: &dyn Database) -> Result<Vec<Migration>> {
        let driver = db.driver();
        let mut paths: Vec<PathBuf> = Vec::new();
        self.fs.walk(Path::new(""), &mut |path, info| {
            let top_level = path.parent().is_some_and(|p| p.as_os_str().is_empty());
            if info.is_file() && top_level && path.extension().is_some_and(|ext| ext == "sql") {
                paths.push(path.to_path_buf());
            }
            Ok(())
        })?;

        let mut parsed = Vec::with_capacity(paths.len());
        for path in &paths {
            let migration = Migration::parse(path)?;
            if migration.supports(driver) {
                parsed.push(migration);
            } else {
                debug!(file = %path.display(), driver = %driver, "skipping migration for another driver");
            }
        }
        migration::merge(parsed)
    }

    /// Rows of the ledger table, sorted by id. A missing table is an empty
    /// ledger.
    pub fn from_ledger(&self, db: &mut dyn Database) -> Result<Vec<Migration>> {
        let query = Query::sql(
            format!("SELECT id, description, created_at FROM {LEDGER_TABLE} ORDER BY id ASC"),
            Vec::new(),
        )
        .prepare();
        let rows = match db.query(&query.sql, &query.bindings) {
            Ok(rows) => rows,
            Err(err) if err.is_undefined_table() => {
                debug!("ledger table does not exist yet");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        ledger_rows(&rows)
    }

    /// Every migration on disk, with `created_at` filled in from the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Mismatch`] when the ledger and the files
    /// disagree.
    pub fn migrations(&self, db: &mut dyn Database) -> Result<Vec<Migration>> {
        let mut files = self.from_files(db)?;
        let ledger = self.from_ledger(db)?;

        for (i, applied) in ledger.into_iter().enumerate() {
            let Some(local) = files.get_mut(i) else {
                return Err(MigrationError::Mismatch {
                    field: "id",
                    expected: applied.id,
                    actual: String::new(),
                });
            };
            if local.id != applied.id {
                return Err(MigrationError::Mismatch {
                    field: "id",
                    expected: applied.id,
                    actual: local.id.clone(),
                });
            }
            if local.description != applied.description {
                return Err(MigrationError::Mismatch {
                    field: "description",
                    expected: applied.description,
                    actual: local.description.clone(),
                });
            }
            local.created_at = applied.created_at;
        }

        Ok(files)
    }

    /// Records `migration` as applied now.
    pub fn insert(&self, db: &mut dyn Database, migration: &mut Migration) -> Result<()> {
        let now = Utc::now().trunc_subsecs(0);
        let query = Query::sql(
            format!("INSERT INTO {LEDGER_TABLE} (id, description, created_at) VALUES (?, ?, ?)"),
            vec![
                Value::from(migration.id.as_str()),
                Value::from(migration.description.as_str()),
                Value::Timestamp(now),
            ],
        )
        .prepare();
        db.execute(&query.sql, &query.bindings)?;
        migration.created_at = Some(now);
        Ok(())
    }

    /// Removes the ledger row of `migration`.
    ///
    /// # Errors
    ///
    /// A driver error of kind `NoRows` when no row matched.
    pub fn delete(&self, db: &mut dyn Database, migration: &Migration) -> Result<()> {
        let query = Query::sql(
            format!("DELETE FROM {LEDGER_TABLE} WHERE id = ?"),
            vec![Value::from(migration.id.as_str())],
        )
        .prepare();
        let affected = db.execute(&query.sql, &query.bindings)?;
        if affected == 0 {
            return Err(sqlmill_core::DriverError::new(
                sqlmill_core::DriverErrorKind::NoRows,
                format!("no ledger row for migration '{}'", migration.id),
            )
            .into());
        }
        Ok(())
    }

    /// Returns `true` if the ledger has a row for `migration`.
    pub fn exists(&self, db: &mut dyn Database, migration: &Migration) -> Result<bool> {
        let query = Query::sql(
            format!("SELECT id FROM {LEDGER_TABLE} WHERE id = ?"),
            vec![Value::from(migration.id.as_str())],
        )
        .prepare();
        Ok(!db.query(&query.sql, &query.bindings)?.is_empty())
    }
}

fn ledger_rows(rows: &RowSet) -> Result<Vec<Migration>> {
    let mut migrations = Vec::with_capacity(rows.len());
    for i in 0..rows.len() {
        let text = |column: &str| rows.get(i, column).map(Value::to_string).unwrap_or_default();
        let id = text("id");
        let created_at = rows
            .get(i, "created_at")
            .and_then(Value::as_timestamp)
            .ok_or_else(|| MigrationError::Ledger {
                id: id.clone(),
                column: "created_at",
            })?;

        let mut migration = Migration::new(id, text("description"));
        migration.created_at = Some(created_at);
        migrations.push(migration);
    }
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use sqlmill_core::fs::{FILE_MODE, MemFs};
    use sqlmill_core::{Bindings, DriverErrorKind};
    use sqlmill_db::SqliteDatabase;

    use super::*;

    const LEDGER_DDL: &str = "CREATE TABLE migrations (id VARCHAR(15) NOT NULL PRIMARY KEY, description TEXT NOT NULL, created_at TIMESTAMP NOT NULL)";

    fn files(names: &[&str]) -> MemFs {
        let fs = MemFs::new();
        for name in names {
            fs.write_file(Path::new(name), b"-- name: up\nSELECT 1;\n", FILE_MODE)
                .unwrap();
        }
        fs
    }

    fn ledger(db: &mut SqliteDatabase, rows: &[(&str, &str)]) {
        db.execute(LEDGER_DDL, &Bindings::none()).unwrap();
        for (id, description) in rows {
            db.execute(
                &format!("INSERT INTO migrations VALUES ('{id}', '{description}', '2006-01-02 15:04:05')"),
                &Bindings::none(),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_from_files_filters_by_driver() {
        let fs = files(&[
            "20060102150405_schema.sql",
            "20060102150405_schema_sqlite3.sql",
            "20070102150405_trigger_postgres.sql",
            "README.md",
            "nested/20080102150405_ignored.sql",
        ]);
        let db = SqliteDatabase::in_memory().unwrap();
        let migrations = Provider::new(&fs).from_files(&db).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(
            migrations[0].filenames(),
            vec!["20060102150405_schema.sql", "20060102150405_schema_sqlite3.sql"]
        );
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let fs = files(&["20060102150405_schema.sql"]);
        let mut db = SqliteDatabase::in_memory().unwrap();
        let provider = Provider::new(&fs);
        assert!(provider.from_ledger(&mut db).unwrap().is_empty());

        let migrations = provider.migrations(&mut db).unwrap();
        assert_eq!(migrations.len(), 1);
        assert!(migrations[0].is_pending());
    }

    #[test]
    fn test_merge_marks_applied_prefix() {
        let fs = files(&["20060102150405_schema.sql", "20070102150405_trigger.sql"]);
        let mut db = SqliteDatabase::in_memory().unwrap();
        ledger(&mut db, &[("20060102150405", "schema")]);

        let migrations = Provider::new(&fs).migrations(&mut db).unwrap();
        assert!(migrations[0].is_applied());
        assert!(migrations[1].is_pending());
    }

    #[test]
    fn test_ledger_without_file_is_drift() {
        let fs = files(&["20070102150405_trigger.sql"]);
        let mut db = SqliteDatabase::in_memory().unwrap();
        ledger(&mut db, &[("20060102150405", "schema")]);

        let err = Provider::new(&fs).migrations(&mut db).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mismatched migration id. Expected: '20060102150405' but has '20070102150405'"
        );
    }

    #[test]
    fn test_ledger_longer_than_files_is_drift() {
        let fs = files(&["20060102150405_schema.sql"]);
        let mut db = SqliteDatabase::in_memory().unwrap();
        ledger(&mut db, &[("20060102150405", "schema"), ("20070102150405", "trigger")]);

        let err = Provider::new(&fs).migrations(&mut db).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mismatched migration id. Expected: '20070102150405' but has ''"
        );
    }

    #[test]
    fn test_description_drift() {
        let fs = files(&["20060102150405_schema.sql"]);
        let mut db = SqliteDatabase::in_memory().unwrap();
        ledger(&mut db, &[("20060102150405", "tables")]);

        let err = Provider::new(&fs).migrations(&mut db).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mismatched migration description. Expected: 'tables' but has 'schema'"
        );
    }

    #[test]
    fn test_insert_exists_delete() {
        let fs = MemFs::new();
        let mut db = SqliteDatabase::in_memory().unwrap();
        ledger(&mut db, &[]);
        let provider = Provider::new(&fs);

        let mut migration = Migration::new("20060102150405", "schema");
        provider.insert(&mut db, &mut migration).unwrap();
        assert!(migration.is_applied());
        assert!(provider.exists(&mut db, &migration).unwrap());

        let stored = provider.from_ledger(&mut db).unwrap();
        assert_eq!(stored[0].created_at, migration.created_at);

        provider.delete(&mut db, &migration).unwrap();
        assert!(!provider.exists(&mut db, &migration).unwrap());

        let err = provider.delete(&mut db, &migration).unwrap_err();
        assert!(matches!(err, MigrationError::Driver(e) if e.kind() == DriverErrorKind::NoRows));
    }
}
