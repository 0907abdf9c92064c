//! Applying and reverting one migration inside a transaction.

use std::io::BufReader;
use std::path::Path;

use sqlmill_core::{Bindings, Database, FileSystem, Provider as RoutineProvider, scanner};
use tracing::{debug, warn};

use crate::error::{MigrationError, Result};
use crate::migration::Migration;

const UP: &str = "up";
const DOWN: &str = "down";

/// Executes the `up` and `down` routines of migration files.
///
/// The runner never touches the ledger; the executor records the outcome.
pub struct Runner<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> Runner<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Runs the `up` routines of every file of `migration`, in filename
    /// order.
    pub fn run(&self, db: &mut dyn Database, migration: &Migration) -> Result<()> {
        let statements = self.statements(migration, UP, migration.filenames())?;
        execute(db, migration, &statements)
    }

    /// Runs the `down` routines in reverse filename order, so
    /// dialect-specific files are torn down before the portable one.
    pub fn revert(&self, db: &mut dyn Database, migration: &Migration) -> Result<()> {
        let mut files = migration.filenames();
        files.reverse();
        let statements = self.statements(migration, DOWN, files)?;
        execute(db, migration, &statements)
    }

    fn statements(
        &self,
        migration: &Migration,
        routine: &'static str,
        files: Vec<String>,
    ) -> Result<Vec<String>> {
        let mut found = false;
        let mut statements = Vec::new();

        for file in files {
            let routines = RoutineProvider::new();
            routines.read_from(BufReader::new(self.fs.open(Path::new(&file))?))?;
            let Ok(body) = routines.get(routine) else {
                debug!(migration = %migration.id, file = %file, routine, "file has no routine");
                continue;
            };
            found = true;
            statements.extend(
                scanner::split(&body)
                    .into_iter()
                    .filter(|statement| !is_comment_only(statement)),
            );
        }

        if !found {
            return Err(MigrationError::RoutineNotFound {
                routine,
                id: migration.id.clone(),
            });
        }
        Ok(statements)
    }
}

fn execute(db: &mut dyn Database, migration: &Migration, statements: &[String]) -> Result<()> {
    let mut tx = db.transaction()?;
    for statement in statements {
        debug!(migration = %migration.id, statement = %statement, "executing");
        if let Err(source) = tx.execute(statement, &Bindings::none()) {
            if let Err(err) = tx.rollback() {
                warn!(migration = %migration.id, error = %err, "rollback failed");
            }
            return Err(MigrationError::Statement {
                statement: statement.clone(),
                source,
            });
        }
    }
    tx.commit()?;
    Ok(())
}

/// Skeleton bodies hold nothing but comments; some drivers reject an
/// empty query, so such chunks are never sent.
fn is_comment_only(statement: &str) -> bool {
    statement
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use sqlmill_core::fs::{FILE_MODE, MemFs};
    use sqlmill_db::SqliteDatabase;

    use super::*;

    fn write(fs: &MemFs, name: &str, body: &str) {
        fs.write_file(Path::new(name), body.as_bytes(), FILE_MODE)
            .unwrap();
    }

    fn tables(db: &mut SqliteDatabase) -> Vec<String> {
        db.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            &Bindings::none(),
        )
        .unwrap()
        .rows
        .into_iter()
        .map(|row| row[0].to_string())
        .collect()
    }

    #[test]
    fn test_run_and_revert() {
        let fs = MemFs::new();
        write(
            &fs,
            "20060102150405_schema.sql",
            "-- name: up\nCREATE TABLE a(id INT);\nGO\nCREATE TABLE b(id INT);\n\n-- name: down\nDROP TABLE b;\nGO\nDROP TABLE a;\n",
        );
        let migration = Migration::new("20060102150405", "schema");
        let mut db = SqliteDatabase::in_memory().unwrap();
        let runner = Runner::new(&fs);

        runner.run(&mut db, &migration).unwrap();
        assert_eq!(tables(&mut db), vec!["a", "b"]);

        runner.revert(&mut db, &migration).unwrap();
        assert!(tables(&mut db).is_empty());
    }

    #[test]
    fn test_failing_statement_rolls_back() {
        let fs = MemFs::new();
        write(
            &fs,
            "20060102150405_schema.sql",
            "-- name: up\nCREATE TABLE a(id INT);\nGO\nCREATE TABLE a(id INT);\n",
        );
        let migration = Migration::new("20060102150405", "schema");
        let mut db = SqliteDatabase::in_memory().unwrap();

        let err = Runner::new(&fs).run(&mut db, &migration).unwrap_err();
        match err {
            MigrationError::Statement { statement, .. } => {
                assert_eq!(statement, "CREATE TABLE a(id INT);");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(tables(&mut db).is_empty());
    }

    #[test]
    fn test_missing_routine() {
        let fs = MemFs::new();
        write(&fs, "20060102150405_schema.sql", "-- name: up\nSELECT 1;\n");
        let migration = Migration::new("20060102150405", "schema");
        let mut db = SqliteDatabase::in_memory().unwrap();

        let err = Runner::new(&fs).revert(&mut db, &migration).unwrap_err();
        assert_eq!(
            err.to_string(),
            "routine 'down' not found for migration '20060102150405'"
        );
    }

    #[test]
    fn test_comment_only_body_is_a_no_op() {
        assert!(is_comment_only("-- nothing here\n\n-- still nothing"));
        assert!(!is_comment_only("-- create\nCREATE TABLE a(id INT);"));

        let fs = MemFs::new();
        write(
            &fs,
            "20060102150405_empty.sql",
            "-- name: up\n-- Statements applying this migration.\n\n-- name: down\n-- Statements reverting this migration.\n",
        );
        let migration = Migration::new("20060102150405", "empty");
        let mut db = SqliteDatabase::in_memory().unwrap();
        Runner::new(&fs).run(&mut db, &migration).unwrap();
    }
}
