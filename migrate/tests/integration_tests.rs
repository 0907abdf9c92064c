//! Integration tests for the sqlmill-migrate crate.

use std::path::Path;

use sqlmill_core::fs::FILE_MODE;
use sqlmill_core::{Bindings, Database, DirFs, FileSystem, MemFs};
use sqlmill_db::SqliteDatabase;
use sqlmill_migrate::{Executor, MigrationError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SCHEMA: &str = "\
-- name: up
CREATE TABLE users (
 id INTEGER PRIMARY KEY,
 name TEXT NOT NULL
);

-- name: down
DROP TABLE users;
";

const TRIGGER: &str = "\
-- name: up
CREATE TABLE audit (id INTEGER PRIMARY KEY, user_id INTEGER);
GO
CREATE TRIGGER users_audit AFTER INSERT ON users
BEGIN
 INSERT INTO audit (user_id) VALUES (new.id);
END;

-- name: down
DROP TRIGGER users_audit;
GO
DROP TABLE audit;
";

fn write(fs: &dyn FileSystem, name: &str, body: &str) {
    fs.write_file(Path::new(name), body.as_bytes(), FILE_MODE)
        .unwrap();
}

fn ledger_ids(db: &mut dyn Database) -> Vec<String> {
    db.query("SELECT id FROM migrations ORDER BY id", &Bindings::none())
        .unwrap()
        .rows
        .into_iter()
        .map(|row| row[0].to_string())
        .collect()
}

fn tables(db: &mut dyn Database) -> Vec<String> {
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

/// A migration that records its own name into `events` on up and down.
fn recording(name: &str) -> String {
    format!(
        "-- name: up\nINSERT INTO events (name) VALUES ('up {name}');\n\n-- name: down\nINSERT INTO events (name) VALUES ('down {name}');\n"
    )
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn test_setup_twice_writes_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let fs = DirFs::new(dir.path());
    let mut db = SqliteDatabase::in_memory().unwrap();
    let executor = Executor::new(&fs, &mut db);

    assert!(executor.setup().unwrap());
    let first = std::fs::read_to_string(dir.path().join("00010101000000_setup.sql")).unwrap();
    assert!(!executor.setup().unwrap());

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec!["00010101000000_setup.sql"]);
    let second = std::fs::read_to_string(dir.path().join("00010101000000_setup.sql")).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Apply and revert
// ---------------------------------------------------------------------------

#[test]
fn test_apply_all_then_revert_two() {
    let fs = MemFs::new();
    write(&fs, "20060102150405_schema.sql", SCHEMA);
    write(&fs, "20070102150405_trigger.sql", TRIGGER);
    let mut db = SqliteDatabase::in_memory().unwrap();

    {
        let mut executor = Executor::new(&fs, &mut db);
        executor.setup().unwrap();
        assert_eq!(executor.run(-1).unwrap(), 3);
        assert_eq!(executor.run(-1).unwrap(), 0);
    }
    assert_eq!(
        ledger_ids(&mut db),
        vec!["00010101000000", "20060102150405", "20070102150405"]
    );
    assert_eq!(tables(&mut db), vec!["audit", "migrations", "users"]);

    {
        let mut executor = Executor::new(&fs, &mut db);
        assert_eq!(executor.revert(2).unwrap(), 2);
    }
    assert_eq!(ledger_ids(&mut db), vec!["00010101000000"]);
    assert_eq!(tables(&mut db), vec!["migrations"]);
}

#[test]
fn test_run_count_applies_oldest_first() {
    let fs = MemFs::new();
    write(&fs, "20060102150405_schema.sql", SCHEMA);
    write(&fs, "20070102150405_trigger.sql", TRIGGER);
    let mut db = SqliteDatabase::in_memory().unwrap();
    let mut executor = Executor::new(&fs, &mut db);
    executor.setup().unwrap();

    assert_eq!(executor.run(2).unwrap(), 2);
    let status = executor.status().unwrap();
    assert_eq!((status.applied, status.pending), (2, 1));
    assert!(status.migrations[2].is_pending());
    assert_eq!(status.migrations[2].id, "20070102150405");
}

#[test]
fn test_apply_and_revert_order() {
    let fs = MemFs::new();
    write(
        &fs,
        "00010101000000_setup.sql",
        "-- name: up\nCREATE TABLE migrations (id VARCHAR(15) NOT NULL PRIMARY KEY, description TEXT NOT NULL, created_at TIMESTAMP NOT NULL);\nGO\nCREATE TABLE events (seq INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);\n\n-- name: down\nDROP TABLE migrations;\n",
    );
    write(&fs, "20080102150405_third.sql", &recording("c"));
    write(&fs, "20060102150405_first.sql", &recording("a"));
    write(&fs, "20070102150405_second.sql", &recording("b"));
    let mut db = SqliteDatabase::in_memory().unwrap();

    {
        let mut executor = Executor::new(&fs, &mut db);
        assert_eq!(executor.run(-1).unwrap(), 4);
        assert_eq!(executor.revert(3).unwrap(), 3);
    }

    let events: Vec<String> = db
        .query("SELECT name FROM events ORDER BY seq", &Bindings::none())
        .unwrap()
        .rows
        .into_iter()
        .map(|row| row[0].to_string())
        .collect();
    assert_eq!(events, vec!["up a", "up b", "up c", "down c", "down b", "down a"]);
}

#[test]
fn test_create_apply_revert_round_trip() {
    let fs = MemFs::new();
    let mut db = SqliteDatabase::in_memory().unwrap();
    let mut executor = Executor::new(&fs, &mut db);
    executor.setup().unwrap();
    executor.run(-1).unwrap();

    let created = executor.create("x").unwrap();
    write(
        &fs,
        &created.filename(),
        "-- name: up\nCREATE TABLE x(id INT);\n\n-- name: down\nDROP TABLE x;\n",
    );
    assert_eq!(executor.run(-1).unwrap(), 1);
    assert_eq!(executor.revert(1).unwrap(), 1);

    assert_eq!(ledger_ids(&mut db), vec!["00010101000000"]);
    assert_eq!(tables(&mut db), vec!["migrations"]);
}

#[test]
fn test_skeleton_migration_applies_as_no_op() {
    let fs = MemFs::new();
    let mut db = SqliteDatabase::in_memory().unwrap();
    let mut executor = Executor::new(&fs, &mut db);
    executor.setup().unwrap();
    let created = executor.create("empty step").unwrap();

    assert_eq!(executor.run(-1).unwrap(), 2);
    let status = executor.status().unwrap();
    assert!(status.migrations.iter().all(|m| m.is_applied()));
    assert_eq!(status.migrations[1].id, created.id);
}

#[test]
fn test_revert_setup_drops_ledger() {
    let fs = MemFs::new();
    let mut db = SqliteDatabase::in_memory().unwrap();
    {
        let mut executor = Executor::new(&fs, &mut db);
        executor.setup().unwrap();
        executor.run(-1).unwrap();
        assert_eq!(executor.revert(-1).unwrap(), 1);

        let status = executor.status().unwrap();
        assert_eq!((status.applied, status.pending), (0, 1));
    }
    assert!(tables(&mut db).is_empty());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_go_split_failure_rolls_back_everything() {
    let fs = MemFs::new();
    write(
        &fs,
        "20060102150405_pair.sql",
        "-- name: up\nCREATE TABLE a(id INT);\nGO\nCREATE TABLE b(id INT);\n\n-- name: down\nDROP TABLE b;\nGO\nDROP TABLE a;\n",
    );
    let mut db = SqliteDatabase::in_memory().unwrap();
    db.execute("CREATE TABLE b(id INT)", &Bindings::none())
        .unwrap();

    {
        let mut executor = Executor::new(&fs, &mut db);
        executor.setup().unwrap();
        let err = executor.run(-1).unwrap_err();
        assert_eq!(err.completed, 1);
        match &err.source {
            MigrationError::Statement { statement, .. } => {
                assert_eq!(statement, "CREATE TABLE b(id INT);");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(tables(&mut db), vec!["b", "migrations"]);
    assert_eq!(ledger_ids(&mut db), vec!["00010101000000"]);
}

#[test]
fn test_ledger_row_without_file_is_drift() {
    let fs = MemFs::new();
    let mut db = SqliteDatabase::in_memory().unwrap();
    {
        let mut executor = Executor::new(&fs, &mut db);
        executor.setup().unwrap();
        executor.run(-1).unwrap();
    }
    db.execute(
        "INSERT INTO migrations VALUES ('20090102150405', 'gone', '2009-01-02 15:04:05')",
        &Bindings::none(),
    )
    .unwrap();

    let mut executor = Executor::new(&fs, &mut db);
    let err = executor.migrations().unwrap_err();
    assert!(err.to_string().contains("'20090102150405'"), "{err}");
    assert_eq!(executor.run(-1).unwrap_err().completed, 0);
}

#[test]
fn test_renamed_file_is_description_drift() {
    let fs = MemFs::new();
    write(&fs, "20060102150405_schema.sql", SCHEMA);
    let mut db = SqliteDatabase::in_memory().unwrap();
    let mut executor = Executor::new(&fs, &mut db);
    executor.setup().unwrap();
    executor.run(-1).unwrap();

    fs.remove(Path::new("20060102150405_schema.sql")).unwrap();
    write(&fs, "20060102150405_tables.sql", SCHEMA);
    let err = executor.migrations().unwrap_err();
    assert_eq!(
        err.to_string(),
        "mismatched migration description. Expected: 'schema' but has 'tables'"
    );
}

#[test]
fn test_missing_down_routine() {
    let fs = MemFs::new();
    write(
        &fs,
        "20060102150405_oneway.sql",
        "-- name: up\nCREATE TABLE t(id INT);\n",
    );
    let mut db = SqliteDatabase::in_memory().unwrap();
    let mut executor = Executor::new(&fs, &mut db);
    executor.setup().unwrap();
    executor.run(-1).unwrap();

    let err = executor.revert(1).unwrap_err();
    assert_eq!(err.completed, 0);
    assert_eq!(
        err.to_string(),
        "routine 'down' not found for migration '20060102150405'"
    );
}

// ---------------------------------------------------------------------------
// Driver-specific files
// ---------------------------------------------------------------------------

#[test]
fn test_driver_specific_files() {
    let fs = MemFs::new();
    write(&fs, "20060102150405_schema.sql", SCHEMA);
    write(
        &fs,
        "20060102150405_schema_sqlite3.sql",
        "-- name: up\nCREATE INDEX users_name ON users (name);\n\n-- name: down\nDROP INDEX users_name;\n",
    );
    write(
        &fs,
        "20070102150405_extensions_postgres.sql",
        "-- name: up\nCREATE EXTENSION hstore;\n\n-- name: down\nDROP EXTENSION hstore;\n",
    );
    let mut db = SqliteDatabase::in_memory().unwrap();
    let mut executor = Executor::new(&fs, &mut db);
    executor.setup().unwrap();

    let migrations = executor.migrations().unwrap();
    assert_eq!(migrations.len(), 2);
    assert_eq!(
        migrations[1].filenames(),
        vec!["20060102150405_schema.sql", "20060102150405_schema_sqlite3.sql"]
    );

    assert_eq!(executor.run(-1).unwrap(), 2);
    assert_eq!(executor.revert(1).unwrap(), 1);
}
