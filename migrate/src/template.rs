//! Generated migration files.

use chrono::{DateTime, Utc};
use sqlmill_core::TIMESTAMP_FORMAT;

/// Id of the migration that creates the ledger table.
pub const SETUP_ID: &str = "00010101000000";

/// Description of the ledger migration.
pub const SETUP_DESCRIPTION: &str = "setup";

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

fn header(now: DateTime<Utc>) -> String {
    format!(
        "-- Auto-generated at {}\n-- Please do not change the name attributes\n",
        now.format(TIMESTAMP_FORMAT)
    )
}

/// Body of `00010101000000_setup.sql`.
///
/// `VARCHAR(15)` keeps the DDL valid for every supported dialect.
pub fn setup(now: DateTime<Utc>) -> String {
    format!(
        "{header}
-- name: up
CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
 id VARCHAR(15) NOT NULL PRIMARY KEY,
 description TEXT NOT NULL,
 created_at TIMESTAMP NOT NULL
);

-- name: down
DROP TABLE IF EXISTS {LEDGER_TABLE};
",
        header = header(now)
    )
}

/// Body of a freshly created migration.
pub fn skeleton(now: DateTime<Utc>) -> String {
    format!(
        "{header}
-- name: up
-- Statements applying this migration. Separate them with GO lines.

-- name: down
-- Statements reverting this migration.
",
        header = header(now)
    )
}

/// Turns a free-form name into a snake_case description.
///
/// Word boundaries are runs of non-alphanumeric characters and
/// lower-to-upper case transitions.
pub fn slugify(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.join("_")
}
