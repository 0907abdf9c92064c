//! Tagged-SQL scanning.
//!
//! A routine file is plain SQL in which `-- name: <routine>` comment lines
//! open named sections:
//!
//! ```sql
//! -- name: show-users
//! SELECT * FROM users;
//!
//! -- name: find-user
//! -- looks a user up by primary key
//! SELECT * FROM users WHERE id = ?;
//! ```
//!
//! [`scan`] turns such a stream into `(name, body)` pairs and [`split`]
//! breaks one body into statements at `GO` separator lines.

use std::io::{self, BufRead};
use std::sync::LazyLock;

use regex::Regex;

static NAME_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*--\s*name:\s*(\S+)").expect("static regex must compile"));

static GO_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-*\s*(?i)go[;]*\s*(--.*)?$").expect("static regex must compile")
});

/// Returns the routine name if `line` is a name tag.
pub fn name_tag(line: &str) -> Option<&str> {
    NAME_TAG_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Reads a tagged-SQL stream into `(name, body)` pairs in stream order.
///
/// Body lines are trimmed and joined with `\n`; blank lines at either end of
/// a body are dropped and sections with an empty body yield nothing. Lines
/// before the first tag are ignored. Duplicate names are returned as-is so
/// the caller can decide how to treat them.
pub fn scan<R: BufRead>(reader: R) -> io::Result<Vec<(String, String)>> {
    let mut routines = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in reader.lines() {
        let line = line?;
        if let Some(name) = name_tag(&line) {
            if let Some(section) = current.take() {
                push_section(&mut routines, section);
            }
            current = Some((name.to_string(), Vec::new()));
            continue;
        }
        if let Some((_, lines)) = current.as_mut() {
            lines.push(line.trim().to_string());
        }
    }

    if let Some(section) = current {
        push_section(&mut routines, section);
    }

    Ok(routines)
}

fn push_section(routines: &mut Vec<(String, String)>, (name, lines): (String, Vec<String>)) {
    let body = lines.join("\n");
    let body = body.trim_matches('\n');
    if !body.is_empty() {
        routines.push((name, body.to_string()));
    }
}

/// Splits a routine body into statements at `GO` separator lines.
pub fn split(body: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        if GO_SEPARATOR_RE.is_match(line) {
            flush_statement(&mut statements, &mut current);
        } else {
            current.push(line);
        }
    }
    flush_statement(&mut statements, &mut current);

    statements
}

fn flush_statement(statements: &mut Vec<String>, current: &mut Vec<&str>) {
    let statement = current.join("\n");
    let statement = statement.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
