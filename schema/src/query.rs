//! Named CRUD routines generated from a [`Schema`].
//!
//! The output is a tagged-SQL file the routine provider loads directly:
//!
//! ```sql
//! -- name: select-all-users
//! SELECT * FROM users;
//!
//! -- name: select-user-by-pk
//! SELECT * FROM users WHERE id = ?;
//! ```
//!
//! Tables without a primary key get only `select-all-*` and `insert-*`.
//! Tables made only of primary-key columns get no `update-*-by-pk`.

use std::path::PathBuf;

use sqlmill_core::FileSystem;
use sqlmill_core::fs::FILE_MODE;
use tracing::info;

use crate::error::Result;
use crate::inflect;
use crate::model::{Column, Schema, Table};

const HEADER: &str = "-- Code generated by sqlmill. DO NOT EDIT.\n";

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Tables that get no routines.
    pub ignore_tables: Vec<String>,
    /// `:column` placeholders instead of `?`.
    pub use_named_params: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ignore_tables: vec!["migrations".to_string()],
            use_named_params: false,
        }
    }
}

/// Generates the routine file for `schema`; empty when no table is left
/// after filtering.
pub fn generate(schema: &Schema, options: &QueryOptions) -> String {
    let mut out = String::new();
    for table in schema.included(&options.ignore_tables) {
        write_routines(&mut out, schema, table, options);
    }
    if out.is_empty() {
        return out;
    }
    format!("{HEADER}\n{out}")
}

/// Writes the routines of `schema` to `<schema>.sql` under `fs`.
///
/// Returns the path written, or `None` when there was nothing to write.
pub fn sync(fs: &dyn FileSystem, schema: &Schema, options: &QueryOptions) -> Result<Option<PathBuf>> {
    let sql = generate(schema, options);
    if sql.is_empty() {
        return Ok(None);
    }
    let path = PathBuf::from(format!("{}.sql", inflect::snake(&schema.name)));
    fs.write_file(&path, sql.as_bytes(), FILE_MODE)?;
    info!(schema = %schema.name, path = %path.display(), "wrote routines");
    Ok(Some(path))
}

fn write_routines(out: &mut String, schema: &Schema, table: &Table, options: &QueryOptions) {
    let named = options.use_named_params;
    let qualified = schema.qualify(&table.name);
    let plural = &table.model.kebab_name;
    let singular = &table.model.singular_kebab_name;

    out.push_str(&format!("-- name: select-all-{plural}\nSELECT * FROM {qualified};\n\n"));

    let has_primary_key = !table.model.primary_key.is_empty();
    let condition = assignments(table.primary_key_columns(), named, " AND ");
    if has_primary_key {
        out.push_str(&format!(
            "-- name: select-{singular}-by-pk\nSELECT * FROM {qualified} WHERE {condition};\n\n"
        ));
    }

    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    let values: Vec<String> = table.columns.iter().map(|c| placeholder(c, named)).collect();
    out.push_str(&format!(
        "-- name: insert-{singular}\nINSERT INTO {qualified} ({}) VALUES ({});\n\n",
        names.join(", "),
        values.join(", ")
    ));

    if !has_primary_key {
        return;
    }
    if table.other_columns().next().is_some() {
        let set = assignments(table.other_columns(), named, ", ");
        out.push_str(&format!(
            "-- name: update-{singular}-by-pk\nUPDATE {qualified} SET {set} WHERE {condition};\n\n"
        ));
    }
    out.push_str(&format!(
        "-- name: delete-{singular}-by-pk\nDELETE FROM {qualified} WHERE {condition};\n\n"
    ));
}

fn placeholder(column: &Column, named: bool) -> String {
    if named {
        format!(":{}", column.name)
    } else {
        "?".to_string()
    }
}

/// `a = ?<sep>b = ?`
fn assignments<'c>(columns: impl Iterator<Item = &'c Column>, named: bool, sep: &str) -> String {
    columns
        .map(|c| format!("{} = {}", c.name, placeholder(c, named)))
        .collect::<Vec<_>>()
        .join(sep)
}
