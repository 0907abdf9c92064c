//! Rust record types generated from a [`Schema`].
//!
//! One `pub struct` per table, annotated by the [`CompositeTagBuilder`]
//! for the chosen [`OrmType`] and [`Tag`]s. With [`OrmType::SeaOrm`] each
//! record is a `Model` inside its own module, next to the `Relation` enum
//! and `ActiveModelBehavior` impl the entity derive expects. The emitted
//! source goes through an import resolver, which adds `use` lines for the
//! external names it references, and is then parsed with `syn` so
//! malformed output is never written.
//!
//! # Example
//!
//! ```
//! use sqlmill_core::Driver;
//! use sqlmill_schema::codegen::{generate, ModelOptions};
//! use sqlmill_schema::{Column, ColumnType, Schema, Table};
//!
//! let mut schema = Schema::new("default", true, Driver::Sqlite3);
//! let id = ColumnType { name: "integer".into(), is_primary_key: true, ..Default::default() };
//! schema.tables.push(Table::new("users", Driver::Sqlite3, vec![Column::new("id", id)]));
//!
//! let source = generate(&schema, &ModelOptions::default()).unwrap();
//! assert!(source.contains("pub struct User {"));
//! assert!(source.contains("pub id: i64,") || source.contains("pub id: i32,"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use sqlmill_core::FileSystem;
use sqlmill_core::fs::FILE_MODE;
use tracing::{debug, info};

use crate::error::{Result, SchemaError};
use crate::inflect;
use crate::model::{Column, Schema, Table};
use crate::tags::{CompositeTagBuilder, OrmType, Tag, TagBuilder};

/// Names the resolver knows how to import, with the path they live under.
const IMPORTS: &[(&str, &str)] = &[
    ("HashMap", "std::collections"),
    ("DateTime", "chrono"),
    ("NaiveDate", "chrono"),
    ("NaiveDateTime", "chrono"),
    ("NaiveTime", "chrono"),
    ("Utc", "chrono"),
    ("ActiveModelBehavior", "sea_orm::entity::prelude"),
    ("DeriveEntityModel", "sea_orm::entity::prelude"),
    ("DeriveRelation", "sea_orm::entity::prelude"),
    ("EnumIter", "sea_orm::entity::prelude"),
    ("Deserialize", "serde"),
    ("Serialize", "serde"),
    ("FromRow", "sqlx"),
    ("Uuid", "uuid"),
    ("Validate", "validator"),
];

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9]*\b").expect("static regex must compile"));

static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("static regex must compile"));

/// How models are generated.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Module the models are generated for; named in the file header.
    pub package: String,
    /// Tables that get no model.
    pub ignore_tables: Vec<String>,
    /// Emit doc comments on records and fields.
    pub include_docs: bool,
    /// Prefix type names with the schema name.
    pub keep_schema: bool,
    pub orm: OrmType,
    /// Serialization and validation tags applied after the ORM builder.
    pub tags: Vec<Tag>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            package: "models".to_string(),
            ignore_tables: vec!["migrations".to_string()],
            include_docs: false,
            keep_schema: false,
            orm: OrmType::Sqlx,
            tags: Tag::DEFAULTS.to_vec(),
        }
    }
}

/// Generates model source for `schema`.
///
/// Returns an empty string when no table is left after filtering.
///
/// # Errors
///
/// [`SchemaError::Syntax`] if the emitted source does not parse.
pub fn generate(schema: &Schema, options: &ModelOptions) -> Result<String> {
    let tables: Vec<&Table> = schema.included(&options.ignore_tables).collect();
    if tables.is_empty() {
        debug!(schema = %schema.name, "no tables to generate models for");
        return Ok(String::new());
    }

    let tags = CompositeTagBuilder::for_orm(options.orm, &options.tags);
    let mut body = String::new();
    let mut defined = BTreeSet::new();
    for table in tables {
        let type_name = type_name(schema, table, options);
        if options.orm.is_entity_module() {
            write_entity(&mut body, schema, table, &type_name, &tags, options);
        } else {
            defined.insert(type_name.clone());
            write_record(&mut body, schema, table, &type_name, &tags, options);
        }
    }

    let mut source = format!(
        "//! `{}`: records of the `{}` schema.\n//!\n//! Code generated by sqlmill. DO NOT EDIT.\n\n",
        options.package, schema.name
    );
    source.push_str(&resolve_imports(&body, &defined));
    source.push_str(&body);

    syn::parse_file(&source).map_err(|err| SchemaError::Syntax(err.to_string()))?;
    Ok(source)
}

/// Writes the models of `schema` to `<schema>.rs` under `fs`.
///
/// Returns the path written, or `None` when there was nothing to write.
pub fn sync(fs: &dyn FileSystem, schema: &Schema, options: &ModelOptions) -> Result<Option<PathBuf>> {
    let source = generate(schema, options)?;
    if source.is_empty() {
        return Ok(None);
    }
    let path = PathBuf::from(format!("{}.rs", inflect::snake(&schema.name)));
    fs.write_file(&path, source.as_bytes(), FILE_MODE)?;
    info!(schema = %schema.name, path = %path.display(), "wrote models");
    Ok(Some(path))
}

fn type_name(schema: &Schema, table: &Table, options: &ModelOptions) -> String {
    if options.keep_schema {
        format!("{}{}", inflect::camelize(&schema.name), table.model.type_name)
    } else {
        table.model.type_name.clone()
    }
}

fn write_record(
    out: &mut String,
    schema: &Schema,
    table: &Table,
    type_name: &str,
    tags: &CompositeTagBuilder,
    options: &ModelOptions,
) {
    if options.include_docs {
        out.push_str(&format!("/// Row of the `{}` table.\n", schema.qualify(&table.name)));
    }
    let mut derives = vec!["Debug", "Clone", "PartialEq"];
    derives.extend(tags.derives(table));
    out.push_str(&format!("#[derive({})]\n", derives.join(", ")));
    for attribute in tags.attributes(schema, table) {
        out.push_str(&format!("{attribute}\n"));
    }
    out.push_str(&format!("pub struct {type_name} {{\n"));

    for (i, column) in table.columns.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if options.include_docs {
            out.push_str(&format!("    /// {}\n", column_doc(column)));
        }
        for attribute in tags.field(column) {
            out.push_str(&format!("    {attribute}\n"));
        }
        out.push_str(&format!("    pub {}: {},\n", column.model.field_name, column.scan_type));
    }
    out.push_str("}\n\n");

    let primary_key: Vec<String> = table
        .model
        .primary_key
        .iter()
        .map(|name| format!("{name:?}"))
        .collect();
    out.push_str(&format!("impl {type_name} {{\n"));
    out.push_str(&format!(
        "    pub const TABLE: &'static str = {:?};\n",
        schema.qualify(&table.name)
    ));
    out.push_str(&format!(
        "    pub const PRIMARY_KEY: &'static [&'static str] = &[{}];\n",
        primary_key.join(", ")
    ));
    out.push_str("}\n\n");
}

/// A `pub mod <type>` holding the record as `Model` plus the items the
/// sea-orm entity derive needs.
fn write_entity(
    out: &mut String,
    schema: &Schema,
    table: &Table,
    type_name: &str,
    tags: &CompositeTagBuilder,
    options: &ModelOptions,
) {
    let mut inner = String::new();
    write_record(&mut inner, schema, table, "Model", tags, options);
    inner.push_str("#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]\n");
    inner.push_str("pub enum Relation {}\n\n");
    inner.push_str("impl ActiveModelBehavior for ActiveModel {}\n");

    out.push_str(&format!("pub mod {} {{\n", inflect::field_name(type_name)));
    out.push_str("    use super::*;\n\n");
    for line in inner.lines() {
        if !line.is_empty() {
            out.push_str("    ");
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str("}\n\n");
}

/// `varchar(255)`, primary key, nullable, size 255.
fn column_doc(column: &Column) -> String {
    let ty = &column.ty;
    let declared = if ty.underlying.is_empty() { &ty.name } else { &ty.underlying };
    let mut parts = vec![format!("`{declared}`")];
    if ty.is_primary_key {
        parts.push("primary key".to_string());
    }
    parts.push(if ty.is_nullable { "nullable" } else { "not null" }.to_string());
    if let Some(size) = ty.char_max_length {
        parts.push(format!("size {size}"));
    }
    match (ty.precision, ty.precision_scale) {
        (Some(precision), Some(scale)) if scale > 0 => {
            parts.push(format!("precision {precision},{scale}"));
        }
        (Some(precision), _) => parts.push(format!("precision {precision}")),
        _ => {}
    }
    parts.join(", ")
}

/// `use` lines for every known external name `body` mentions.
///
/// Doc comments and string literals are ignored, as are names the
/// generated code defines itself.
fn resolve_imports(body: &str, defined: &BTreeSet<String>) -> String {
    let mut used: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for line in body.lines() {
        if line.trim_start().starts_with("//") {
            continue;
        }
        let code = STRING_RE.replace_all(line, "\"\"");
        for ident in IDENT_RE.find_iter(&code) {
            let ident = ident.as_str();
            if defined.contains(ident) {
                continue;
            }
            if let Some((name, path)) = IMPORTS.iter().find(|(name, _)| *name == ident) {
                used.entry(path).or_default().insert(name);
            }
        }
    }
    if used.is_empty() {
        return String::new();
    }

    let line = |path: &str, names: &BTreeSet<&str>| -> String {
        let names: Vec<&str> = names.iter().copied().collect();
        match names.as_slice() {
            [single] => format!("use {path}::{single};\n"),
            many => format!("use {path}::{{{}}};\n", many.join(", ")),
        }
    };
    let (std, external): (Vec<_>, Vec<_>) =
        used.iter().partition(|(path, _)| path.starts_with("std::"));

    let mut imports = String::new();
    for (path, names) in &std {
        imports.push_str(&line(path, names));
    }
    if !std.is_empty() && !external.is_empty() {
        imports.push('\n');
    }
    for (path, names) in &external {
        imports.push_str(&line(path, names));
    }
    imports.push('\n');
    imports
}
