//! SQLite catalog access through `sqlite_master` and `PRAGMA table_info`.

use std::sync::LazyLock;

use regex::Regex;
use sqlmill_core::{Database, Driver};

use super::{Introspector, catalog, names, number, text};
use crate::error::{Result, SchemaError};
use crate::model::{Column, ColumnType, Schema, Table};

/// SQLite has a single, unnamed schema.
pub const DEFAULT_SCHEMA: &str = "default";

/// `varchar(255)`, `decimal(10,2)`, `bit(8)`.
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-z ]+)\(([0-9]+),?([0-9]*)\)").expect("static regex must compile")
});

pub struct SqliteIntrospector<'a> {
    db: &'a mut dyn Database,
}

impl<'a> SqliteIntrospector<'a> {
    pub fn new(db: &'a mut dyn Database) -> Self {
        Self { db }
    }

    fn table(&mut self, name: &str) -> Result<Table> {
        let sql = format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\""));
        let rows = catalog(self.db, &sql, &[])?;
        if rows.is_empty() {
            return Err(SchemaError::TableNotFound {
                schema: DEFAULT_SCHEMA.to_string(),
                table: name.to_string(),
            });
        }

        let mut columns = Vec::with_capacity(rows.len());
        for i in 0..rows.len() {
            let declared = text(&rows, i, "type")?;
            let is_primary_key = number(&rows, i, "pk").unwrap_or(0) > 0;
            let not_null = number(&rows, i, "notnull").unwrap_or(0) != 0;
            columns.push(Column::new(
                text(&rows, i, "name")?,
                column_type(&declared, is_primary_key, !not_null && !is_primary_key),
            ));
        }
        Ok(Table::new(name, Driver::Sqlite3, columns))
    }
}

impl Introspector for SqliteIntrospector<'_> {
    fn default_schema(&mut self) -> Result<String> {
        Ok(DEFAULT_SCHEMA.to_string())
    }

    fn tables(&mut self, _schema: &str) -> Result<Vec<String>> {
        let rows = catalog(
            self.db,
            "SELECT DISTINCT tbl_name FROM sqlite_master \
             WHERE type = 'table' AND tbl_name NOT LIKE 'sqlite_%' ORDER BY tbl_name",
            &[],
        )?;
        Ok(names(&rows))
    }

    fn schema(&mut self, _schema: &str, names: &[String]) -> Result<Schema> {
        let mut schema = Schema::new(DEFAULT_SCHEMA, true, Driver::Sqlite3);
        for name in names {
            schema.tables.push(self.table(name)?);
        }
        Ok(schema)
    }
}

/// Interprets a declared column type such as `VARCHAR(255) NOT NULL`'s
/// `VARCHAR(255)`.
fn column_type(declared: &str, is_primary_key: bool, is_nullable: bool) -> ColumnType {
    let underlying = declared.trim().to_ascii_lowercase();
    let is_unsigned = underlying.contains("unsigned");
    let mut ty = ColumnType {
        name: crate::types::normalize(&underlying),
        underlying: underlying.clone(),
        is_primary_key,
        is_nullable,
        is_unsigned,
        ..ColumnType::default()
    };

    if let Some(caps) = SIZE_RE.captures(&underlying) {
        let base = caps.get(1).map_or("", |m| m.as_str()).trim();
        let first = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let second = caps.get(3).and_then(|m| m.as_str().parse().ok());
        match second {
            Some(scale) => {
                ty.precision = first;
                ty.precision_scale = Some(scale);
            }
            None if base == "bit" => ty.precision = first,
            None => ty.char_max_length = first,
        }
    }
    ty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_sizes() {
        let ty = column_type("VARCHAR(255)", false, true);
        assert_eq!(ty.name, "varchar");
        assert_eq!(ty.underlying, "varchar(255)");
        assert_eq!(ty.char_max_length, Some(255));
        assert_eq!(ty.precision, None);

        let ty = column_type("DECIMAL(10,2)", false, false);
        assert_eq!((ty.precision, ty.precision_scale), (Some(10), Some(2)));
        assert_eq!(ty.char_max_length, None);

        let ty = column_type("bit(8)", false, false);
        assert_eq!(ty.precision, Some(8));

        let ty = column_type("INTEGER UNSIGNED", true, false);
        assert_eq!(ty.name, "integer");
        assert!(ty.is_unsigned);
    }

    #[test]
    fn test_untyped_column() {
        let ty = column_type("", false, true);
        assert_eq!(ty.name, "");
        assert_eq!(crate::types::translate(&ty), "Option<String>");
    }
}
