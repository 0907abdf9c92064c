//! PostgreSQL catalog access through `information_schema`.
//!
//! Catalog columns use domain types (`sql_identifier`, `cardinal_number`)
//! that drivers do not decode; every selected column is cast to `text` or
//! `int`.

use sqlmill_core::{Database, Driver};

use super::{Introspector, catalog, names, number, text};
use crate::error::{Result, SchemaError};
use crate::model::{Column, ColumnType, Schema, Table};

pub const DEFAULT_SCHEMA: &str = "public";

const TABLES: &str = "\
SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = ? AND table_type = 'BASE TABLE'
ORDER BY table_name";

const COLUMNS: &str = "\
SELECT column_name::text AS column_name,
 data_type::text AS data_type,
 udt_name::text AS udt_name,
 is_nullable::text AS is_nullable,
 numeric_precision::int AS numeric_precision,
 numeric_scale::int AS numeric_scale,
 character_maximum_length::int AS character_maximum_length
FROM information_schema.columns
WHERE table_schema = ? AND table_name = ?
ORDER BY ordinal_position";

const PRIMARY_KEYS: &str = "\
SELECT kcu.column_name::text AS column_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
 ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
 AND tc.table_name = kcu.table_name
WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = ? AND tc.table_name = ?
ORDER BY kcu.ordinal_position";

pub struct PostgresIntrospector<'a> {
    db: &'a mut dyn Database,
}

impl<'a> PostgresIntrospector<'a> {
    pub fn new(db: &'a mut dyn Database) -> Self {
        Self { db }
    }

    fn table(&mut self, schema: &str, name: &str) -> Result<Table> {
        let rows = catalog(self.db, COLUMNS, &[schema, name])?;
        if rows.is_empty() {
            return Err(SchemaError::TableNotFound {
                schema: schema.to_string(),
                table: name.to_string(),
            });
        }
        let primary_key = names(&catalog(self.db, PRIMARY_KEYS, &[schema, name])?);

        let mut columns = Vec::with_capacity(rows.len());
        for i in 0..rows.len() {
            let column = text(&rows, i, "column_name")?;
            let ty = ColumnType {
                name: text(&rows, i, "data_type")?.to_ascii_lowercase(),
                underlying: text(&rows, i, "udt_name")?,
                is_primary_key: primary_key.contains(&column),
                is_nullable: text(&rows, i, "is_nullable")? == "YES",
                is_unsigned: false,
                char_max_length: number(&rows, i, "character_maximum_length"),
                precision: number(&rows, i, "numeric_precision"),
                precision_scale: number(&rows, i, "numeric_scale"),
            };
            columns.push(Column::new(column, ty));
        }
        Ok(Table::new(name, Driver::Postgres, columns))
    }
}

impl Introspector for PostgresIntrospector<'_> {
    fn default_schema(&mut self) -> Result<String> {
        Ok(DEFAULT_SCHEMA.to_string())
    }

    fn tables(&mut self, schema: &str) -> Result<Vec<String>> {
        Ok(names(&catalog(self.db, TABLES, &[schema])?))
    }

    fn schema(&mut self, schema: &str, names: &[String]) -> Result<Schema> {
        let mut result = Schema::new(schema, schema == DEFAULT_SCHEMA, Driver::Postgres);
        for name in names {
            result.tables.push(self.table(schema, name)?);
        }
        Ok(result)
    }
}
