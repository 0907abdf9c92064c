//! MySQL catalog access through `information_schema`.

use sqlmill_core::{Database, Driver};

use super::{Introspector, catalog, names, number, text};
use crate::error::{Result, SchemaError};
use crate::model::{Column, ColumnType, Schema, Table};

const TABLES: &str = "\
SELECT table_name AS table_name
FROM information_schema.tables
WHERE table_schema = ? AND table_type = 'BASE TABLE'
ORDER BY table_name";

const COLUMNS: &str = "\
SELECT column_name AS column_name,
 data_type AS data_type,
 column_type AS column_type,
 is_nullable AS is_nullable,
 numeric_precision AS numeric_precision,
 numeric_scale AS numeric_scale,
 character_maximum_length AS character_maximum_length
FROM information_schema.columns
WHERE table_schema = ? AND table_name = ?
ORDER BY ordinal_position";

const PRIMARY_KEYS: &str = "\
SELECT kcu.column_name AS column_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
 ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
 AND tc.table_name = kcu.table_name
WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = ? AND tc.table_name = ?
ORDER BY kcu.ordinal_position";

pub struct MysqlIntrospector<'a> {
    db: &'a mut dyn Database,
}

impl<'a> MysqlIntrospector<'a> {
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
            let (underlying, is_unsigned) = strip_unsigned(&text(&rows, i, "column_type")?);
            let ty = ColumnType {
                name: text(&rows, i, "data_type")?.to_ascii_lowercase(),
                underlying,
                is_primary_key: primary_key.contains(&column),
                is_nullable: text(&rows, i, "is_nullable")? == "YES",
                is_unsigned,
                char_max_length: number(&rows, i, "character_maximum_length"),
                precision: number(&rows, i, "numeric_precision"),
                precision_scale: number(&rows, i, "numeric_scale"),
            };
            columns.push(Column::new(column, ty));
        }
        Ok(Table::new(name, Driver::Mysql, columns))
    }
}

impl Introspector for MysqlIntrospector<'_> {
    /// The database selected by the connection URL.
    fn default_schema(&mut self) -> Result<String> {
        let rows = catalog(self.db, "SELECT database() AS name", &[])?;
        match names(&rows).into_iter().next() {
            Some(name) if name != "NULL" && !name.is_empty() => Ok(name),
            _ => Err(SchemaError::Catalog("no database selected".to_string())),
        }
    }

    fn tables(&mut self, schema: &str) -> Result<Vec<String>> {
        Ok(names(&catalog(self.db, TABLES, &[schema])?))
    }

    fn schema(&mut self, schema: &str, names: &[String]) -> Result<Schema> {
        let is_default = self.default_schema().is_ok_and(|default| default == schema);
        let mut result = Schema::new(schema, is_default, Driver::Mysql);
        for name in names {
            result.tables.push(self.table(schema, name)?);
        }
        Ok(result)
    }
}

/// `int(10) unsigned zerofill` -> (`int(10)`, true).
fn strip_unsigned(column_type: &str) -> (String, bool) {
    let lower = column_type.to_ascii_lowercase();
    let unsigned = lower.contains("unsigned");
    let stripped = lower
        .replace("unsigned", "")
        .replace("zerofill", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (stripped, unsigned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_unsigned() {
        assert_eq!(strip_unsigned("int(10) unsigned"), ("int(10)".to_string(), true));
        assert_eq!(
            strip_unsigned("bigint(20) unsigned zerofill"),
            ("bigint(20)".to_string(), true)
        );
        assert_eq!(strip_unsigned("varchar(64)"), ("varchar(64)".to_string(), false));
        assert_eq!(strip_unsigned("tinyint(1)"), ("tinyint(1)".to_string(), false));
    }

    #[test]
    fn test_unsigned_column_translates_to_unsigned_type() {
        let (underlying, is_unsigned) = strip_unsigned("int(10) unsigned");
        let column = Column::new(
            "hits",
            ColumnType {
                name: "int".to_string(),
                underlying,
                is_unsigned,
                ..ColumnType::default()
            },
        );
        assert_eq!(column.scan_type, "u32");
    }
}
