//! The introspected schema tree.
//!
//! `Schema -> Table -> Column`, each carrying a `model` sub-record with the
//! names the generators derive from it. Everything here is a plain value
//! and serializes to JSON for `schema print --format json`.

use serde::Serialize;
use sqlmill_core::Driver;

use crate::inflect;
use crate::types;

/// A database namespace and the tables read from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub name: String,
    /// `true` when tables need no schema qualifier.
    pub is_default: bool,
    pub driver: Driver,
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn new(name: impl Into<String>, is_default: bool, driver: Driver) -> Self {
        Self {
            name: name.into(),
            is_default,
            driver,
            tables: Vec::new(),
        }
    }

    /// Tables whose name is not in `ignore`, in schema order.
    pub fn included<'s>(&'s self, ignore: &[String]) -> impl Iterator<Item = &'s Table> + 's {
        let mut ignore = ignore.to_vec();
        ignore.sort();
        self.tables
            .iter()
            .filter(move |table| ignore.binary_search(&table.name).is_err())
    }

    /// `schema.table`, or the bare table name in the default schema.
    pub fn qualify(&self, table: &str) -> String {
        if self.is_default {
            table.to_string()
        } else {
            format!("{}.{}", self.name, table)
        }
    }
}

/// One table with its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub driver: Driver,
    pub columns: Vec<Column>,
    pub model: TableModel,
}

/// Names derived from a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableModel {
    /// Record type name, `Camelize(Singularize(name))`.
    pub type_name: String,
    /// `user-roles`.
    pub kebab_name: String,
    /// `user-role`.
    pub singular_kebab_name: String,
    /// Primary-key column names in declaration order.
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, driver: Driver, columns: Vec<Column>) -> Self {
        let name = name.into();
        let singular = inflect::singularize(&name);
        let model = TableModel {
            type_name: inflect::camelize(&singular),
            kebab_name: inflect::kebab(&name),
            singular_kebab_name: inflect::kebab(&singular),
            primary_key: columns
                .iter()
                .filter(|c| c.ty.is_primary_key)
                .map(|c| c.name.clone())
                .collect(),
        };
        Self {
            name,
            driver,
            columns,
            model,
        }
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.ty.is_primary_key)
    }

    pub fn other_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.ty.is_primary_key)
    }
}

/// One column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Rust type receiving this column's values.
    pub scan_type: String,
    pub model: ColumnModel,
}

/// Names derived from a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnModel {
    /// Rust field identifier.
    pub field_name: String,
}

impl Column {
    /// Builds a column, translating its type and deriving its field name.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        let name = name.into();
        Self {
            scan_type: types::translate(&ty).to_string(),
            model: ColumnModel {
                field_name: inflect::field_name(&name),
            },
            name,
            ty,
        }
    }
}

/// What the catalog says about a column's type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnType {
    /// Type name as the dialect reports it, e.g. `integer` or `VARCHAR`.
    pub name: String,
    /// The full declared type, e.g. `varchar(255)` or `int4`.
    pub underlying: String,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub is_unsigned: bool,
    pub char_max_length: Option<i64>,
    pub precision: Option<i64>,
    pub precision_scale: Option<i64>,
}
