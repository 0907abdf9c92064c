//! Field annotations for generated records.
//!
//! Each [`TagBuilder`] contributes derives and attributes for the record
//! and attributes for its fields. A [`CompositeTagBuilder`] merges several
//! builders in order, dropping duplicates, so `json` and `xml` (which both
//! map to serde renames) emit one attribute.

use std::str::FromStr;

use crate::error::SchemaError;
use crate::model::{Column, Schema, Table};
use crate::types;

/// One source of derives and field attributes.
pub trait TagBuilder {
    /// Derive paths the record needs.
    fn derives(&self, _table: &Table) -> Vec<&'static str> {
        Vec::new()
    }

    /// Attribute lines for the record itself, placed after the derive.
    fn attributes(&self, _schema: &Schema, _table: &Table) -> Vec<String> {
        Vec::new()
    }

    /// Attribute lines for `column`, without indentation.
    fn field(&self, column: &Column) -> Vec<String>;
}

/// Database mapping through `sqlx::FromRow`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbTag;

impl TagBuilder for DbTag {
    fn derives(&self, _table: &Table) -> Vec<&'static str> {
        vec!["FromRow"]
    }

    fn field(&self, column: &Column) -> Vec<String> {
        vec![format!("#[sqlx(rename = {:?})]", column.name)]
    }
}

/// Entity mapping through `sea_orm::DeriveEntityModel`.
///
/// Carries the column name, declared type, primary key and nullability of
/// every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeaOrmTag;

impl SeaOrmTag {
    /// The `column_type` expression for a column, `custom(..)` when the
    /// declared type has no sea-orm counterpart.
    fn column_type(column: &Column) -> String {
        let ty = &column.ty;
        let declared = if ty.underlying.is_empty() { &ty.name } else { &ty.underlying };
        match types::normalize(&ty.name).as_str() {
            "bool" | "boolean" => "Boolean".to_string(),
            "tinyint" => "TinyInteger".to_string(),
            "smallint" | "int2" | "smallserial" => "SmallInteger".to_string(),
            "mediumint" | "int" | "integer" | "int4" | "serial" => "Integer".to_string(),
            "bigint" | "int8" | "bigserial" => "BigInteger".to_string(),
            "real" | "float" | "float4" => "Float".to_string(),
            "double" | "double precision" | "float8" => "Double".to_string(),
            "decimal" | "numeric" => match (ty.precision, ty.precision_scale) {
                (Some(precision), scale) => {
                    format!("Decimal(Some(({precision}, {})))", scale.unwrap_or(0))
                }
                (None, _) => "Decimal(None)".to_string(),
            },
            "varchar" | "character varying" => match ty.char_max_length.filter(|n| *n > 0) {
                Some(size) => format!("String(StringLen::N({size}))"),
                None => "String(StringLen::None)".to_string(),
            },
            "text" => "Text".to_string(),
            "date" => "Date".to_string(),
            "time" | "time without time zone" => "Time".to_string(),
            "datetime" | "timestamp" | "timestamp without time zone" => "DateTime".to_string(),
            "timestamp with time zone" | "timestamptz" => "TimestampWithTimeZone".to_string(),
            "json" => "Json".to_string(),
            "jsonb" => "JsonBinary".to_string(),
            "uuid" => "Uuid".to_string(),
            _ => format!("custom({declared:?})"),
        }
    }
}

impl TagBuilder for SeaOrmTag {
    fn derives(&self, _table: &Table) -> Vec<&'static str> {
        vec!["DeriveEntityModel"]
    }

    fn attributes(&self, schema: &Schema, table: &Table) -> Vec<String> {
        if schema.is_default {
            vec![format!("#[sea_orm(table_name = {:?})]", table.name)]
        } else {
            vec![format!(
                "#[sea_orm(schema_name = {:?}, table_name = {:?})]",
                schema.name, table.name
            )]
        }
    }

    fn field(&self, column: &Column) -> Vec<String> {
        let mut parts = vec![
            format!("column_name = {:?}", column.name),
            format!("column_type = {:?}", Self::column_type(column)),
        ];
        if column.ty.is_primary_key {
            parts.push("primary_key".to_string());
        }
        if column.ty.is_nullable {
            parts.push("nullable".to_string());
        }
        vec![format!("#[sea_orm({})]", parts.join(", "))]
    }
}

/// JSON names through serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTag;

impl TagBuilder for JsonTag {
    fn derives(&self, _table: &Table) -> Vec<&'static str> {
        vec!["Serialize", "Deserialize"]
    }

    fn field(&self, column: &Column) -> Vec<String> {
        vec![serde_rename(column)]
    }
}

/// XML names; serde drives XML serializers too.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlTag;

impl TagBuilder for XmlTag {
    fn derives(&self, _table: &Table) -> Vec<&'static str> {
        vec!["Serialize", "Deserialize"]
    }

    fn field(&self, column: &Column) -> Vec<String> {
        vec![serde_rename(column)]
    }
}

fn serde_rename(column: &Column) -> String {
    format!("#[serde(rename = {:?})]", column.name)
}

/// Length limits through `validator::Validate`.
///
/// Required-ness needs no rule: a non-nullable column is a non-`Option`
/// field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateTag;

impl ValidateTag {
    fn rule(column: &Column) -> Option<String> {
        let max = column.ty.char_max_length.filter(|n| *n > 0)?;
        let is_text = column.scan_type == "String" || column.scan_type == "Option<String>";
        is_text.then(|| format!("#[validate(length(max = {max}))]"))
    }
}

impl TagBuilder for ValidateTag {
    fn derives(&self, table: &Table) -> Vec<&'static str> {
        if table.columns.iter().any(|c| Self::rule(c).is_some()) {
            vec!["Validate"]
        } else {
            Vec::new()
        }
    }

    fn field(&self, column: &Column) -> Vec<String> {
        Self::rule(column).into_iter().collect()
    }
}

/// Ordered builders merged into one attribute set.
#[derive(Default)]
pub struct CompositeTagBuilder {
    builders: Vec<Box<dyn TagBuilder>>,
}

impl CompositeTagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, builder: impl TagBuilder + 'static) -> Self {
        self.builders.push(Box::new(builder));
        self
    }

    /// The database-facing builder for `orm` followed by `tags` in order.
    pub fn for_orm(orm: OrmType, tags: &[Tag]) -> Self {
        let mut composite = match orm {
            OrmType::Sqlx => Self::new().with(DbTag),
            OrmType::SeaOrm => Self::new().with(SeaOrmTag),
            OrmType::None => Self::new(),
        };
        for tag in tags {
            composite = match tag {
                Tag::Json => composite.with(JsonTag),
                Tag::Xml => composite.with(XmlTag),
                Tag::Validate => composite.with(ValidateTag),
            };
        }
        composite
    }
}

impl TagBuilder for CompositeTagBuilder {
    fn derives(&self, table: &Table) -> Vec<&'static str> {
        let mut derives = Vec::new();
        for derive in self.builders.iter().flat_map(|b| b.derives(table)) {
            if !derives.contains(&derive) {
                derives.push(derive);
            }
        }
        derives
    }

    fn attributes(&self, schema: &Schema, table: &Table) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        for line in self.builders.iter().flat_map(|b| b.attributes(schema, table)) {
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines
    }

    fn field(&self, column: &Column) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        for line in self.builders.iter().flat_map(|b| b.field(column)) {
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines
    }
}

/// Database-facing attribute vocabulary of generated models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrmType {
    #[default]
    Sqlx,
    SeaOrm,
    None,
}

impl OrmType {
    /// Whether each record is emitted as a `Model` in its own module.
    pub fn is_entity_module(self) -> bool {
        self == OrmType::SeaOrm
    }
}

impl FromStr for OrmType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlx" => Ok(OrmType::Sqlx),
            "sea-orm" | "sea_orm" => Ok(OrmType::SeaOrm),
            "none" | "" => Ok(OrmType::None),
            other => Err(SchemaError::UnknownOrmType(other.to_string())),
        }
    }
}

/// Serialization and validation tags layered over the ORM builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Json,
    Xml,
    Validate,
}

impl Tag {
    /// Tags used when none are configured.
    pub const DEFAULTS: [Tag; 2] = [Tag::Json, Tag::Validate];

    /// Parses every name, failing on the first unknown one.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Tag>, SchemaError> {
        names.iter().map(|name| name.as_ref().parse()).collect()
    }
}

impl FromStr for Tag {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Tag::Json),
            "xml" => Ok(Tag::Xml),
            "validate" => Ok(Tag::Validate),
            other => Err(SchemaError::UnknownTag(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlmill_core::Driver;

    use super::*;
    use crate::model::ColumnType;

    fn column(name: &str, ty: &str, size: Option<i64>) -> Column {
        Column::new(
            name,
            ColumnType {
                name: ty.to_string(),
                underlying: ty.to_string(),
                char_max_length: size,
                ..ColumnType::default()
            },
        )
    }

    #[test]
    fn test_composite_merges_and_dedupes() {
        let composite = CompositeTagBuilder::new()
            .with(DbTag)
            .with(JsonTag)
            .with(XmlTag)
            .with(ValidateTag);
        let col = column("email", "varchar", Some(120));
        let table = Table::new("users", Driver::Sqlite3, vec![col.clone()]);

        assert_eq!(
            composite.derives(&table),
            vec!["FromRow", "Serialize", "Deserialize", "Validate"]
        );
        assert_eq!(
            composite.field(&col),
            vec![
                "#[sqlx(rename = \"email\")]",
                "#[serde(rename = \"email\")]",
                "#[validate(length(max = 120))]",
            ]
        );
    }

    #[test]
    fn test_validate_without_rules() {
        let col = column("id", "int", None);
        let table = Table::new("users", Driver::Sqlite3, vec![col.clone()]);
        assert!(ValidateTag.derives(&table).is_empty());
        assert!(ValidateTag.field(&col).is_empty());

        let sized_int = column("code", "int", Some(4));
        assert!(ValidateTag.field(&sized_int).is_empty());
    }

    #[test]
    fn test_orm_type() {
        assert_eq!("sqlx".parse::<OrmType>().unwrap(), OrmType::Sqlx);
        assert_eq!("sea-orm".parse::<OrmType>().unwrap(), OrmType::SeaOrm);
        assert_eq!("none".parse::<OrmType>().unwrap(), OrmType::None);
        let err = "gorm".parse::<OrmType>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported orm type 'gorm'");

        let col = column("id", "int", None);
        assert_eq!(
            CompositeTagBuilder::for_orm(OrmType::None, &Tag::DEFAULTS).field(&col),
            vec!["#[serde(rename = \"id\")]"]
        );
    }

    #[test]
    fn test_sea_orm_carries_column_metadata() {
        let mut id = column("id", "INT", None);
        id.ty.is_primary_key = true;
        let first_name = column("first_name", "TEXT", None);
        let mut last_name = column("last_name", "TEXT", None);
        last_name.ty.is_nullable = true;
        let mut email = column("email", "varchar", Some(120));
        email.ty.underlying = "varchar(120)".to_string();
        let mut price = column("price", "numeric", None);
        price.ty.precision = Some(10);
        price.ty.precision_scale = Some(2);
        let inet = column("addr", "inet", None);

        let tags = CompositeTagBuilder::for_orm(OrmType::SeaOrm, &[]);
        assert_eq!(
            tags.field(&id),
            vec!["#[sea_orm(column_name = \"id\", column_type = \"Integer\", primary_key)]"]
        );
        assert_eq!(
            tags.field(&first_name),
            vec!["#[sea_orm(column_name = \"first_name\", column_type = \"Text\")]"]
        );
        assert_eq!(
            tags.field(&last_name),
            vec!["#[sea_orm(column_name = \"last_name\", column_type = \"Text\", nullable)]"]
        );
        assert_eq!(
            tags.field(&email),
            vec!["#[sea_orm(column_name = \"email\", column_type = \"String(StringLen::N(120))\")]"]
        );
        assert_eq!(
            tags.field(&price),
            vec!["#[sea_orm(column_name = \"price\", column_type = \"Decimal(Some((10, 2)))\")]"]
        );
        assert_eq!(
            tags.field(&inet),
            vec!["#[sea_orm(column_name = \"addr\", column_type = \"custom(\\\"inet\\\")\")]"]
        );
    }

    #[test]
    fn test_sea_orm_record_attributes() {
        let table = Table::new("users", Driver::Sqlite3, vec![column("id", "int", None)]);
        let tags = CompositeTagBuilder::for_orm(OrmType::SeaOrm, &Tag::DEFAULTS);
        assert_eq!(tags.derives(&table), vec!["DeriveEntityModel", "Serialize", "Deserialize"]);

        let default = Schema::new("main", true, Driver::Sqlite3);
        assert_eq!(
            tags.attributes(&default, &table),
            vec!["#[sea_orm(table_name = \"users\")]"]
        );
        let sales = Schema::new("sales", false, Driver::Postgres);
        assert_eq!(
            tags.attributes(&sales, &table),
            vec!["#[sea_orm(schema_name = \"sales\", table_name = \"users\")]"]
        );
        assert!(CompositeTagBuilder::for_orm(OrmType::Sqlx, &[]).attributes(&sales, &table).is_empty());
    }

    #[test]
    fn test_configured_tags() {
        let tags = Tag::parse_all(&["xml", "json"]).unwrap();
        assert_eq!(tags, vec![Tag::Xml, Tag::Json]);
        let err = Tag::parse_all(&["yaml"]).unwrap_err();
        assert_eq!(err.to_string(), "unsupported tag 'yaml'");

        let col = column("email", "varchar", Some(40));
        let table = Table::new("users", Driver::Sqlite3, vec![col.clone()]);
        let composite = CompositeTagBuilder::for_orm(OrmType::None, &[Tag::Xml]);
        assert_eq!(composite.derives(&table), vec!["Serialize", "Deserialize"]);
        assert_eq!(composite.field(&col), vec!["#[serde(rename = \"email\")]"]);
    }
}
