//! Translation of database column types to Rust scan types.
//!
//! Each dialect type name maps to a [`TypeDef`]: the Rust type used for a
//! `NOT NULL` column and the one used for a nullable column. Names are
//! matched case-insensitively with any size suffix (`varchar(255)`) and
//! `unsigned` marker removed. Unknown names map to `String`.

use crate::model::ColumnType;

/// The two faces of a scan type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDef {
    pub ty: &'static str,
    pub nullable_ty: &'static str,
}

impl TypeDef {
    const fn new(ty: &'static str, nullable_ty: &'static str) -> Self {
        Self { ty, nullable_ty }
    }

    /// The face matching the column's nullability.
    pub fn face(&self, nullable: bool) -> &'static str {
        if nullable { self.nullable_ty } else { self.ty }
    }
}

const BOOL: TypeDef = TypeDef::new("bool", "Option<bool>");
const I8: TypeDef = TypeDef::new("i8", "Option<i8>");
const U8: TypeDef = TypeDef::new("u8", "Option<u8>");
const I16: TypeDef = TypeDef::new("i16", "Option<i16>");
const U16: TypeDef = TypeDef::new("u16", "Option<u16>");
const I32: TypeDef = TypeDef::new("i32", "Option<i32>");
const U32: TypeDef = TypeDef::new("u32", "Option<u32>");
const I64: TypeDef = TypeDef::new("i64", "Option<i64>");
const U64: TypeDef = TypeDef::new("u64", "Option<u64>");
const F32: TypeDef = TypeDef::new("f32", "Option<f32>");
const F64: TypeDef = TypeDef::new("f64", "Option<f64>");
const BYTES: TypeDef = TypeDef::new("Vec<u8>", "Option<Vec<u8>>");
const JSON: TypeDef = TypeDef::new("serde_json::Value", "Option<serde_json::Value>");
const DATE: TypeDef = TypeDef::new("NaiveDate", "Option<NaiveDate>");
const TIME: TypeDef = TypeDef::new("NaiveTime", "Option<NaiveTime>");
const DATETIME: TypeDef = TypeDef::new("NaiveDateTime", "Option<NaiveDateTime>");
const DATETIME_TZ: TypeDef = TypeDef::new("DateTime<Utc>", "Option<DateTime<Utc>>");
const UUID: TypeDef = TypeDef::new("Uuid", "Option<Uuid>");
const HSTORE: TypeDef = TypeDef::new(
    "HashMap<String, Option<String>>",
    "Option<HashMap<String, Option<String>>>",
);
const STRING: TypeDef = TypeDef::new("String", "Option<String>");

/// Type names the translator knows, for documentation and tests.
pub const KNOWN_TYPES: &[&str] = &[
    "bool",
    "boolean",
    "tinyint",
    "smallint",
    "int2",
    "smallserial",
    "mediumint",
    "int",
    "integer",
    "int4",
    "serial",
    "bigint",
    "int8",
    "bigserial",
    "decimal",
    "numeric",
    "double",
    "double precision",
    "float8",
    "real",
    "float",
    "float4",
    "binary",
    "varbinary",
    "tinyblob",
    "blob",
    "mediumblob",
    "longblob",
    "char",
    "bytea",
    "json",
    "jsonb",
    "date",
    "time",
    "time without time zone",
    "time with time zone",
    "timetz",
    "datetime",
    "timestamp",
    "timestamp without time zone",
    "timestamp with time zone",
    "timestamptz",
    "uuid",
    "hstore",
    "user-defined",
    "bit",
    "money",
    "text",
    "xml",
    "cidr",
    "inet",
    "macaddr",
    "character",
    "character varying",
    "varchar",
];

/// Looks up the [`TypeDef`] for a column type.
///
/// `underlying` is the raw declared type; it decides `tinyint(1)` (a MySQL
/// boolean) and PostgreSQL user-defined types.
pub fn lookup(name: &str, unsigned: bool, underlying: &str) -> TypeDef {
    let name = normalize(name);
    let underlying = underlying.trim().to_ascii_lowercase();
    if underlying.starts_with("tinyint(1)") {
        return BOOL;
    }

    match name.as_str() {
        "bool" | "boolean" => BOOL,
        "tinyint" => pick(unsigned, U8, I8),
        "smallint" | "int2" | "smallserial" => pick(unsigned, U16, I16),
        "mediumint" | "int" | "integer" | "int4" | "serial" => pick(unsigned, U32, I32),
        "bigint" | "int8" | "bigserial" => pick(unsigned, U64, I64),
        "decimal" | "numeric" | "double" | "double precision" | "float8" => F64,
        "real" | "float" | "float4" => F32,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "char"
        | "bytea" => BYTES,
        "json" | "jsonb" => JSON,
        "date" => DATE,
        "time" | "time without time zone" => TIME,
        "datetime" | "timestamp" | "timestamp without time zone" => DATETIME,
        "time with time zone" | "timetz" | "timestamp with time zone" | "timestamptz" => {
            DATETIME_TZ
        }
        "uuid" => UUID,
        "hstore" => HSTORE,
        "user-defined" if underlying == "hstore" => HSTORE,
        _ => STRING,
    }
}

/// The Rust scan type for `column`.
pub fn translate(column: &ColumnType) -> &'static str {
    lookup(&column.name, column.is_unsigned, &column.underlying).face(column.is_nullable)
}

fn pick(unsigned: bool, when_unsigned: TypeDef, signed: TypeDef) -> TypeDef {
    if unsigned { when_unsigned } else { signed }
}

/// Lowercases a type name and strips size suffixes and sign markers.
pub fn normalize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mut base = match (lower.find('('), lower.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            format!("{}{}", &lower[..open], &lower[close + 1..])
        }
        _ => lower,
    };
    for marker in ["unsigned", "zerofill"] {
        base = base.replace(marker, "");
    }
    base.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, nullable: bool) -> ColumnType {
        ColumnType {
            name: name.to_string(),
            underlying: name.to_string(),
            is_nullable: nullable,
            ..ColumnType::default()
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("VARCHAR(255)"), "varchar");
        assert_eq!(normalize("int(10) unsigned"), "int");
        assert_eq!(normalize("  Double   Precision "), "double precision");
        assert_eq!(normalize("timestamp(6) with time zone"), "timestamp with time zone");
    }

    #[test]
    fn test_integers_follow_sign() {
        assert_eq!(lookup("tinyint", true, "tinyint(3) unsigned"), U8);
        assert_eq!(lookup("tinyint", false, "tinyint(4)"), I8);
        assert_eq!(lookup("tinyint", false, "tinyint(1)"), BOOL);
        assert_eq!(lookup("bigint", true, "bigint"), U64);
        assert_eq!(lookup("serial", false, "int4"), I32);
    }

    #[test]
    fn test_nullable_face() {
        assert_eq!(translate(&column("INT", false)), "i32");
        assert_eq!(translate(&column("INT", true)), "Option<i32>");
        assert_eq!(translate(&column("TEXT", true)), "Option<String>");
        assert_eq!(translate(&column("jsonb", false)), "serde_json::Value");
        assert_eq!(
            translate(&column("timestamp with time zone", false)),
            "DateTime<Utc>"
        );
    }

    #[test]
    fn test_user_defined() {
        assert_eq!(lookup("USER-DEFINED", false, "hstore"), HSTORE);
        assert_eq!(lookup("USER-DEFINED", false, "mood"), STRING);
    }

    #[test]
    fn test_unknown_defaults_to_string() {
        assert_eq!(lookup("geometry", false, "geometry"), STRING);
        assert_eq!(lookup("", false, ""), STRING);
    }

    #[test]
    fn test_every_known_type_is_a_valid_rust_type() {
        for name in KNOWN_TYPES {
            for nullable in [false, true] {
                for unsigned in [false, true] {
                    let ty = lookup(name, unsigned, name).face(nullable);
                    assert!(
                        syn::parse_str::<syn::Type>(ty).is_ok(),
                        "{name} (nullable: {nullable}) -> {ty}"
                    );
                    assert_eq!(ty.starts_with("Option<"), nullable, "{name}");
                }
            }
        }
    }

    mod proptests {
        use proptest::prelude::*;
        use proptest::{prop_assert, proptest};

        use super::super::*;

        proptest! {
            #[test]
            fn any_name_translates_to_a_rust_type(name in "[a-zA-Z ()0-9,-]{0,24}", nullable in any::<bool>()) {
                let ty = lookup(&name, false, &name).face(nullable);
                prop_assert!(syn::parse_str::<syn::Type>(ty).is_ok());
            }
        }
    }
}
