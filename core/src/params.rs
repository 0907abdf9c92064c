//! Record-to-parameter mapping.
//!
//! [`to_params`] turns any `Serialize` struct or map into named [`Params`].
//! A field's key is its serialized name lowercased, so `#[serde(rename)]`
//! decides the placeholder name a field binds to. `#[serde(flatten)]`
//! merges an embedded record into its parent. `Option`, `Box` and
//! references are looked through; nested sequences, maps and structs are
//! bound as JSON text.
//!
//! ```
//! use serde::Serialize;
//! use sqlmill_core::params::to_params;
//! use sqlmill_core::Value;
//!
//! #[derive(Serialize)]
//! struct User {
//!     #[serde(rename = "FirstName")]
//!     first_name: String,
//!     age: Option<u32>,
//! }
//!
//! let params = to_params(&User { first_name: "Ada".into(), age: None }).unwrap();
//! assert_eq!(params["firstname"], Value::from("Ada"));
//! assert_eq!(params["age"], Value::Null);
//! ```

use std::fmt;

use serde::Serialize;
use serde::ser::{self, Impossible};

use crate::error::{CoreError, Result};
use crate::value::{Params, Value};

/// Maps a record onto named parameters.
///
/// # Errors
///
/// Returns [`CoreError::Binding`] when `record` does not serialize as a
/// struct or map, or when a field fails to serialize.
pub fn to_params<T: Serialize + ?Sized>(record: &T) -> Result<Params> {
    record
        .serialize(RecordSerializer)
        .map_err(|err| CoreError::Binding(err.to_string()))
}

#[derive(Debug)]
enum BindError {
    Message(String),
    /// A field is not a scalar; the caller falls back to JSON.
    Compound,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Message(msg) => f.write_str(msg),
            BindError::Compound => f.write_str("value is not a scalar"),
        }
    }
}

impl std::error::Error for BindError {}

impl ser::Error for BindError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BindError::Message(msg.to_string())
    }
}

fn not_a_record() -> BindError {
    BindError::Message("expected a struct or a map of named parameters".to_string())
}

fn field_value<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Value, BindError> {
    match value.serialize(ValueSerializer) {
        Err(BindError::Compound) => serde_json::to_string(value)
            .map(Value::Text)
            .map_err(|err| BindError::Message(err.to_string())),
        other => other,
    }
}

macro_rules! unsupported {
    ($err:expr; $($method:ident($($arg:ty),*) -> $ret:ty;)*) => {
        $(
            fn $method(self, $(_: $arg),*) -> std::result::Result<$ret, Self::Error> {
                Err($err)
            }
        )*
    };
}

/// Accepts the top-level record.
struct RecordSerializer;

impl ser::Serializer for RecordSerializer {
    type Ok = Params;
    type Error = BindError;
    type SerializeSeq = Impossible<Params, BindError>;
    type SerializeTuple = Impossible<Params, BindError>;
    type SerializeTupleStruct = Impossible<Params, BindError>;
    type SerializeTupleVariant = Impossible<Params, BindError>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = StructSerializer;
    type SerializeStructVariant = Impossible<Params, BindError>;

    unsupported! { not_a_record();
        serialize_bool(bool) -> Params;
        serialize_i8(i8) -> Params;
        serialize_i16(i16) -> Params;
        serialize_i32(i32) -> Params;
        serialize_i64(i64) -> Params;
        serialize_u8(u8) -> Params;
        serialize_u16(u16) -> Params;
        serialize_u32(u32) -> Params;
        serialize_u64(u64) -> Params;
        serialize_f32(f32) -> Params;
        serialize_f64(f64) -> Params;
        serialize_char(char) -> Params;
        serialize_str(&str) -> Params;
        serialize_bytes(&[u8]) -> Params;
        serialize_none() -> Params;
        serialize_unit() -> Params;
        serialize_unit_struct(&'static str) -> Params;
        serialize_unit_variant(&'static str, u32, &'static str) -> Params;
        serialize_seq(Option<usize>) -> Self::SerializeSeq;
        serialize_tuple(usize) -> Self::SerializeTuple;
        serialize_tuple_struct(&'static str, usize) -> Self::SerializeTupleStruct;
        serialize_tuple_variant(&'static str, u32, &'static str, usize) -> Self::SerializeTupleVariant;
        serialize_struct_variant(&'static str, u32, &'static str, usize) -> Self::SerializeStructVariant;
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> std::result::Result<Params, BindError> {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<Params, BindError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> std::result::Result<Params, BindError> {
        Err(not_a_record())
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<MapSerializer, BindError> {
        Ok(MapSerializer {
            params: Params::new(),
            key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<StructSerializer, BindError> {
        Ok(StructSerializer {
            params: Params::new(),
        })
    }
}

struct StructSerializer {
    params: Params,
}

impl ser::SerializeStruct for StructSerializer {
    type Ok = Params;
    type Error = BindError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), BindError> {
        self.params.insert(key.to_lowercase(), field_value(value)?);
        Ok(())
    }

    fn end(self) -> std::result::Result<Params, BindError> {
        Ok(self.params)
    }
}

struct MapSerializer {
    params: Params,
    key: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Params;
    type Error = BindError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> std::result::Result<(), BindError> {
        let key = match key.serialize(ValueSerializer)? {
            Value::Text(text) => text,
            other => other.to_string(),
        };
        self.key = Some(key.to_lowercase());
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), BindError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| BindError::Message("map value without a key".to_string()))?;
        self.params.insert(key, field_value(value)?);
        Ok(())
    }

    fn end(self) -> std::result::Result<Params, BindError> {
        Ok(self.params)
    }
}

/// Converts one field into a scalar [`Value`].
struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = BindError;
    type SerializeSeq = Impossible<Value, BindError>;
    type SerializeTuple = Impossible<Value, BindError>;
    type SerializeTupleStruct = Impossible<Value, BindError>;
    type SerializeTupleVariant = Impossible<Value, BindError>;
    type SerializeMap = Impossible<Value, BindError>;
    type SerializeStruct = Impossible<Value, BindError>;
    type SerializeStructVariant = Impossible<Value, BindError>;

    unsupported! { BindError::Compound;
        serialize_seq(Option<usize>) -> Self::SerializeSeq;
        serialize_tuple(usize) -> Self::SerializeTuple;
        serialize_tuple_struct(&'static str, usize) -> Self::SerializeTupleStruct;
        serialize_tuple_variant(&'static str, u32, &'static str, usize) -> Self::SerializeTupleVariant;
        serialize_map(Option<usize>) -> Self::SerializeMap;
        serialize_struct(&'static str, usize) -> Self::SerializeStruct;
        serialize_struct_variant(&'static str, u32, &'static str, usize) -> Self::SerializeStructVariant;
    }

    fn serialize_bool(self, v: bool) -> std::result::Result<Value, BindError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> std::result::Result<Value, BindError> {
        Ok(Value::Int(v))
    }

    fn serialize_i128(self, v: i128) -> std::result::Result<Value, BindError> {
        Ok(i64::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::Int))
    }

    fn serialize_u8(self, v: u8) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> std::result::Result<Value, BindError> {
        Ok(i64::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::Int))
    }

    fn serialize_u128(self, v: u128) -> std::result::Result<Value, BindError> {
        Ok(i64::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::Int))
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<Value, BindError> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> std::result::Result<Value, BindError> {
        Ok(Value::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> std::result::Result<Value, BindError> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> std::result::Result<Value, BindError> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> std::result::Result<Value, BindError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> std::result::Result<Value, BindError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<Value, BindError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> std::result::Result<Value, BindError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> std::result::Result<Value, BindError> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<Value, BindError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> std::result::Result<Value, BindError> {
        Err(BindError::Compound)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Audit {
        #[serde(rename = "CreatedBy")]
        created_by: String,
    }

    #[derive(Serialize)]
    enum Role {
        Admin,
    }

    #[derive(Serialize)]
    struct User<'a> {
        id: u64,
        #[serde(rename = "FirstName")]
        first_name: &'a str,
        nickname: Option<String>,
        avatar: Option<Box<i64>>,
        role: Role,
        tags: Vec<&'a str>,
        #[serde(flatten)]
        audit: Audit,
    }

    #[test]
    fn test_record_fields_become_lowercase_keys() {
        let user = User {
            id: 7,
            first_name: "Ada",
            nickname: None,
            avatar: None,
            role: Role::Admin,
            tags: vec!["a", "b"],
            audit: Audit {
                created_by: "root".to_string(),
            },
        };
        let params = to_params(&user).unwrap();

        assert_eq!(params["id"], Value::Int(7));
        assert_eq!(params["firstname"], Value::from("Ada"));
        assert_eq!(params["nickname"], Value::Null);
        assert_eq!(params["avatar"], Value::Null);
        assert_eq!(params["role"], Value::from("Admin"));
        assert_eq!(params["tags"], Value::from(r#"["a","b"]"#));
        assert_eq!(params["createdby"], Value::from("root"));
        assert_eq!(params.len(), 7);
    }

    #[test]
    fn test_map_binding_lowercases_keys() {
        let mut map = BTreeMap::new();
        map.insert("Name", "x");
        let params = to_params(&map).unwrap();
        assert_eq!(params["name"], Value::from("x"));
    }

    #[test]
    fn test_references_and_options_are_dereferenced() {
        #[derive(Serialize)]
        struct Wrapper<'a> {
            inner: &'a Option<i32>,
        }
        let value = Some(3);
        let params = to_params(&Some(&Wrapper { inner: &value })).unwrap();
        assert_eq!(params["inner"], Value::Int(3));
    }

    #[test]
    fn test_large_unsigned_falls_back_to_text() {
        let mut map = BTreeMap::new();
        map.insert("big", u64::MAX);
        let params = to_params(&map).unwrap();
        assert_eq!(params["big"], Value::Text(u64::MAX.to_string()));
    }

    #[test]
    fn test_scalar_record_is_rejected() {
        let err = to_params(&42).unwrap_err();
        assert!(matches!(err, CoreError::Binding(_)));
        assert!(to_params(&vec![1, 2]).is_err());
    }
}
