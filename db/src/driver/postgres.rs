//! PostgreSQL driver backed by the synchronous `postgres` client.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::error::SqlState;
use postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use postgres::{Client, GenericClient, NoTls, Row};
use sqlmill_core::bind::compile;
use sqlmill_core::{
    Bindings, Database, Driver, DriverError, DriverErrorKind, PlaceholderStyle, RowSet,
    Transaction, Value,
};
use tracing::debug;

/// A PostgreSQL connection.
pub struct PostgresDatabase {
    client: Client,
}

impl PostgresDatabase {
    /// Connects using a `postgres://` URL or a key/value connection string.
    pub fn connect(url: &str) -> Result<Self, DriverError> {
        let client = Client::connect(url, NoTls).map_err(driver_error)?;
        Ok(Self { client })
    }
}

impl Database for PostgresDatabase {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn execute(&mut self, sql: &str, bindings: &Bindings) -> Result<u64, DriverError> {
        execute_on(&mut self.client, sql, bindings)
    }

    fn query(&mut self, sql: &str, bindings: &Bindings) -> Result<RowSet, DriverError> {
        let compiled = compile(sql, bindings, PlaceholderStyle::Dollar)?;
        debug!(statement = %compiled.sql, params = compiled.values.len(), "postgres query");

        let stmt = self.client.prepare(&compiled.sql).map_err(driver_error)?;
        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let args: Vec<PgValue<'_>> = compiled.values.iter().map(PgValue).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = args.iter().map(|a| a as &(dyn ToSql + Sync)).collect();
        let rows = self.client.query(&stmt, &refs).map_err(driver_error)?;

        let mut result = RowSet::new(columns);
        for row in &rows {
            result.rows.push(decode_row(row)?);
        }
        Ok(result)
    }

    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, DriverError> {
        let tx = self.client.transaction().map_err(driver_error)?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction<'a> {
    tx: postgres::Transaction<'a>,
}

impl Transaction for PostgresTransaction<'_> {
    fn execute(&mut self, sql: &str, bindings: &Bindings) -> Result<u64, DriverError> {
        execute_on(&mut self.tx, sql, bindings)
    }

    fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.commit().map_err(driver_error)
    }

    fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.rollback().map_err(driver_error)
    }
}

fn execute_on<C: GenericClient>(client: &mut C, sql: &str, bindings: &Bindings) -> Result<u64, DriverError> {
    if bindings.is_empty() {
        debug!(statement = %sql, "postgres batch");
        client.batch_execute(sql).map_err(driver_error)?;
        return Ok(0);
    }

    let compiled = compile(sql, bindings, PlaceholderStyle::Dollar)?;
    debug!(statement = %compiled.sql, params = compiled.values.len(), "postgres execute");
    let args: Vec<PgValue<'_>> = compiled.values.iter().map(PgValue).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = args.iter().map(|a| a as &(dyn ToSql + Sync)).collect();
    client
        .execute(compiled.sql.as_str(), &refs)
        .map_err(driver_error)
}

/// Adapts a [`Value`] to whatever type the server expects for a parameter.
#[derive(Debug)]
struct PgValue<'a>(&'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                    i.to_string().to_sql(ty, out)
                }
                _ => i.to_sql(ty, out),
            },
            Value::Float(x) => match *ty {
                Type::FLOAT4 => (*x as f32).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                    x.to_string().to_sql(ty, out)
                }
                _ => x.to_sql(ty, out),
            },
            Value::Text(s) => s.as_str().to_sql(ty, out),
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
                Type::DATE => ts.date_naive().to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => ts.to_rfc3339().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Raw column bytes for types without a dedicated decoder.
struct Raw(Vec<u8>);

impl<'a> FromSql<'a> for Raw {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Raw(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_row(row: &Row) -> Result<Vec<Value>, DriverError> {
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = match *column.type_() {
            Type::BOOL => row.try_get::<_, Option<bool>>(i).map(Value::from),
            Type::INT2 => row.try_get::<_, Option<i16>>(i).map(Value::from),
            Type::INT4 => row.try_get::<_, Option<i32>>(i).map(Value::from),
            Type::INT8 => row.try_get::<_, Option<i64>>(i).map(Value::from),
            Type::OID => row.try_get::<_, Option<u32>>(i).map(Value::from),
            Type::FLOAT4 => row.try_get::<_, Option<f32>>(i).map(Value::from),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(i).map(Value::from),
            Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(i).map(Value::from),
            Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(i).map(Value::from),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(i)
                .map(|ts| Value::from(ts.map(|ts| ts.and_utc()))),
            Type::DATE => row
                .try_get::<_, Option<NaiveDate>>(i)
                .map(|d| Value::from(d.map(|d| d.to_string()))),
            Type::TIME => row
                .try_get::<_, Option<NaiveTime>>(i)
                .map(|t| Value::from(t.map(|t| t.to_string()))),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                row.try_get::<_, Option<String>>(i).map(Value::from)
            }
            _ => row.try_get::<_, Option<Raw>>(i).map(|raw| match raw {
                Some(Raw(bytes)) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
                None => Value::Null,
            }),
        };
        values.push(value.map_err(driver_error)?);
    }
    Ok(values)
}

fn driver_error(err: postgres::Error) -> DriverError {
    let kind = if err.code() == Some(&SqlState::UNDEFINED_TABLE) {
        DriverErrorKind::UndefinedTable
    } else {
        DriverErrorKind::Other
    };
    let message = match err.as_db_error() {
        Some(db) => db.to_string(),
        None => err.to_string(),
    };
    DriverError::new(kind, message)
}
