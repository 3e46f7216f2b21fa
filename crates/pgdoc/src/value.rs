//! Dynamically-typed parameter and column values.
//!
//! [`Value`] is what the parameter store holds and what indexed columns are
//! materialized into before they are merged back into the JSON document.

use crate::error::{DocError, DocResult};
use crate::types::SqlType;
use bytes::BytesMut;
use chrono::{DateTime, SecondsFormat, Utc};
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A single bindable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    /// Enumerable value, expanded into one placeholder per element.
    List(Vec<Value>),
    /// Table-valued parameter, bound as a single set (bulk id lookups).
    Table(Vec<Value>),
}

impl Value {
    /// Build a table-valued parameter from any iterator of values.
    pub fn table<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Table(values.into_iter().map(Into::into).collect())
    }

    /// Build a list parameter from any iterator of values.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for list and table-valued parameters.
    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::Table(_))
    }

    /// Elements of a collection value, `None` for scalars.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Table(items) => Some(items),
            _ => None,
        }
    }

    /// The SQL type a JSON-path comparison against this value should be cast to.
    ///
    /// Text compares as text (no cast); collections use their first element.
    pub fn comparison_type(&self) -> Option<SqlType> {
        match self {
            Value::Bool(_) => Some(SqlType::Boolean),
            Value::Int(_) | Value::BigInt(_) => Some(SqlType::BigInt),
            Value::Double(_) => Some(SqlType::Double),
            Value::Uuid(_) => Some(SqlType::Uuid),
            Value::Timestamp(_) => Some(SqlType::Timestamp),
            Value::List(items) | Value::Table(items) => {
                items.first().and_then(Value::comparison_type)
            }
            _ => None,
        }
    }

    /// Convert a JSON property into a column value of the declared type.
    pub fn from_json(json: &serde_json::Value, sql_type: &SqlType) -> DocResult<Self> {
        use serde_json::Value as J;

        if json.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = || {
            DocError::validation(format!(
                "JSON value {json} cannot be stored in a {} column",
                sql_type.pg_name()
            ))
        };
        let value = match sql_type {
            SqlType::Boolean => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
            SqlType::Integer => {
                let n = json.as_i64().ok_or_else(mismatch)?;
                Value::Int(i32::try_from(n).map_err(|_| mismatch())?)
            }
            SqlType::BigInt => Value::BigInt(json.as_i64().ok_or_else(mismatch)?),
            SqlType::Double => Value::Double(json.as_f64().ok_or_else(mismatch)?),
            SqlType::Text | SqlType::Custom(_) => match json {
                J::String(s) => Value::Text(s.clone()),
                other => Value::Text(other.to_string()),
            },
            SqlType::Bytes => {
                let items = json.as_array().ok_or_else(mismatch)?;
                let bytes = items
                    .iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(mismatch)?;
                Value::Bytes(bytes)
            }
            SqlType::Uuid => {
                let s = json.as_str().ok_or_else(mismatch)?;
                Value::Uuid(Uuid::parse_str(s).map_err(|_| mismatch())?)
            }
            SqlType::Timestamp => {
                let s = json.as_str().ok_or_else(mismatch)?;
                let ts = DateTime::parse_from_rfc3339(s).map_err(|_| mismatch())?;
                Value::Timestamp(ts.with_timezone(&Utc))
            }
            SqlType::Json => Value::Json(json.clone()),
        };
        Ok(value)
    }

    /// Convert a column value back into the JSON shape serde produces for it.
    pub fn into_json(self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(b),
            Value::Int(n) => J::from(n),
            Value::BigInt(n) => J::from(n),
            Value::Double(f) => J::from(f),
            Value::Text(s) => J::String(s),
            Value::Bytes(b) => J::Array(b.into_iter().map(J::from).collect()),
            Value::Uuid(u) => J::String(u.to_string()),
            Value::Timestamp(ts) => J::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Json(j) => j,
            Value::List(items) | Value::Table(items) => {
                J::Array(items.into_iter().map(Value::into_json).collect())
            }
        }
    }

    /// Length used for max-length validation of indexed text columns.
    pub(crate) fn text_len(&self) -> Option<usize> {
        match self {
            Value::Text(s) => Some(s.chars().count()),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => BigInt,
    f32 => Double,
    f64 => Double,
    String => Text,
    &str => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    serde_json::Value => Json,
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Value::list(v.iter().cloned())
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(n) => match *ty {
                Type::INT8 => i64::from(*n).to_sql(ty, out),
                Type::INT2 => i16::try_from(*n)?.to_sql(ty, out),
                Type::FLOAT8 => f64::from(*n).to_sql(ty, out),
                _ => n.to_sql(ty, out),
            },
            Value::BigInt(n) => match *ty {
                Type::INT4 => i32::try_from(*n)?.to_sql(ty, out),
                Type::INT2 => i16::try_from(*n)?.to_sql(ty, out),
                _ => n.to_sql(ty, out),
            },
            Value::Double(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    serde_json::Value::String(s.clone()).to_sql(ty, out)
                }
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Uuid(u) => u.to_sql(ty, out),
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
            Value::Json(j) => j.to_sql(ty, out),
            Value::List(items) | Value::Table(items) => items.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let value = match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i32::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?),
            Type::INT8 => Value::BigInt(i64::from_sql(ty, raw)?),
            Type::FLOAT4 => Value::Double(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => Value::Double(f64::from_sql(ty, raw)?),
            Type::BYTEA => Value::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            Type::UUID => Value::Uuid(Uuid::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::TIMESTAMP => {
                Value::Timestamp(chrono::NaiveDateTime::from_sql(ty, raw)?.and_utc())
            }
            Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
            _ => Value::Text(String::from_sql(ty, raw)?),
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::BYTEA
                | Type::UUID
                | Type::TIMESTAMPTZ
                | Type::TIMESTAMP
                | Type::JSON
                | Type::JSONB
        ) || <String as FromSql>::accepts(ty)
    }
}
