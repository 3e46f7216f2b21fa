//! Column types and pluggable converters for domain types.

use crate::error::{DocError, DocResult};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Declared SQL type of an indexed column or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    Double,
    Text,
    Bytes,
    Uuid,
    Timestamp,
    Json,
    /// A domain type converted by a registered [`TypeHandler`].
    Custom(String),
}

impl SqlType {
    /// PostgreSQL type name, usable in casts.
    pub fn pg_name(&self) -> &str {
        match self {
            SqlType::Boolean => "boolean",
            SqlType::Integer => "integer",
            SqlType::BigInt => "bigint",
            SqlType::Double => "double precision",
            SqlType::Text => "text",
            SqlType::Bytes => "bytea",
            SqlType::Uuid => "uuid",
            SqlType::Timestamp => "timestamptz",
            SqlType::Json => "jsonb",
            SqlType::Custom(name) => name,
        }
    }

    /// SQL Server type name, usable in `CAST(.. AS ..)`.
    pub fn sql_server_name(&self) -> &str {
        match self {
            SqlType::Boolean => "bit",
            SqlType::Integer => "int",
            SqlType::BigInt => "bigint",
            SqlType::Double => "float",
            SqlType::Text | SqlType::Json => "nvarchar(max)",
            SqlType::Bytes => "varbinary(max)",
            SqlType::Uuid => "uniqueidentifier",
            SqlType::Timestamp => "datetimeoffset",
            SqlType::Custom(name) => name,
        }
    }

    /// Text needs no cast when compared against a JSON path.
    pub(crate) fn needs_json_cast(&self) -> bool {
        !matches!(self, SqlType::Text | SqlType::Custom(_))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pg_name())
    }
}

/// Converter for a domain type stored in an indexed column of [`SqlType::Custom`].
///
/// `to_column` runs when a document is split into columns (and when a custom-typed
/// parameter is bound); `from_column` runs when the row is materialized.
pub trait TypeHandler: Send + Sync {
    fn to_column(&self, json: &serde_json::Value) -> DocResult<Value>;

    fn from_column(&self, value: Value) -> DocResult<serde_json::Value>;
}

/// Registry of [`TypeHandler`]s keyed by custom type name.
#[derive(Clone, Default)]
pub struct TypeHandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn TypeHandler>>>>,
}

impl TypeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a custom type name.
    pub fn register(&self, type_name: impl Into<String>, handler: impl TypeHandler + 'static) {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.insert(type_name.into(), Arc::new(handler));
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn TypeHandler>> {
        let handlers = match self.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.get(type_name).cloned()
    }

    /// Convert a JSON property into a column value, using a handler for custom types.
    pub fn to_column(&self, json: &serde_json::Value, sql_type: &SqlType) -> DocResult<Value> {
        match sql_type {
            SqlType::Custom(name) => match self.get(name) {
                Some(handler) => handler.to_column(json),
                None => Value::from_json(json, sql_type),
            },
            _ => Value::from_json(json, sql_type),
        }
    }

    /// Convert a column value back into JSON, using a handler for custom types.
    pub fn from_column(&self, value: Value, sql_type: &SqlType) -> DocResult<serde_json::Value> {
        match sql_type {
            SqlType::Custom(name) if !value.is_null() => match self.get(name) {
                Some(handler) => handler.from_column(value),
                None => Ok(value.into_json()),
            },
            _ => Ok(value.into_json()),
        }
    }
}

impl fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = match self.handlers.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        f.debug_struct("TypeHandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}

/// Helper for handlers that reject values they cannot convert.
pub fn handler_error(type_name: &str, message: impl fmt::Display) -> DocError {
    DocError::validation(format!("{type_name}: {message}"))
}
