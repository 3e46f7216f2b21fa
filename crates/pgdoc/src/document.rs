//! Documents and their per-type column maps.
//!
//! A document is serialized with serde as a whole; the properties declared as
//! indexed are lifted out of the JSON object into real columns and the rest is
//! stored in the blob column. [`DocumentMap::target`] is the single place that
//! decides where a field lives, so predicates, inserts and row materialization
//! always agree.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, pgdoc::Document)]
//! #[doc_map(table = "People")]
//! struct Person {
//!     #[doc_map(id)]
//!     id: i64,
//!     #[doc_map(indexed, max_length = 100)]
//!     first_name: String,
//!     #[doc_map(indexed, max_length = 100)]
//!     last_name: String,
//!     nickname: Option<String>,
//! }
//! ```

use crate::ast::FieldRef;
use crate::error::{DocError, DocResult};
use crate::ident::{field_path, validate_identifier};
use crate::types::{SqlType, TypeHandlerRegistry};
use crate::value::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_postgres::Row;

/// Default name of the JSON blob column.
pub const DOCUMENT_COLUMN: &str = "Document";

/// A value persisted as one row: indexed columns plus a JSON blob.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Column map for this type.
    fn map() -> DocumentMap;

    /// Current id; `0` means "not assigned yet".
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Discriminator value stored for polymorphic tables.
    fn discriminator(&self) -> Option<&str> {
        None
    }

    /// Rebuild a document from its merged JSON.
    ///
    /// `concrete` is the type name the map's [`TypeResolver`] picked for the
    /// row's discriminator; it is `None` for tables without one.
    fn from_document(concrete: Option<&str>, json: serde_json::Value) -> DocResult<Self> {
        let _ = concrete;
        Ok(serde_json::from_value(json)?)
    }
}

/// A property promoted to a real column.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedColumn {
    /// JSON property name.
    pub key: String,
    pub column: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub max_length: Option<usize>,
}

impl IndexedColumn {
    pub fn new(key: impl Into<String>, column: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            sql_type,
            nullable: false,
            max_length: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// A unique constraint with the message reported when it is violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
    pub message: String,
}

impl UniqueConstraint {
    pub fn new<I, S>(name: impl Into<String>, columns: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

/// Discriminator column ↔ concrete type mapping for polymorphic tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeResolver {
    pub column: String,
    variants: Vec<(String, String)>,
}

impl TypeResolver {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            variants: Vec::new(),
        }
    }

    /// Map a discriminator value to a concrete type name.
    pub fn variant(mut self, discriminator: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.variants.push((discriminator.into(), type_name.into()));
        self
    }

    pub fn type_for(&self, discriminator: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|(d, _)| d == discriminator)
            .map(|(_, t)| t.as_str())
    }

    pub fn discriminator_for(&self, type_name: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, t)| t == type_name)
            .map(|(d, _)| d.as_str())
    }
}

/// Where a document field is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTarget<'a> {
    Id(&'a str),
    Column(&'a IndexedColumn),
    Discriminator(&'a str),
    Json(Vec<String>),
}

/// Per-type metadata: table, id column, indexed columns, unique constraints
/// and optional discriminator.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMap {
    type_name: String,
    table: String,
    id_key: String,
    id_column: String,
    document_column: String,
    columns: Vec<IndexedColumn>,
    unique: Vec<UniqueConstraint>,
    resolver: Option<TypeResolver>,
}

impl DocumentMap {
    /// New map for `T` stored in `table`, with id `id` → `Id`.
    pub fn for_type<T: ?Sized>(table: impl Into<String>) -> Self {
        Self::new(std::any::type_name::<T>(), table)
    }

    pub fn new(type_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: table.into(),
            id_key: "id".into(),
            id_column: "Id".into(),
            document_column: DOCUMENT_COLUMN.into(),
            columns: Vec::new(),
            unique: Vec::new(),
            resolver: None,
        }
    }

    /// Set the id property and column.
    pub fn id(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.id_key = key.into();
        self.id_column = column.into();
        self
    }

    /// Reuse this map for another type stored in the same table.
    pub fn retyped<T: ?Sized>(mut self) -> Self {
        self.type_name = std::any::type_name::<T>().to_string();
        self
    }

    pub fn document_column(mut self, column: impl Into<String>) -> Self {
        self.document_column = column.into();
        self
    }

    pub fn indexed(mut self, column: IndexedColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn unique(mut self, constraint: UniqueConstraint) -> Self {
        self.unique.push(constraint);
        self
    }

    pub fn resolver(mut self, resolver: TypeResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn blob_column(&self) -> &str {
        &self.document_column
    }

    pub fn columns(&self) -> &[IndexedColumn] {
        &self.columns
    }

    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique
    }

    pub fn type_resolver(&self) -> Option<&TypeResolver> {
        self.resolver.as_ref()
    }

    /// The configured unique constraint with this (case-insensitive) name.
    pub fn unique_constraint(&self, name: &str) -> Option<&UniqueConstraint> {
        self.unique
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Concrete type name for a row's discriminator value.
    ///
    /// Tables without a resolver yield `None`. With one, a missing or unknown
    /// discriminator is a decode error.
    pub fn concrete_type(&self, discriminator: Option<&str>) -> DocResult<Option<&str>> {
        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };
        let Some(value) = discriminator else {
            return Err(DocError::decode(&resolver.column, "missing discriminator"));
        };
        match resolver.type_for(value) {
            Some(type_name) => Ok(Some(type_name)),
            None => Err(DocError::decode(
                &resolver.column,
                format!("no type registered for discriminator `{value}`"),
            )),
        }
    }

    /// Check every name that will be rendered into SQL.
    pub fn validate(&self) -> DocResult<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.id_column)?;
        validate_identifier(&self.document_column)?;
        for column in &self.columns {
            validate_identifier(&column.key)?;
            validate_identifier(&column.column)?;
        }
        if let Some(resolver) = &self.resolver {
            validate_identifier(&resolver.column)?;
        }
        Ok(())
    }

    /// Decide where `field` lives. Accepts JSON property names and column names.
    pub fn target(&self, field: &str) -> DocResult<FieldTarget<'_>> {
        if field == self.id_key || field.eq_ignore_ascii_case(&self.id_column) {
            return Ok(FieldTarget::Id(&self.id_column));
        }
        if let Some(column) = self
            .columns
            .iter()
            .find(|c| c.key == field || c.column.eq_ignore_ascii_case(field))
        {
            return Ok(FieldTarget::Column(column));
        }
        if let Some(resolver) = &self.resolver {
            if resolver.column.eq_ignore_ascii_case(field) {
                return Ok(FieldTarget::Discriminator(&resolver.column));
            }
        }
        let path = field_path(field)?;
        Ok(FieldTarget::Json(path.into_iter().map(String::from).collect()))
    }

    /// SQL reference for `field`; JSON properties are cast to `cast` when compared.
    pub fn field_ref(&self, field: &str, cast: Option<SqlType>) -> DocResult<FieldRef> {
        Ok(match self.target(field)? {
            FieldTarget::Id(column) | FieldTarget::Discriminator(column) => {
                FieldRef::column(column)
            }
            FieldTarget::Column(column) => FieldRef::column(&column.column),
            FieldTarget::Json(path) => FieldRef::json(&self.document_column, path, cast),
        })
    }

    /// Split a serialized document into id, column values and the remaining blob.
    pub fn split(
        &self,
        json: serde_json::Value,
        handlers: &TypeHandlerRegistry,
    ) -> DocResult<SplitDocument> {
        let serde_json::Value::Object(mut object) = json else {
            return Err(DocError::Serialization(format!(
                "{} must serialize to a JSON object",
                self.type_name
            )));
        };
        object.remove(&self.id_key);

        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let json = object.remove(&column.key).unwrap_or(serde_json::Value::Null);
            let value = handlers.to_column(&json, &column.sql_type)?;
            if value.is_null() && !column.nullable {
                return Err(DocError::validation(format!(
                    "{}.{} is not nullable",
                    self.table, column.column
                )));
            }
            if let (Some(max), Some(len)) = (column.max_length, value.text_len()) {
                if len > max {
                    return Err(DocError::validation(format!(
                        "{}.{} exceeds its maximum length of {max} ({len})",
                        self.table, column.column
                    )));
                }
            }
            columns.push(SplitColumn {
                column: column.column.clone(),
                value,
            });
        }

        Ok(SplitDocument {
            columns,
            document: serde_json::Value::Object(object),
        })
    }

    /// Rebuild the full JSON document from a row: blob + id + indexed columns.
    ///
    /// Returns the discriminator value alongside, if the table has one.
    pub fn materialize(
        &self,
        row: &Row,
        handlers: &TypeHandlerRegistry,
    ) -> DocResult<(Option<String>, serde_json::Value)> {
        let blob: Option<serde_json::Value> = row
            .try_get(self.document_column.as_str())
            .map_err(|e| DocError::decode(&self.document_column, e.to_string()))?;
        let mut object = match blob {
            Some(serde_json::Value::Object(object)) => object,
            Some(other) => {
                return Err(DocError::decode(
                    &self.document_column,
                    format!("expected a JSON object, got {other}"),
                ));
            }
            None => serde_json::Map::new(),
        };

        let id: i64 = row
            .try_get(self.id_column.as_str())
            .map_err(|e| DocError::decode(&self.id_column, e.to_string()))?;
        object.insert(self.id_key.clone(), serde_json::Value::from(id));

        for column in &self.columns {
            let value: Value = row
                .try_get(column.column.as_str())
                .map_err(|e| DocError::decode(&column.column, e.to_string()))?;
            let json = handlers.from_column(value, &column.sql_type)?;
            object.insert(column.key.clone(), json);
        }

        let discriminator = match &self.resolver {
            Some(resolver) => row
                .try_get::<_, Option<String>>(resolver.column.as_str())
                .map_err(|e| DocError::decode(&resolver.column, e.to_string()))?,
            None => None,
        };

        Ok((discriminator, serde_json::Value::Object(object)))
    }
}

/// One indexed column value extracted from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitColumn {
    pub column: String,
    pub value: Value,
}

/// A document split into column values and the JSON blob.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDocument {
    pub columns: Vec<SplitColumn>,
    pub document: serde_json::Value,
}

/// Static registration emitted by `#[derive(Document)]`.
pub struct DocumentRegistration {
    /// `std::any::type_name` of the document type.
    pub type_name: fn() -> &'static str,
    pub map: fn() -> DocumentMap,
}

inventory::collect!(DocumentRegistration);

/// Read-mostly lookup of document maps by type.
#[derive(Debug, Clone, Default)]
pub struct DocumentMapRegistry {
    maps: Arc<RwLock<HashMap<String, Arc<DocumentMap>>>>,
}

impl DocumentMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every `#[derive(Document)]` type linked in.
    pub fn from_inventory() -> Self {
        let registry = Self::new();
        for registration in inventory::iter::<DocumentRegistration> {
            let map = (registration.map)();
            registry.insert((registration.type_name)().to_string(), map);
        }
        registry
    }

    /// Register a map under its own type name.
    pub fn register(&self, map: DocumentMap) {
        self.insert(map.type_name.clone(), map);
    }

    fn insert(&self, type_name: String, map: DocumentMap) {
        let mut maps = match self.maps.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        maps.insert(type_name, Arc::new(map));
    }

    /// Map for `T`, building and caching it from [`Document::map`] on first use.
    pub fn resolve<T: Document>(&self) -> DocResult<Arc<DocumentMap>> {
        let type_name = std::any::type_name::<T>();
        if let Some(map) = self.resolve_optional(type_name) {
            return Ok(map);
        }
        let map = T::map();
        map.validate()?;
        let map = Arc::new(map);
        let mut maps = match self.maps.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(maps
            .entry(type_name.to_string())
            .or_insert(map)
            .clone())
    }

    /// Map registered under `type_name`, if any.
    pub fn resolve_optional(&self, type_name: &str) -> Option<Arc<DocumentMap>> {
        let maps = match self.maps.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        maps.get(type_name).cloned()
    }

    pub fn len(&self) -> usize {
        match self.maps.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
