//! Reader strategies: how a row becomes the value a terminal call returns.
//!
//! - documents go through [`read_document`]: blob + id + indexed columns are
//!   merged back into one JSON object and deserialized (polymorphic tables
//!   pick the concrete type from the discriminator column);
//! - scalars read column 0;
//! - tuples read columns `0..N` in order;
//! - projection structs derive [`FromRow`] and read columns by name.

use crate::document::{Document, DocumentMap};
use crate::error::{DocError, DocResult};
use crate::types::TypeHandlerRegistry;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;
use uuid::Uuid;

/// Trait for converting a database row into a Rust value.
///
/// Derive it for projection structs with `#[derive(FromRow)]`:
///
/// ```ignore
/// use pgdoc::FromRow;
///
/// #[derive(FromRow)]
/// struct NameCount {
///     #[doc_map(column = "LastName")]
///     last_name: String,
///     people: i64,
/// }
///
/// let counts: Vec<NameCount> = tx
///     .query::<Person>()
///     .select(["lastName"])
///     .aggregate(Aggregate::Count, "id", "people")
///     .group_by("lastName")
///     .to_list_as(&tx)
///     .await?;
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> DocResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning `DocError::Decode` on failure
    fn try_get_column<T>(&self, column: &str) -> DocResult<T>
    where
        T: for<'a> FromSql<'a>;

    /// Try to get a column value by position.
    fn try_get_index<T>(&self, index: usize) -> DocResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> DocResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| DocError::decode(column, e.to_string()))
    }

    fn try_get_index<T>(&self, index: usize) -> DocResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(index)
            .map_err(|e| DocError::decode(format!("#{index}"), e.to_string()))
    }
}

macro_rules! scalar_from_row {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row) -> DocResult<Self> {
                    row.try_get_index(0)
                }
            }

            impl FromRow for Option<$ty> {
                fn from_row(row: &Row) -> DocResult<Self> {
                    row.try_get_index(0)
                }
            }
        )*
    };
}

scalar_from_row!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Vec<u8>,
    Uuid,
    DateTime<Utc>,
    NaiveDate,
    NaiveDateTime,
    serde_json::Value,
);

impl FromRow for Value {
    fn from_row(row: &Row) -> DocResult<Self> {
        row.try_get_index(0)
    }
}

macro_rules! tuple_from_row {
    ($(($($name:ident : $index:tt),+)),* $(,)?) => {
        $(
            impl<$($name),+> FromRow for ($($name,)+)
            where
                $($name: for<'a> FromSql<'a>),+
            {
                fn from_row(row: &Row) -> DocResult<Self> {
                    Ok(($(row.try_get_index::<$name>($index)?,)+))
                }
            }
        )*
    };
}

tuple_from_row!(
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
    (A: 0, B: 1, C: 2, D: 3, E: 4),
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5),
);

/// Materialize a document row into `T`.
pub fn read_document<T: Document>(
    map: &DocumentMap,
    handlers: &TypeHandlerRegistry,
    row: &Row,
) -> DocResult<T> {
    let (discriminator, json) = map.materialize(row, handlers)?;
    let concrete = map.concrete_type(discriminator.as_deref())?;
    let mut document = T::from_document(concrete, json)?;
    // The id lives in its own column; keep it authoritative.
    let id: i64 = row.try_get_column(map.id_column())?;
    if document.id() != id {
        document.set_id(id);
    }
    Ok(document)
}
