use super::Query;
use crate::document::Document;
use crate::error::{DocError, DocResult};
use crate::param::UniqueParameter;
use crate::value::Value;

/// Parameter names reserved on a query, waiting for their values.
///
/// ```ignore
/// let list = tx.query::<Person>().parameter_pair("age");
/// let sql = format!("[Age] BETWEEN {}", list.placeholders(" AND "));
/// let query = list.bind_values([18, 65])?.bind().filter_sql(&sql);
/// ```
#[derive(Debug)]
#[must_use]
pub struct ParameterList<T> {
    query: Query<T>,
    params: Vec<UniqueParameter>,
}

impl<T: Document> ParameterList<T> {
    pub(super) fn new(query: Query<T>, params: Vec<UniqueParameter>) -> Self {
        Self { query, params }
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(UniqueParameter::name).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `@name` tokens joined by `separator`, for use in raw SQL.
    pub fn placeholders(&self, separator: &str) -> String {
        self.params
            .iter()
            .map(|p| format!("@{}", p.name()))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Supply the values; their number must match the reserved names.
    pub fn bind_values<I, V>(self, values: I) -> DocResult<BoundParameters<T>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() != self.params.len() {
            return Err(DocError::ParameterCount {
                expected: self.params.len(),
                actual: values.len(),
            });
        }
        let bindings = self
            .params
            .iter()
            .map(|p| p.name().to_string())
            .zip(values)
            .collect();
        Ok(BoundParameters {
            query: self.query,
            bindings,
        })
    }
}

/// Reserved parameters with their values; [`BoundParameters::bind`] returns
/// the query with the values in its store.
#[derive(Debug)]
#[must_use]
pub struct BoundParameters<T> {
    query: Query<T>,
    bindings: Vec<(String, Value)>,
}

impl<T: Document> BoundParameters<T> {
    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn bind(self) -> Query<T> {
        self.query.bind_values_raw(self.bindings)
    }
}
