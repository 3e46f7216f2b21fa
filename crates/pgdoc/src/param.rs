//! Parameter store: name → value bindings owned by a single query.
//!
//! Names are normalized (`@` stripped, spaces and dashes become `_`, lower-cased)
//! so builder-generated and user-supplied names compare case-insensitively.
//! Builders that branch (join, union, subquery) clone the store; merging two
//! stores renames colliding right-hand names and reports the renames so the
//! caller can rewrite its AST.

use crate::types::SqlType;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Normalize a parameter name.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_start_matches('@')
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// A logical parameter: normalized name plus optional declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    sql_type: Option<SqlType>,
}

impl Parameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            sql_type: None,
        }
    }

    pub fn typed(name: &str, sql_type: SqlType) -> Self {
        Self {
            name: normalize_name(name),
            sql_type: Some(sql_type),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> Option<&SqlType> {
        self.sql_type.as_ref()
    }
}

/// A parameter whose name was disambiguated by the owning store
/// (`<name>__<n>`), used whenever one logical field appears more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueParameter {
    base: String,
    param: Parameter,
}

impl UniqueParameter {
    /// The logical name this parameter was derived from.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn name(&self) -> &str {
        self.param.name()
    }

    pub fn parameter(&self) -> &Parameter {
        &self.param
    }
}

/// A parameter value ready to be bound, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: Value,
    pub sql_type: Option<SqlType>,
}

/// Name → value map for one in-flight query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamStore {
    values: BTreeMap<String, Value>,
    types: BTreeMap<String, SqlType>,
    counter: u32,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value; an existing binding with the same (normalized) name is replaced.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> String {
        let name = normalize_name(name);
        self.values.insert(name.clone(), value.into());
        name
    }

    /// Bind a value with a declared type.
    pub fn set_param(&mut self, param: &Parameter, value: impl Into<Value>) {
        if let Some(ty) = param.sql_type() {
            self.types.insert(param.name().to_string(), ty.clone());
        }
        self.values.insert(param.name().to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&normalize_name(name))
    }

    pub fn sql_type(&self, name: &str) -> Option<&SqlType> {
        self.types.get(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Allocate a fresh disambiguated name for `base`.
    pub fn unique(&mut self, base: &str) -> UniqueParameter {
        let base = normalize_name(base);
        loop {
            let name = format!("{base}__{}", self.counter);
            self.counter += 1;
            if !self.values.contains_key(&name) {
                return UniqueParameter {
                    param: Parameter {
                        name,
                        sql_type: None,
                    },
                    base,
                };
            }
        }
    }

    /// Bind `value` under a fresh unique name derived from `base`.
    pub fn bind_unique(&mut self, base: &str, value: impl Into<Value>) -> String {
        let param = self.unique(base);
        let name = param.name().to_string();
        self.values.insert(name.clone(), value.into());
        name
    }

    /// Merge `other` into this store.
    ///
    /// Right-hand names that collide with an existing binding holding a
    /// different value are renamed; the returned map (old → new) must be
    /// applied to the right-hand AST.
    pub fn merge(&mut self, other: ParamStore) -> HashMap<String, String> {
        let mut renames = HashMap::new();
        self.counter = self.counter.max(other.counter);
        for (name, value) in other.values {
            let target = match self.values.get(&name) {
                None => name.clone(),
                Some(existing) if *existing == value => continue,
                Some(_) => {
                    let base = name.split("__").next().unwrap_or(&name).to_string();
                    let fresh = self.unique(&base).name().to_string();
                    renames.insert(name.clone(), fresh.clone());
                    fresh
                }
            };
            if let Some(ty) = other.types.get(&name) {
                self.types.insert(target.clone(), ty.clone());
            }
            self.values.insert(target, value);
        }
        renames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("@First Name"), "first_name");
        assert_eq!(normalize_name("last-name"), "last_name");
        assert_eq!(normalize_name("ID"), "id");
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let mut store = ParamStore::new();
        store.set("@FirstName", "Donald");
        assert_eq!(store.get("firstname"), Some(&Value::Text("Donald".into())));
        assert!(store.contains("FIRSTNAME"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unique_names_are_sequential() {
        let mut store = ParamStore::new();
        assert_eq!(store.unique("Age").name(), "age__0");
        assert_eq!(store.unique("Age").name(), "age__1");
        assert_eq!(store.unique("Name").base(), "name");
    }

    #[test]
    fn merge_renames_collisions_only() {
        let mut left = ParamStore::new();
        left.bind_unique("age", 30);
        left.set("shared", "x");

        let mut right = ParamStore::new();
        right.bind_unique("age", 40);
        right.set("shared", "x");
        right.set("extra", 1);

        let renames = left.merge(right);
        assert_eq!(renames.len(), 1);
        let renamed = &renames["age__0"];
        assert_eq!(left.get(renamed), Some(&Value::Int(40)));
        assert_eq!(left.get("age__0"), Some(&Value::Int(30)));
        assert_eq!(left.get("extra"), Some(&Value::Int(1)));
        assert_eq!(left.len(), 4);
    }

    #[test]
    fn branches_do_not_share_state() {
        let mut base = ParamStore::new();
        base.set("a", 1);
        let mut branch = base.clone();
        branch.set("b", 2);
        assert!(!base.contains("b"));
    }
}
