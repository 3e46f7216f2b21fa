use super::Dialect;
use crate::ast::LikeKind;
use crate::error::{DocError, DocResult};
use crate::param::{BoundParam, ParamStore};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Part {
    Raw(String),
    Param(String),
    Like { name: String, kind: LikeKind },
}

/// Rendered SQL text plus parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

/// Accumulates SQL text and parameter references, then resolves them against a
/// [`ParamStore`].
///
/// - `SqlServer`: `@name`; list values become `(@name_0, @name_1, ...)`,
///   table values `(SELECT [Value] FROM @name)`.
/// - `Postgres`: `$n` numbered by first appearance of each name (repeated names
///   reuse their number); list values become `($a, $b, ...)`, table values bind
///   one array.
///
/// Only referenced parameters are bound.
#[derive(Debug, Clone)]
pub struct SqlWriter {
    dialect: Dialect,
    parts: Vec<Part>,
}

impl SqlWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            parts: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(Part::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(Part::Raw(sql.to_string())),
        }
        self
    }

    /// Append a quoted identifier.
    pub fn ident(&mut self, name: &str) -> &mut Self {
        let quoted = self.dialect.quote(name);
        self.push(&quoted)
    }

    /// Append a parameter placeholder.
    pub fn param(&mut self, name: &str) -> &mut Self {
        self.parts.push(Part::Param(name.to_string()));
        self
    }

    /// Append a placeholder whose text value becomes an escaped LIKE pattern.
    pub fn like_param(&mut self, name: &str, kind: LikeKind) -> &mut Self {
        self.parts.push(Part::Like {
            name: name.to_string(),
            kind,
        });
        self
    }

    /// Resolve parameter references and produce the final statement.
    pub fn finish(self, store: &ParamStore) -> DocResult<Statement> {
        let mut out = Placeholders {
            dialect: self.dialect,
            store,
            sql: String::new(),
            params: Vec::new(),
            positions: HashMap::new(),
        };

        for part in self.parts {
            match part {
                Part::Raw(text) => out.sql.push_str(&text),
                Part::Param(name) => {
                    let value = lookup(store, &name)?;
                    match value {
                        Value::List(items) => {
                            out.sql.push('(');
                            if items.is_empty() {
                                out.sql.push_str("NULL");
                            }
                            for (i, item) in items.iter().enumerate() {
                                if i > 0 {
                                    out.sql.push_str(", ");
                                }
                                out.placeholder(&format!("{name}_{i}"), item.clone());
                            }
                            out.sql.push(')');
                        }
                        Value::Table(_) if self.dialect == Dialect::SqlServer => {
                            out.sql.push_str("(SELECT [Value] FROM ");
                            out.placeholder(&name, value.clone());
                            out.sql.push(')');
                        }
                        _ => out.placeholder(&name, value.clone()),
                    }
                }
                Part::Like { name, kind } => match lookup(store, &name)? {
                    Value::Text(literal) => {
                        let pattern = self.dialect.like_pattern(kind, literal);
                        out.placeholder(&name, Value::Text(pattern));
                    }
                    other => {
                        return Err(DocError::validation(format!(
                            "LIKE parameter @{name} must be text, got {other:?}"
                        )));
                    }
                },
            }
        }

        Ok(Statement {
            sql: out.sql,
            params: out.params,
        })
    }
}

fn lookup<'a>(store: &'a ParamStore, name: &str) -> DocResult<&'a Value> {
    store
        .get(name)
        .ok_or_else(|| DocError::validation(format!("parameter @{name} has no value")))
}

struct Placeholders<'a> {
    dialect: Dialect,
    store: &'a ParamStore,
    sql: String,
    params: Vec<BoundParam>,
    positions: HashMap<String, usize>,
}

impl Placeholders<'_> {
    fn placeholder(&mut self, name: &str, value: Value) {
        let sql_type = self.store.sql_type(name).cloned();
        let position = match self.positions.get(name) {
            Some(&position) => position,
            None => {
                self.params.push(BoundParam {
                    name: name.to_string(),
                    value,
                    sql_type: sql_type.clone(),
                });
                self.positions.insert(name.to_string(), self.params.len());
                self.params.len()
            }
        };
        match self.dialect {
            Dialect::SqlServer => {
                self.sql.push('@');
                self.sql.push_str(name);
            }
            Dialect::Postgres => {
                self.sql.push('$');
                self.sql.push_str(&position.to_string());
                if let Some(ty) = sql_type {
                    self.sql.push_str("::");
                    self.sql.push_str(ty.pg_name());
                }
            }
        }
    }
}
