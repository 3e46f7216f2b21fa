use crate::ast::{JoinKind, LikeKind, TableHint};
use crate::types::SqlType;

/// Target SQL dialect.
///
/// `Postgres` is what the store executes. `SqlServer` renders the bracket-quoted,
/// `@name` reference form, useful for inspecting generated statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    SqlServer,
    #[default]
    Postgres,
}

impl Dialect {
    /// Quote an identifier.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::SqlServer => format!("[{}]", ident.replace(']', "]]")),
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quote an optionally qualified column reference.
    pub fn column(self, qualifier: Option<&str>, name: &str) -> String {
        match qualifier {
            Some(q) => format!("{}.{}", self.quote(q), self.quote(name)),
            None => self.quote(name),
        }
    }

    /// Expression extracting a JSON property from the blob column as text,
    /// optionally cast to a SQL type.
    ///
    /// Path segments are validated identifiers, so inlining them is safe.
    pub fn json_value(
        self,
        qualifier: Option<&str>,
        column: &str,
        path: &[String],
        cast: Option<&SqlType>,
    ) -> String {
        let column = self.column(qualifier, column);
        let cast = cast.filter(|ty| ty.needs_json_cast());
        match self {
            Dialect::SqlServer => {
                let extract = format!("JSON_VALUE({column}, '$.{}')", path.join("."));
                match cast {
                    Some(ty) => format!("CAST({extract} AS {})", ty.sql_server_name()),
                    None => extract,
                }
            }
            Dialect::Postgres => {
                let extract = format!("({column} #>> '{{{}}}')", path.join(","));
                match cast {
                    Some(ty) => format!("({extract}::{})", ty.pg_name()),
                    None => extract,
                }
            }
        }
    }

    /// Join keyword for inner and left-hash joins.
    pub fn join_keyword(self, kind: JoinKind) -> &'static str {
        match (self, kind) {
            (_, JoinKind::Inner) => " INNER JOIN ",
            (Dialect::SqlServer, JoinKind::LeftHash) => " LEFT HASH JOIN ",
            (Dialect::Postgres, JoinKind::LeftHash) => " LEFT JOIN ",
            (Dialect::SqlServer, JoinKind::CrossApply) => " CROSS APPLY ",
            (Dialect::Postgres, JoinKind::CrossApply) => " CROSS JOIN LATERAL ",
        }
    }

    /// Table hint clause, if the dialect supports hints.
    pub fn table_hint(self, hint: TableHint) -> Option<String> {
        match self {
            Dialect::SqlServer => Some(format!(" WITH ({})", hint.keyword())),
            Dialect::Postgres => None,
        }
    }

    /// Escape LIKE metacharacters in a literal.
    pub fn escape_like(self, literal: &str) -> String {
        let mut out = String::with_capacity(literal.len() + 4);
        for c in literal.chars() {
            match (self, c) {
                (Dialect::SqlServer, '%' | '_' | '[') => {
                    out.push('[');
                    out.push(c);
                    out.push(']');
                }
                (Dialect::Postgres, '%' | '_' | '[' | '\\') => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        out
    }

    /// Build the LIKE pattern for a literal.
    pub fn like_pattern(self, kind: LikeKind, literal: &str) -> String {
        let escaped = self.escape_like(literal);
        match kind {
            LikeKind::Contains => format!("%{escaped}%"),
            LikeKind::StartsWith => format!("{escaped}%"),
            LikeKind::EndsWith => format!("%{escaped}"),
        }
    }
}
