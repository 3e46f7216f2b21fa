//! Statements for single-document operations.

use super::{Dialect, SqlGenerator, SqlWriter, Statement};
use crate::ast::{CompareOp, FieldRef, SelectAst, WhereNode};
use crate::document::{DocumentMap, SplitDocument};
use crate::error::DocResult;
use crate::param::{ParamStore, normalize_name};
use crate::value::Value;

struct Assignment {
    column: String,
    param: String,
}

fn assignments(
    map: &DocumentMap,
    split: &SplitDocument,
    discriminator: Option<&str>,
    store: &mut ParamStore,
) -> Vec<Assignment> {
    let mut out = Vec::with_capacity(split.columns.len() + 2);
    for column in &split.columns {
        let param = store.set(&normalize_name(&column.column), column.value.clone());
        out.push(Assignment {
            column: column.column.clone(),
            param,
        });
    }
    if let Some(resolver) = map.type_resolver() {
        let param = store.set(&resolver.column, Value::from(discriminator));
        out.push(Assignment {
            column: resolver.column.clone(),
            param,
        });
    }
    let param = store.set(map.blob_column(), split.document.clone());
    out.push(Assignment {
        column: map.blob_column().to_string(),
        param,
    });
    out
}

/// `INSERT INTO [T] ([Id], [Col]..., [Document]) VALUES (@id, @col..., @document)`
pub fn insert(
    dialect: Dialect,
    map: &DocumentMap,
    id: i64,
    split: &SplitDocument,
    discriminator: Option<&str>,
) -> DocResult<Statement> {
    let mut store = ParamStore::new();
    let id_param = store.set(map.id_column(), id);
    let assignments = assignments(map, split, discriminator, &mut store);

    let mut w = SqlWriter::new(dialect);
    w.push("INSERT INTO ").ident(map.table()).push(" (");
    w.ident(map.id_column());
    for a in &assignments {
        w.push(", ").ident(&a.column);
    }
    w.push(") VALUES (").param(&id_param);
    for a in &assignments {
        w.push(", ").param(&a.param);
    }
    w.push(")");
    w.finish(&store)
}

/// `UPDATE [T] SET [Col] = @col, ..., [Document] = @document WHERE [Id] = @id`
pub fn update(
    dialect: Dialect,
    map: &DocumentMap,
    id: i64,
    split: &SplitDocument,
    discriminator: Option<&str>,
) -> DocResult<Statement> {
    let mut store = ParamStore::new();
    let id_param = store.set(map.id_column(), id);
    let assignments = assignments(map, split, discriminator, &mut store);

    let mut w = SqlWriter::new(dialect);
    w.push("UPDATE ").ident(map.table()).push(" SET ");
    for (i, a) in assignments.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.ident(&a.column).push(" = ").param(&a.param);
    }
    w.push(" WHERE ").ident(map.id_column()).push(" = ").param(&id_param);
    w.finish(&store)
}

fn by_id(map: &DocumentMap, store: &mut ParamStore, id: i64) -> SelectAst {
    let param = store.set(map.id_column(), id);
    let mut ast = SelectAst::from_table(map.table());
    ast.filter = Some(WhereNode::Unary {
        field: FieldRef::column(map.id_column()),
        op: CompareOp::Eq,
        param,
    });
    ast
}

/// `SELECT * FROM [T] WHERE [Id] = @id`
pub fn load(dialect: Dialect, map: &DocumentMap, id: i64) -> DocResult<Statement> {
    let mut store = ParamStore::new();
    let ast = by_id(map, &mut store, id);
    SqlGenerator::new(dialect, &store).select(&ast)
}

/// `SELECT * FROM [T] WHERE [Id] IN (<table-valued ids>) ORDER BY [Id] ASC`
pub fn load_many(dialect: Dialect, map: &DocumentMap, ids: &[i64]) -> DocResult<Statement> {
    let mut store = ParamStore::new();
    let param = store.set("ids", Value::table(ids.iter().copied()));
    let mut ast = SelectAst::from_table(map.table());
    ast.filter = Some(WhereNode::Array {
        field: FieldRef::column(map.id_column()),
        negated: false,
        param,
    });
    ast.default_order = Some(FieldRef::column(map.id_column()));
    SqlGenerator::new(dialect, &store).select(&ast)
}

/// `DELETE FROM [T] WHERE [Id] = @id`
pub fn delete_by_id(dialect: Dialect, map: &DocumentMap, id: i64) -> DocResult<Statement> {
    let mut store = ParamStore::new();
    let ast = by_id(map, &mut store, id);
    SqlGenerator::new(dialect, &store).delete(&ast)
}
