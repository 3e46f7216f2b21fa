use super::*;
use crate::ast::{
    Column, CompareOp, FieldRef, Fragment, FragmentPart, Join, JoinKind, JoinOn, LikeKind, Logic,
    OrderBy, SelectAst, Source, TableHint, WhereNode,
};
use crate::document::{DocumentMap, IndexedColumn, SplitColumn, SplitDocument};
use crate::error::DocError;
use crate::param::ParamStore;
use crate::types::SqlType;
use crate::value::Value;

fn people() -> SelectAst {
    let mut ast = SelectAst::from_table("People");
    ast.default_order = Some(FieldRef::column("Id"));
    ast
}

fn eq(column: &str, param: &str) -> WhereNode {
    WhereNode::Unary {
        field: FieldRef::column(column),
        op: CompareOp::Eq,
        param: param.into(),
    }
}

fn ss(ast: &SelectAst, store: &ParamStore) -> String {
    SqlGenerator::new(Dialect::SqlServer, store)
        .select(ast)
        .unwrap()
        .sql
}

fn pg(ast: &SelectAst, store: &ParamStore) -> Statement {
    SqlGenerator::new(Dialect::Postgres, store)
        .select(ast)
        .unwrap()
}

#[test]
fn select_with_default_order() {
    let mut store = ParamStore::new();
    let param = store.bind_unique("firstname", "Donald");
    let mut ast = people();
    ast.filter = Some(eq("FirstName", &param));

    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE [FirstName] = @firstname__0 ORDER BY [Id] ASC"
    );
    let statement = pg(&ast, &store);
    assert_eq!(
        statement.sql,
        "SELECT * FROM \"People\" WHERE \"FirstName\" = $1 ORDER BY \"Id\" ASC"
    );
    assert_eq!(statement.params.len(), 1);
    assert_eq!(statement.params[0].value, Value::Text("Donald".into()));
}

#[test]
fn rendering_is_deterministic() {
    let mut store = ParamStore::new();
    let a = store.bind_unique("age", 30);
    let b = store.bind_unique("age", 40);
    let mut ast = people();
    ast.filter = Some(WhereNode::Composite {
        logic: Logic::Or,
        children: vec![eq("Age", &a), eq("Age", &b)],
    });
    assert_eq!(ss(&ast, &store), ss(&ast.clone(), &store.clone()));
    assert_eq!(pg(&ast, &store), pg(&ast, &store));
}

#[test]
fn list_parameters_expand_in_place() {
    let mut store = ParamStore::new();
    store.set("f", Value::list([1, 2]));
    let mut ast = people();
    ast.filter = Some(WhereNode::Array {
        field: FieldRef::column("F"),
        negated: false,
        param: "f".into(),
    });

    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE [F] IN (@f_0, @f_1) ORDER BY [Id] ASC"
    );
    let statement = pg(&ast, &store);
    assert_eq!(
        statement.sql,
        "SELECT * FROM \"People\" WHERE \"F\" IN ($1, $2) ORDER BY \"Id\" ASC"
    );
    let names: Vec<_> = statement.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["f_0", "f_1"]);
}

#[test]
fn table_parameters() {
    let mut store = ParamStore::new();
    store.set("ids", Value::table([1_i64, 2, 3]));
    let mut ast = people();
    ast.filter = Some(WhereNode::Array {
        field: FieldRef::column("Id"),
        negated: true,
        param: "ids".into(),
    });

    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE [Id] NOT IN (SELECT [Value] FROM @ids) ORDER BY [Id] ASC"
    );
    let statement = pg(&ast, &store);
    assert_eq!(
        statement.sql,
        "SELECT * FROM \"People\" WHERE \"Id\" <> ALL($1) ORDER BY \"Id\" ASC"
    );
    assert_eq!(statement.params.len(), 1);
}

#[test]
fn empty_collections_never_render_empty_in() {
    let mut store = ParamStore::new();
    store.set("none", Value::list(Vec::<i32>::new()));
    let mut ast = people();
    ast.filter = Some(WhereNode::Array {
        field: FieldRef::column("F"),
        negated: false,
        param: "none".into(),
    });
    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE 0 = 1 ORDER BY [Id] ASC"
    );

    ast.filter = Some(WhereNode::Array {
        field: FieldRef::column("F"),
        negated: true,
        param: "none".into(),
    });
    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE 1 = 1 ORDER BY [Id] ASC"
    );
}

#[test]
fn empty_list_in_raw_fragment_renders_null() {
    let mut store = ParamStore::new();
    store.set("ids", Value::list(Vec::<i32>::new()));
    let mut ast = people();
    ast.filter = Some(WhereNode::Custom(Fragment {
        parts: vec![
            FragmentPart::Raw("[Id] IN ".into()),
            FragmentPart::Param("ids".into()),
        ],
    }));
    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE [Id] IN (NULL) ORDER BY [Id] ASC"
    );
}

#[test]
fn nested_groups_are_parenthesized() {
    let mut store = ParamStore::new();
    let a = store.set("a", 1);
    let b = store.set("b", 2);
    let c = store.set("c", 3);
    let mut ast = people();
    ast.filter = Some(WhereNode::Composite {
        logic: Logic::And,
        children: vec![
            eq("A", &a),
            WhereNode::Composite {
                logic: Logic::Or,
                children: vec![
                    eq("B", &b),
                    WhereNode::Custom(Fragment {
                        parts: vec![
                            FragmentPart::Raw("[C] > ".into()),
                            FragmentPart::Param(c.clone()),
                        ],
                    }),
                ],
            },
        ],
    });

    let sql = ss(&ast, &store);
    assert_eq!(
        sql,
        "SELECT * FROM [People] WHERE [A] = @a AND ([B] = @b OR ([C] > @c)) ORDER BY [Id] ASC"
    );
    assert_eq!(sql.matches('(').count(), sql.matches(')').count());
}

#[test]
fn like_patterns_are_escaped_per_dialect() {
    let mut store = ParamStore::new();
    let p = store.bind_unique("name", "50%_off");
    let mut ast = people();
    ast.filter = Some(WhereNode::Unary {
        field: FieldRef::column("Name"),
        op: CompareOp::Like {
            kind: LikeKind::StartsWith,
            negated: true,
        },
        param: p,
    });

    let statement = SqlGenerator::new(Dialect::SqlServer, &store)
        .select(&ast)
        .unwrap();
    assert_eq!(
        statement.sql,
        "SELECT * FROM [People] WHERE [Name] NOT LIKE @name__0 ORDER BY [Id] ASC"
    );
    assert_eq!(statement.params[0].value, Value::Text("50[%][_]off%".into()));

    let statement = pg(&ast, &store);
    assert_eq!(statement.params[0].value, Value::Text("50\\%\\_off%".into()));
    // The stored literal is untouched.
    assert_eq!(store.get("name__0"), Some(&Value::Text("50%_off".into())));
}

#[test]
fn json_fields_are_cast_for_comparison() {
    let mut store = ParamStore::new();
    let p = store.bind_unique("age", 18);
    let mut ast = people();
    ast.filter = Some(WhereNode::Unary {
        field: FieldRef::json("Document", vec!["age".into()], Some(SqlType::Integer)),
        op: CompareOp::Gt,
        param: p,
    });
    assert_eq!(
        ss(&ast, &store),
        "SELECT * FROM [People] WHERE CAST(JSON_VALUE([Document], '$.age') AS int) > @age__0 ORDER BY [Id] ASC"
    );
    assert_eq!(
        pg(&ast, &store).sql,
        "SELECT * FROM \"People\" WHERE ((\"Document\" #>> '{age}')::integer) > $1 ORDER BY \"Id\" ASC"
    );
}

#[test]
fn postgres_reuses_positions_for_repeated_names() {
    let mut store = ParamStore::new();
    store.set("x", 5);
    let mut ast = people();
    ast.filter = Some(WhereNode::Composite {
        logic: Logic::Or,
        children: vec![eq("A", "x"), eq("B", "x")],
    });
    let statement = pg(&ast, &store);
    assert_eq!(
        statement.sql,
        "SELECT * FROM \"People\" WHERE \"A\" = $1 OR \"B\" = $1 ORDER BY \"Id\" ASC"
    );
    assert_eq!(statement.params.len(), 1);
}

#[test]
fn top_and_limit() {
    let store = ParamStore::new();
    let mut ast = people();
    ast.top = Some(10);
    assert_eq!(
        ss(&ast, &store),
        "SELECT TOP (10) * FROM [People] ORDER BY [Id] ASC"
    );
    assert_eq!(
        pg(&ast, &store).sql,
        "SELECT * FROM \"People\" ORDER BY \"Id\" ASC LIMIT 10"
    );
}

#[test]
fn page_wraps_in_row_numbered_subquery() {
    let mut store = ParamStore::new();
    let mut ast = people();
    ast.order = vec![OrderBy::desc(FieldRef::column("LastName"))];

    let paged = SqlGenerator::page(&ast, &mut store, 20, 10, "ALIAS_page_0").unwrap();
    assert_eq!(
        ss(&paged, &store),
        "SELECT [ALIAS_page_0].* FROM (SELECT *, ROW_NUMBER() OVER (ORDER BY [LastName] DESC) AS [RowNumber] FROM [People]) AS [ALIAS_page_0] \
         WHERE [ALIAS_page_0].[RowNumber] BETWEEN @page_start__0 AND @page_end__1 ORDER BY [ALIAS_page_0].[RowNumber] ASC"
    );
    assert_eq!(store.get("page_start__0"), Some(&Value::BigInt(21)));
    assert_eq!(store.get("page_end__1"), Some(&Value::BigInt(30)));
}

#[test]
fn page_bounds_clamp_to_bigint() {
    let ast = people();

    let mut store = ParamStore::new();
    let statement =
        SqlGenerator::page_with_count(Dialect::Postgres, &ast, &mut store, 0, u64::MAX, "p").unwrap();
    assert_eq!(statement.params[0].value, Value::BigInt(1));
    assert_eq!(statement.params[1].value, Value::BigInt(i64::MAX));

    let mut store = ParamStore::new();
    SqlGenerator::page(&ast, &mut store, 5, u64::MAX, "p").unwrap();
    assert_eq!(store.get("page_start__0"), Some(&Value::BigInt(6)));
    assert_eq!(store.get("page_end__1"), Some(&Value::BigInt(i64::MAX)));

    let mut store = ParamStore::new();
    SqlGenerator::page(&ast, &mut store, u64::MAX, 10, "p").unwrap();
    assert_eq!(store.get("page_start__0"), Some(&Value::BigInt(i64::MAX)));
}

#[test]
fn paging_an_aggregate_requires_an_order() {
    let mut store = ParamStore::new();
    let mut ast = people();
    ast.columns = vec![Column::Count { alias: None }];
    let err = SqlGenerator::page(&ast, &mut store, 0, 10, "p").unwrap_err();
    assert!(matches!(err, DocError::Validation(_)));
}

#[test]
fn page_with_count_uses_a_cte() {
    let mut store = ParamStore::new();
    let ast = people();
    let statement =
        SqlGenerator::page_with_count(Dialect::Postgres, &ast, &mut store, 0, 5, "ALIAS_page_1")
            .unwrap();
    assert_eq!(
        statement.sql,
        "WITH \"ALIAS_page_1\" AS (SELECT *, COUNT(*) OVER () AS \"TotalCount\", ROW_NUMBER() OVER (ORDER BY \"Id\" ASC) AS \"RowNumber\" FROM \"People\") \
         SELECT \"ALIAS_page_1\".* FROM \"ALIAS_page_1\" WHERE \"ALIAS_page_1\".\"RowNumber\" BETWEEN $1 AND $2 ORDER BY \"ALIAS_page_1\".\"RowNumber\" ASC"
    );
    assert_eq!(statement.params[0].value, Value::BigInt(1));
    assert_eq!(statement.params[1].value, Value::BigInt(5));
}

#[test]
fn count_replaces_projection_or_wraps() {
    let store = ParamStore::new();
    let ast = people();
    assert_eq!(
        SqlGenerator::new(Dialect::SqlServer, &store)
            .count(&ast, "ALIAS_count_0")
            .unwrap()
            .sql,
        "SELECT COUNT(*) FROM [People]"
    );

    let mut limited = people();
    limited.top = Some(3);
    assert_eq!(
        SqlGenerator::new(Dialect::SqlServer, &store)
            .count(&limited, "ALIAS_count_0")
            .unwrap()
            .sql,
        "SELECT COUNT(*) FROM (SELECT TOP (3) * FROM [People] ORDER BY [Id] ASC) AS [ALIAS_count_0]"
    );
}

#[test]
fn joins_and_hints() {
    let store = ParamStore::new();
    let mut ast = SelectAst::from_table("People");
    ast.source = Source::Join {
        left: Box::new(Source::Table {
            name: "People".into(),
            alias: Some("p".into()),
            hint: Some(TableHint::NoLock),
        }),
        joins: vec![Join {
            source: Source::Table {
                name: "Orders".into(),
                alias: Some("o".into()),
                hint: None,
            },
            kind: JoinKind::LeftHash,
            on: vec![JoinOn {
                left: FieldRef::column("Id").qualified(Some("p")),
                right: FieldRef::column("PersonId").qualified(Some("o")),
            }],
        }],
    };
    ast.columns = vec![Column::AllOf("p".into())];

    assert_eq!(
        ss(&ast, &store),
        "SELECT [p].* FROM [People] AS [p] WITH (NOLOCK) LEFT HASH JOIN [Orders] AS [o] ON [p].[Id] = [o].[PersonId]"
    );
    assert_eq!(
        pg(&ast, &store).sql,
        "SELECT \"p\".* FROM \"People\" AS \"p\" LEFT JOIN \"Orders\" AS \"o\" ON \"p\".\"Id\" = \"o\".\"PersonId\""
    );
}

#[test]
fn join_without_on_is_rejected() {
    let store = ParamStore::new();
    let mut ast = SelectAst::from_table("People");
    ast.source = Source::Join {
        left: Box::new(Source::table("People")),
        joins: vec![Join {
            source: Source::table("Orders"),
            kind: JoinKind::Inner,
            on: Vec::new(),
        }],
    };
    let err = SqlGenerator::new(Dialect::SqlServer, &store)
        .select(&ast)
        .unwrap_err();
    assert!(matches!(err, DocError::InvalidJoin(_)));
}

#[test]
fn delete_statements() {
    let mut store = ParamStore::new();
    let p = store.set("id", 7);
    let mut ast = people();
    ast.filter = Some(eq("Id", &p));
    assert_eq!(
        SqlGenerator::new(Dialect::SqlServer, &store)
            .delete(&ast)
            .unwrap()
            .sql,
        "DELETE FROM [People] WHERE [Id] = @id"
    );

    ast.source = Source::Table {
        name: "People".into(),
        alias: Some("p".into()),
        hint: None,
    };
    assert_eq!(
        SqlGenerator::new(Dialect::SqlServer, &store)
            .delete(&ast)
            .unwrap()
            .sql,
        "DELETE [p] FROM [People] AS [p] WHERE [Id] = @id"
    );
}

#[test]
fn delete_through_join_is_unsupported() {
    let store = ParamStore::new();
    let mut ast = people();
    ast.source = Source::Join {
        left: Box::new(Source::table("People")),
        joins: vec![Join {
            source: Source::table("Orders"),
            kind: JoinKind::Inner,
            on: vec![JoinOn {
                left: FieldRef::column("Id"),
                right: FieldRef::column("PersonId"),
            }],
        }],
    };
    let err = SqlGenerator::new(Dialect::Postgres, &store)
        .delete(&ast)
        .unwrap_err();
    assert!(matches!(err, DocError::UnsupportedOperation(_)));

    let mut limited = people();
    limited.top = Some(1);
    assert!(matches!(
        SqlGenerator::new(Dialect::Postgres, &store).delete(&limited),
        Err(DocError::UnsupportedOperation(_))
    ));
}

#[test]
fn missing_parameter_value_is_an_error() {
    let store = ParamStore::new();
    let mut ast = people();
    ast.filter = Some(eq("A", "nope"));
    let err = SqlGenerator::new(Dialect::Postgres, &store)
        .select(&ast)
        .unwrap_err();
    assert!(matches!(err, DocError::Validation(_)));
}

fn person_map() -> DocumentMap {
    DocumentMap::new("Person", "People")
        .indexed(IndexedColumn::new("firstName", "FirstName", SqlType::Text).max_length(100))
}

fn split() -> SplitDocument {
    SplitDocument {
        columns: vec![SplitColumn {
            column: "FirstName".into(),
            value: Value::Text("Donald".into()),
        }],
        document: serde_json::json!({ "nickname": "Don" }),
    }
}

#[test]
fn document_insert_and_update() {
    let map = person_map();
    let insert = document::insert(Dialect::Postgres, &map, 1, &split(), None).unwrap();
    assert_eq!(
        insert.sql,
        "INSERT INTO \"People\" (\"Id\", \"FirstName\", \"Document\") VALUES ($1, $2, $3)"
    );
    assert_eq!(insert.params[0].value, Value::BigInt(1));
    assert_eq!(
        insert.params[2].value,
        Value::Json(serde_json::json!({ "nickname": "Don" }))
    );

    let update = document::update(Dialect::SqlServer, &map, 1, &split(), None).unwrap();
    assert_eq!(
        update.sql,
        "UPDATE [People] SET [FirstName] = @firstname, [Document] = @document WHERE [Id] = @id"
    );
}

#[test]
fn document_load_many_orders_by_id() {
    let map = person_map();
    let statement = document::load_many(Dialect::Postgres, &map, &[3, 1, 2]).unwrap();
    assert_eq!(
        statement.sql,
        "SELECT * FROM \"People\" WHERE \"Id\" = ANY($1) ORDER BY \"Id\" ASC"
    );
    assert_eq!(
        document::delete_by_id(Dialect::SqlServer, &map, 9).unwrap().sql,
        "DELETE FROM [People] WHERE [Id] = @id"
    );
}
