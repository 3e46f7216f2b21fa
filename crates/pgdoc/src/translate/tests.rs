use super::*;
use crate::ast::SelectAst;
use crate::document::{DocumentMap, IndexedColumn};
use crate::sql::{Dialect, SqlGenerator};

struct Person;

const FIRST_NAME: Field<Person, String> = Field::new("firstName");
const AGE: Field<Person, i32> = Field::new("age");
const ACTIVE: Field<Person, bool> = Field::new("active");
const NICKNAME: Field<Person, Option<String>> = Field::new("nickname");
const CITY: Field<Person, String> = Field::new("address.city");

fn map() -> DocumentMap {
    DocumentMap::new("Person", "People")
        .indexed(IndexedColumn::new("firstName", "FirstName", SqlType::Text))
}

/// Translate `expr` and render the WHERE clause in the SQL Server form.
fn render(expr: Expr) -> DocResult<String> {
    let map = map();
    let mut store = ParamStore::new();
    let mut builder = WhereBuilder::new();
    Translator::new(&map, &mut store, None).translate(&expr, &mut builder)?;

    let mut ast = SelectAst::from_table("People");
    ast.filter = builder.build()?;
    let sql = SqlGenerator::new(Dialect::SqlServer, &store).select(&ast)?.sql;
    Ok(sql
        .trim_start_matches("SELECT * FROM [People] WHERE ")
        .to_string())
}

#[test]
fn indexed_equality_uses_the_column() {
    assert_eq!(
        render(FIRST_NAME.eq("Donald")).unwrap(),
        "[FirstName] = @firstname__0"
    );
}

#[test]
fn json_properties_are_cast_by_value_type() {
    assert_eq!(
        render(AGE.gt(18)).unwrap(),
        "CAST(JSON_VALUE([Document], '$.age') AS bigint) > @age__0"
    );
    assert_eq!(
        render(CITY.eq("Duckburg")).unwrap(),
        "JSON_VALUE([Document], '$.address.city') = @address_city__0"
    );
}

#[test]
fn constant_on_the_left_is_mirrored() {
    let expr = Expr::binary(BinaryOp::LessThan, Expr::constant(5), AGE.member());
    assert_eq!(
        render(expr).unwrap(),
        "CAST(JSON_VALUE([Document], '$.age') AS bigint) > @age__0"
    );
}

#[test]
fn and_also_is_applied_in_order() {
    let expr = FIRST_NAME.eq("Donald") & AGE.ge(18) & AGE.le(99);
    assert_eq!(
        render(expr).unwrap(),
        "[FirstName] = @firstname__0 AND CAST(JSON_VALUE([Document], '$.age') AS bigint) >= @age__1 \
         AND CAST(JSON_VALUE([Document], '$.age') AS bigint) <= @age__2"
    );
}

#[test]
fn or_else_is_unsupported() {
    let err = render(FIRST_NAME.eq("Donald") | FIRST_NAME.eq("Daisy")).unwrap_err();
    assert!(matches!(err, DocError::Unsupported(ref m) if m.contains("OrElse")));
}

#[test]
fn null_comparisons_become_is_null() {
    assert_eq!(
        render(NICKNAME.is_null()).unwrap(),
        "JSON_VALUE([Document], '$.nickname') IS NULL"
    );
    assert_eq!(
        render(NICKNAME.is_not_null()).unwrap(),
        "JSON_VALUE([Document], '$.nickname') IS NOT NULL"
    );
    assert_eq!(
        render(!NICKNAME.is_null()).unwrap(),
        "JSON_VALUE([Document], '$.nickname') IS NOT NULL"
    );
}

#[test]
fn string_methods_become_like() {
    assert_eq!(
        render(FIRST_NAME.starts_with("Don")).unwrap(),
        "[FirstName] LIKE @firstname__0"
    );
    assert_eq!(
        render(!NICKNAME.contains("uck")).unwrap(),
        "JSON_VALUE([Document], '$.nickname') NOT LIKE @nickname__0"
    );
}

#[test]
fn collection_contains_becomes_in() {
    assert_eq!(
        render(FIRST_NAME.is_in(["Donald", "Daisy"])).unwrap(),
        "[FirstName] IN (@firstname__0_0, @firstname__0_1)"
    );
    assert_eq!(
        render(!AGE.is_in(Vec::<i32>::new())).unwrap(),
        "1 = 1"
    );
    assert_eq!(render(AGE.is_in(Vec::<i32>::new())).unwrap(), "0 = 1");
}

#[test]
fn boolean_members() {
    assert_eq!(
        render(ACTIVE.is_true()).unwrap(),
        "CAST(JSON_VALUE([Document], '$.active') AS bit) = @active__0"
    );

    let map = map();
    let mut store = ParamStore::new();
    let mut builder = WhereBuilder::new();
    Translator::new(&map, &mut store, None)
        .translate(&ACTIVE.is_false(), &mut builder)
        .unwrap();
    assert_eq!(store.get("active__0"), Some(&Value::Bool(false)));
}

#[test]
fn negated_comparison_flips_the_operator() {
    assert_eq!(
        render(!AGE.lt(18)).unwrap(),
        "CAST(JSON_VALUE([Document], '$.age') AS bigint) >= @age__0"
    );
}

#[test]
fn captured_values_are_evaluated_once() {
    let threshold = 21;
    assert_eq!(
        render(AGE.eq_with(move || threshold)).unwrap(),
        "CAST(JSON_VALUE([Document], '$.age') AS bigint) = @age__0"
    );
}

#[test]
fn converted_members_are_accepted() {
    let expr = Expr::binary(
        BinaryOp::Equal,
        Expr::convert(AGE.member()),
        Expr::constant(30_i64),
    );
    assert!(render(expr).is_ok());
}

#[test]
fn unsupported_shapes_name_the_node() {
    let err = render(Expr::binary(
        BinaryOp::Equal,
        Expr::constant(1),
        Expr::constant(2),
    ))
    .unwrap_err();
    assert!(matches!(err, DocError::Unsupported(ref m) if m.contains("Constant")));

    let err = render(Expr::call(
        Method::Other("ToUpper".into()),
        FIRST_NAME.member(),
        Expr::constant("x"),
    ))
    .unwrap_err();
    assert!(matches!(err, DocError::Unsupported(ref m) if m.contains("ToUpper")));

    let err = render(Expr::binary(BinaryOp::Add, AGE.member(), Expr::constant(1))).unwrap_err();
    assert!(matches!(err, DocError::Unsupported(_)));

    let err = render(Expr::binary(BinaryOp::Equal, AGE.member(), FIRST_NAME.member())).unwrap_err();
    assert!(matches!(err, DocError::Unsupported(_)));
}

#[test]
fn qualifier_is_applied() {
    let map = map();
    let mut store = ParamStore::new();
    let mut builder = WhereBuilder::new();
    Translator::new(&map, &mut store, Some("p"))
        .translate(&FIRST_NAME.eq("Donald"), &mut builder)
        .unwrap();
    let node = builder.build().unwrap().unwrap();
    let WhereNode::Unary { field, .. } = node else {
        panic!("expected a unary node");
    };
    assert_eq!(
        field,
        FieldRef::Column {
            qualifier: Some("p".into()),
            name: "FirstName".into()
        }
    );
}
