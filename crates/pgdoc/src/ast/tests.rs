use super::*;
use crate::error::DocError;

fn unary(field: &str, param: &str) -> WhereNode {
    WhereNode::Unary {
        field: FieldRef::column(field),
        op: CompareOp::Eq,
        param: param.into(),
    }
}

#[test]
fn empty_builder_builds_nothing() {
    assert_eq!(WhereBuilder::new().build().unwrap(), None);
}

#[test]
fn single_condition_is_not_wrapped() {
    let mut w = WhereBuilder::new();
    w.add(unary("A", "a"));
    assert_eq!(w.build().unwrap(), Some(unary("A", "a")));
}

#[test]
fn popped_or_group_becomes_composite() {
    let mut w = WhereBuilder::new();
    w.add(unary("A", "a"));
    w.push_or();
    w.add(unary("B", "b"));
    w.add(unary("C", "c"));
    w.pop().unwrap();

    let Some(WhereNode::Composite { logic, children }) = w.build().unwrap() else {
        panic!("expected composite root");
    };
    assert_eq!(logic, Logic::And);
    assert_eq!(children.len(), 2);
    assert!(matches!(
        &children[1],
        WhereNode::Composite { logic: Logic::Or, children } if children.len() == 2
    ));
}

#[test]
fn empty_group_is_discarded() {
    let mut w = WhereBuilder::new();
    w.add(unary("A", "a"));
    w.push_or();
    w.push_and();
    w.pop().unwrap();
    w.pop().unwrap();
    assert_eq!(w.build().unwrap(), Some(unary("A", "a")));
}

#[test]
fn unclosed_group_fails_to_build() {
    let mut w = WhereBuilder::new();
    w.push_and();
    w.add(unary("A", "a"));
    assert!(matches!(w.build(), Err(DocError::UnbalancedGroups(_))));
    assert_eq!(w.open_groups(), 1);
}

#[test]
fn pop_without_push_fails() {
    let mut w = WhereBuilder::new();
    assert!(matches!(w.pop(), Err(DocError::UnbalancedGroups(_))));
}

#[test]
fn default_order_is_id_unless_aggregating() {
    let mut ast = SelectAst::from_table("People");
    ast.default_order = Some(FieldRef::column("Id"));
    assert_eq!(ast.effective_order(), vec![OrderBy::asc(FieldRef::column("Id"))]);

    ast.columns.push(Column::Count { alias: None });
    assert!(ast.effective_order().is_empty());
}

#[test]
fn explicit_order_wins() {
    let mut ast = SelectAst::from_table("People");
    ast.default_order = Some(FieldRef::column("Id"));
    ast.order.push(OrderBy::desc(FieldRef::column("LastName")));
    assert_eq!(
        ast.effective_order(),
        vec![OrderBy::desc(FieldRef::column("LastName"))]
    );
}

#[test]
fn selecting_twice_is_a_union() {
    let mut ast = SelectAst::from_table("People");
    let first = Column::Field {
        field: FieldRef::column("FirstName"),
        alias: None,
    };
    let last = Column::Field {
        field: FieldRef::column("LastName"),
        alias: None,
    };
    ast.select([first.clone()]);
    ast.select([first.clone(), last.clone()]);
    assert_eq!(ast.columns, vec![first, last]);
}

#[test]
fn join_without_on_clause_is_invalid() {
    let mut ast = SelectAst::from_table("People");
    ast.source = Source::Join {
        left: Box::new(Source::SubQuery {
            select: Box::new(SelectAst::from_table("People")),
            alias: "ALIAS_left_0".into(),
        }),
        joins: vec![Join {
            source: Source::SubQuery {
                select: Box::new(SelectAst::from_table("Orders")),
                alias: "ALIAS_join_1".into(),
            },
            kind: JoinKind::Inner,
            on: Vec::new(),
        }],
    };
    assert!(matches!(ast.validate(), Err(DocError::InvalidJoin(_))));
}

#[test]
fn rename_reaches_nested_subqueries() {
    let mut inner = SelectAst::from_table("Orders");
    inner.filter = Some(unary("Total", "total__0"));
    let mut ast = SelectAst::from_table("People");
    ast.filter = Some(WhereNode::SubQuery {
        field: FieldRef::column("Id"),
        negated: false,
        select: Box::new(inner),
    });

    let renames = [("total__0".to_string(), "total__3".to_string())]
        .into_iter()
        .collect();
    ast.rename_params(&renames);

    let Some(WhereNode::SubQuery { select, .. }) = &ast.filter else {
        panic!("expected subquery");
    };
    assert_eq!(select.filter, Some(unary("Total", "total__3")));
}

#[test]
fn qualify_leaves_qualified_fields_alone() {
    let mut field = FieldRef::Column {
        qualifier: Some("a".into()),
        name: "Id".into(),
    };
    field.qualify("b");
    assert_eq!(
        field,
        FieldRef::Column {
            qualifier: Some("a".into()),
            name: "Id".into()
        }
    );
}
