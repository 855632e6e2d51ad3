//! Integration coverage for `findMany`/`findFirst`/`findUnique` compilation,
//! exercised through the public `SqlCompiler::compile` entry point rather
//! than the module-internal unit tests in `src/select.rs`.

use prisma_value::{PrismaValue, TypeIdentifier};
use query_builder::Dialect;
use query_structure::{Action, Field, Model, QueryBuilder, RelationKind, SchemaRegistry, Where};
use sql_query_builder::SqlCompiler;

fn registry() -> SchemaRegistry {
    let mut reg = SchemaRegistry::new(false);
    reg.register_model(
        Model::new("Product")
            .field(Field::scalar("id", TypeIdentifier::String).primary())
            .field(Field::scalar("name", TypeIdentifier::String))
            .field(Field::scalar("isActive", TypeIdentifier::Boolean))
            .field(Field::scalar("price", TypeIdentifier::Int32))
            .relation(query_structure::Relation {
                name: "reviews".into(),
                kind: RelationKind::OneToMany,
                target_model: "Review".into(),
                foreign_key: vec!["productId".into()],
                references: vec!["id".into()],
                join_table: None,
                join_column: None,
                inverse_join_column: None,
                inverse_relation: Some("product".into()),
                is_owner: false,
            }),
    )
    .unwrap();
    reg.register_model(
        Model::new("Review")
            .field(Field::scalar("id", TypeIdentifier::String).primary())
            .field(Field::scalar("productId", TypeIdentifier::String))
            .field(Field::scalar("rating", TypeIdentifier::Int32)),
    )
    .unwrap();
    reg
}

#[test]
fn find_many_with_filter_and_order_has_no_base_alias() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
    let query = QueryBuilder::new()
        .model("Product")
        .action(Action::FindMany)
        .where_(Where::from_json(&serde_json::json!({ "isActive": true })).unwrap())
        .take(10)
        .build()
        .unwrap();

    let compiled = compiler.compile(&query).unwrap();
    assert!(!compiled.sql.contains("t0"));
    assert_eq!(compiled.args, vec![PrismaValue::Boolean(true)]);
}

#[test]
fn find_unique_caps_limit_at_one_row() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
    let query = QueryBuilder::new()
        .model("Product")
        .action(Action::FindUnique)
        .where_(Where::from_json(&serde_json::json!({ "id": "p1" })).unwrap())
        .build()
        .unwrap();

    let compiled = compiler.compile(&query).unwrap();
    assert!(compiled.sql.contains("LIMIT 1"));
}

#[test]
fn find_many_with_include_introduces_base_alias_and_join() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
    let mut nested = query_structure::Selection::default();
    nested.scalars = Some(vec!["id".into(), "rating".into()]);
    let query = QueryBuilder::new()
        .model("Product")
        .action(Action::FindMany)
        .include("reviews", nested)
        .build()
        .unwrap();

    let compiled = compiler.compile(&query).unwrap();
    assert!(compiled.sql.contains("t0"));
    assert!(compiled.sql.contains("LEFT JOIN \"Review\""));
    assert!(compiled.relation_metadata.is_some());
}

#[test]
fn mysql_dialect_uses_backtick_quoting_and_question_mark_placeholders() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Mysql);
    let query = QueryBuilder::new()
        .model("Product")
        .action(Action::FindMany)
        .where_(Where::from_json(&serde_json::json!({ "isActive": true })).unwrap())
        .build()
        .unwrap();

    let compiled = compiler.compile(&query).unwrap();
    assert!(compiled.sql.contains('`'));
    assert!(compiled.sql.contains('?'));
    assert!(!compiled.sql.contains('$'));
}
