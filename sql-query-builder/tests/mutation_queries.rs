//! Integration coverage for write compilation (`create`, `update`,
//! `upsert`, nested `connect`), exercised through `SqlCompiler`'s public
//! per-action entry points rather than the unit tests living alongside
//! `src/mutations.rs`.

use prisma_value::{PrismaValue, TypeIdentifier};
use query_builder::Dialect;
use query_structure::{Args, Arguments, Field, Model, Relation, RelationKind, SchemaRegistry, Selection, Where};
use serde_json::json;
use sql_query_builder::SqlCompiler;

fn registry() -> SchemaRegistry {
    let mut reg = SchemaRegistry::new(false);
    reg.register_model(
        Model::new("User")
            .field(Field::scalar("email", TypeIdentifier::String).unique())
            .field(Field::scalar("name", TypeIdentifier::String)),
    )
    .unwrap();
    reg.register_model(
        Model::new("SlotOfAppointment")
            .field(Field::scalar("id", TypeIdentifier::String).primary())
            .field(Field::scalar("startsAt", TypeIdentifier::DateTime))
            .relation(Relation {
                name: "users".into(),
                kind: RelationKind::ManyToMany,
                target_model: "Account".into(),
                foreign_key: vec![],
                references: vec!["id".into()],
                join_table: Some("_SlotToUser".into()),
                join_column: Some("A".into()),
                inverse_join_column: Some("B".into()),
                inverse_relation: Some("slots".into()),
                is_owner: true,
            }),
    )
    .unwrap();
    reg
}

#[test]
fn create_many_on_sqlite_has_no_returning_clause() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Sqlite);
    let args = Args {
        arguments: Arguments {
            data: Some(json!([
                {"email": "a@b", "name": "A"},
                {"email": "c@d", "name": "C"}
            ])),
            ..Default::default()
        },
        selection: Selection::default(),
    };
    let compiled = compiler.compile_create_many("User", &args).unwrap();
    assert!(!compiled.sql.contains("RETURNING"));
    assert_eq!(
        compiled.args,
        vec![
            PrismaValue::String("a@b".into()),
            PrismaValue::String("A".into()),
            PrismaValue::String("c@d".into()),
            PrismaValue::String("C".into()),
        ]
    );
}

#[test]
fn mysql_upsert_uses_on_duplicate_key_update() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Mysql);
    let args = Args {
        arguments: Arguments {
            where_: Some(Where::from_json(&json!({"email": "a@b"})).unwrap()),
            create_data: Some(json!({"email": "a@b", "name": "New"})),
            update_data: Some(json!({"name": "Up"})),
            ..Default::default()
        },
        selection: Selection::default(),
    };
    let compiled = compiler.compile_upsert("User", &args).unwrap();
    assert!(compiled.sql.contains("ON DUPLICATE KEY UPDATE"));
    assert!(!compiled.sql.contains("RETURNING"));
}

#[test]
fn sqlite_upsert_includes_returning_clause() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Sqlite);
    let args = Args {
        arguments: Arguments {
            where_: Some(Where::from_json(&json!({"email": "a@b"})).unwrap()),
            create_data: Some(json!({"email": "a@b", "name": "New"})),
            update_data: Some(json!({"name": "Up"})),
            ..Default::default()
        },
        selection: Selection::default(),
    };
    let compiled = compiler.compile_upsert("User", &args).unwrap();
    assert!(compiled.sql.contains("ON CONFLICT"));
    assert!(compiled.sql.contains("RETURNING *"));
}

#[test]
fn compile_with_relations_splits_many_to_many_connect_into_side_effect() {
    let reg = registry();
    let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
    let args = Args {
        arguments: Arguments {
            data: Some(json!({
                "id": "s1",
                "startsAt": "2026-01-01T00:00:00Z",
                "users": {"connect": [{"id": "u1"}]}
            })),
            ..Default::default()
        },
        selection: Selection::default(),
    };
    let compiled = compiler.compile_with_relations("SlotOfAppointment", &args).unwrap();
    assert!(compiled.main_query.sql.starts_with("INSERT INTO \"SlotOfAppointment\""));
    assert_eq!(compiled.relation_mutations.len(), 1);
    assert!(compiled.relation_mutations[0].query.sql.contains("_SlotToUser"));
}
