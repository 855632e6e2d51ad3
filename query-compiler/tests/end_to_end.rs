//! End-to-end coverage of the compile-execute-deserialize pipeline
//! against the in-memory test adapter: no real database, but every
//! layer (`query_structure` IR -> `sql_query_builder` compilation ->
//! `driver_adapter::Adapter` -> `Record` folding) is exercised together,
//! the way an embedder would actually drive this crate.

use driver_adapter::test_adapter::MemoryAdapter;
use driver_adapter::SqlResultSet;
use prisma_value::{PrismaValue, TypeIdentifier};
use query_builder::{Dialect, Record, RecordValue};
use query_compiler::{ExecutorError, MutationResult, QueryExecutor};
use query_structure::{Action, Field, Model, QueryBuilder, Relation, RelationKind, SchemaRegistry, Where};
use std::sync::Arc;

fn registry() -> Arc<SchemaRegistry> {
    let mut reg = SchemaRegistry::new(false);
    reg.register_model(
        Model::new("User")
            .table_name("User")
            .field(Field::scalar("id", TypeIdentifier::Int32).primary())
            .field(Field::scalar("email", TypeIdentifier::String).unique())
            .relation(Relation {
                name: "posts".into(),
                kind: RelationKind::OneToMany,
                target_model: "Post".into(),
                foreign_key: vec!["authorId".into()],
                references: vec!["id".into()],
                join_table: None,
                join_column: None,
                inverse_join_column: None,
                inverse_relation: Some("author".into()),
                is_owner: false,
            }),
    )
    .unwrap();
    reg.register_model(
        Model::new("Post")
            .table_name("Post")
            .field(Field::scalar("id", TypeIdentifier::Int32).primary())
            .field(Field::scalar("authorId", TypeIdentifier::Int32))
            .field(Field::scalar("title", TypeIdentifier::String)),
    )
    .unwrap();
    Arc::new(reg)
}

#[tokio::test]
async fn find_many_round_trips_through_the_memory_adapter() {
    let adapter = Arc::new(MemoryAdapter::new("postgresql"));
    adapter.push_query_result(SqlResultSet {
        column_names: vec!["id".to_string(), "email".to_string()],
        column_types: vec![TypeIdentifier::Int32, TypeIdentifier::String],
        rows: vec![
            vec![PrismaValue::Int(1), PrismaValue::String("a@example.com".into())],
            vec![PrismaValue::Int(2), PrismaValue::String("b@example.com".into())],
        ],
        last_insert_id: None,
    });

    let executor = QueryExecutor::new(adapter.clone(), registry(), Dialect::Postgres);
    let query = QueryBuilder::new()
        .model("User")
        .action(Action::FindMany)
        .where_(
            Where::from_json(&serde_json::json!({
                "email": { "contains": { "value": "example", "mode": "insensitive" } }
            }))
            .unwrap(),
        )
        .build()
        .unwrap();

    let records = executor.execute_query_as_maps(&query).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["email"], RecordValue::Scalar(PrismaValue::String("b@example.com".into())));

    let calls = adapter.recorded_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].sql.contains("ILIKE"));
}

#[tokio::test]
async fn create_returns_the_inserted_record_on_postgres() {
    let adapter = Arc::new(MemoryAdapter::new("postgresql"));
    adapter.push_query_result(SqlResultSet {
        column_names: vec!["id".to_string(), "email".to_string()],
        column_types: vec![TypeIdentifier::Int32, TypeIdentifier::String],
        rows: vec![vec![PrismaValue::Int(3), PrismaValue::String("new@example.com".into())]],
        last_insert_id: None,
    });

    let executor = QueryExecutor::new(adapter, registry(), Dialect::Postgres);
    let query = QueryBuilder::new()
        .model("User")
        .action(Action::Create)
        .data(serde_json::json!({ "id": 3, "email": "new@example.com" }))
        .build()
        .unwrap();

    let outcome = executor.execute_mutation(&query).await.unwrap();
    match outcome {
        MutationResult::Returned(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["id"], RecordValue::Scalar(PrismaValue::Int(3)));
        }
        MutationResult::AffectedRows(_) => panic!("postgres create should RETURNING"),
    }
}

#[tokio::test]
async fn update_many_on_sqlite_reports_affected_rows_without_returning() {
    let adapter = Arc::new(MemoryAdapter::new("sqlite"));
    adapter.push_execute_result(4);

    let executor = QueryExecutor::new(adapter.clone(), registry(), Dialect::Sqlite);
    let query = QueryBuilder::new()
        .model("User")
        .action(Action::UpdateMany)
        .where_(Where::from_json(&serde_json::json!({ "email": { "contains": "example" } })).unwrap())
        .data(serde_json::json!({ "email": "updated@example.com" }))
        .build()
        .unwrap();

    let outcome = executor.execute_mutation(&query).await.unwrap();
    assert_eq!(outcome.row_count(), 4);

    let calls = adapter.recorded_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].sql.contains("LIKE"));
    assert!(!calls[0].sql.contains("RETURNING"));
}

#[tokio::test]
async fn find_unique_or_throw_surfaces_record_not_found_as_a_user_facing_error() {
    let adapter = Arc::new(MemoryAdapter::new("postgresql"));
    adapter.push_query_result(SqlResultSet::default());

    let executor = QueryExecutor::new(adapter, registry(), Dialect::Postgres);
    let query = QueryBuilder::new()
        .model("User")
        .action(Action::FindUniqueOrThrow)
        .where_(Where::from_json(&serde_json::json!({ "id": 9 })).unwrap())
        .build()
        .unwrap();

    let err = executor.execute_query_as_single_map(&query).await.unwrap_err();
    assert!(matches!(
        err,
        ExecutorError::Driver(user_facing_errors::UserFacingError::RecordNotFoundError { .. })
    ));
}

#[tokio::test]
async fn nested_create_with_connect_runs_primary_then_relation_statements_in_order() {
    let adapter = Arc::new(MemoryAdapter::new("postgresql"));
    // Primary INSERT ... RETURNING.
    adapter.push_query_result(SqlResultSet {
        column_names: vec!["id".to_string(), "authorId".to_string(), "title".to_string()],
        column_types: vec![TypeIdentifier::Int32, TypeIdentifier::Int32, TypeIdentifier::String],
        rows: vec![vec![PrismaValue::Int(10), PrismaValue::Int(1), PrismaValue::String("Hello".into())]],
        last_insert_id: None,
    });

    let executor = QueryExecutor::new(adapter.clone(), registry(), Dialect::Postgres);
    let query = QueryBuilder::new()
        .model("Post")
        .action(Action::Create)
        .data(serde_json::json!({ "id": 10, "title": "Hello", "authorId": 1 }))
        .build()
        .unwrap();

    let outcome = executor.execute_mutation_with_relations(&query).await.unwrap();
    assert_eq!(outcome.primary.row_count(), 1);
    assert!(outcome.relation_failures.is_empty());

    let calls = adapter.recorded_calls();
    assert_eq!(calls.len(), 1, "Post has no many-to-many fields, so no junction statements are expected");
}

fn record(id: i32) -> Record {
    let mut r = Record::new();
    r.insert("id".to_string(), RecordValue::Scalar(PrismaValue::Int(id)));
    r
}

#[test]
fn mutation_result_row_count_matches_either_variant() {
    assert_eq!(MutationResult::Returned(vec![record(1), record(2)]).row_count(), 2);
    assert_eq!(MutationResult::AffectedRows(7).row_count(), 7);
}
