//! Composes the compiler, the schema registry and an [`Adapter`] into the
//! single entry point an embedder links against. Every method here
//! follows the same shape: compile, dispatch through [`Target`] with
//! logging wrapped around the call, then fold the result into the
//! caller-facing type.

use crate::error::ExecutorError;
use crate::mapping::flat_records;
use crate::runner::Target;
use driver_adapter::{Adapter, ConnectionInfo, IsolationLevel, SqlResultSet, Transaction};
use prisma_metrics::{NoopLogger, QueryEndEvent, QueryErrorEvent, QueryLogger, QueryStartEvent};
use prisma_value::PrismaValue;
use query_builder::{Record, RecordValue, SqlQuery};
use query_structure::{Action, Query, SchemaRegistry};
use sql_query_builder::{CompileError, Dialect, SqlCompiler};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, Instrument};

/// What [`QueryExecutor::execute_mutation`] hands back: a set of rows for
/// statements that support `RETURNING`, or a bare affected-row count for
/// statements that don't.
#[derive(Debug, Clone)]
pub enum MutationResult {
    Returned(Vec<Record>),
    AffectedRows(u64),
}

impl MutationResult {
    pub fn row_count(&self) -> usize {
        match self {
            MutationResult::Returned(rows) => rows.len(),
            MutationResult::AffectedRows(n) => *n as usize,
        }
    }
}

/// The outcome of a nested write: the primary statement's result plus
/// the junction-table statements that were attempted alongside it, each
/// with its own success/failure (populated even in the atomic variant,
/// where a failure also means the whole transaction rolled back).
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub primary: MutationResult,
    pub relation_failures: Vec<RelationStatementFailure>,
}

#[derive(Debug, Clone)]
pub struct RelationStatementFailure {
    pub relation_name: String,
    pub message: String,
}

/// Holds everything a request needs: the adapter to run SQL against, the
/// schema registry + dialect to compile with, and the logger to notify.
/// Cheap to construct per request; the adapter and registry are meant to
/// be shared (via `Arc`) across many executors.
pub struct QueryExecutor {
    adapter: Arc<dyn Adapter>,
    registry: Arc<SchemaRegistry>,
    dialect: Dialect,
    strict_mode: bool,
    logger: Arc<dyn QueryLogger>,
}

impl QueryExecutor {
    pub fn new(adapter: Arc<dyn Adapter>, registry: Arc<SchemaRegistry>, dialect: Dialect) -> Self {
        let strict_mode = registry.strict_mode();
        QueryExecutor {
            adapter,
            registry,
            dialect,
            strict_mode,
            logger: Arc::new(NoopLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    fn compiler(&self) -> SqlCompiler<'_> {
        SqlCompiler::new(&self.registry, self.dialect).with_strict_mode(self.strict_mode)
    }

    fn target(&self) -> Target<'_> {
        Target::Adapter(self.adapter.as_ref())
    }

    pub async fn execute_query_as_maps(&self, query: &Query) -> Result<Vec<Record>, ExecutorError> {
        let compiled = self.compiler().compile(query)?;
        let result = dispatch_query(&self.target(), &self.logger, Some(&query.model), Some(query.action), &compiled).await?;
        build_records(&self.registry, &query.model, &compiled, &result)
    }

    pub async fn execute_query_as_single_map(&self, query: &Query) -> Result<Option<Record>, ExecutorError> {
        let records = self.execute_query_as_maps(query).await?;
        let first = records.into_iter().next();
        if first.is_none() && query.action.or_throw() {
            return Err(ExecutorError::record_not_found(&query.model));
        }
        Ok(first)
    }

    pub async fn execute_count(&self, query: &Query) -> Result<i64, ExecutorError> {
        let compiled = self.compiler().compile(query)?;
        let result = dispatch_query(&self.target(), &self.logger, Some(&query.model), Some(query.action), &compiled).await?;
        Ok(first_column_as_int(&result))
    }

    pub async fn execute_mutation(&self, query: &Query) -> Result<MutationResult, ExecutorError> {
        if query.action == Action::CreateMany {
            if let Some(batches) = self.split_create_many_batches(query) {
                return self.execute_create_many_batches(query, batches).await;
            }
        }
        let compiled = self.compiler().compile(query)?;
        run_mutation(&self.target(), &self.registry, &self.logger, query, &compiled).await
    }

    /// Splits `createMany`'s row array into chunks that each fit under
    /// the adapter's `max_bind_values`, when the whole array wouldn't.
    /// Returns `None` when there's nothing to split (no declared limit,
    /// or the statement already fits), so the caller falls through to the
    /// ordinary single-statement path.
    fn split_create_many_batches(&self, query: &Query) -> Option<Vec<serde_json::Value>> {
        let max_bind_values = self.adapter.connection_info()?.max_bind_values?;
        let rows = query.args.arguments.data.as_ref()?.as_array()?;
        if rows.is_empty() {
            return None;
        }
        let width = rows[0].as_object().map(|o| o.len()).unwrap_or(1).max(1);
        let rows_per_batch = (max_bind_values / width).max(1);
        if rows.len() <= rows_per_batch {
            return None;
        }
        Some(rows.chunks(rows_per_batch).map(|chunk| serde_json::Value::Array(chunk.to_vec())).collect())
    }

    /// Runs one `createMany` statement per batch and folds their
    /// affected-row counts into a single result, so a caller who split a
    /// large insert to respect a bind-value limit still sees one outcome.
    async fn execute_create_many_batches(
        &self,
        query: &Query,
        batches: Vec<serde_json::Value>,
    ) -> Result<MutationResult, ExecutorError> {
        let mut total = 0u64;
        for batch in batches {
            let mut batch_args = query.args.arguments.clone();
            batch_args.data = Some(batch);
            let batch_query = Query {
                model: query.model.clone(),
                action: query.action,
                args: query_structure::Args { arguments: batch_args, selection: query.args.selection.clone() },
            };
            let compiled = self.compiler().compile(&batch_query)?;
            let result = run_mutation(&self.target(), &self.registry, &self.logger, &batch_query, &compiled).await?;
            total += result.row_count() as u64;
        }
        Ok(MutationResult::AffectedRows(total))
    }

    pub async fn execute_mutation_with_relations(&self, query: &Query) -> Result<MutationOutcome, ExecutorError> {
        let compiled = self.compiler().compile_with_relations(&query.model, query.action, &query.args)?;
        let primary = run_mutation_query(&self.target(), &self.registry, &self.logger, query, &compiled.main_query).await?;

        let mut relation_failures = Vec::new();
        for mutation in &compiled.relation_mutations {
            let outcome = dispatch_execute(
                &self.target(),
                &self.logger,
                Some(&query.model),
                Some(query.action),
                &mutation.query,
            )
            .await;
            if let Err(err) = outcome {
                relation_failures.push(RelationStatementFailure {
                    relation_name: mutation.relation_name.clone(),
                    message: err.to_string(),
                });
            }
        }

        Ok(MutationOutcome { primary, relation_failures })
    }

    pub async fn execute_mutation_with_relations_atomic(
        &self,
        query: &Query,
        isolation: Option<IsolationLevel>,
    ) -> Result<MutationOutcome, ExecutorError> {
        let compiled = self.compiler().compile_with_relations(&query.model, query.action, &query.args)?;

        self.execute_in_transaction(isolation, |tx| {
            let compiled = &compiled;
            async move {
                let primary = run_mutation_query(&tx.target(), &tx.registry, &tx.logger, query, &compiled.main_query).await?;
                for mutation in &compiled.relation_mutations {
                    dispatch_execute(&tx.target(), &tx.logger, Some(&query.model), Some(query.action), &mutation.query).await?;
                }
                Ok(MutationOutcome { primary, relation_failures: Vec::new() })
            }
        })
        .await
    }

    pub async fn execute_raw(&self, sql: &str, params: Vec<PrismaValue>) -> Result<SqlResultSet, ExecutorError> {
        let compiled = raw_query(sql, params);
        Ok(dispatch_query(&self.target(), &self.logger, None, None, &compiled).await?)
    }

    pub async fn execute_mutation_raw(&self, sql: &str, params: Vec<PrismaValue>) -> Result<u64, ExecutorError> {
        let compiled = raw_query(sql, params);
        Ok(dispatch_execute(&self.target(), &self.logger, None, None, &compiled).await?)
    }

    /// Begins a transaction, hands a transaction-bound executor to
    /// `callback`, commits on success and rolls back (before
    /// re-propagating) on failure.
    pub async fn execute_in_transaction<F, Fut, T>(&self, isolation: Option<IsolationLevel>, callback: F) -> Result<T, ExecutorError>
    where
        F: FnOnce(TransactionExecutor<'_>) -> Fut,
        Fut: Future<Output = Result<T, ExecutorError>>,
    {
        let tx = self.adapter.start_transaction(isolation).await?;
        let tx_executor = TransactionExecutor {
            tx: tx.as_ref(),
            registry: &self.registry,
            dialect: self.dialect,
            strict_mode: self.strict_mode,
            logger: &self.logger,
        };

        match callback(tx_executor).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                // Best-effort: a rollback failure is swallowed in favor of
                // the original error, which is what the caller actually
                // needs to see.
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.adapter.connection_info()
    }
}

/// The same surface as [`QueryExecutor`], scoped to a single open
/// transaction. Produced only by [`QueryExecutor::execute_in_transaction`];
/// every call runs against the transaction, not the adapter directly.
pub struct TransactionExecutor<'a> {
    tx: &'a dyn Transaction,
    registry: &'a SchemaRegistry,
    dialect: Dialect,
    strict_mode: bool,
    logger: &'a Arc<dyn QueryLogger>,
}

impl<'a> TransactionExecutor<'a> {
    fn compiler(&self) -> SqlCompiler<'_> {
        SqlCompiler::new(self.registry, self.dialect).with_strict_mode(self.strict_mode)
    }

    fn target(&self) -> Target<'_> {
        Target::Transaction(self.tx)
    }

    pub async fn execute_query_as_maps(&self, query: &Query) -> Result<Vec<Record>, ExecutorError> {
        let compiled = self.compiler().compile(query)?;
        let result = dispatch_query(&self.target(), self.logger, Some(&query.model), Some(query.action), &compiled).await?;
        build_records(self.registry, &query.model, &compiled, &result)
    }

    pub async fn execute_mutation(&self, query: &Query) -> Result<MutationResult, ExecutorError> {
        let compiled = self.compiler().compile(query)?;
        run_mutation(&self.target(), self.registry, self.logger, query, &compiled).await
    }

    pub async fn execute_raw(&self, sql: &str, params: Vec<PrismaValue>) -> Result<SqlResultSet, ExecutorError> {
        let compiled = raw_query(sql, params);
        Ok(dispatch_query(&self.target(), self.logger, None, None, &compiled).await?)
    }

    pub async fn execute_mutation_raw(&self, sql: &str, params: Vec<PrismaValue>) -> Result<u64, ExecutorError> {
        let compiled = raw_query(sql, params);
        Ok(dispatch_execute(&self.target(), self.logger, None, None, &compiled).await?)
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_active()
    }
}

fn raw_query(sql: &str, params: Vec<PrismaValue>) -> SqlQuery {
    let mut compiled = SqlQuery::raw(sql);
    for param in params {
        compiled.push_arg(param);
    }
    compiled
}

/// Runs `compiled` through `target`, wrapping the call with the
/// `onQueryStart`/`onQueryEnd`/`onQueryError` logging triad and a tracing
/// span, the same shape the adapter-boundary grounding code in this
/// workspace uses for its own `query_raw`/`execute_raw`.
async fn dispatch_query(
    target: &Target<'_>,
    logger: &Arc<dyn QueryLogger>,
    model: Option<&str>,
    action: Option<Action>,
    compiled: &SqlQuery,
) -> Result<SqlResultSet, user_facing_errors::UserFacingError> {
    let operation = action.map(|a| a.to_string());
    logger.on_query_start(&QueryStartEvent {
        sql: compiled.sql.clone(),
        parameters: compiled.args.clone(),
        model: model.map(str::to_string),
        operation: operation.clone(),
        start_time: Instant::now(),
    });
    let started = Instant::now();

    let span = info_span!(
        "query_compiler:query",
        "db.query.text" = %compiled.sql,
        "prisma.db_query.params.count" = compiled.args.len(),
    );

    match target.query_raw(compiled).instrument(span).await {
        Ok(result) => {
            logger.on_query_end(&QueryEndEvent {
                sql: compiled.sql.clone(),
                parameters: compiled.args.clone(),
                model: model.map(str::to_string),
                operation,
                duration: started.elapsed(),
                row_count: result.rows.len(),
            });
            Ok(result)
        }
        Err(err) => {
            logger.on_query_error(&QueryErrorEvent {
                sql: compiled.sql.clone(),
                parameters: compiled.args.clone(),
                model: model.map(str::to_string),
                operation,
                duration: started.elapsed(),
                error: err.to_string(),
                stack_trace: None,
            });
            Err(err)
        }
    }
}

async fn dispatch_execute(
    target: &Target<'_>,
    logger: &Arc<dyn QueryLogger>,
    model: Option<&str>,
    action: Option<Action>,
    compiled: &SqlQuery,
) -> Result<u64, user_facing_errors::UserFacingError> {
    let operation = action.map(|a| a.to_string());
    logger.on_query_start(&QueryStartEvent {
        sql: compiled.sql.clone(),
        parameters: compiled.args.clone(),
        model: model.map(str::to_string),
        operation: operation.clone(),
        start_time: Instant::now(),
    });
    let started = Instant::now();

    let span = info_span!(
        "query_compiler:execute",
        "db.query.text" = %compiled.sql,
        "prisma.db_query.params.count" = compiled.args.len(),
    );

    match target.execute_raw(compiled).instrument(span).await {
        Ok(affected) => {
            logger.on_query_end(&QueryEndEvent {
                sql: compiled.sql.clone(),
                parameters: compiled.args.clone(),
                model: model.map(str::to_string),
                operation,
                duration: started.elapsed(),
                row_count: affected as usize,
            });
            Ok(affected)
        }
        Err(err) => {
            logger.on_query_error(&QueryErrorEvent {
                sql: compiled.sql.clone(),
                parameters: compiled.args.clone(),
                model: model.map(str::to_string),
                operation,
                duration: started.elapsed(),
                error: err.to_string(),
                stack_trace: None,
            });
            Err(err)
        }
    }
}

/// Folds a query's raw result into [`Record`]s: through the relation
/// deserializer when the compiler produced relation metadata, or through
/// the flat snake_case-to-camelCase fold otherwise. Computed-field
/// columns carry no `__` separator, so both paths already preserve them
/// as ordinary scalar columns without any extra reattachment step — the
/// deserializer groups by base PK tuple and a computed value is constant
/// across every row sharing that tuple.
fn build_records(
    registry: &SchemaRegistry,
    model: &str,
    compiled: &SqlQuery,
    result: &SqlResultSet,
) -> Result<Vec<Record>, ExecutorError> {
    match &compiled.relation_metadata {
        Some(relations) => {
            let rows = result.as_flat_rows();
            let records = sql_query_builder::deserialize_rows(registry, model, &relations.included_relations, &rows)?;
            Ok(records)
        }
        None => Ok(flat_records(result)),
    }
}

fn first_column_as_int(result: &SqlResultSet) -> i64 {
    result
        .rows
        .first()
        .and_then(|row| row.first())
        .map(|value| match value {
            PrismaValue::Int(n) => *n,
            PrismaValue::Float(f) => *f as i64,
            _ => 0,
        })
        .unwrap_or(0)
}

/// `execute_mutation`'s shared body, usable against either the adapter or
/// a transaction: dispatches the statement and, for `create`, folds
/// `RETURNING` rows into `Record`s; for `update`/`delete`, raises
/// `RecordNotFoundError` when a single-row action affected nothing.
async fn run_mutation(
    target: &Target<'_>,
    registry: &SchemaRegistry,
    logger: &Arc<dyn QueryLogger>,
    query: &Query,
    compiled: &SqlQuery,
) -> Result<MutationResult, ExecutorError> {
    run_mutation_query(target, registry, logger, query, compiled).await
}

async fn run_mutation_query(
    target: &Target<'_>,
    registry: &SchemaRegistry,
    logger: &Arc<dyn QueryLogger>,
    query: &Query,
    compiled: &SqlQuery,
) -> Result<MutationResult, ExecutorError> {
    let expects_single_row = matches!(query.action, Action::Update | Action::Delete | Action::Upsert);

    if compiled.relation_metadata.is_some() || returns_rows(compiled) {
        let result = dispatch_query(target, logger, Some(&query.model), Some(query.action), compiled).await?;
        let records = build_records(registry, &query.model, compiled, &result)?;
        if expects_single_row && records.is_empty() {
            return Err(ExecutorError::record_not_found(&query.model));
        }
        return Ok(MutationResult::Returned(records));
    }

    let affected = dispatch_execute(target, logger, Some(&query.model), Some(query.action), compiled).await?;
    if expects_single_row && affected == 0 {
        return Err(ExecutorError::record_not_found(&query.model));
    }
    Ok(MutationResult::AffectedRows(affected))
}

/// Whether the compiled statement actually carries a `RETURNING`
/// clause. `create`/`createMany` get one on every dialect that supports
/// it; `update`/`upsert` only on PostgreSQL — checking the compiled SQL
/// directly instead of hardcoding the action list keeps this in sync
/// with `sql_query_builder`'s per-dialect RETURNING rules instead of
/// duplicating them here.
fn returns_rows(compiled: &SqlQuery) -> bool {
    compiled.sql.ends_with("RETURNING *")
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_adapter::test_adapter::MemoryAdapter;
    use prisma_value::TypeIdentifier;
    use query_structure::{Field, Model};

    fn registry() -> Arc<SchemaRegistry> {
        let mut reg = SchemaRegistry::new(false);
        reg.register_model(
            Model::new("User")
                .table_name("User")
                .field(Field::scalar("id", TypeIdentifier::Int32).primary())
                .field(Field::scalar("email", TypeIdentifier::String)),
        )
        .unwrap();
        Arc::new(reg)
    }

    fn find_many_query() -> Query {
        query_structure::QueryBuilder::new()
            .model("User")
            .action(Action::FindMany)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn execute_query_as_maps_folds_flat_snake_case_columns() {
        let adapter = Arc::new(MemoryAdapter::new("postgresql"));
        adapter.push_query_result(SqlResultSet {
            column_names: vec!["id".to_string(), "email".to_string()],
            column_types: vec![TypeIdentifier::Int32, TypeIdentifier::String],
            rows: vec![vec![PrismaValue::Int(1), PrismaValue::String("a@example.com".into())]],
            last_insert_id: None,
        });

        let executor = QueryExecutor::new(adapter, registry(), Dialect::Postgres);
        let records = executor.execute_query_as_maps(&find_many_query()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["email"], RecordValue::Scalar(PrismaValue::String("a@example.com".into())));
    }

    #[tokio::test]
    async fn find_unique_or_throw_raises_record_not_found_on_empty_result() {
        let adapter = Arc::new(MemoryAdapter::new("postgresql"));
        adapter.push_query_result(SqlResultSet::default());

        let executor = QueryExecutor::new(adapter, registry(), Dialect::Postgres);
        let query = query_structure::QueryBuilder::new()
            .model("User")
            .action(Action::FindUniqueOrThrow)
            .build()
            .unwrap();

        let err = executor.execute_query_as_single_map(&query).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Driver(user_facing_errors::UserFacingError::RecordNotFoundError { .. })));
    }

    #[tokio::test]
    async fn update_affecting_zero_rows_raises_record_not_found() {
        let adapter = Arc::new(MemoryAdapter::new("postgresql"));
        adapter.push_execute_result(0);

        let executor = QueryExecutor::new(adapter, registry(), Dialect::Postgres);
        let query = query_structure::QueryBuilder::new()
            .model("User")
            .action(Action::Update)
            .data(serde_json::json!({"email": "b@example.com"}))
            .where_(query_structure::Where::from_json(&serde_json::json!({"id": 1})).unwrap())
            .build()
            .unwrap();

        let err = executor.execute_mutation(&query).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Driver(user_facing_errors::UserFacingError::RecordNotFoundError { .. })));
    }

    #[tokio::test]
    async fn execute_in_transaction_rolls_back_on_callback_error() {
        let adapter = Arc::new(MemoryAdapter::new("postgresql"));
        let executor = QueryExecutor::new(adapter, registry(), Dialect::Postgres);

        let result: Result<(), ExecutorError> = executor
            .execute_in_transaction(None, |_tx| async move { Err(ExecutorError::Cancelled) })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_many_splits_into_batches_that_respect_max_bind_values() {
        let adapter = Arc::new(MemoryAdapter::new("postgresql"));
        // Two columns per row; a limit of 5 bind values allows at most 2
        // rows per batch, so 5 rows split into batches of 2, 2, 1.
        adapter.set_max_bind_values(Some(5));
        adapter.push_execute_result(2);
        adapter.push_execute_result(2);
        adapter.push_execute_result(1);

        let executor = QueryExecutor::new(adapter.clone(), registry(), Dialect::Postgres);
        let rows: Vec<_> = (0..5)
            .map(|i| serde_json::json!({"id": i, "email": format!("u{i}@example.com")}))
            .collect();
        let query = query_structure::QueryBuilder::new()
            .model("User")
            .action(Action::CreateMany)
            .data(serde_json::Value::Array(rows))
            .build()
            .unwrap();

        let outcome = executor.execute_mutation(&query).await.unwrap();
        assert_eq!(outcome.row_count(), 5);
        assert_eq!(adapter.recorded_calls().len(), 3);
    }

    #[tokio::test]
    async fn create_many_under_the_limit_stays_a_single_statement() {
        let adapter = Arc::new(MemoryAdapter::new("postgresql"));
        adapter.set_max_bind_values(Some(5));
        adapter.push_execute_result(2);

        let executor = QueryExecutor::new(adapter.clone(), registry(), Dialect::Postgres);
        let rows = vec![
            serde_json::json!({"id": 1, "email": "a@example.com"}),
            serde_json::json!({"id": 2, "email": "b@example.com"}),
        ];
        let query = query_structure::QueryBuilder::new()
            .model("User")
            .action(Action::CreateMany)
            .data(serde_json::Value::Array(rows))
            .build()
            .unwrap();

        let outcome = executor.execute_mutation(&query).await.unwrap();
        assert_eq!(outcome.row_count(), 2);
        assert_eq!(adapter.recorded_calls().len(), 1);
    }
}
