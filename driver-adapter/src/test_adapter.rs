//! An in-memory, fixture-driven [`Adapter`] used by this workspace's own
//! integration tests. It does not parse or execute SQL — it records
//! every call it receives and returns pre-programmed [`SqlResultSet`]s
//! in FIFO order, so tests can exercise the executor without spinning
//! up a real database.

use crate::{Adapter, ConnectionInfo, IsolationLevel, SqlResultSet, Transaction};
use async_trait::async_trait;
use query_builder::SqlQuery;
use std::collections::VecDeque;
use std::sync::Mutex;
use user_facing_errors::UserFacingError;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub sql: String,
    pub args: Vec<prisma_value::PrismaValue>,
}

#[derive(Default)]
struct Fixtures {
    /// Responses returned in FIFO order, regardless of the SQL text —
    /// good enough for a single-statement-at-a-time test harness.
    queue: VecDeque<Result<SqlResultSet, UserFacingError>>,
    execute_queue: VecDeque<Result<u64, UserFacingError>>,
    calls: Vec<RecordedCall>,
}

/// Fixture-driven adapter: tests push expected responses with
/// [`MemoryAdapter::push_query_result`]/[`MemoryAdapter::push_execute_result`]
/// before exercising the executor, then assert against
/// [`MemoryAdapter::recorded_calls`].
pub struct MemoryAdapter {
    provider: String,
    fixtures: Mutex<Fixtures>,
    max_bind_values: Mutex<Option<usize>>,
}

impl MemoryAdapter {
    pub fn new(provider: impl Into<String>) -> Self {
        MemoryAdapter {
            provider: provider.into(),
            fixtures: Mutex::new(Fixtures::default()),
            max_bind_values: Mutex::new(Some(32_767)),
        }
    }

    /// Overrides the `max_bind_values` this adapter reports through
    /// [`Adapter::connection_info`], so tests can exercise
    /// bind-value-limited behavior (e.g. `createMany` batching) without
    /// needing thousands of fixture rows.
    pub fn set_max_bind_values(&self, value: Option<usize>) {
        *self.max_bind_values.lock().unwrap() = value;
    }

    pub fn push_query_result(&self, result: SqlResultSet) {
        self.fixtures.lock().unwrap().queue.push_back(Ok(result));
    }

    pub fn push_query_error(&self, error: UserFacingError) {
        self.fixtures.lock().unwrap().queue.push_back(Err(error));
    }

    pub fn push_execute_result(&self, affected_rows: u64) {
        self.fixtures.lock().unwrap().execute_queue.push_back(Ok(affected_rows));
    }

    pub fn push_execute_error(&self, error: UserFacingError) {
        self.fixtures.lock().unwrap().execute_queue.push_back(Err(error));
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.fixtures.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn adapter_name(&self) -> &str {
        "memory"
    }

    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, UserFacingError> {
        let mut fixtures = self.fixtures.lock().unwrap();
        fixtures.calls.push(RecordedCall { sql: query.sql.clone(), args: query.args.clone() });
        fixtures
            .queue
            .pop_front()
            .unwrap_or_else(|| Ok(SqlResultSet::default()))
    }

    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64, UserFacingError> {
        let mut fixtures = self.fixtures.lock().unwrap();
        fixtures.calls.push(RecordedCall { sql: query.sql.clone(), args: query.args.clone() });
        fixtures.execute_queue.pop_front().unwrap_or(Ok(0))
    }

    async fn execute_script(&self, script: &str) -> Result<(), UserFacingError> {
        for stmt in crate::split_script_statements(script) {
            let mut fixtures = self.fixtures.lock().unwrap();
            fixtures.calls.push(RecordedCall { sql: stmt.to_string(), args: Vec::new() });
        }
        Ok(())
    }

    async fn start_transaction(&self, _isolation: Option<IsolationLevel>) -> Result<Box<dyn Transaction>, UserFacingError> {
        Ok(Box::new(MemoryTransaction { active: Mutex::new(true) }))
    }

    fn connection_info(&self) -> Option<ConnectionInfo> {
        Some(ConnectionInfo {
            schema_name: Some("public".to_string()),
            max_bind_values: *self.max_bind_values.lock().unwrap(),
            supports_relation_joins: true,
        })
    }

    async fn dispose(&self) -> Result<(), UserFacingError> {
        Ok(())
    }
}

/// A transaction that simply tracks its own `is_active` flag; statement
/// execution delegates to a borrowed [`MemoryAdapter`] is deliberately
/// not modeled here (tests exercise transaction statement sequencing at
/// the executor level, against a dedicated in-memory queue per test).
struct MemoryTransaction {
    active: Mutex<bool>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn query_raw(&self, _query: &SqlQuery) -> Result<SqlResultSet, UserFacingError> {
        if !*self.active.lock().unwrap() {
            return Err(UserFacingError::transaction_error("transaction is no longer active", false));
        }
        Ok(SqlResultSet::default())
    }

    async fn execute_raw(&self, _query: &SqlQuery) -> Result<u64, UserFacingError> {
        if !*self.active.lock().unwrap() {
            return Err(UserFacingError::transaction_error("transaction is no longer active", false));
        }
        Ok(0)
    }

    async fn commit(&self) -> Result<(), UserFacingError> {
        *self.active.lock().unwrap() = false;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), UserFacingError> {
        *self.active.lock().unwrap() = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        *self.active.lock().unwrap()
    }
}
