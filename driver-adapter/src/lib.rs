//! The adapter trait contract: the abstract boundary between the
//! compiler/executor and a concrete wire driver. Only the contract lives
//! here — concrete PostgreSQL/MySQL/SQLite drivers are out of scope —
//! plus an in-memory [`test_adapter::MemoryAdapter`] used by this
//! workspace's own integration tests.

pub mod test_adapter;

use async_trait::async_trait;
use prisma_value::{PrismaValue, TypeIdentifier};
use query_builder::SqlQuery;
use std::fmt;
use user_facing_errors::UserFacingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        f.write_str(s)
    }
}

/// Static metadata about the connection an adapter wraps. `None` when
/// the adapter doesn't expose it (e.g. a JS driver proxy that never
/// surfaced bind-limit info).
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub schema_name: Option<String>,
    pub max_bind_values: Option<usize>,
    pub supports_relation_joins: bool,
}

/// What [`Adapter::query_raw`] returns: rows alongside the column shape
/// the compiler's `SqlQuery` expected, so the executor/deserializer
/// never have to guess a driver's native type mapping.
#[derive(Debug, Clone, Default)]
pub struct SqlResultSet {
    pub column_names: Vec<String>,
    pub column_types: Vec<TypeIdentifier>,
    pub rows: Vec<Vec<PrismaValue>>,
    pub last_insert_id: Option<String>,
}

impl SqlResultSet {
    /// Folds each row into an alias-keyed map, the shape the relation
    /// deserializer and the executor's flat-map path both expect.
    pub fn as_flat_rows(&self) -> Vec<indexmap::IndexMap<String, PrismaValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.column_names
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<indexmap::IndexMap<_, _>>()
            })
            .collect()
    }
}

/// A transaction owned by exactly one task: `is_active` transitions
/// monotonically `true -> false` at commit or rollback, and any call
/// after that point is a programmer error the implementation must
/// reject.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, UserFacingError>;
    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64, UserFacingError>;
    async fn commit(&self) -> Result<(), UserFacingError>;
    async fn rollback(&self) -> Result<(), UserFacingError>;
    fn is_active(&self) -> bool;
}

/// The abstract contract the compiler/executor consume. A concrete
/// implementation owns a connection (or pool) and is the sole
/// synchronization point for it — the compiler and schema registry are
/// immutable and may be freely shared across tasks, but an `Adapter`
/// either pools internally or requires external serialization, and must
/// document which via [`Adapter::connection_info`].
#[async_trait]
pub trait Adapter: Send + Sync {
    /// One of `postgresql`, `mysql`, `sqlite`, or a vendor name (e.g.
    /// `cockroachdb`) that compiles as PostgreSQL.
    fn provider(&self) -> &str;

    /// Diagnostic-only identifier, e.g. `"pg"` or `"libsql"`.
    fn adapter_name(&self) -> &str;

    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, UserFacingError>;

    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64, UserFacingError>;

    /// Runs a semicolon-split script, one statement at a time. Naive by
    /// design: this mis-handles semicolons embedded in string literals
    /// and is scoped as development/test tooling, not a production
    /// migration runner.
    async fn execute_script(&self, script: &str) -> Result<(), UserFacingError>;

    async fn start_transaction(&self, isolation: Option<IsolationLevel>) -> Result<Box<dyn Transaction>, UserFacingError>;

    fn connection_info(&self) -> Option<ConnectionInfo>;

    async fn dispose(&self) -> Result<(), UserFacingError>;
}

/// Naively splits a script on `;` followed by (optional whitespace and)
/// a newline or end-of-input, skipping blank statements. Shared helper
/// for [`Adapter::execute_script`] implementations since the splitting
/// logic itself isn't adapter-specific.
pub fn split_script_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_renders_sql_keywords() {
        assert_eq!(IsolationLevel::RepeatableRead.to_string(), "REPEATABLE READ");
    }

    #[test]
    fn script_splitting_skips_blank_statements() {
        let stmts = split_script_statements("CREATE TABLE a (id INT);\n\nINSERT INTO a VALUES (1);");
        assert_eq!(stmts, vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)"]);
    }
}
