//! Ties compilation, execution and logging together behind a single
//! [`QueryExecutor`]: compile a query with `sql-query-builder`, run it
//! through a `driver-adapter::Adapter`, fold the result back into
//! `query-builder::Record`s an embedder can serialize straight out.

mod error;
mod executor;
mod mapping;
mod runner;

pub use error::ExecutorError;
pub use executor::{MutationOutcome, MutationResult, QueryExecutor, RelationStatementFailure, TransactionExecutor};
