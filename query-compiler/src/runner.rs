//! A `Target` dispatches a compiled statement to whichever thing can run
//! it — a top-level [`Adapter`] or a [`Transaction`] borrowed from one.
//! Kept as an enum rather than a shared trait object so the executor
//! doesn't need a blanket impl bridging two otherwise-unrelated traits.

use driver_adapter::{Adapter, SqlResultSet, Transaction};
use query_builder::SqlQuery;
use user_facing_errors::UserFacingError;

pub(crate) enum Target<'a> {
    Adapter(&'a dyn Adapter),
    Transaction(&'a dyn Transaction),
}

impl<'a> Target<'a> {
    pub(crate) async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, UserFacingError> {
        match self {
            Target::Adapter(adapter) => adapter.query_raw(query).await,
            Target::Transaction(tx) => tx.query_raw(query).await,
        }
    }

    pub(crate) async fn execute_raw(&self, query: &SqlQuery) -> Result<u64, UserFacingError> {
        match self {
            Target::Adapter(adapter) => adapter.execute_raw(query).await,
            Target::Transaction(tx) => tx.execute_raw(query).await,
        }
    }
}
