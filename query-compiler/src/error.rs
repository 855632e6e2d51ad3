//! The executor's own error type: a thin sum of the compile-time
//! taxonomy (`sql-query-builder::CompileError`, which covers everything
//! the spec says must "fail before any SQL is issued") and the
//! driver-level taxonomy (`user-facing-errors::UserFacingError`, mapped
//! at the adapter boundary). `RecordNotFoundError`/`RelatedRecordNotFoundError`
//! are raised directly by the executor itself — they are request-level
//! outcomes ("no row matched"), not driver failures, so they never pass
//! through a dialect error-code mapping table.

use sql_query_builder::CompileError;
use user_facing_errors::UserFacingError;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Driver(#[from] UserFacingError),

    #[error("cancelled before any SQL was issued")]
    Cancelled,
}

impl ExecutorError {
    pub fn record_not_found(model: &str) -> Self {
        ExecutorError::Driver(UserFacingError::record_not_found(model))
    }

    pub fn related_record_not_found(model: &str, relation: &str) -> Self {
        ExecutorError::Driver(UserFacingError::related_record_not_found(model, relation))
    }
}

/// The deserializer surfaces registry lookups (primary-key resolution)
/// as `RegistryError`; route it through the same `Compile` variant
/// `CompileError::Registry` already carries so callers only match on one
/// compile-time-error shape.
impl From<query_structure::RegistryError> for ExecutorError {
    fn from(err: query_structure::RegistryError) -> Self {
        ExecutorError::Compile(CompileError::from(err))
    }
}
