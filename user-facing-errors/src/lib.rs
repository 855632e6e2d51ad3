//! The typed error taxonomy and the dialect-specific mapping tables that
//! translate a driver's native error code into one of these variants.
//! Compiler-detected invariants (unknown operator, missing data,
//! strict-mode unknown model, ...) are NOT modeled here — those live in
//! `sql-query-builder::CompileError` and fail before any SQL is issued.
//! This taxonomy only covers errors that can occur once a statement has
//! actually been sent to a database.

use std::fmt;

/// Which SQL dialect produced the native error code being mapped.
/// Deliberately separate from `query_builder::Dialect` so this crate has
/// no dependency on the compiler — the adapter boundary is the only
/// place dialect and error code meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverDialect {
    Postgres,
    Mysql,
    Sqlite,
}

/// Free-form key/value context attached to an error — e.g. the native
/// SQLSTATE, the constraint name, or which relation a connect/disconnect
/// targeted. Kept as an ordered list rather than a map since entries are
/// for diagnostics, not lookup.
pub type ErrorContext = Vec<(&'static str, String)>;

#[derive(Debug, thiserror::Error)]
pub enum UserFacingError {
    #[error("Can't reach database: {message}")]
    ConnectionError { message: String, context: ErrorContext },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String, context: ErrorContext },

    #[error("Timed out trying to connect: {message}")]
    ConnectionTimeoutError { message: String, context: ErrorContext },

    #[error("An operation failed because it depends on one or more records that were required but not found: {message}")]
    RecordNotFoundError { message: String, context: ErrorContext },

    #[error("Unique constraint failed: {message}")]
    UniqueConstraintError {
        message: String,
        fields: Vec<String>,
        context: ErrorContext,
    },

    #[error("Foreign key constraint failed: {message}")]
    ForeignKeyError { message: String, context: ErrorContext },

    #[error("Constraint failed: {message}")]
    ConstraintError { message: String, context: ErrorContext },

    #[error("Invalid value provided for a field: {message}")]
    InvalidFieldValueError { message: String, context: ErrorContext },

    #[error("Query timed out: {message}")]
    QueryTimeoutError { message: String, context: ErrorContext },

    #[error("A required field was not provided: {message}")]
    RequiredFieldError { message: String, context: ErrorContext },

    #[error("A related record could not be found: {message}")]
    RelatedRecordNotFoundError { message: String, context: ErrorContext },

    #[error("Transaction failed: {message} (rolled_back={rolled_back})")]
    TransactionError {
        message: String,
        rolled_back: bool,
        context: ErrorContext,
    },

    #[error("An unsupported operation was requested: {message}")]
    UnsupportedOperationError { message: String, context: ErrorContext },

    #[error("Internal error: {message}")]
    InternalError { message: String, context: ErrorContext },
}

impl UserFacingError {
    /// `context` of a constructed error always records the dialect code
    /// that drove the mapping decision.
    pub fn internal(message: impl Into<String>, dialect_code: impl Into<String>) -> Self {
        UserFacingError::InternalError {
            message: message.into(),
            context: vec![("dialect_code", dialect_code.into())],
        }
    }

    pub fn transaction_error(message: impl Into<String>, rolled_back: bool) -> Self {
        UserFacingError::TransactionError {
            message: message.into(),
            rolled_back,
            context: Vec::new(),
        }
    }

    pub fn record_not_found(model: &str) -> Self {
        UserFacingError::RecordNotFoundError {
            message: format!("No `{model}` record found for the given criteria"),
            context: vec![("model", model.to_string())],
        }
    }

    pub fn related_record_not_found(model: &str, relation: &str) -> Self {
        UserFacingError::RelatedRecordNotFoundError {
            message: format!("No record for `{model}.{relation}` could be connected/disconnected"),
            context: vec![("model", model.to_string()), ("relation", relation.to_string())],
        }
    }
}

impl fmt::Display for DriverDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Maps a driver's native error into a [`UserFacingError`] using the
/// dialect-specific code tables below. `code` is the SQLSTATE for
/// PostgreSQL, the numeric error code as a string for MySQL, or the
/// SQLite result code as a string.
pub fn map_driver_error(dialect: DriverDialect, code: Option<&str>, message: &str) -> UserFacingError {
    match dialect {
        DriverDialect::Postgres => map_postgres(code, message),
        DriverDialect::Mysql => map_mysql(code, message),
        DriverDialect::Sqlite => map_sqlite(code, message),
    }
}

fn ctx(code: Option<&str>) -> ErrorContext {
    code.map(|c| vec![("dialect_code", c.to_string())]).unwrap_or_default()
}

fn map_postgres(code: Option<&str>, message: &str) -> UserFacingError {
    match code {
        Some("23505") => UserFacingError::UniqueConstraintError {
            message: message.to_string(),
            fields: Vec::new(),
            context: ctx(code),
        },
        Some("23503") => UserFacingError::ForeignKeyError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("23502") | Some("23514") => UserFacingError::ConstraintError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("57014") => UserFacingError::QueryTimeoutError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("28P01") => UserFacingError::AuthenticationError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("08001") | Some("08006") => UserFacingError::ConnectionError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some(c) => UserFacingError::internal(message, c),
        None => UserFacingError::internal(message, "unknown"),
    }
}

fn map_mysql(code: Option<&str>, message: &str) -> UserFacingError {
    match code {
        Some("1062") => UserFacingError::UniqueConstraintError {
            message: message.to_string(),
            fields: Vec::new(),
            context: ctx(code),
        },
        Some("1451") | Some("1452") => UserFacingError::ForeignKeyError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("1048") | Some("1138") => UserFacingError::ConstraintError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("4031") => UserFacingError::QueryTimeoutError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("1045") => UserFacingError::AuthenticationError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some("2002") | Some("2003") => UserFacingError::ConnectionError {
            message: message.to_string(),
            context: ctx(code),
        },
        Some(c) => UserFacingError::internal(message, c),
        None => UserFacingError::internal(message, "unknown"),
    }
}

fn map_sqlite(code: Option<&str>, message: &str) -> UserFacingError {
    // SQLite overloads result code 19 (SQLITE_CONSTRAINT) for unique,
    // foreign-key and NOT-NULL violations alike; the message text is the
    // only thing that disambiguates which.
    match code {
        Some("19") => {
            let lower = message.to_ascii_lowercase();
            if lower.contains("unique") {
                UserFacingError::UniqueConstraintError {
                    message: message.to_string(),
                    fields: Vec::new(),
                    context: ctx(code),
                }
            } else if lower.contains("foreign key") {
                UserFacingError::ForeignKeyError {
                    message: message.to_string(),
                    context: ctx(code),
                }
            } else {
                UserFacingError::ConstraintError {
                    message: message.to_string(),
                    context: ctx(code),
                }
            }
        }
        Some(c) => UserFacingError::internal(message, c),
        None => UserFacingError::internal(message, "unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_unique_violation_maps_to_unique_constraint() {
        let err = map_driver_error(DriverDialect::Postgres, Some("23505"), "duplicate key value");
        assert!(matches!(err, UserFacingError::UniqueConstraintError { .. }));
    }

    #[test]
    fn mysql_duplicate_entry_maps_to_unique_constraint() {
        let err = map_driver_error(DriverDialect::Mysql, Some("1062"), "Duplicate entry");
        assert!(matches!(err, UserFacingError::UniqueConstraintError { .. }));
    }

    #[test]
    fn sqlite_constraint_disambiguates_by_message_text() {
        let unique = map_driver_error(DriverDialect::Sqlite, Some("19"), "UNIQUE constraint failed: User.email");
        assert!(matches!(unique, UserFacingError::UniqueConstraintError { .. }));

        let fk = map_driver_error(DriverDialect::Sqlite, Some("19"), "FOREIGN KEY constraint failed");
        assert!(matches!(fk, UserFacingError::ForeignKeyError { .. }));

        let generic = map_driver_error(DriverDialect::Sqlite, Some("19"), "NOT NULL constraint failed: User.name");
        assert!(matches!(generic, UserFacingError::ConstraintError { .. }));
    }

    #[test]
    fn unmapped_code_falls_back_to_internal_error_and_records_it_in_context() {
        let err = map_driver_error(DriverDialect::Postgres, Some("99999"), "weird");
        match err {
            UserFacingError::InternalError { context, .. } => {
                assert_eq!(context, vec![("dialect_code", "99999".to_string())]);
            }
            other => panic!("expected InternalError, got {other:?}"),
        }
    }
}
