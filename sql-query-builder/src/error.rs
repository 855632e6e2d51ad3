use query_structure::RegistryError;
use thiserror::Error;

/// Errors raised by the compiler itself, before any SQL is issued —
/// distinct from the driver-level taxonomy in `user-facing-errors`,
/// which only comes into play once a statement has actually been sent
/// to a database.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("`data` is required for `{action}` on `{model}`")]
    MissingData { model: String, action: String },

    #[error("`createMany` on `{model}` requires at least one row")]
    EmptyCreateMany { model: String },

    #[error("createMany rows on `{model}` must all share the same set of keys")]
    InconsistentCreateManyKeys { model: String },

    #[error("upsert on `{model}` requires at least one conflict key in `where`")]
    EmptyConflictKeys { model: String },

    #[error(
        "`{field}` on `{model}` is a relation field but was filtered without a relation operator \
         (some/every/none); bare equality is only valid on scalar fields"
    )]
    MissingRelationOperator { model: String, field: String },

    #[error("unknown filter operator `{operator}`")]
    UnknownOperator { operator: String },

    #[error("`connect`/`disconnect` on `{model}.{field}` requires a many-to-many relation")]
    ConnectOnNonManyToMany { model: String, field: String },

    #[error("`connect` on `{model}.{field}` references unknown field `{target_field}`")]
    UnknownConnectField {
        model: String,
        field: String,
        target_field: String,
    },

    #[error("`{action}` is not supported on dialect `{dialect:?}`")]
    UnsupportedAction { action: String, dialect: crate::Dialect },
}
