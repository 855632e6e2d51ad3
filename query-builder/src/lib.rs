//! Output types shared between the SQL compiler (`sql-query-builder`) and
//! the driver adapter contract (`driver-adapter`), so that neither crate
//! needs to depend on the other's implementation — only on this common
//! vocabulary.

use indexmap::IndexMap;
use prisma_value::{PrismaValue, TypeIdentifier};
use query_structure::RelationKind;
use serde::{Deserialize, Serialize};

/// The three SQL dialects this compiler targets. Kept as a plain enum
/// (not a trait-per-dialect object) because dialect divergence here is
/// compile-time dispatch over a handful of syntax choices, not a deep
/// behavioral difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
}

impl Dialect {
    pub fn from_provider(provider: &str) -> Dialect {
        match provider {
            "mysql" => Dialect::Mysql,
            "sqlite" => Dialect::Sqlite,
            // PostgreSQL and any vendor that speaks the PostgreSQL wire
            // protocol (e.g. CockroachDB) compile identically.
            _ => Dialect::Postgres,
        }
    }

    pub fn quote(&self, identifier: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => format!("\"{identifier}\""),
            Dialect::Mysql => format!("`{identifier}`"),
        }
    }

    pub fn supports_returning(&self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    pub fn supports_filter_clause(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    pub fn supports_nulls_ordering(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    pub fn supports_distinct_on(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    pub fn case_insensitive_like(&self) -> &'static str {
        match self {
            Dialect::Postgres => "ILIKE",
            Dialect::Mysql | Dialect::Sqlite => "LIKE",
        }
    }
}

/// A single placeholder in generated SQL: `$N` (1-based) for PostgreSQL,
/// `?` for MySQL/SQLite.
pub fn placeholder(dialect: Dialect, index: usize) -> String {
    match dialect {
        Dialect::Postgres => format!("${index}"),
        Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
    }
}

/// One column surfaced by a JOIN tree, keyed by its synthesized alias
/// (`<relation_path>__<column>` for related columns, bare `<column>` for
/// base columns).
#[derive(Debug, Clone)]
pub struct ColumnAlias {
    pub table_alias: String,
    pub column_name: String,
    pub model_name: String,
    pub relation_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IncludedRelation {
    pub name: String,
    pub kind: RelationKind,
    pub table_alias: String,
    pub parent_alias: String,
    pub target_model: String,
    pub nested: Vec<IncludedRelation>,
}

/// Output of the relation compiler: the JOIN clause text, the ordered
/// column-alias map the SELECT list is generated from, and the relation
/// tree the deserializer folds rows against afterwards.
#[derive(Debug, Clone, Default)]
pub struct CompiledRelations {
    pub join_clauses: String,
    pub column_aliases: IndexMap<String, ColumnAlias>,
    pub included_relations: Vec<IncludedRelation>,
}

/// A fully compiled, parameterized statement: what the compiler hands to
/// the adapter.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub sql: String,
    pub args: Vec<PrismaValue>,
    pub arg_types: Vec<TypeIdentifier>,
    pub relation_metadata: Option<CompiledRelations>,
    pub computed_field_names: Vec<String>,
}

impl SqlQuery {
    pub fn raw(sql: impl Into<String>) -> Self {
        SqlQuery {
            sql: sql.into(),
            args: Vec::new(),
            arg_types: Vec::new(),
            relation_metadata: None,
            computed_field_names: Vec::new(),
        }
    }

    pub fn push_arg(&mut self, value: PrismaValue) {
        self.arg_types.push(value.type_identifier());
        self.args.push(value);
    }
}

/// A side-effect statement produced for a M:N `connect`/`disconnect`
/// entry found while compiling a nested write.
#[derive(Debug, Clone)]
pub struct RelationMutation {
    pub relation_name: String,
    pub query: SqlQuery,
}

/// The result of `compile_with_relations`: the primary INSERT/UPDATE
/// plus the junction-table statements it implies.
#[derive(Debug, Clone)]
pub struct CompiledMutation {
    pub main_query: SqlQuery,
    pub relation_mutations: Vec<RelationMutation>,
}

/// The deserializer's output shape: a scalar leaf, a to-one relation
/// (absent when the LEFT JOIN found no match), or a to-many relation's
/// deduplicated, order-preserving list.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Scalar(PrismaValue),
    ToOne(Option<Record>),
    ToMany(Vec<Record>),
}

/// A single nested, typed result record — what `execute_query_as_maps`
/// hands back once flat JOIN rows have been folded.
pub type Record = IndexMap<String, RecordValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_quotes_with_double_quotes() {
        assert_eq!(Dialect::Postgres.quote("User"), "\"User\"");
    }

    #[test]
    fn mysql_quotes_with_backticks() {
        assert_eq!(Dialect::Mysql.quote("User"), "`User`");
    }

    #[test]
    fn placeholders_differ_by_dialect() {
        assert_eq!(placeholder(Dialect::Postgres, 3), "$3");
        assert_eq!(placeholder(Dialect::Mysql, 3), "?");
    }

    #[test]
    fn cockroachdb_like_provider_compiles_as_postgres() {
        assert_eq!(Dialect::from_provider("cockroachdb"), Dialect::Postgres);
    }
}
