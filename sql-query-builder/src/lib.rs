//! Compiles the JSON query IR into parameterized SQL for PostgreSQL,
//! MySQL and SQLite. The entry point is [`compile`], which
//! dispatches by [`Action`]; individual action families live in their own
//! modules so each can be read (and tested) in isolation.

pub mod aggregate;
pub mod computed;
pub mod context;
pub mod deserializer;
pub mod error;
pub mod mutations;
pub mod relation_compiler;
pub mod select;
pub mod where_clause;

pub use context::{AliasCounter, SqlCompiler, BASE_ALIAS};
pub use deserializer::{deserialize_rows, FlatRow};
pub use error::CompileError;
pub use query_builder::Dialect;

use query_structure::{Action, Query};

impl<'a> SqlCompiler<'a> {
    /// Compiles a query IR node into a single [`query_builder::SqlQuery`].
    /// Nested writes (`connect`/`disconnect`) are not reachable through
    /// this entry point — callers that need junction-table side effects
    /// call [`SqlCompiler::compile_with_relations`] directly, since its
    /// return shape (`CompiledMutation`) differs from a plain `SqlQuery`.
    pub fn compile(&self, query: &Query) -> Result<query_builder::SqlQuery, CompileError> {
        match query.action {
            Action::FindUnique
            | Action::FindUniqueOrThrow
            | Action::FindFirst
            | Action::FindFirstOrThrow
            | Action::FindMany => {
                self.compile_select(&query.model, query.action, &query.args, &query.args.arguments.computed)
            }
            Action::Create => self.compile_create(&query.model, &query.args),
            Action::CreateMany => self.compile_create_many(&query.model, &query.args),
            Action::Update | Action::UpdateMany => self.compile_update(&query.model, query.action, &query.args),
            Action::Delete | Action::DeleteMany => self.compile_delete(&query.model, &query.args),
            Action::Upsert => self.compile_upsert(&query.model, &query.args),
            Action::Count => self.compile_count(&query.model, &query.args),
            Action::Aggregate => self.compile_aggregate(&query.model, &query.args),
            Action::GroupBy => self.compile_group_by(&query.model, &query.args),
        }
    }

    /// Same as [`compile`](Self::compile), but also threads a query's
    /// computed fields through to `findUnique`/`findFirst`/`findMany`
    /// compilation. Kept separate from `compile` so callers
    /// that never use computed fields don't need to thread an empty slice
    /// through every call site.
    pub fn compile_with_computed(
        &self,
        query: &Query,
        computed: &[query_structure::ComputedField],
    ) -> Result<query_builder::SqlQuery, CompileError> {
        match query.action {
            Action::FindUnique
            | Action::FindUniqueOrThrow
            | Action::FindFirst
            | Action::FindFirstOrThrow
            | Action::FindMany => self.compile_select(&query.model, query.action, &query.args, computed),
            _ => self.compile(query),
        }
    }
}
