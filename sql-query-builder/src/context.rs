use query_structure::SchemaRegistry;
pub use query_builder::Dialect;

/// Monotone `t0, t1, ...` alias allocator. `t0` is reserved for the base
/// table and is never handed out by `next()` — callers that need it use
/// the `BASE_ALIAS` constant directly. A fresh counter starts at 1 for
/// every top-level compile; it never carries over between queries.
pub const BASE_ALIAS: &str = "t0";

#[derive(Debug, Clone)]
pub struct AliasCounter(usize);

impl AliasCounter {
    pub fn starting_at(n: usize) -> Self {
        AliasCounter(n.max(1))
    }

    /// Allocates the next alias *number*. Each included relation
    /// consumes exactly one number, shared by its target-table alias
    /// (`tN`) and, for many-to-many relations, its join-table alias
    /// (`jN`): the target table gets `t{n}`, and for M:N relations the
    /// join table gets `j{n}` using that same `n`.
    pub fn next_number(&mut self) -> usize {
        let n = self.0;
        self.0 += 1;
        n
    }

    pub fn next_table(&mut self) -> String {
        format!("t{}", self.next_number())
    }
}

/// Compiler configuration: the registry to resolve names against, the
/// target dialect, and the strict-mode flag. Strict mode defaults to the
/// registry's own setting but can be overridden per compiler instance.
pub struct SqlCompiler<'a> {
    pub registry: &'a SchemaRegistry,
    pub dialect: Dialect,
    pub strict_mode: bool,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(registry: &'a SchemaRegistry, dialect: Dialect) -> Self {
        SqlCompiler {
            registry,
            dialect,
            strict_mode: registry.strict_mode(),
        }
    }

    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    pub fn quote(&self, identifier: &str) -> String {
        self.dialect.quote(identifier)
    }

    /// Resolves a model's table name, honoring strict mode: an
    /// unregistered PascalCase name is a hard compile error instead of a
    /// silent passthrough.
    pub fn resolve_table(&self, model: &str) -> Result<String, crate::error::CompileError> {
        if self.strict_mode {
            // `get_model` surfaces the PascalCase diagnostic in strict mode.
            self.registry.get_model(model)?;
        }
        Ok(self.registry.get_table_name(model))
    }
}
