//! `findUnique` / `findFirst` / `findMany` compilation.

use crate::context::{AliasCounter, SqlCompiler, BASE_ALIAS};
use crate::error::CompileError;
use prisma_value::PrismaValue;
use query_builder::SqlQuery;
use query_structure::{Action, Args, ComputedField, NullsOrder, SortOrder};

impl<'a> SqlCompiler<'a> {
    pub fn compile_select(
        &self,
        model: &str,
        action: Action,
        args: &Args,
        computed: &[ComputedField],
    ) -> Result<SqlQuery, CompileError> {
        let needs_alias = !args.selection.include.is_empty()
            || !computed.is_empty()
            || args
                .arguments
                .where_
                .as_ref()
                .is_some_and(|w| w.relation_path.is_some());

        let table = self.resolve_table(model)?;
        let mut sql_args = Vec::new();
        let mut computed_field_names = Vec::new();

        // Computed-field subqueries occupy the first parameter slots,
        // so they are compiled before the outer WHERE.
        let mut computed_selects = Vec::new();
        for field in computed {
            computed_selects.push(self.compile_computed_field(field, &mut sql_args)?);
            computed_field_names.push(field.field.clone());
        }

        let relation_meta = if needs_alias {
            Some(self.compile_relations(
                model,
                BASE_ALIAS,
                &args.selection.include,
                args.selection.scalars.as_deref(),
                &mut AliasCounter::starting_at(1),
            )?)
        } else {
            None
        };

        let has_include = !args.selection.include.is_empty();
        let select_list = self.render_select_list(
            &args.selection.scalars,
            needs_alias,
            has_include.then_some(()).and(relation_meta.as_ref()),
            &computed_selects,
        );

        let mut sql = format!("SELECT {select_list} FROM {}", self.quote(&table));
        if needs_alias {
            sql.push_str(&format!(" {BASE_ALIAS}"));
        }
        if let Some(meta) = &relation_meta {
            sql.push_str(&meta.join_clauses);
        }

        let base_alias = needs_alias.then_some(BASE_ALIAS);
        if let Some(where_) = &args.arguments.where_ {
            if let Some(clause) = self.compile_where(where_, model, base_alias, &mut sql_args)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }

        if !args.arguments.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.render_order_by(&args.arguments.order_by, base_alias, &args.arguments.distinct_fields));
        }

        if self.dialect.supports_distinct_on() && !args.arguments.distinct_fields.is_empty() {
            let cols = args
                .arguments
                .distinct_fields
                .iter()
                .map(|f| self.column_ref(base_alias, f))
                .collect::<Vec<_>>()
                .join(", ");
            sql = sql.replacen("SELECT ", &format!("SELECT DISTINCT ON ({cols}) "), 1);
        } else if args.arguments.distinct || (!self.dialect.supports_distinct_on() && !args.arguments.distinct_fields.is_empty()) {
            sql = sql.replacen("SELECT ", "SELECT DISTINCT ", 1);
        }

        if action.is_single_row() {
            sql.push_str(" LIMIT 1");
        } else if let Some(take) = args.arguments.take {
            sql.push_str(&format!(" LIMIT {take}"));
        }

        if let Some(skip) = args.arguments.skip {
            sql.push_str(&format!(" OFFSET {skip}"));
        }

        Ok(SqlQuery {
            sql,
            args: sql_args.clone(),
            arg_types: sql_args.iter().map(|v| v.type_identifier()).collect(),
            relation_metadata: relation_meta,
            computed_field_names,
        })
    }

    fn column_ref(&self, alias: Option<&str>, field: &str) -> String {
        match alias {
            Some(a) => format!("{a}.{}", self.quote(field)),
            None => self.quote(field),
        }
    }

    fn render_select_list(
        &self,
        scalars: &Option<Vec<String>>,
        needs_alias: bool,
        relation_meta: Option<&query_builder::CompiledRelations>,
        computed_selects: &[String],
    ) -> String {
        let mut parts = Vec::new();

        match relation_meta {
            Some(meta) => parts.push(self.generate_select_columns(&meta.column_aliases)),
            None => match scalars {
                Some(fields) => {
                    let cols = fields
                        .iter()
                        .map(|f| self.render_select_field(f, needs_alias))
                        .collect::<Vec<_>>()
                        .join(", ");
                    parts.push(cols);
                }
                None if needs_alias => parts.push(format!("{BASE_ALIAS}.*")),
                None => parts.push("*".to_string()),
            },
        }

        parts.extend(computed_selects.iter().cloned());
        parts.join(", ")
    }

    /// Supports the dot-notation `rel.field` form: resolves to the
    /// relation's alias and emits `rel__field` as the output alias.
    fn render_select_field(&self, field: &str, needs_alias: bool) -> String {
        if let Some((rel, col)) = field.split_once('.') {
            // The relation compiler has already registered `rel`'s alias
            // under `column_aliases`; callers that reach this branch
            // without `include` still get well-formed (if unresolved)
            // SQL naming the relation path directly, since `include` is
            // what actually wires the JOIN in.
            format!("{rel}.{} AS {}", self.quote(col), self.quote(&format!("{rel}__{col}")))
        } else if needs_alias {
            format!("{BASE_ALIAS}.{}", self.quote(field))
        } else {
            self.quote(field)
        }
    }

    fn render_order_by(&self, entries: &[query_structure::OrderByEntry], alias: Option<&str>, distinct_fields: &[String]) -> String {
        // MySQL/SQLite have no `DISTINCT ON`; moving distinct fields to
        // the front of ORDER BY on those dialects gives plain DISTINCT a
        // deterministic representative row per group.
        let mut ordered: Vec<&query_structure::OrderByEntry> = Vec::new();
        if !self.dialect.supports_distinct_on() {
            for f in distinct_fields {
                if let Some(e) = entries.iter().find(|e| &e.field == f) {
                    ordered.push(e);
                }
            }
        }
        for e in entries {
            if !ordered.iter().any(|o| o.field == e.field) {
                ordered.push(e);
            }
        }

        ordered
            .iter()
            .map(|entry| {
                let col = self.column_ref(alias, &entry.field);
                let dir = match entry.order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                let mut rendered = format!("{col} {dir}");
                if self.dialect.supports_nulls_ordering() {
                    if let Some(nulls) = entry.nulls {
                        rendered.push_str(match nulls {
                            NullsOrder::First => " NULLS FIRST",
                            NullsOrder::Last => " NULLS LAST",
                        });
                    }
                }
                rendered
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
