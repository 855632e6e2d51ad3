//! Turns an `include` tree into JOIN clauses and a SELECT column-alias
//! map. Shared between the main `findMany`/`findFirst`/
//! `findUnique` SELECT compilation and the executor's post-deserialize
//! computed-field reattachment (which needs to know which aliases are
//! *not* relation columns).

use crate::context::{AliasCounter, SqlCompiler};
use crate::error::CompileError;
use indexmap::IndexMap;
use query_builder::{ColumnAlias, CompiledRelations, IncludedRelation};
use query_structure::{IncludeEntry, Model, Relation, RelationKind};

impl<'a> SqlCompiler<'a> {
    /// Entry point: compiles the base model's own columns plus every
    /// relation named in `include`, starting table aliasing at
    /// `counter` (which must already be >= 1 — `t0` is reserved for the
    /// base table and is never allocated by the counter).
    pub fn compile_relations(
        &self,
        base_model: &str,
        base_alias: &str,
        include: &IndexMap<String, IncludeEntry>,
        base_select_fields: Option<&[String]>,
        counter: &mut AliasCounter,
    ) -> Result<CompiledRelations, CompileError> {
        let model = self.registry.get_model(base_model)?;
        let mut column_aliases = IndexMap::new();

        add_model_columns(model, base_alias, None, base_select_fields, &mut column_aliases);

        let mut join_clauses = String::new();
        let mut included_relations = Vec::new();

        for (name, entry) in include {
            let relation = self.registry.get_relation(base_model, name)?;
            let target = self.registry.get_model(&relation.target_model)?;

            let (clause, target_alias) =
                self.emit_join(relation, base_alias, counter)?;
            join_clauses.push_str(&clause);

            add_model_columns(
                target,
                &target_alias,
                Some(name),
                entry.nested.scalars.as_deref(),
                &mut column_aliases,
            );

            let nested_compiled = self.compile_relations(
                &relation.target_model,
                &target_alias,
                &entry.nested.include,
                None,
                counter,
            )?;

            join_clauses.push_str(&nested_compiled.join_clauses);
            for (key, col) in nested_compiled.column_aliases {
                // Nested relation_path is already namespaced by the
                // recursive call using `name.child`; just merge.
                column_aliases.insert(namespaced(name, &key), col);
            }

            included_relations.push(IncludedRelation {
                name: name.clone(),
                kind: relation.kind,
                table_alias: target_alias.clone(),
                parent_alias: base_alias.to_string(),
                target_model: relation.target_model.clone(),
                nested: nested_compiled.included_relations,
            });
        }

        Ok(CompiledRelations {
            join_clauses,
            column_aliases,
            included_relations,
        })
    }

    /// Emits one relation's JOIN clause(s) and returns the target alias
    /// the caller should add that relation's own columns under.
    fn emit_join(
        &self,
        relation: &Relation,
        parent_alias: &str,
        counter: &mut AliasCounter,
    ) -> Result<(String, String), CompileError> {
        let target_table = self.registry.get_table_name(&relation.target_model);
        let q = |s: &str| self.quote(s);

        match relation.kind {
            RelationKind::OneToMany => {
                let alias = counter.next_table();
                let fk = &relation.foreign_key[0];
                let reference = &relation.references[0];
                let clause = format!(
                    " LEFT JOIN {} {} ON {}.{} = {}.{}",
                    q(&target_table),
                    alias,
                    alias,
                    q(fk),
                    parent_alias,
                    q(reference)
                );
                Ok((clause, alias))
            }
            RelationKind::ManyToOne => {
                let alias = counter.next_table();
                let fk = &relation.foreign_key[0];
                let reference = &relation.references[0];
                let clause = format!(
                    " LEFT JOIN {} {} ON {}.{} = {}.{}",
                    q(&target_table),
                    alias,
                    alias,
                    q(reference),
                    parent_alias,
                    q(fk)
                );
                Ok((clause, alias))
            }
            RelationKind::OneToOne => {
                if relation.is_owner {
                    let alias = counter.next_table();
                    let fk = &relation.foreign_key[0];
                    let reference = &relation.references[0];
                    let clause = format!(
                        " LEFT JOIN {} {} ON {}.{} = {}.{}",
                        q(&target_table),
                        alias,
                        alias,
                        q(reference),
                        parent_alias,
                        q(fk)
                    );
                    Ok((clause, alias))
                } else {
                    let alias = counter.next_table();
                    let fk = &relation.foreign_key[0];
                    let reference = &relation.references[0];
                    let clause = format!(
                        " LEFT JOIN {} {} ON {}.{} = {}.{}",
                        q(&target_table),
                        alias,
                        alias,
                        q(fk),
                        parent_alias,
                        q(reference)
                    );
                    Ok((clause, alias))
                }
            }
            RelationKind::ManyToMany => {
                let join_table = relation
                    .join_table
                    .as_ref()
                    .expect("validated at registration: M:N has join_table");
                let join_column = relation.join_column.as_ref().unwrap();
                let inverse_join_column = relation.inverse_join_column.as_ref().unwrap();
                let reference = &relation.references[0];

                let n = counter.next_number();
                let join_alias = format!("j{n}");
                let target_alias = format!("t{n}");

                let clause = format!(
                    " LEFT JOIN {} {} ON {}.{} = {}.{} LEFT JOIN {} {} ON {}.{} = {}.{}",
                    q(join_table),
                    join_alias,
                    join_alias,
                    q(join_column),
                    parent_alias,
                    q(reference),
                    q(&target_table),
                    target_alias,
                    target_alias,
                    q(reference),
                    join_alias,
                    q(inverse_join_column),
                );
                Ok((clause, target_alias))
            }
        }
    }

    /// Generates `table_alias.column AS alias_key` for every entry,
    /// preserving insertion order (`generate_select_columns`).
    pub fn generate_select_columns(&self, column_aliases: &IndexMap<String, ColumnAlias>) -> String {
        use itertools::Itertools;

        column_aliases
            .iter()
            .map(|(key, col)| {
                format!(
                    "{}.{} AS {}",
                    col.table_alias,
                    self.quote(&col.column_name),
                    self.quote(key)
                )
            })
            .join(", ")
    }
}

fn namespaced(prefix: &str, key: &str) -> String {
    format!("{prefix}__{key}")
}

fn add_model_columns(
    model: &Model,
    table_alias: &str,
    relation_path: Option<&str>,
    restrict_to: Option<&[String]>,
    out: &mut IndexMap<String, ColumnAlias>,
) {
    for field in model.fields.values() {
        if field.is_relation_marker {
            continue;
        }
        if let Some(allowed) = restrict_to {
            if !allowed.iter().any(|f| f == &field.name) {
                continue;
            }
        }
        let key = match relation_path {
            Some(path) => format!("{path}__{}", field.name),
            None => field.name.clone(),
        };
        out.insert(
            key,
            ColumnAlias {
                table_alias: table_alias.to_string(),
                column_name: field.column_name.clone(),
                model_name: model.name.clone(),
                relation_path: relation_path.map(str::to_string),
            },
        );
    }
}
