//! WHERE synthesis and relation-filter EXISTS synthesis.

use crate::context::{AliasCounter, SqlCompiler};
use crate::error::CompileError;
use prisma_value::PrismaValue;
use query_builder::placeholder;
use query_structure::{RelationFilter, RelationOp, ScalarCondition, ScalarOp, StringMatchMode, Where};

impl<'a> SqlCompiler<'a> {
    /// Binds a value as the next positional parameter and returns its
    /// placeholder text. Placeholder numbering tracks `args` directly —
    /// this is the single spot that guarantees "placeholder count ==
    /// args.len() == arg_types.len()".
    pub fn bind(&self, args: &mut Vec<PrismaValue>, value: PrismaValue) -> String {
        args.push(value);
        placeholder(self.dialect, args.len())
    }

    fn column(&self, alias: Option<&str>, column: &str) -> String {
        match alias {
            Some(a) => format!("{a}.{}", self.quote(column)),
            None => self.quote(column),
        }
    }

    /// Compiles a `where` mapping into a single boolean SQL expression
    /// (the conjunction of every top-level key), or `None` if the filter
    /// carries no conditions at all. `alias` is the current row's table
    /// alias — `Some("t0")` once a JOINed query is in play, `None` for
    /// an unaliased single-table query, emitted with no `t0` prefix at
    /// all when no JOINs, computed fields, or relation path are present.
    pub fn compile_where(
        &self,
        where_: &Where,
        model: &str,
        alias: Option<&str>,
        args: &mut Vec<PrismaValue>,
    ) -> Result<Option<String>, CompileError> {
        if where_.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::new();

        for scalar in &where_.scalars {
            self.reject_if_relation_field(model, &scalar.field)?;
            parts.push(self.compile_scalar_condition(scalar, alias, args)?);
        }

        for relation in &where_.relations {
            parts.push(self.compile_relation_filter(model, alias, relation, args)?);
        }

        if !where_.and.is_empty() {
            let mut conjoined = Vec::with_capacity(where_.and.len());
            for sub in &where_.and {
                if let Some(sql) = self.compile_where(sub, model, alias, args)? {
                    conjoined.push(format!("({sql})"));
                }
            }
            if !conjoined.is_empty() {
                parts.push(conjoined.join(" AND "));
            }
        }

        if !where_.or.is_empty() {
            let mut disjoined = Vec::with_capacity(where_.or.len());
            for sub in &where_.or {
                if let Some(sql) = self.compile_where(sub, model, alias, args)? {
                    disjoined.push(format!("({sql})"));
                }
            }
            if !disjoined.is_empty() {
                parts.push(format!("({})", disjoined.join(" OR ")));
            }
        }

        for sub in &where_.not {
            if let Some(sql) = self.compile_where(sub, model, alias, args)? {
                parts.push(format!("NOT ({sql})"));
            }
        }

        if let Some(path_filter) = &where_.relation_path {
            parts.push(self.compile_relation_path(model, alias, path_filter, args)?);
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(parts.join(" AND ")))
        }
    }

    fn reject_if_relation_field(&self, model: &str, field: &str) -> Result<(), CompileError> {
        if self.registry.get_relation(model, field).is_ok() {
            return Err(CompileError::MissingRelationOperator {
                model: model.to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    fn compile_scalar_condition(
        &self,
        cond: &ScalarCondition,
        alias: Option<&str>,
        args: &mut Vec<PrismaValue>,
    ) -> Result<String, CompileError> {
        let col = self.column(alias, &cond.field);

        let scalar_value = |v: &query_structure::FilterValue| -> PrismaValue {
            match v {
                query_structure::FilterValue::Scalar(p) => p.clone(),
                query_structure::FilterValue::List(_) => unreachable!("list handled by caller"),
                query_structure::FilterValue::Ops(_) => unreachable!("ops handled by caller"),
            }
        };

        Ok(match cond.op {
            ScalarOp::Equals => {
                let value = scalar_value(&cond.value);
                if value.is_null() {
                    format!("{col} IS NULL")
                } else {
                    let ph = self.bind(args, value);
                    format!("{col} = {ph}")
                }
            }
            ScalarOp::Not => {
                let value = scalar_value(&cond.value);
                if value.is_null() {
                    format!("{col} IS NOT NULL")
                } else {
                    let ph = self.bind(args, value);
                    format!("{col} <> {ph}")
                }
            }
            ScalarOp::Lt | ScalarOp::Lte | ScalarOp::Gt | ScalarOp::Gte => {
                let op = match cond.op {
                    ScalarOp::Lt => "<",
                    ScalarOp::Lte => "<=",
                    ScalarOp::Gt => ">",
                    ScalarOp::Gte => ">=",
                    _ => unreachable!(),
                };
                let ph = self.bind(args, scalar_value(&cond.value));
                format!("{col} {op} {ph}")
            }
            ScalarOp::In => self.compile_in(&col, &cond.value, args, false),
            ScalarOp::NotIn => self.compile_in(&col, &cond.value, args, true),
            ScalarOp::Contains | ScalarOp::StartsWith | ScalarOp::EndsWith => {
                self.compile_like(&col, cond.op, &cond.value, cond.mode, args)
            }
            ScalarOp::IsNull => format!("{col} IS NULL"),
            ScalarOp::IsNotNull => format!("{col} IS NOT NULL"),
            ScalarOp::EqualsOrNull => {
                let ph = self.bind(args, scalar_value(&cond.value));
                format!("({col} = {ph} OR {col} IS NULL)")
            }
            ScalarOp::InOrNull => {
                let list = as_list(&cond.value);
                if list.is_empty() {
                    format!("{col} IS NULL")
                } else {
                    let inner = self.compile_in(&col, &cond.value, args, false);
                    format!("({inner} OR {col} IS NULL)")
                }
            }
            ScalarOp::NotInOrNull => {
                let list = as_list(&cond.value);
                if list.is_empty() {
                    "(1=1)".to_string()
                } else {
                    let inner = self.compile_in(&col, &cond.value, args, true);
                    format!("({inner} OR {col} IS NULL)")
                }
            }
        })
    }

    /// `in`/`notIn`: an empty list is a constant, emitted as
    /// `(1=1)`/`(1=0)` so it still occupies zero parameter slots and
    /// adjacent placeholder numbering is untouched.
    fn compile_in(
        &self,
        col: &str,
        value: &query_structure::FilterValue,
        args: &mut Vec<PrismaValue>,
        negate: bool,
    ) -> String {
        let list = as_list(value);
        if list.is_empty() {
            return if negate { "(1=1)".to_string() } else { "(1=0)".to_string() };
        }
        let placeholders = list
            .iter()
            .map(|v| self.bind(args, v.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        let op = if negate { "NOT IN" } else { "IN" };
        format!("{col} {op} ({placeholders})")
    }

    fn compile_like(
        &self,
        col: &str,
        op: ScalarOp,
        value: &query_structure::FilterValue,
        mode: StringMatchMode,
        args: &mut Vec<PrismaValue>,
    ) -> String {
        let raw = match value {
            query_structure::FilterValue::Scalar(PrismaValue::String(s)) => s.clone(),
            query_structure::FilterValue::Scalar(other) => format!("{other:?}"),
            _ => String::new(),
        };
        let pattern = match op {
            ScalarOp::Contains => format!("%{raw}%"),
            ScalarOp::StartsWith => format!("{raw}%"),
            ScalarOp::EndsWith => format!("%{raw}"),
            _ => unreachable!(),
        };
        let operator = match mode {
            StringMatchMode::Insensitive => self.dialect.case_insensitive_like(),
            StringMatchMode::Default => "LIKE",
        };
        let ph = self.bind(args, PrismaValue::String(pattern));
        format!("{col} {operator} {ph}")
    }

    /// Relation-filter EXISTS synthesis. `parent_alias`
    /// is `None` for the un-aliased single-table case, in which case we
    /// fall back to the bare table name, matching `reject_if_relation_field`'s
    /// expectation that a relation filter always implies JOIN-worthy SQL.
    fn compile_relation_filter(
        &self,
        model: &str,
        parent_alias: Option<&str>,
        filter: &RelationFilter,
        args: &mut Vec<PrismaValue>,
    ) -> Result<String, CompileError> {
        let relation = self.registry.get_relation(model, &filter.field)?;
        let target_table = self.registry.get_table_name(&relation.target_model);
        let sub_alias = format!("sub_{}", filter.field);
        let parent = match parent_alias {
            Some(a) => a.to_string(),
            None => self.quote(&self.registry.get_table_name(model)),
        };

        // OneToMany, and the non-owning side of a OneToOne, point the
        // child's foreign key back at the parent's primary key. ManyToOne,
        // and the owning side of a OneToOne, hold the foreign key
        // themselves, so the columns swap.
        let child_holds_fk = match relation.kind {
            query_structure::RelationKind::OneToMany => true,
            query_structure::RelationKind::OneToOne => !relation.is_owner,
            query_structure::RelationKind::ManyToOne => false,
            query_structure::RelationKind::ManyToMany => false,
        };

        let (from_clause, link_condition) = match relation.kind {
            query_structure::RelationKind::OneToMany
            | query_structure::RelationKind::OneToOne
            | query_structure::RelationKind::ManyToOne => {
                let fk = &relation.foreign_key[0];
                let reference = &relation.references[0];
                let condition = if child_holds_fk {
                    format!("{sub_alias}.{} = {parent}.{}", self.quote(fk), self.quote(reference))
                } else {
                    format!("{sub_alias}.{} = {parent}.{}", self.quote(reference), self.quote(fk))
                };
                (format!("{} {sub_alias}", self.quote(&target_table)), condition)
            }
            query_structure::RelationKind::ManyToMany => {
                let join_table = relation.join_table.as_ref().unwrap();
                let join_column = relation.join_column.as_ref().unwrap();
                let inverse_join_column = relation.inverse_join_column.as_ref().unwrap();
                let reference = &relation.references[0];
                (
                    format!(
                        "{} INNER JOIN {} {sub_alias} ON {sub_alias}.{} = {}.{}",
                        self.quote(join_table),
                        self.quote(&target_table),
                        self.quote(reference),
                        self.quote(join_table),
                        self.quote(inverse_join_column),
                    ),
                    format!(
                        "{}.{} = {parent}.{}",
                        self.quote(join_table),
                        self.quote(join_column),
                        self.quote(reference)
                    ),
                )
            }
        };

        let inner_sql = self.compile_where(&filter.inner, &relation.target_model, Some(&sub_alias), args)?;

        let (exists_kw, predicate) = match filter.op {
            RelationOp::Some => (
                "EXISTS",
                match inner_sql {
                    Some(sql) => format!("{link_condition} AND {sql}"),
                    None => link_condition,
                },
            ),
            RelationOp::None => (
                "NOT EXISTS",
                match inner_sql {
                    Some(sql) => format!("{link_condition} AND {sql}"),
                    None => link_condition,
                },
            ),
            RelationOp::Every => {
                // `every` with no inner predicate is vacuously TRUE.
                match inner_sql {
                    None => return Ok("TRUE".to_string()),
                    Some(sql) => (
                        "NOT EXISTS",
                        format!("{link_condition} AND NOT ({sql})"),
                    ),
                }
            }
        };

        Ok(format!("{exists_kw} (SELECT 1 FROM {from_clause} WHERE {predicate})"))
    }

    /// `_relationPath` + `_relationWhere`: walks a dotted path through
    /// the registry the same way `compile_relations` would, chaining
    /// LEFT JOINs, and closes with a link back to the outer base row.
    fn compile_relation_path(
        &self,
        model: &str,
        base_alias: Option<&str>,
        path_filter: &query_structure::RelationPathFilter,
        args: &mut Vec<PrismaValue>,
    ) -> Result<String, CompileError> {
        let base = base_alias.unwrap_or(crate::context::BASE_ALIAS).to_string();
        let mut counter = AliasCounter::starting_at(1);
        let mut current_model = model.to_string();
        let mut parent_alias = base.clone();
        // (table, alias, on-condition); item 0's condition links back to
        // the outer base row and is moved into the WHERE predicate, since
        // a bare FROM item can't carry an ON clause.
        let mut from_items: Vec<(String, String, String)> = Vec::new();
        let mut last_alias = base.clone();

        for hop in &path_filter.path {
            let relation = self.registry.get_relation(&current_model, hop)?;
            let target_table = self.registry.get_table_name(&relation.target_model);
            let alias = format!("hop{}", counter.next_number());

            match relation.kind {
                query_structure::RelationKind::OneToMany => {
                    let on = format!(
                        "{alias}.{} = {parent_alias}.{}",
                        self.quote(&relation.foreign_key[0]),
                        self.quote(&relation.references[0])
                    );
                    from_items.push((target_table.clone(), alias.clone(), on));
                }
                query_structure::RelationKind::ManyToOne | query_structure::RelationKind::OneToOne => {
                    let on = format!(
                        "{alias}.{} = {parent_alias}.{}",
                        self.quote(&relation.references[0]),
                        self.quote(&relation.foreign_key[0])
                    );
                    from_items.push((target_table.clone(), alias.clone(), on));
                }
                query_structure::RelationKind::ManyToMany => {
                    let join_table = relation.join_table.as_ref().unwrap();
                    let join_column = relation.join_column.as_ref().unwrap();
                    let inverse_join_column = relation.inverse_join_column.as_ref().unwrap();
                    let reference = &relation.references[0];
                    let jn = format!("j{}", counter.next_number());
                    let on1 = format!(
                        "{jn}.{} = {parent_alias}.{}",
                        self.quote(join_column),
                        self.quote(reference)
                    );
                    from_items.push((join_table.clone(), jn.clone(), on1));
                    let on2 = format!(
                        "{alias}.{} = {jn}.{}",
                        self.quote(reference),
                        self.quote(inverse_join_column)
                    );
                    from_items.push((target_table.clone(), alias.clone(), on2));
                }
            };

            parent_alias = alias.clone();
            last_alias = alias;
            current_model = relation.target_model.clone();
        }

        let inner_sql = self.compile_where(&path_filter.inner, &current_model, Some(&last_alias), args)?;

        let mut joined_parts = Vec::new();
        let mut link_predicate = None;
        for (i, (table, alias, on)) in from_items.iter().enumerate() {
            if i == 0 {
                link_predicate = Some(on.clone());
                joined_parts.push(format!("{} {alias}", self.quote(table)));
            } else {
                joined_parts.push(format!("LEFT JOIN {} {alias} ON {on}", self.quote(table)));
            }
        }
        let joined = joined_parts.join(" ");

        let mut predicate = link_predicate.unwrap_or_else(|| "TRUE".to_string());
        if let Some(sql) = inner_sql {
            predicate.push_str(" AND ");
            predicate.push_str(&sql);
        }

        Ok(format!("EXISTS (SELECT 1 FROM {joined} WHERE {predicate})"))
    }
}

fn as_list(value: &query_structure::FilterValue) -> Vec<PrismaValue> {
    match value {
        query_structure::FilterValue::List(items) => items.clone(),
        query_structure::FilterValue::Scalar(v) => vec![v.clone()],
        query_structure::FilterValue::Ops(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Dialect;
    use prisma_value::TypeIdentifier;
    use query_structure::{Field, Model, Relation, RelationKind, SchemaRegistry};

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new(false);
        reg.register_model(
            Model::new("Product")
                .field(Field::scalar("id", TypeIdentifier::String).primary())
                .field(Field::scalar("isActive", TypeIdentifier::Boolean))
                .field(Field::scalar("price", TypeIdentifier::Float))
                .relation(Relation {
                    name: "reviews".into(),
                    kind: RelationKind::OneToMany,
                    target_model: "Review".into(),
                    foreign_key: vec!["productId".into()],
                    references: vec!["id".into()],
                    join_table: None,
                    join_column: None,
                    inverse_join_column: None,
                    inverse_relation: Some("product".into()),
                    is_owner: false,
                }),
        )
        .unwrap();
        reg.register_model(
            Model::new("Review")
                .field(Field::scalar("id", TypeIdentifier::String).primary())
                .field(Field::scalar("rating", TypeIdentifier::Int32))
                .field(Field::scalar("productId", TypeIdentifier::String)),
        )
        .unwrap();
        reg
    }

    #[test]
    fn simple_equals_filter() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ = query_structure::Where::from_json(&serde_json::json!({"isActive": true})).unwrap();
        let mut args = Vec::new();
        let sql = compiler.compile_where(&where_, "Product", None, &mut args).unwrap().unwrap();
        assert_eq!(sql, "\"isActive\" = $1");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn relation_some_emits_exists() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ =
            query_structure::Where::from_json(&serde_json::json!({"reviews": {"some": {"rating": {"gte": 4}}}}))
                .unwrap();
        let mut args = Vec::new();
        let sql = compiler.compile_where(&where_, "Product", None, &mut args).unwrap().unwrap();
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM \"Review\" sub_reviews WHERE sub_reviews.\"productId\" = \"Product\".\"id\" AND sub_reviews.\"rating\" >= $1)"
        );
    }

    #[test]
    fn empty_in_list_is_always_false() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ = query_structure::Where::from_json(&serde_json::json!({"id": {"in": []}})).unwrap();
        let mut args = Vec::new();
        let sql = compiler.compile_where(&where_, "Product", None, &mut args).unwrap().unwrap();
        assert_eq!(sql, "(1=0)");
        assert!(args.is_empty());
    }

    #[test]
    fn empty_not_in_list_is_always_true() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ = query_structure::Where::from_json(&serde_json::json!({"id": {"notIn": []}})).unwrap();
        let mut args = Vec::new();
        let sql = compiler.compile_where(&where_, "Product", None, &mut args).unwrap().unwrap();
        assert_eq!(sql, "(1=1)");
    }

    #[test]
    fn relation_field_without_relation_operator_is_rejected() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ = query_structure::Where::from_json(&serde_json::json!({"reviews": "nope"})).unwrap();
        let mut args = Vec::new();
        let err = compiler.compile_where(&where_, "Product", None, &mut args).unwrap_err();
        assert!(matches!(err, CompileError::MissingRelationOperator { .. }));
    }

    #[test]
    fn relation_path_emits_left_join_with_base_link_in_where() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ = query_structure::Where::from_json(&serde_json::json!({
            "_relationPath": "reviews",
            "_relationWhere": {"rating": {"gte": 4}}
        }))
        .unwrap();
        let mut args = Vec::new();
        let sql = compiler.compile_where(&where_, "Product", None, &mut args).unwrap().unwrap();
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM \"Review\" hop1 WHERE hop1.\"productId\" = t0.\"id\" AND hop1.\"rating\" >= $1)"
        );
        assert!(!sql.contains("INNER JOIN"));
    }

    #[test]
    fn and_or_not_compose_with_parens() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let where_ = query_structure::Where::from_json(&serde_json::json!({
            "AND": [{"isActive": true}, {"price": {"gt": 10.0}}],
        }))
        .unwrap();
        let mut args = Vec::new();
        let sql = compiler.compile_where(&where_, "Product", None, &mut args).unwrap().unwrap();
        assert_eq!(sql, "(\"isActive\" = $1) AND (\"price\" > $2)");
    }
}
